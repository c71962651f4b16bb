use serde::{Deserialize, Serialize};

/// Tunables for the command queue and timeout supervision.
///
/// The defaults mirror the device firmware's expectations: a 3000 ms write
/// timeout polled every 100 ms, with up to 3 resends before a command is
/// abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// How long to wait for a command to complete before resending, in ms.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Maximum number of resends before a command is abandoned.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Period of the timeout supervision tick, in ms.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    /// Largest track payload the device will store.
    #[serde(default = "default_max_stored_track_size")]
    pub max_stored_track_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout_ms(),
            max_retries: default_max_retries(),
            tick_period_ms: default_tick_period_ms(),
            max_stored_track_size: default_max_stored_track_size(),
        }
    }
}

fn default_write_timeout_ms() -> u64 {
    3000
}
fn default_max_retries() -> u32 {
    3
}
fn default_tick_period_ms() -> u64 {
    100
}
fn default_max_stored_track_size() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "blescent".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
