//! Domain types: engine events, link state, and configuration.

pub mod models;
pub mod settings;

pub use models::{DeviceEvent, LinkState, RfidRead};
pub use settings::{EngineSettings, LogSettings};
