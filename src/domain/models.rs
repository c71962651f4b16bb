use crate::protocol::firmware::FirmwareRevision;

/// State of the BLE link as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// A decoded RFID response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfidRead {
    pub family_code: u16,
    pub identifier: String,
    pub track: Vec<u8>,
}

/// Events emitted by the engine towards the caller/UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The device sent heartbeat padding with no real data behind it.
    Heartbeat,
    /// Raw inbound bytes after heartbeat stripping, for diagnostics.
    RawDataReceived(Vec<u8>),
    /// Device status query result (opcode 2).
    Status {
        battery_percent: u8,
        has_offline_analytics: bool,
    },
    /// The device acknowledged a track write (opcode 3).
    TrackWritten,
    /// The track currently stored on the device (opcode 4).
    StoredTrack(Vec<u8>),
    /// An RFID tag read by the device (opcode 5).
    RfidRead(RfidRead),
    /// Offline analytics blob read from the device (opcode 8).
    OfflineAnalyticsRead(Vec<u8>),
    /// A recoverable protocol failure (bad frame, retries exhausted).
    CommunicationError(String),
    /// Firmware revision negotiated from the device information string.
    FirmwareRevisionDetermined(FirmwareRevision),
}
