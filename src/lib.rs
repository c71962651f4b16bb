//! Device-control library for a Bluetooth-LE scent-diffuser accessory.
//!
//! The crate implements the diffuser's binary command/response protocol on
//! top of an injected byte transport: frame encoding/decoding with an
//! additive checksum, an inbound accumulator that copes with fragmented,
//! heartbeat-padded notifications, and an outbound queue that enforces
//! one-in-flight delivery with bounded timeout/retry. BLE discovery,
//! connection and GATT plumbing stay outside, behind the [`Transport`]
//! trait.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► DiffuserEngine ──► FrameCodec.encode ──► CommandQueue ──► Transport.send
//!                ▲                                         │
//!                │ typed DeviceEvents                      │ timeout tick,
//!                │                                         ▼ bounded retry
//! Transport.on_bytes ──► ResponseAccumulator ──► FrameCodec.decode
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use blescent::{DiffuserEngine, DeviceEvent, EngineSettings, LinkState};
//! use tokio::sync::mpsc;
//!
//! let (events_tx, mut events_rx) = mpsc::unbounded_channel();
//! let engine = DiffuserEngine::new(transport, events_tx, EngineSettings::default());
//!
//! engine.on_link_state_changed(LinkState::Connected);
//! engine.set_firmware_revision_string("Revision 2.0");
//! engine.play_scent(30, 200, "0001");
//!
//! while let Some(event) = events_rx.recv().await {
//!     match event {
//!         DeviceEvent::Status { battery_percent, .. } => println!("{}%", battery_percent),
//!         _ => {}
//!     }
//! }
//! ```

pub mod domain;
pub mod engine;
pub mod logging;
pub mod protocol;
pub mod transport;

pub use domain::models::{DeviceEvent, LinkState, RfidRead};
pub use domain::settings::{EngineSettings, LogSettings};
pub use engine::DiffuserEngine;
pub use protocol::firmware::FirmwareRevision;
pub use transport::{Transport, TransportError};
