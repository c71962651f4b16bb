//! Scent-diffuser wire protocol.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     DiffuserEngine                       │
//! │        (engine façade — public API of the crate)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌─────────────┐  ┌──────────┐
//! │   Codec   │  │ Accumulator │  │ Firmware │
//! │           │  │             │  │          │
//! │ - framing │  │ - heartbeat │  │ - dialect│
//! │ - checksum│  │   stripping │  │   gating │
//! │ - payloads│  │ - reassembly│  │ - parsing│
//! └───────────┘  └─────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`codec`] - Frame encoding, incremental decoding, payload parsers
//! - [`accumulator`] - Inbound byte buffer with heartbeat stripping
//! - [`firmware`] - Firmware revision parsing and dialect selection

pub mod accumulator;
pub mod codec;
pub mod firmware;

pub use accumulator::ResponseAccumulator;
pub use codec::{DecodeOutcome, Opcode, ResponseFrame};
pub use firmware::FirmwareRevision;
