//! Abstract byte transport under the protocol engine.
//!
//! The engine owns no Bluetooth plumbing. Whatever carries the bytes (a GATT
//! characteristic pair in production, a test double in tests) implements
//! [`Transport`] and forwards its inbound notifications to
//! [`crate::engine::DiffuserEngine::on_bytes_received`] and
//! [`crate::engine::DiffuserEngine::on_link_state_changed`].

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link is not connected")]
    NotConnected,
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// Future returned by [`Transport::send`], resolving when the local write
/// is acknowledged or fails.
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// One asynchronous send operation onto the wire.
///
/// The engine issues at most one outstanding `send` at a time, matching its
/// one-in-flight queue discipline.
pub trait Transport: Send + Sync {
    fn send(&self, frame: Vec<u8>) -> SendFuture<'_>;

    /// Tear the link down. Used by the firmware-negotiation recovery path
    /// when the device reports an impossible revision.
    fn disconnect(&self);
}
