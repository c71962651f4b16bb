//! Inbound byte accumulation.
//!
//! BLE notifications arrive as arbitrarily small fragments, padded with
//! heartbeat bytes whenever the device has nothing to say. The accumulator
//! strips the padding, buffers real bytes while a response is expected, and
//! reports the codec's verdict after every fragment.

use crate::protocol::codec::{self, DecodeOutcome, HEARTBEAT_BYTE};
use tracing::{debug, trace};

/// What one inbound fragment produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulated {
    /// Leading heartbeat padding was stripped from this fragment.
    pub heartbeat: bool,
    /// Bytes that survived stripping (empty for pure heartbeat fragments).
    pub data: Vec<u8>,
    /// Decode verdict, present only when bytes reached the parser.
    pub outcome: Option<DecodeOutcome>,
}

/// Accumulates response bytes while exactly one response-expecting command
/// is in flight.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    buffer: Vec<u8>,
    enabled: bool,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start collecting bytes for the response to a just-sent command.
    pub fn arm(&mut self) {
        self.enabled = true;
    }

    pub fn is_armed(&self) -> bool {
        self.enabled
    }

    /// Drop any partial response and stop collecting (link teardown).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.enabled = false;
    }

    /// Feed one raw notification fragment.
    ///
    /// A completed parse (valid or invalid) clears the buffer and disarms
    /// the accumulator; it is re-armed by the next response-expecting send.
    /// An incomplete parse retains the buffer for the next fragment.
    pub fn on_bytes(&mut self, raw: &[u8]) -> Accumulated {
        let stripped = raw
            .iter()
            .take_while(|b| **b == HEARTBEAT_BYTE)
            .count();
        if stripped > 0 {
            trace!("stripped {} heartbeat byte(s)", stripped);
        }
        let data = &raw[stripped..];

        let mut result = Accumulated {
            heartbeat: stripped > 0,
            data: data.to_vec(),
            outcome: None,
        };
        if !self.enabled || data.is_empty() {
            return result;
        }

        self.buffer.extend_from_slice(data);
        debug!("response buffer now {} byte(s): {:02X?}", self.buffer.len(), self.buffer);

        let outcome = codec::decode(&self.buffer);
        match outcome {
            DecodeOutcome::Incomplete => {}
            DecodeOutcome::Valid(_) | DecodeOutcome::Invalid => {
                self.buffer.clear();
                self.enabled = false;
            }
        }
        result.outcome = Some(outcome);
        result
    }
}
