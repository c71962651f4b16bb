//! Outbound command queue.
//!
//! FIFO of pending commands with at most one in flight. The queue itself is
//! a pure state machine: the engine feeds it the current time on every
//! supervision tick and acts on the returned verdict, which keeps the
//! timeout/retry logic testable without a runtime.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// One command waiting in, or at the head of, the queue.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    /// Encoded frame bytes, resent verbatim on retry.
    pub frame: Vec<u8>,
    /// Binary-dialect commands expect a framed response; legacy ones are
    /// complete once the local write is confirmed.
    pub expects_response: bool,
    /// Timeouts survived so far by the in-flight command.
    pub attempts: u32,
    pub enqueued_at: Instant,
    pub sent_at: Option<Instant>,
}

/// Instruction to hand a frame to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOrder {
    pub frame: Vec<u8>,
    pub expects_response: bool,
}

/// Verdict of one supervision tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing in flight and nothing pending; the tick can stop.
    Idle,
    /// The in-flight command is still within its timeout window.
    Waiting,
    /// The in-flight command completed; drive the next one.
    Completed(QueuedCommand),
    /// Timeout elapsed with retries left; resend the identical frame.
    Resend(SendOrder),
    /// Retries exhausted; the command is dropped and the queue advances.
    Abandoned(QueuedCommand),
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<QueuedCommand>,
    /// True from the moment the head is sent until its completion is
    /// recorded. The completed head is dequeued by the next tick.
    processing: bool,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn has_in_flight(&self) -> bool {
        self.processing
    }

    /// Append a command. The caller must follow up with [`Self::drive`].
    pub fn enqueue(&mut self, frame: Vec<u8>, expects_response: bool, now: Instant) {
        self.pending.push_back(QueuedCommand {
            frame,
            expects_response,
            attempts: 0,
            enqueued_at: now,
            sent_at: None,
        });
    }

    /// Put the head in flight if the link is up and nothing else is.
    ///
    /// A dead link flushes the queue instead: stale pre-reconnect commands
    /// are never resumed, callers must reissue them.
    pub fn drive(&mut self, connected: bool, now: Instant) -> Option<SendOrder> {
        if !connected {
            if !self.pending.is_empty() {
                debug!("link down, flushing {} pending command(s)", self.pending.len());
            }
            self.clear();
            return None;
        }
        if self.processing {
            return None;
        }
        let head = self.pending.front_mut()?;
        head.attempts = 0;
        head.sent_at = Some(now);
        self.processing = true;
        Some(SendOrder {
            frame: head.frame.clone(),
            expects_response: head.expects_response,
        })
    }

    /// Record that the in-flight command finished (valid response parsed,
    /// or local write confirmed for a no-response command).
    pub fn complete_in_flight(&mut self) {
        self.processing = false;
    }

    /// Evaluate the in-flight command against the timeout policy.
    pub fn tick(&mut self, now: Instant, timeout: Duration, max_retries: u32) -> TickOutcome {
        if !self.processing {
            return match self.pending.pop_front() {
                Some(done) => TickOutcome::Completed(done),
                None => TickOutcome::Idle,
            };
        }

        let head = match self.pending.front_mut() {
            Some(head) => head,
            None => {
                self.processing = false;
                return TickOutcome::Idle;
            }
        };

        let sent_at = head.sent_at.unwrap_or(now);
        if now.duration_since(sent_at) <= timeout {
            return TickOutcome::Waiting;
        }

        head.attempts += 1;
        if head.attempts > max_retries {
            self.processing = false;
            match self.pending.pop_front() {
                Some(abandoned) => TickOutcome::Abandoned(abandoned),
                None => TickOutcome::Idle,
            }
        } else {
            head.sent_at = Some(now);
            TickOutcome::Resend(SendOrder {
                frame: head.frame.clone(),
                expects_response: head.expects_response,
            })
        }
    }

    /// Drop everything: pending commands and in-flight state.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing = false;
    }
}
