//! Distribution channel between the listener and the broadcaster
//!
//! A FIFO of [`SignalUpdate`]s backed by `crossbeam-channel`. Unbounded by
//! default: a stalled broadcaster grows the queue rather than silently
//! dropping telemetry at the producer.

use crate::types::{Result, SignalUpdate, TelemetryError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Create a distribution channel (`None` = unbounded)
pub fn distribution_channel(capacity: Option<usize>) -> (UpdateSender, UpdateReceiver) {
    let (tx, rx) = match capacity {
        Some(cap) => crossbeam_channel::bounded(cap),
        None => crossbeam_channel::unbounded(),
    };
    (UpdateSender { tx }, UpdateReceiver { rx })
}

/// Producer half, held by the listener
#[derive(Debug, Clone)]
pub struct UpdateSender {
    tx: Sender<SignalUpdate>,
}

impl UpdateSender {
    /// Enqueue an update
    ///
    /// Only blocks when the channel is bounded and full. Fails once the
    /// consumer has been dropped.
    pub fn push(&self, update: SignalUpdate) -> Result<()> {
        self.tx.send(update).map_err(|_| TelemetryError::ChannelClosed)
    }

    /// Number of updates waiting to be broadcast
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Outcome of a timed dequeue
#[derive(Debug, Clone, PartialEq)]
pub enum Pop {
    /// An update was dequeued
    Update(SignalUpdate),
    /// Nothing arrived within the timeout
    Empty,
    /// All producers are gone and the queue is drained
    Closed,
}

/// Consumer half, held by the broadcaster
#[derive(Debug)]
pub struct UpdateReceiver {
    rx: Receiver<SignalUpdate>,
}

impl UpdateReceiver {
    /// Dequeue the next update, waiting at most `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Pop {
        match self.rx.recv_timeout(timeout) {
            Ok(update) => Pop::Update(update),
            Err(RecvTimeoutError::Timeout) => Pop::Empty,
            Err(RecvTimeoutError::Disconnected) => Pop::Closed,
        }
    }

    /// Dequeue without waiting
    pub fn try_pop(&self) -> Option<SignalUpdate> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
