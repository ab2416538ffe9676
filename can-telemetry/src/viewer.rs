//! Viewer abstraction
//!
//! A viewer is anything a transport layer (WebSocket session, TCP client,
//! console) hands to the hub to receive live updates. Sends must not block:
//! the broadcaster calls them while holding the registry lock.

use crate::types::SignalUpdate;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::fmt;

/// Why a viewer did not accept an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    /// The viewer is gone; the hub drops it from the registry
    #[error("viewer disconnected")]
    Disconnected,

    /// The viewer is lagging; this update is skipped for it only
    #[error("viewer queue full")]
    Full,
}

/// A live consumer of signal updates
pub trait Viewer: Send + Sync {
    /// Deliver one update without blocking
    fn send(&self, update: &SignalUpdate) -> Result<(), ViewerError>;
}

/// Identifier assigned to a viewer on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Viewer backed by a bounded in-process channel
///
/// The transport side owns the [`Receiver`] and forwards whatever arrives to
/// its client. Dropping the receiver disconnects the viewer.
#[derive(Debug, Clone)]
pub struct ChannelViewer {
    tx: Sender<SignalUpdate>,
}

impl ChannelViewer {
    /// Create a viewer and the receiver its transport reads from
    pub fn new(capacity: usize) -> (Self, Receiver<SignalUpdate>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl Viewer for ChannelViewer {
    fn send(&self, update: &SignalUpdate) -> Result<(), ViewerError> {
        self.tx.try_send(update.clone()).map_err(|e| match e {
            TrySendError::Full(_) => ViewerError::Full,
            TrySendError::Disconnected(_) => ViewerError::Disconnected,
        })
    }
}
