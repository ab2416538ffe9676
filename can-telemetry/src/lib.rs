//! CAN Telemetry Library
//!
//! Ingests CAN frames carried as text over UDP, decodes them into named, scaled
//! physical values with a JSON signal map, and fans the values out to live
//! viewers while keeping the latest value of every signal.
//!
//! # Architecture
//!
//! ```text
//! socket → FrameParser → Decoder → distribution channel → Broadcaster → Hub
//!                                                                      ├─ latest-value cache
//!                                                                      └─ connected viewers
//! ```
//!
//! Three long-lived threads do the work (listener, broadcaster, stats
//! reporter). They share nothing but the channel and the hub, and each one
//! stops within one receive/dequeue timeout of its [`CancellationToken`] being
//! cancelled.
//!
//! The library does NOT:
//! - Serve HTML or WebSocket connections (transports plug in via [`Viewer`])
//! - Keep value history (only the latest value per signal)
//! - Install signal handlers (the application cancels the token)
//!
//! # Example Usage
//!
//! ```no_run
//! use can_telemetry::{CancellationToken, ChannelViewer, PipelineConfig, SignalMap, TelemetryService};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let signal_map = SignalMap::load_or_empty(Path::new("can_map.json"));
//! let token = CancellationToken::new();
//! let service = TelemetryService::start(PipelineConfig::new(), signal_map, token.clone()).unwrap();
//!
//! // A transport registers each client as a viewer
//! let (viewer, updates) = ChannelViewer::new(1024);
//! service.hub().on_connect(Arc::new(viewer));
//!
//! for update in updates.iter().take(10) {
//!     println!("{}", update);
//! }
//!
//! token.cancel();
//! service.shutdown().unwrap();
//! ```

// Public modules
pub mod broadcaster;
pub mod cache;
pub mod channel;
pub mod config;
pub mod decoder;
pub mod hub;
pub mod listener;
pub mod service;
pub mod shutdown;
pub mod stats;
pub mod types;
pub mod viewer;
pub mod wire;

// Re-export main types for convenience
pub use broadcaster::Broadcaster;
pub use cache::LatestValueCache;
pub use channel::{distribution_channel, Pop, UpdateReceiver, UpdateSender};
pub use config::PipelineConfig;
pub use decoder::{Decoder, MapStats};
pub use hub::Hub;
pub use listener::IngestionListener;
pub use service::{ServiceHandle, TelemetryService};
pub use shutdown::CancellationToken;
pub use signals::{FrameDefinition, SignalDefinition, SignalMap};
pub use stats::{HealthReport, Stats, StatsReporter, StatsSnapshot};
pub use types::{ParseError, RawFrame, Result, SignalUpdate, TelemetryError, Timestamp};
pub use viewer::{ChannelViewer, Viewer, ViewerError, ViewerId};
pub use wire::{encode_frame, FrameParser};

// Internal modules (not exposed in public API)
mod message_decoder;
mod signals;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
