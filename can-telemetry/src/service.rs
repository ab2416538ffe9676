//! Pipeline orchestration
//!
//! Builds the shared state, spawns the three long-lived workers (listener,
//! broadcaster, stats reporter) and joins them on shutdown.

use crate::broadcaster::Broadcaster;
use crate::cache::LatestValueCache;
use crate::channel::distribution_channel;
use crate::config::PipelineConfig;
use crate::decoder::Decoder;
use crate::hub::Hub;
use crate::listener::IngestionListener;
use crate::shutdown::CancellationToken;
use crate::signals::SignalMap;
use crate::stats::{Stats, StatsReporter};
use crate::types::{Result, TelemetryError};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How often [`ServiceHandle::run_until_cancelled`] checks on the workers
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(100);

/// Entry point: start the pipeline
pub struct TelemetryService;

impl TelemetryService {
    /// Spawn every worker and return a handle to the running pipeline
    pub fn start(
        config: PipelineConfig,
        signal_map: SignalMap,
        token: CancellationToken,
    ) -> Result<ServiceHandle> {
        let map_stats = signal_map.stats();
        log::info!(
            "Starting telemetry pipeline ({} frames, {} signals mapped)",
            map_stats.num_frames,
            map_stats.num_signals
        );
        if signal_map.is_empty() {
            log::warn!("Signal map is empty, datagrams will be received but nothing decoded");
        }

        let cache = match signal_map.max_distinct_names() {
            0 => LatestValueCache::new(),
            bound => LatestValueCache::with_expected_bound(bound),
        };
        let stats = Arc::new(Stats::new());
        let hub = Arc::new(Hub::new(cache, Arc::clone(&stats)));
        let (sender, receiver) = distribution_channel(config.channel_capacity);

        let listener = IngestionListener::new(
            config.clone(),
            Decoder::with_map(signal_map),
            sender,
            Arc::clone(&stats),
            token.clone(),
        );
        let bound_addr = listener.bound_addr();
        let broadcaster = Broadcaster::new(
            receiver,
            Arc::clone(&hub),
            token.clone(),
            config.pop_timeout(),
            config.idle_sleep(),
        );
        let reporter = StatsReporter::new(Arc::clone(&hub), config.stats_interval(), token.clone());

        let listener = std::thread::Builder::new()
            .name("telemetry-listener".to_string())
            .spawn(move || listener.run())?;
        let broadcaster = std::thread::Builder::new()
            .name("telemetry-broadcaster".to_string())
            .spawn(move || broadcaster.run())?;
        let reporter = std::thread::Builder::new()
            .name("telemetry-stats".to_string())
            .spawn(move || reporter.run())?;

        log::info!("✓ All pipeline workers started");

        Ok(ServiceHandle {
            hub,
            token,
            bound_addr,
            listener,
            broadcaster,
            reporter,
        })
    }
}

/// Handle to a running pipeline
pub struct ServiceHandle {
    hub: Arc<Hub>,
    token: CancellationToken,
    bound_addr: Arc<OnceLock<SocketAddr>>,
    listener: JoinHandle<Result<()>>,
    broadcaster: JoinHandle<u64>,
    reporter: JoinHandle<()>,
}

impl ServiceHandle {
    /// Query interface for transports and snapshot consumers
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Address the listener is bound to, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound_addr.get().copied()
    }

    /// Wait up to `timeout` for the listener to bind
    pub fn wait_until_bound(&self, timeout: Duration) -> Option<SocketAddr> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(addr) = self.local_addr() {
                return Some(addr);
            }
            if Instant::now() >= deadline || self.listener.is_finished() {
                return None;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Block until the token is cancelled or the listener stops on its own
    /// (e.g. bind attempts exhausted), then shut everything down
    pub fn run_until_cancelled(self) -> Result<()> {
        while !self.token.is_cancelled() && !self.listener.is_finished() {
            std::thread::sleep(SUPERVISE_INTERVAL);
        }
        self.shutdown()
    }

    /// Cancel every worker and wait for them to exit
    ///
    /// Every worker is joined before anything is reported. Returns the first
    /// panicked worker (listener, broadcaster, stats reporter), otherwise the
    /// listener's own error if it stopped with one.
    pub fn shutdown(self) -> Result<()> {
        log::info!("Stopping pipeline workers...");
        self.token.cancel();

        let listener = join("telemetry-listener", self.listener);
        let broadcaster = join("telemetry-broadcaster", self.broadcaster);
        let reporter = join("telemetry-stats", self.reporter);

        if let Ok(broadcast) = &broadcaster {
            log::info!("✓ Pipeline stopped after {} broadcast updates", broadcast);
        }
        log::info!("{}", self.hub.get_health().summary());

        let listener_result = listener?;
        broadcaster?;
        reporter?;
        listener_result
    }
}

fn join<T>(name: &str, handle: JoinHandle<T>) -> Result<T> {
    handle.join().map_err(|_| {
        log::error!("Worker thread '{}' panicked", name);
        TelemetryError::WorkerPanicked(name.to_string())
    })
}
