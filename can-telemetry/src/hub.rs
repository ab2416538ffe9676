//! Telemetry hub: latest-value cache, viewer registry and query interface
//!
//! The hub is the seam between the pipeline and whatever transport serves
//! viewers. The broadcaster feeds it through [`Hub::on_update`]; the transport
//! calls [`Hub::on_connect`] / [`Hub::on_disconnect`] and the read-only
//! queries.
//!
//! Cache writes and viewer publishing happen under the registry lock, and
//! `on_connect` replays the snapshot under the same lock. A new viewer
//! therefore sees every name exactly once in its snapshot and then only
//! updates that were cached after it.

use crate::cache::LatestValueCache;
use crate::stats::{HealthReport, Stats};
use crate::types::SignalUpdate;
use crate::viewer::{Viewer, ViewerError, ViewerId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct Registration {
    id: ViewerId,
    viewer: Arc<dyn Viewer>,
}

/// Shared state read by viewers and queries, written by the broadcaster
pub struct Hub {
    cache: LatestValueCache,
    viewers: Mutex<Vec<Registration>>,
    next_viewer_id: AtomicU64,
    stats: Arc<Stats>,
}

impl Hub {
    pub fn new(cache: LatestValueCache, stats: Arc<Stats>) -> Self {
        Self {
            cache,
            viewers: Mutex::new(Vec::new()),
            next_viewer_id: AtomicU64::new(1),
            stats,
        }
    }

    /// Counters shared with the listener
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Store an update and publish it to every connected viewer
    ///
    /// Returns how many viewers accepted it. A viewer that reports
    /// [`ViewerError::Disconnected`] or panics is removed; one that is full
    /// just misses this update.
    pub fn on_update(&self, update: SignalUpdate) -> usize {
        let mut viewers = self.viewers.lock();
        self.cache.insert(update.clone());

        let mut delivered = 0;
        viewers.retain(|registration| {
            match send_contained(registration.id, registration.viewer.as_ref(), &update) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(ViewerError::Full) => {
                    log::debug!("{} lagging, dropped {}", registration.id, update.name);
                    true
                }
                Err(ViewerError::Disconnected) => {
                    log::info!("{} disconnected", registration.id);
                    false
                }
            }
        });

        delivered
    }

    /// Register a viewer and replay the current snapshot to it
    ///
    /// The viewer's queue must hold at least one value per cached name
    /// ([`SignalMap::max_distinct_names`] bounds that). If it fills during the
    /// replay, the rest of the snapshot is skipped and the viewer is still
    /// registered: it starts with a partial view and catches up as each name
    /// is next updated.
    ///
    /// [`SignalMap::max_distinct_names`]: crate::SignalMap::max_distinct_names
    pub fn on_connect(&self, viewer: Arc<dyn Viewer>) -> ViewerId {
        let id = ViewerId(self.next_viewer_id.fetch_add(1, Ordering::Relaxed));
        let mut viewers = self.viewers.lock();

        let snapshot = self.cache.snapshot();
        let mut replayed = 0;
        for update in snapshot.values() {
            match send_contained(id, viewer.as_ref(), update) {
                Ok(()) => replayed += 1,
                Err(ViewerError::Full) => {
                    log::warn!(
                        "{} queue filled during snapshot replay ({} of {} values sent)",
                        id,
                        replayed,
                        snapshot.len()
                    );
                    break;
                }
                Err(ViewerError::Disconnected) => {
                    log::info!("{} disconnected during snapshot replay", id);
                    return id;
                }
            }
        }

        viewers.push(Registration { id, viewer });
        log::info!("{} connected, replayed {} latest values", id, replayed);
        id
    }

    /// Remove a viewer; returns false if it was not registered
    pub fn on_disconnect(&self, id: ViewerId) -> bool {
        let mut viewers = self.viewers.lock();
        let before = viewers.len();
        viewers.retain(|registration| registration.id != id);
        let removed = viewers.len() != before;
        if removed {
            log::info!("{} disconnected", id);
        }
        removed
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.lock().len()
    }

    /// Every latest value, keyed by name
    pub fn get_all_latest(&self) -> BTreeMap<String, SignalUpdate> {
        self.cache.snapshot()
    }

    /// Latest value of one signal
    pub fn get_latest(&self, name: &str) -> Option<SignalUpdate> {
        self.cache.get(name)
    }

    /// Uptime, counters and signal count
    pub fn get_health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            uptime: self.stats.uptime().as_secs_f64(),
            stats: self.stats.snapshot(),
            signal_count: self.cache.len(),
        }
    }
}

/// Send to a viewer, treating a panic inside the transport as a disconnect
fn send_contained(
    id: ViewerId,
    viewer: &dyn Viewer,
    update: &SignalUpdate,
) -> Result<(), ViewerError> {
    panic::catch_unwind(AssertUnwindSafe(|| viewer.send(update))).unwrap_or_else(|_| {
        log::error!("{} panicked while sending {}, dropping it", id, update.name);
        Err(ViewerError::Disconnected)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::ChannelViewer;
    use parking_lot::Mutex as PlMutex;

    fn hub() -> Hub {
        Hub::new(LatestValueCache::new(), Arc::new(Stats::new()))
    }

    fn update(name: &str, value: f64) -> SignalUpdate {
        SignalUpdate::with_timestamp(name, value, "mV", value)
    }

    /// Viewer that always fails, counting attempts
    struct BrokenViewer {
        attempts: PlMutex<usize>,
    }

    impl Viewer for BrokenViewer {
        fn send(&self, _update: &SignalUpdate) -> Result<(), ViewerError> {
            *self.attempts.lock() += 1;
            Err(ViewerError::Disconnected)
        }
    }

    /// Viewer whose transport panics on one particular signal
    struct PanickingViewer {
        poison: &'static str,
    }

    impl Viewer for PanickingViewer {
        fn send(&self, update: &SignalUpdate) -> Result<(), ViewerError> {
            if update.name == self.poison {
                panic!("transport failure on {}", update.name);
            }
            Ok(())
        }
    }

    #[test]
    fn test_panicking_viewer_is_dropped_and_others_keep_receiving() {
        let hub = hub();
        let (healthy, rx) = ChannelViewer::new(16);
        hub.on_connect(Arc::new(healthy));
        hub.on_connect(Arc::new(PanickingViewer { poison: "bad" }));
        assert_eq!(hub.viewer_count(), 2);

        assert_eq!(hub.on_update(update("bad", 1.0)), 1);
        assert_eq!(hub.viewer_count(), 1);
        assert_eq!(hub.on_update(update("good", 2.0)), 1);

        let names: Vec<String> = rx.try_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["bad", "good"]);
        assert_eq!(hub.get_latest("bad").unwrap().value, 1.0);
    }

    #[test]
    fn test_viewer_panicking_during_replay_is_not_registered() {
        let hub = hub();
        hub.on_update(update("bad", 1.0));
        hub.on_connect(Arc::new(PanickingViewer { poison: "bad" }));
        assert_eq!(hub.viewer_count(), 0);
    }

    #[test]
    fn test_undersized_viewer_gets_partial_replay_then_live() {
        let hub = hub();
        hub.on_update(update("a", 1.0));
        hub.on_update(update("b", 2.0));
        hub.on_update(update("c", 3.0));

        let (viewer, rx) = ChannelViewer::new(1);
        hub.on_connect(Arc::new(viewer));
        assert_eq!(hub.viewer_count(), 1);

        let replay: Vec<String> = rx.try_iter().map(|u| u.name).collect();
        assert_eq!(replay, vec!["a"]);

        assert_eq!(hub.on_update(update("c", 4.0)), 1);
        assert_eq!(rx.try_recv().unwrap(), update("c", 4.0));
    }

    #[test]
    fn test_update_reaches_all_viewers_and_cache() {
        let hub = hub();
        let (a, rx_a) = ChannelViewer::new(16);
        let (b, rx_b) = ChannelViewer::new(16);
        hub.on_connect(Arc::new(a));
        hub.on_connect(Arc::new(b));

        assert_eq!(hub.on_update(update("group-1-voltage-1", 3900.0)), 2);
        assert_eq!(rx_a.try_recv().unwrap().value, 3900.0);
        assert_eq!(rx_b.try_recv().unwrap().value, 3900.0);
        assert_eq!(hub.get_latest("group-1-voltage-1").unwrap().value, 3900.0);
    }

    #[test]
    fn test_connect_replays_snapshot_then_live_only() {
        let hub = hub();
        hub.on_update(update("group-1-voltage-1", 1.0));
        hub.on_update(update("group-1-voltage-2", 2.0));
        hub.on_update(update("group-1-voltage-1", 3.0));

        let (viewer, rx) = ChannelViewer::new(16);
        hub.on_connect(Arc::new(viewer));

        let replay: Vec<SignalUpdate> = rx.try_iter().collect();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay[0].name, "group-1-voltage-1");
        assert_eq!(replay[0].value, 3.0);
        assert_eq!(replay[1].value, 2.0);

        hub.on_update(update("group-1-voltage-2", 4.0));
        let live: Vec<SignalUpdate> = rx.try_iter().collect();
        assert_eq!(live, vec![update("group-1-voltage-2", 4.0)]);
    }

    #[test]
    fn test_failed_viewer_does_not_block_others() {
        let hub = hub();
        let broken = Arc::new(BrokenViewer {
            attempts: PlMutex::new(0),
        });
        let (good, rx) = ChannelViewer::new(16);

        hub.on_update(update("seed", 0.0));
        // Broken viewer fails during replay and is never registered
        hub.on_connect(broken.clone());
        hub.on_connect(Arc::new(good));
        assert_eq!(hub.viewer_count(), 1);

        assert_eq!(hub.on_update(update("x", 1.0)), 1);
        assert_eq!(rx.try_iter().count(), 2);
        assert_eq!(*broken.attempts.lock(), 1);
    }

    #[test]
    fn test_disconnected_viewer_is_pruned_on_publish() {
        let hub = hub();
        let (viewer, rx) = ChannelViewer::new(16);
        let (other, other_rx) = ChannelViewer::new(16);
        hub.on_connect(Arc::new(viewer));
        hub.on_connect(Arc::new(other));
        drop(rx);

        assert_eq!(hub.on_update(update("x", 1.0)), 1);
        assert_eq!(hub.viewer_count(), 1);
        assert_eq!(other_rx.try_recv().unwrap().name, "x");
    }

    #[test]
    fn test_full_viewer_is_kept() {
        let hub = hub();
        let (viewer, rx) = ChannelViewer::new(1);
        hub.on_connect(Arc::new(viewer));

        assert_eq!(hub.on_update(update("a", 1.0)), 1);
        assert_eq!(hub.on_update(update("b", 2.0)), 0);
        assert_eq!(hub.viewer_count(), 1);
        assert_eq!(rx.try_recv().unwrap().name, "a");
    }

    #[test]
    fn test_explicit_disconnect() {
        let hub = hub();
        let (viewer, _rx) = ChannelViewer::new(1);
        let id = hub.on_connect(Arc::new(viewer));
        assert!(hub.on_disconnect(id));
        assert!(!hub.on_disconnect(id));
        assert_eq!(hub.viewer_count(), 0);
    }

    #[test]
    fn test_health_reflects_cache_and_counters() {
        let hub = hub();
        hub.stats().record_received();
        hub.on_update(update("a", 1.0));
        hub.on_update(update("b", 1.0));

        let health = hub.get_health();
        assert_eq!(health.status, "ok");
        assert_eq!(health.signal_count, 2);
        assert_eq!(health.stats.packets_received, 1);
        assert!(health.uptime >= 0.0);
        assert_eq!(hub.get_all_latest().len(), 2);
    }
}
