//! Broadcaster worker
//!
//! Drains the distribution channel into the hub: each update overwrites the
//! latest-value cache entry for its name and is pushed to every connected
//! viewer, in exactly the order the listener enqueued it.

use crate::channel::{Pop, UpdateReceiver};
use crate::hub::Hub;
use crate::shutdown::CancellationToken;
use std::sync::Arc;
use std::time::Duration;

pub struct Broadcaster {
    receiver: UpdateReceiver,
    hub: Arc<Hub>,
    token: CancellationToken,
    pop_timeout: Duration,
    idle_sleep: Duration,
}

impl Broadcaster {
    pub fn new(
        receiver: UpdateReceiver,
        hub: Arc<Hub>,
        token: CancellationToken,
        pop_timeout: Duration,
        idle_sleep: Duration,
    ) -> Self {
        Self {
            receiver,
            hub,
            token,
            pop_timeout,
            idle_sleep,
        }
    }

    /// Run until cancelled or until every producer has gone away
    ///
    /// Returns the number of updates broadcast.
    pub fn run(&self) -> u64 {
        log::info!("Broadcaster started");
        let mut broadcast = 0u64;

        while !self.token.is_cancelled() {
            match self.receiver.pop_timeout(self.pop_timeout) {
                Pop::Update(update) => {
                    let delivered = self.hub.on_update(update);
                    log::trace!("Broadcast update to {} viewer(s)", delivered);
                    broadcast += 1;
                }
                Pop::Empty => {
                    self.token.sleep(self.idle_sleep);
                }
                Pop::Closed => {
                    log::info!("Distribution channel closed, broadcaster stopping");
                    break;
                }
            }
        }

        log::info!("Broadcaster exiting after {} updates", broadcast);
        broadcast
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LatestValueCache;
    use crate::channel::distribution_channel;
    use crate::stats::Stats;
    use crate::types::SignalUpdate;
    use crate::viewer::ChannelViewer;
    use std::time::Instant;

    fn setup() -> (crate::channel::UpdateSender, Broadcaster, Arc<Hub>, CancellationToken) {
        let (tx, rx) = distribution_channel(None);
        let hub = Arc::new(Hub::new(LatestValueCache::new(), Arc::new(Stats::new())));
        let token = CancellationToken::new();
        let broadcaster = Broadcaster::new(
            rx,
            Arc::clone(&hub),
            token.clone(),
            Duration::from_millis(50),
            Duration::from_millis(1),
        );
        (tx, broadcaster, hub, token)
    }

    #[test]
    fn test_drains_in_order_until_closed() {
        let (tx, broadcaster, hub, _token) = setup();
        let (viewer, rx) = ChannelViewer::new(64);
        hub.on_connect(Arc::new(viewer));

        for i in 0..10 {
            tx.push(SignalUpdate::with_timestamp("group-0-voltage-1", i as f64, "mV", 0.0))
                .unwrap();
        }
        drop(tx);

        assert_eq!(broadcaster.run(), 10);
        let values: Vec<f64> = rx.try_iter().map(|u| u.value).collect();
        assert_eq!(values, (0..10).map(|i| i as f64).collect::<Vec<_>>());
        assert_eq!(hub.get_latest("group-0-voltage-1").unwrap().value, 9.0);
    }

    struct PanicOnBad;

    impl crate::viewer::Viewer for PanicOnBad {
        fn send(&self, update: &SignalUpdate) -> Result<(), crate::viewer::ViewerError> {
            assert_ne!(update.name, "bad", "transport failure");
            Ok(())
        }
    }

    #[test]
    fn test_viewer_panic_does_not_stop_broadcasting() {
        let (tx, broadcaster, hub, _token) = setup();
        let (healthy, rx) = ChannelViewer::new(8);
        hub.on_connect(Arc::new(healthy));
        hub.on_connect(Arc::new(PanicOnBad));

        let handle = std::thread::spawn(move || broadcaster.run());
        tx.push(SignalUpdate::with_timestamp("bad", 1.0, "", 0.0)).unwrap();
        tx.push(SignalUpdate::with_timestamp("good", 2.0, "", 0.0)).unwrap();
        drop(tx);

        assert_eq!(handle.join().unwrap(), 2);
        let names: Vec<String> = rx.try_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["bad", "good"]);
        assert_eq!(hub.viewer_count(), 1);
    }

    #[test]
    fn test_stops_promptly_on_cancel() {
        let (_tx, broadcaster, _hub, token) = setup();
        let handle = std::thread::spawn(move || broadcaster.run());

        std::thread::sleep(Duration::from_millis(20));
        let cancelled_at = Instant::now();
        token.cancel();
        assert_eq!(handle.join().unwrap(), 0);
        assert!(cancelled_at.elapsed() < Duration::from_millis(500));
    }
}
