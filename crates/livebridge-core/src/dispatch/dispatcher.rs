use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info};

use super::hub::{BroadcastHub, BroadcastReport, Subscriber, SubscriberId, Target};
use super::store::DeltaStore;
use crate::alert::Alerter;
use crate::config::BridgeConfig;
use crate::delta::Delta;
use crate::errors::BridgeError;
use crate::upstream::{Upstream, UpstreamError};
use crate::watch::FileChanged;

struct Shared {
    store: DeltaStore,
    hub: BroadcastHub,
}

/// Routes file changes to the upstream and upstream results to subscribers
/// or the alerter.
///
/// The store and the subscriber set live behind one lock so that a joining
/// subscriber's replay and registration cannot interleave with a broadcast.
/// The lock is never held across an `.await`.
pub struct Dispatcher {
    upstream: Arc<dyn Upstream>,
    alerter: Arc<dyn Alerter>,
    refresh_path: String,
    subscriber_queue: usize,
    shared: Mutex<Shared>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        alerter: Arc<dyn Alerter>,
        refresh_path: impl Into<String>,
        capacity: usize,
        subscriber_queue: usize,
    ) -> Self {
        Self {
            upstream,
            alerter,
            refresh_path: refresh_path.into(),
            // Room for the full replay history plus live traffic.
            subscriber_queue: subscriber_queue.max(capacity),
            shared: Mutex::new(Shared {
                store: DeltaStore::new(capacity),
                hub: BroadcastHub::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(
        config: &BridgeConfig,
        upstream: Arc<dyn Upstream>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        Self::new(
            upstream,
            alerter,
            config.upstream.refresh_path.clone(),
            config.replay.capacity,
            config.replay.subscriber_queue,
        )
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!(event = "core.dispatch.lock_poisoned");
                poisoned.into_inner()
            }
        }
    }

    /// One upstream refresh per signal. Callers spawn this per change, so
    /// overlapping refreshes run independently.
    pub async fn on_file_changed(&self, change: FileChanged) {
        debug!(
            event = "core.dispatch.refresh_started",
            trigger = ?change.trigger,
            path = %self.refresh_path,
        );
        let result = self.upstream.refresh(&self.refresh_path).await;
        self.on_upstream_result(result).await;
    }

    pub async fn on_upstream_result(&self, result: Result<Delta, UpstreamError>) {
        match result {
            Ok(delta) => {
                let report = self.publish(delta);
                info!(
                    event = "core.dispatch.delta_published",
                    delivered = report.delivered,
                    failed = report.failed,
                );
            }
            Err(e @ UpstreamError::Overloaded { .. }) => {
                info!(
                    event = "core.dispatch.refresh_dropped",
                    error_code = e.error_code(),
                    url = e.url(),
                );
            }
            Err(e) => {
                self.alerter.post_alert(&e).await;
            }
        }
    }

    fn publish(&self, delta: Delta) -> BroadcastReport {
        let mut shared = self.shared();
        shared.store.append(delta.clone());
        shared.hub.broadcast(&delta, Target::All)
    }

    pub fn next_subscriber_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// New subscriber with a fresh id and the configured queue depth.
    pub fn new_subscriber(&self) -> (Subscriber, tokio::sync::mpsc::Receiver<bytes::Bytes>) {
        Subscriber::channel(self.next_subscriber_id(), self.subscriber_queue)
    }

    pub fn add_subscriber(&self, subscriber: Subscriber) {
        let id = subscriber.id();
        let mut shared = self.shared();
        shared.hub.insert(subscriber);
        debug!(
            event = "core.dispatch.subscriber_added",
            subscriber_id = %id,
            subscribers = shared.hub.len(),
        );
    }

    /// Removing an absent id does nothing.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        let mut shared = self.shared();
        if shared.hub.remove(id).is_some() {
            debug!(
                event = "core.dispatch.subscriber_removed",
                subscriber_id = %id,
                subscribers = shared.hub.len(),
            );
        }
    }

    /// Replay stored history to `subscriber` alone, then register it.
    pub fn on_subscriber_join(&self, subscriber: Subscriber) -> BroadcastReport {
        let mut shared = self.shared();
        let snapshot = shared.store.snapshot();
        let mut report = BroadcastReport::default();
        for delta in &snapshot {
            let sent = shared.hub.broadcast(delta, Target::One(&subscriber));
            report.delivered += sent.delivered;
            report.failed += sent.failed;
        }

        let id = subscriber.id();
        shared.hub.insert(subscriber);
        info!(
            event = "core.dispatch.subscriber_joined",
            subscriber_id = %id,
            replayed = report.delivered,
            subscribers = shared.hub.len(),
        );
        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared().hub.len()
    }

    pub fn stored_deltas(&self) -> usize {
        self.shared().store.len()
    }
}
