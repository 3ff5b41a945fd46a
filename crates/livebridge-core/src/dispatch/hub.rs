use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::delta::Delta;
use crate::errors::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Subscriber '{id}' has disconnected")]
    Closed { id: SubscriberId },

    #[error("Subscriber '{id}' queue is full")]
    QueueFull { id: SubscriberId },
}

impl BridgeError for SendError {
    fn error_code(&self) -> &'static str {
        match self {
            SendError::Closed { .. } => "SUBSCRIBER_CLOSED",
            SendError::QueueFull { .. } => "SUBSCRIBER_QUEUE_FULL",
        }
    }
}

/// Sending half of one connected client.
///
/// The receiving half belongs to the socket session, which turns each queued
/// payload into a frame. Sends never block.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Bytes>,
}

impl Subscriber {
    pub fn new(id: SubscriberId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id, tx }
    }

    /// Create a subscriber together with its bounded delivery queue.
    pub fn channel(id: SubscriberId, queue: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(queue);
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn send(&self, payload: Bytes) -> Result<(), SendError> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => SendError::Closed { id: self.id },
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull { id: self.id },
        })
    }
}

pub enum Target<'a> {
    All,
    One(&'a Subscriber),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Live subscriber set.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    subscribers: HashMap<SubscriberId, Subscriber>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a subscriber with the same id was already present.
    pub fn insert(&mut self, subscriber: Subscriber) -> bool {
        self.subscribers
            .insert(subscriber.id(), subscriber)
            .is_none()
    }

    pub fn remove(&mut self, id: SubscriberId) -> Option<Subscriber> {
        self.subscribers.remove(&id)
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn broadcast(&self, delta: &Delta, target: Target<'_>) -> BroadcastReport {
        let payload = delta.to_bytes();
        let mut report = BroadcastReport::default();

        let mut deliver = |subscriber: &Subscriber| match subscriber.send(payload.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                warn!(
                    event = "core.hub.send_failed",
                    subscriber_id = %subscriber.id(),
                    error_code = e.error_code(),
                    error = %e,
                );
            }
        };

        match target {
            Target::All => self.subscribers.values().for_each(&mut deliver),
            Target::One(subscriber) => deliver(subscriber),
        }

        debug!(
            event = "core.hub.broadcast_completed",
            bytes = payload.len(),
            delivered = report.delivered,
            failed = report.failed,
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta() -> Delta {
        Delta::from_json_bytes(r#"{"drivers":[1,2]}"#).unwrap()
    }

    #[test]
    fn test_insert_and_remove() {
        let mut hub = BroadcastHub::new();
        let (sub, _rx) = Subscriber::channel(SubscriberId(1), 4);
        assert!(hub.insert(sub.clone()));
        assert!(!hub.insert(sub));
        assert!(hub.contains(SubscriberId(1)));
        assert_eq!(hub.len(), 1);

        assert!(hub.remove(SubscriberId(1)).is_some());
        assert!(hub.remove(SubscriberId(1)).is_none());
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_all_delivers_verbatim() {
        let mut hub = BroadcastHub::new();
        let (a, mut rx_a) = Subscriber::channel(SubscriberId(1), 4);
        let (b, mut rx_b) = Subscriber::channel(SubscriberId(2), 4);
        hub.insert(a);
        hub.insert(b);

        let report = hub.broadcast(&delta(), Target::All);
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 2,
                failed: 0
            }
        );
        assert_eq!(rx_a.recv().await.unwrap(), &br#"{"drivers":[1,2]}"#[..]);
        assert_eq!(rx_b.recv().await.unwrap(), &br#"{"drivers":[1,2]}"#[..]);
    }

    #[tokio::test]
    async fn test_broadcast_one_skips_others() {
        let mut hub = BroadcastHub::new();
        let (a, mut rx_a) = Subscriber::channel(SubscriberId(1), 4);
        let (b, mut rx_b) = Subscriber::channel(SubscriberId(2), 4);
        hub.insert(a);
        hub.insert(b.clone());

        hub.broadcast(&delta(), Target::One(&b));
        assert!(rx_b.recv().await.is_some());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_subscriber_does_not_abort_others() {
        let mut hub = BroadcastHub::new();
        let (gone, rx_gone) = Subscriber::channel(SubscriberId(1), 4);
        let (alive, mut rx_alive) = Subscriber::channel(SubscriberId(2), 4);
        hub.insert(gone);
        hub.insert(alive);
        drop(rx_gone);

        let report = hub.broadcast(&delta(), Target::All);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert!(rx_alive.recv().await.is_some());
    }

    #[test]
    fn test_full_queue_reports_queue_full() {
        let (sub, _rx) = Subscriber::channel(SubscriberId(7), 1);
        sub.send(Bytes::from_static(b"{}")).unwrap();
        assert_eq!(
            sub.send(Bytes::from_static(b"{}")),
            Err(SendError::QueueFull { id: SubscriberId(7) })
        );
    }
}
