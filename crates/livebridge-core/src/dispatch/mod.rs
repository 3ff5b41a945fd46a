//! Refresh orchestration, replay history and subscriber fan-out.

pub mod dispatcher;
pub mod hub;
pub mod store;

pub use dispatcher::Dispatcher;
pub use hub::{BroadcastHub, BroadcastReport, SendError, Subscriber, SubscriberId, Target};
pub use store::{DeltaStore, Snapshot};
