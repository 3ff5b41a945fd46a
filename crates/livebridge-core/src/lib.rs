//! livebridge-core: debounced file change detection and delta fan-out
//!
//! A results file is rewritten by an external process. Each real update
//! triggers one upstream refresh whose JSON payload is kept in a short
//! replay history and pushed to every connected subscriber.
//!
//! # Main Entry Points
//!
//! - [`watch`] - Turn raw filesystem notifications into change signals
//! - [`upstream`] - Fetch deltas from the refresh endpoint
//! - [`dispatch`] - Store deltas and fan them out to subscribers
//! - [`alert`] - Report failed refreshes to operators
//! - [`config`] - Configuration loading

pub mod alert;
pub mod config;
pub mod delta;
pub mod dispatch;
pub mod errors;
pub mod logging;
pub mod upstream;
pub mod watch;

pub use alert::{Alerter, WebhookAlerter, format_alert};
pub use config::{BridgeConfig, ConfigError, load_config};
pub use delta::Delta;
pub use dispatch::{
    BroadcastHub, BroadcastReport, DeltaStore, Dispatcher, SendError, Subscriber, SubscriberId,
};
pub use errors::BridgeError;
pub use logging::init_logging;
pub use upstream::{HttpUpstream, Upstream, UpstreamError};
pub use watch::{ChangeDetector, DetectorState, FileChanged, Trigger, WatchError};
