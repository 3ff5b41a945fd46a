//! TOML configuration: named tunables for the watcher, upstream, replay
//! window, alerting and listener.

pub mod errors;
pub mod loading;
pub mod types;

pub use errors::ConfigError;
pub use loading::{ALERT_WEBHOOK_ENV, DEFAULT_CONFIG_FILE, load_config, validate_config};
pub use types::{AlertConfig, BridgeConfig, ReplayConfig, ServerConfig, UpstreamConfig, WatchConfig};
