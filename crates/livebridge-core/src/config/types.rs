use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level livebridge configuration.
///
/// Every section and every field has a default, so an empty file (or no
/// file at all) yields a runnable configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[watch]` section: the watched results file and its timing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// File whose updates trigger an upstream refresh.
    #[serde(default = "default_watch_path")]
    pub path: PathBuf,

    /// Directory receiving timestamped copies on authoritative
    /// (metadata) updates. None disables archiving.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,

    /// Minimum gap between two accepted MODIFIED notifications.
    /// Default: 50
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,

    /// Delay between an accepted MODIFIED and the change signal, giving
    /// the writer time to finish flushing. Must be > 2.
    /// Default: 20
    #[serde(default = "default_population_delay_ms")]
    pub population_delay_ms: u64,

    /// How long a replaced watch handle stays alive after re-registration.
    /// Default: 1000
    #[serde(default = "default_delete_teardown_delay_ms")]
    pub delete_teardown_delay_ms: u64,

    /// Re-registration attempts after the watched file is deleted.
    /// Default: 8
    #[serde(default = "default_rewatch_attempts")]
    pub rewatch_attempts: u32,

    /// Pause between re-registration attempts.
    /// Default: 250
    #[serde(default = "default_rewatch_backoff_ms")]
    pub rewatch_backoff_ms: u64,
}

impl WatchConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn population_delay(&self) -> Duration {
        Duration::from_millis(self.population_delay_ms)
    }

    pub fn delete_teardown_delay(&self) -> Duration {
        Duration::from_millis(self.delete_teardown_delay_ms)
    }

    pub fn rewatch_backoff(&self) -> Duration {
        Duration::from_millis(self.rewatch_backoff_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: default_watch_path(),
            archive_dir: None,
            debounce_window_ms: default_debounce_window_ms(),
            population_delay_ms: default_population_delay_ms(),
            delete_teardown_delay_ms: default_delete_teardown_delay_ms(),
            rewatch_attempts: default_rewatch_attempts(),
            rewatch_backoff_ms: default_rewatch_backoff_ms(),
        }
    }
}

/// `[upstream]` section: the refresh endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream service, without trailing slash.
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,

    /// Path requested on every accepted file change.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// Per-request timeout. Sized for the slowest refresh the upstream can
    /// produce, not the common case.
    /// Default: 30
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            refresh_path: default_refresh_path(),
            timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

/// `[replay]` section: history window and per-client queueing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Number of recent deltas replayed to a newly connected client.
    /// Default: 10
    #[serde(default = "default_replay_capacity")]
    pub capacity: usize,

    /// Outbound messages queued per client before sends start failing.
    /// Default: 64
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            capacity: default_replay_capacity(),
            subscriber_queue: default_subscriber_queue(),
        }
    }
}

/// `[alert]` section: chat webhook for upstream failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Incoming-webhook URL. None disables alert delivery.
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_alert_username")]
    pub username: String,

    #[serde(default = "default_alert_icon_emoji")]
    pub icon_emoji: String,

    /// Default: 1000
    #[serde(default = "default_alert_timeout_ms")]
    pub timeout_ms: u64,
}

impl AlertConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: default_alert_username(),
            icon_emoji: default_alert_icon_emoji(),
            timeout_ms: default_alert_timeout_ms(),
        }
    }
}

/// `[server]` section: websocket and status page listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_watch_path() -> PathBuf {
    PathBuf::from("live-results.jinja2")
}

fn default_debounce_window_ms() -> u64 {
    50
}

fn default_population_delay_ms() -> u64 {
    20
}

fn default_delete_teardown_delay_ms() -> u64 {
    1000
}

fn default_rewatch_attempts() -> u32 {
    8
}

fn default_rewatch_backoff_ms() -> u64 {
    250
}

fn default_upstream_base_url() -> String {
    "http://127.0.0.1:6543".to_string()
}

fn default_refresh_path() -> String {
    "live/update_redis".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

fn default_replay_capacity() -> usize {
    10
}

fn default_subscriber_queue() -> usize {
    64
}

fn default_alert_username() -> String {
    "LiveBridge".to_string()
}

fn default_alert_icon_emoji() -> String {
    ":ghost:".to_string()
}

fn default_alert_timeout_ms() -> u64 {
    1000
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6544))
}
