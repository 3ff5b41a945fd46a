//! Configuration loading and validation.
//!
//! Sources, later ones override earlier ones:
//! 1. **Hardcoded defaults**
//! 2. **Config file** - `./livebridge.toml` or the path given on the CLI
//! 3. **Environment** - `LIVEBRIDGE_ALERT_WEBHOOK`
//! 4. **CLI arguments** - applied by the binary after loading

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::errors::ConfigError;
use super::types::BridgeConfig;

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "livebridge.toml";

/// Environment variable holding the alert webhook URL.
pub const ALERT_WEBHOOK_ENV: &str = "LIVEBRIDGE_ALERT_WEBHOOK";

/// Load configuration from `path` (or [`DEFAULT_CONFIG_FILE`]), apply
/// environment overrides and validate the result.
///
/// A missing file is not an error: defaults are used. A file that exists
/// but does not parse is.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

    let mut config = match fs::read_to_string(path) {
        Ok(contents) => parse_config(path, &contents)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(
                event = "core.config.file_not_found",
                path = %path.display(),
                "Using default configuration"
            );
            BridgeConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    debug!(
        event = "core.config.loaded",
        path = %path.display(),
        watch = %config.watch.path.display(),
        upstream = %config.upstream.base_url,
    );
    Ok(config)
}

fn parse_config(path: &Path, contents: &str) -> Result<BridgeConfig, ConfigError> {
    toml::from_str(contents).map_err(|e| ConfigError::ConfigParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Apply environment overrides. An empty variable is treated as unset.
pub fn apply_env_overrides(config: &mut BridgeConfig) {
    if let Ok(url) = std::env::var(ALERT_WEBHOOK_ENV)
        && !url.trim().is_empty()
    {
        config.alert.webhook_url = Some(url);
    }
}

/// Reject values the runtime cannot honour.
pub fn validate_config(config: &BridgeConfig) -> Result<(), ConfigError> {
    let invalid = |message: &str| {
        Err(ConfigError::InvalidConfiguration {
            message: message.to_string(),
        })
    };

    // Below ~2 ms the writer is routinely still mid-flush when we read.
    if config.watch.population_delay_ms <= 2 {
        return invalid("watch.population_delay_ms must be > 2");
    }
    if config.watch.rewatch_attempts == 0 {
        return invalid("watch.rewatch_attempts must be > 0");
    }
    if config.upstream.base_url.trim().is_empty() {
        return invalid("upstream.base_url must not be empty");
    }
    if config.upstream.timeout_secs == 0 {
        return invalid("upstream.timeout_secs must be > 0");
    }
    if config.replay.capacity == 0 {
        return invalid("replay.capacity must be > 0");
    }
    if config.replay.subscriber_queue == 0 {
        return invalid("replay.subscriber_queue must be > 0");
    }
    // A joiner's replay is queued in one go before its session drains it.
    if config.replay.subscriber_queue < config.replay.capacity {
        return invalid("replay.subscriber_queue must be >= replay.capacity");
    }
    if config.alert.timeout_ms == 0 {
        return invalid("alert.timeout_ms must be > 0");
    }
    Ok(())
}
