use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `info`, or `warn` when
/// `quiet`. With `json` every event is emitted as one JSON object per line.
pub fn init_logging(json: bool, quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_target(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    // Already installed (tests, embedding): keep the existing subscriber.
    if let Err(e) = result {
        tracing::debug!(event = "core.logging.init_skipped", error = %e);
    }
}
