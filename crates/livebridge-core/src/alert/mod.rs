//! Operator alerts for failed refreshes.

mod webhook;

use async_trait::async_trait;

use crate::upstream::UpstreamError;

pub use webhook::{WebhookAlerter, WebhookPayload};

/// Receives every alert-worthy upstream failure. Implementations must not
/// fail: delivery problems are logged and swallowed.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn post_alert(&self, error: &UpstreamError);
}

/// `"<Label>: <error>"`, the message text operators see.
pub fn format_alert(error: &UpstreamError) -> String {
    format!("{}: {}", error.label(), error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_alert() {
        let error = UpstreamError::Status {
            status: 500,
            url: "http://upstream/live/update_redis".to_string(),
        };
        assert_eq!(
            format_alert(&error),
            "UpstreamError: Status code 500 accessing http://upstream/live/update_redis"
        );
    }

    #[test]
    fn test_format_timeout() {
        let error = UpstreamError::Timeout {
            url: "http://upstream/x".to_string(),
            timeout_ms: 30_000,
        };
        assert!(format_alert(&error).starts_with("TimeoutError: "));
    }
}
