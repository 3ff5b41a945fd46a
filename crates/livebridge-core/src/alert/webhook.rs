use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{Alerter, format_alert};
use crate::config::AlertConfig;
use crate::errors::BridgeError;
use crate::upstream::UpstreamError;

/// Body posted to a chat incoming-webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub text: String,
    pub username: String,
    pub icon_emoji: String,
}

/// Posts alerts to a chat webhook. Without a URL, alerts are only logged.
pub struct WebhookAlerter {
    client: Client,
    url: Option<String>,
    username: String,
    icon_emoji: String,
    timeout: Duration,
}

impl WebhookAlerter {
    pub fn from_config(config: &AlertConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            url: config.webhook_url.clone(),
            username: config.username.clone(),
            icon_emoji: config.icon_emoji.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    pub fn payload_for(&self, error: &UpstreamError) -> WebhookPayload {
        WebhookPayload {
            text: format_alert(error),
            username: self.username.clone(),
            icon_emoji: self.icon_emoji.clone(),
        }
    }
}

#[async_trait]
impl Alerter for WebhookAlerter {
    async fn post_alert(&self, err: &UpstreamError) {
        error!(
            event = "core.alert.raised",
            error_code = err.error_code(),
            error = %err,
        );

        let Some(url) = &self.url else {
            info!(event = "core.alert.skipped", reason = "no webhook configured");
            return;
        };

        let result = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&self.payload_for(err))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(response) => info!(
                event = "core.alert.post_completed",
                status = response.status().as_u16(),
            ),
            Err(e) => warn!(
                event = "core.alert.post_failed",
                error = %e,
            ),
        }
    }
}
