use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::errors::UpstreamError;
use crate::config::UpstreamConfig;
use crate::delta::Delta;

/// Source of deltas. One call, one attempt: retrying is left to the next
/// file change.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn refresh(&self, path: &str) -> Result<Delta, UpstreamError>;
}

/// [`Upstream`] backed by a single HTTP GET per refresh.
pub struct HttpUpstream {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.base_url.clone(), config.timeout())
    }

    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn transport_error(&self, url: String, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout {
                url,
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if is_connection_refused(&err) {
            UpstreamError::ConnectionRefused { url }
        } else if err.is_connect() {
            UpstreamError::Connect {
                url,
                message: err.to_string(),
            }
        } else {
            UpstreamError::Transport {
                url,
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn refresh(&self, path: &str) -> Result<Delta, UpstreamError> {
        let url = self.url_for(path);
        debug!(event = "core.upstream.request_started", url = %url);

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => return Err(self.transport_error(url, e)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::Overloaded { url });
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Err(self.transport_error(url, e)),
        };
        let delta = Delta::from_json_bytes(body).map_err(|e| UpstreamError::InvalidBody {
            url: url.clone(),
            message: e.to_string(),
        })?;

        debug!(
            event = "core.upstream.request_completed",
            url = %url,
            status = status.as_u16(),
            bytes = delta.len(),
        );
        Ok(delta)
    }
}

/// Walk the source chain looking for an `ECONNREFUSED` io error.
fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::ConnectionRefused
        {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;

    const REFRESH: &str = "live/update_redis";

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn upstream(base: &str) -> HttpUpstream {
        HttpUpstream::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_for_joins_single_slash() {
        let client = upstream("http://upstream:6543/");
        assert_eq!(
            client.url_for("/live/update_redis"),
            "http://upstream:6543/live/update_redis"
        );
        let client = upstream("http://upstream:6543");
        assert_eq!(
            client.url_for(REFRESH),
            "http://upstream:6543/live/update_redis"
        );
    }

    #[tokio::test]
    async fn test_ok_returns_body_verbatim() {
        let app = Router::new().route(
            "/live/update_redis",
            get(|| async { r#"{"drivers":[1,2]}"# }),
        );
        let base = serve(app).await;

        let delta = upstream(&base).refresh(REFRESH).await.unwrap();
        assert_eq!(delta.as_bytes(), br#"{"drivers":[1,2]}"#);
    }

    #[tokio::test]
    async fn test_429_is_overloaded() {
        let app = Router::new().route(
            "/live/update_redis",
            get(|| async { (AxumStatus::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(app).await;

        let err = upstream(&base).refresh(REFRESH).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Overloaded { .. }));
    }

    #[tokio::test]
    async fn test_500_carries_status_and_url() {
        let app = Router::new().route(
            "/live/update_redis",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;

        let err = upstream(&base).refresh(REFRESH).await.unwrap_err();
        assert_eq!(
            err,
            UpstreamError::Status {
                status: 500,
                url: format!("{base}/live/update_redis"),
            }
        );
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid() {
        let app = Router::new().route("/live/update_redis", get(|| async { "<html></html>" }));
        let base = serve(app).await;

        let err = upstream(&base).refresh(REFRESH).await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidBody { .. }));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let app = Router::new().route(
            "/live/update_redis",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let base = serve(app).await;

        let client = HttpUpstream::new(&base, Duration::from_millis(200)).unwrap();
        let err = client.refresh(REFRESH).await.unwrap_err();
        assert_eq!(
            err,
            UpstreamError::Timeout {
                url: format!("{base}/live/update_redis"),
                timeout_ms: 200,
            }
        );
        assert_eq!(err.label(), "TimeoutError");
    }

    #[tokio::test]
    async fn test_closed_port_is_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = upstream(&format!("http://{addr}"))
            .refresh(REFRESH)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UpstreamError::ConnectionRefused {
                url: format!("http://{addr}/live/update_redis"),
            }
        );
        assert_eq!(err.label(), "ConnectionRefusedError");
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
    }
}
