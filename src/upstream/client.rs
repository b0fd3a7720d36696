//! HTTP implementation of [`StatusSource`].

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::trace;
use url::Url;

use crate::upstream::errors::FetchError;
use crate::upstream::json::parse_json_with_context;
use crate::upstream::payload::StatusPayload;

/// Something that can resolve a status query URL into a payload.
///
/// The pipeline and the single-record refresh only see this trait, so tests
/// can substitute a scripted source.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<StatusPayload, FetchError>;
}

/// reqwest-backed client with a fixed User-Agent.
pub struct StatusClient {
    http: reqwest::Client,
}

impl StatusClient {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(3))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build upstream HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<StatusPayload, FetchError> {
        let parsed = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;

        let classify = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_owned(),
                    timeout,
                }
            } else {
                FetchError::Request {
                    url: url.to_owned(),
                    source,
                }
            }
        };

        let response = self
            .http
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(classify)?;
        trace!(url, bytes = body.len(), "Fetched status payload");

        parse_json_with_context(&body).map_err(|source| FetchError::Parse {
            url: url.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_fails_before_any_request() {
        let client = StatusClient::new("refund-sync-test").unwrap();
        let err = client
            .fetch("not a url", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert_eq!(err.url(), "not a url");
        assert_eq!(err.kind(), "invalid_url");
    }
}
