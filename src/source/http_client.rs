use crate::config::ProviderConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Status and body of a completed request; non-2xx responses are not errors
/// here because the provider puts its error description in the body.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // The provider sets consent cookies on the first response
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }

    /// Single GET, no retry.
    pub async fn get_text(&self, url: &Url) -> Result<HttpResponse> {
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url.host_str().unwrap_or("provider")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read response body")?;

        debug!("{} -> {} ({} bytes)", url.path(), status, body.len());
        Ok(HttpResponse { status, body })
    }
}
