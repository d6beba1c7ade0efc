//! GitHub source via the public REST API.

use crate::common::{header_u64, into_payload, join_segments, retry_after};
use async_trait::async_trait;
use nickscan_core::SourceName;
use nickscan_scanner::{
    AdapterDescriptor, Capability, Result, ScanError, ScanOutcome, SourceAdapter,
};
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Source name used in configuration and envelopes.
pub const NAME: &str = "github";

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Looks up `GET /users/{name}`.
///
/// An optional token raises the hourly quota; the lookup itself is public.
pub struct GithubSource {
    name: SourceName,
    http: Client,
    token: Option<String>,
    base_url: String,
}

impl GithubSource {
    /// Create the adapter around a shared HTTP client.
    pub fn new(http: Client, token: Option<String>) -> Result<Self> {
        Ok(Self {
            name: SourceName::new(NAME)?,
            http,
            token: token.filter(|t| !t.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the adapter at another API root, e.g. GitHub Enterprise.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SourceAdapter for GithubSource {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(self.name.clone()).with_capability(Capability::SingleScan)
    }

    async fn scan(&self, identifier: &str) -> Result<ScanOutcome> {
        let url = join_segments(&self.name, &self.base_url, &["users", identifier])?;

        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ScanError::transport(&self.name, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(ScanOutcome::Absent);
        }

        let now = chrono::Utc::now().timestamp();
        if let Some(wait) = rate_limit_wait(status, response.headers(), now) {
            return Err(ScanError::RateLimited {
                source_name: self.name.clone(),
                retry_after: wait,
            });
        }

        if !status.is_success() {
            return Err(ScanError::transport(&self.name, format!("GitHub HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ScanError::invalid_response(&self.name, e))?;

        Ok(ScanOutcome::Found(into_payload(&self.name, body)?))
    }
}

/// How long GitHub asks us to wait, if this response is a rate-limit signal.
///
/// Only 403 and 429 qualify. `Retry-After` wins; otherwise an exhausted
/// `x-ratelimit-remaining` waits until `x-ratelimit-reset` (epoch seconds),
/// at least one second. A plain 403 is not a rate limit.
#[must_use]
pub fn rate_limit_wait(
    status: StatusCode,
    headers: &HeaderMap,
    now_epoch: i64,
) -> Option<Duration> {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }

    if let Some(wait) = retry_after(headers) {
        return Some(wait);
    }

    if header_u64(headers, "x-ratelimit-remaining") == Some(0) {
        let reset = header_u64(headers, "x-ratelimit-reset")
            .and_then(|reset| i64::try_from(reset).ok())
            .unwrap_or(now_epoch);
        let secs = u64::try_from(reset.saturating_sub(now_epoch)).unwrap_or(0);
        return Some(Duration::from_secs(secs.max(1)));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some(Duration::from_secs(60));
    }
    None
}
