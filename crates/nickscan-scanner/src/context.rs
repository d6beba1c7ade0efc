//! Shared scanning context.
//!
//! One `ScanContext` is built per process and passed by reference into every
//! processor. It owns the HTTP client handed to adapters, the per-source rate
//! limiters and the scanning settings.

use crate::error::Result;
use crate::rate_limit::{RateLimiter, RateLimiterRegistry};
use nickscan_core::{AppConfig, NickscanError, ScanningConfig, SourceName};

/// Process-wide, read-mostly state shared by all sessions.
#[derive(Debug, Clone)]
pub struct ScanContext {
    http: reqwest::Client,
    limiters: RateLimiterRegistry,
    scanning: ScanningConfig,
}

impl ScanContext {
    /// Create a context around an already-configured HTTP client.
    #[must_use]
    pub fn new(http: reqwest::Client, scanning: ScanningConfig) -> Self {
        Self {
            http,
            limiters: RateLimiterRegistry::new(),
            scanning,
        }
    }

    /// Build the HTTP client and rate limiters described by `config`.
    ///
    /// # Errors
    /// Returns error if the configuration fails validation, the HTTP client
    /// cannot be created, or a configured source name is invalid.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate().map_err(NickscanError::from)?;

        let http = reqwest::Client::builder()
            .timeout(config.http.timeout())
            .user_agent(config.http.user_agent.clone())
            .build()?;

        let mut context = Self::new(http, config.scanning.clone());
        for (name, source) in config.sources.iter() {
            if let Some(limit) = &source.rate_limit {
                let source_name = SourceName::new(name)?;
                tracing::debug!(
                    source = name,
                    max_concurrent = limit.max_concurrent,
                    min_interval_ms = limit.min_interval_ms,
                    "configured rate limiter"
                );
                context
                    .limiters
                    .insert(RateLimiter::from_config(source_name, limit));
            }
        }

        Ok(context)
    }

    /// Register a limiter for one source.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiters.insert(limiter);
        self
    }

    /// Shared HTTP client.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Limiter for `source_name`, if one is configured.
    #[must_use]
    pub fn rate_limiter(&self, source_name: &SourceName) -> Option<&RateLimiter> {
        self.limiters.get(source_name).map(|limiter| &**limiter)
    }

    /// Scanning settings.
    #[must_use]
    pub fn scanning(&self) -> &ScanningConfig {
        &self.scanning
    }
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new(reqwest::Client::new(), ScanningConfig::default())
    }
}
