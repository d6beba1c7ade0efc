//! Per-source admission gate.

use crate::error::{Result, ScanError};
use nickscan_core::{RateLimitConfig, SourceName};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting semaphore plus a fixed delay taken inside the critical section.
///
/// At most `capacity` calls hold a permit at once, and every admitted call
/// waits `min_interval` before proceeding.
#[derive(Debug)]
pub struct RateLimiter {
    source_name: SourceName,
    semaphore: Arc<Semaphore>,
    capacity: usize,
    min_interval: Duration,
}

/// Held for the duration of one call; released on drop.
#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    /// Create a limiter admitting `capacity` concurrent calls.
    #[must_use]
    pub fn new(source_name: SourceName, capacity: usize, min_interval: Duration) -> Self {
        Self {
            source_name,
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            min_interval,
        }
    }

    /// Create a limiter from configuration.
    #[must_use]
    pub fn from_config(source_name: SourceName, config: &RateLimitConfig) -> Self {
        Self::new(source_name, config.max_concurrent, config.min_interval())
    }

    /// Wait for a slot, then wait `min_interval` while holding it.
    pub async fn acquire(&self) -> Result<RateLimitPermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScanError::LimiterClosed {
                source_name: self.source_name.clone(),
            })?;

        if !self.min_interval.is_zero() {
            tokio::time::sleep(self.min_interval).await;
        }

        Ok(RateLimitPermit { _permit: permit })
    }

    /// Maximum concurrent calls.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Delay applied to every admitted call.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Limiters keyed by source name, built once and shared read-only.
#[derive(Debug, Default, Clone)]
pub struct RateLimiterRegistry {
    limiters: HashMap<SourceName, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the limiter for a source.
    pub fn insert(&mut self, limiter: RateLimiter) {
        self.limiters
            .insert(limiter.source_name.clone(), Arc::new(limiter));
    }

    /// Limiter for `source_name`, if one is configured.
    #[must_use]
    pub fn get(&self, source_name: &SourceName) -> Option<&Arc<RateLimiter>> {
        self.limiters.get(source_name)
    }

    /// Number of configured limiters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Whether no limiter is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
