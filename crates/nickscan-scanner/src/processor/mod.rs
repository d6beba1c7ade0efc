//! Strategy-specific processors.
//!
//! Each processor owns the tasks it creates, contains every per-task failure,
//! and reports exactly one progress unit per unit of work through the shared
//! [`ScanSink`](crate::sink::ScanSink).

pub mod bulk;
pub mod parallel;
pub mod sequential;

pub use bulk::BulkProcessor;
pub use parallel::ParallelProcessor;
pub use sequential::{SequentialProcessor, WorkerState};

use crate::adapter::{RegisteredAdapter, ScanOutcome};
use crate::context::ScanContext;
use crate::error::{Result, ScanError};
use std::time::Duration;

/// Unit of work: one identifier on one source.
#[derive(Debug, Clone)]
pub struct Task {
    /// Identifier to look up
    pub identifier: String,
    /// Source to ask
    pub adapter: RegisteredAdapter,
    /// Attempts made so far
    pub attempt_count: u32,
}

impl Task {
    /// New task with no attempts made.
    #[must_use]
    pub fn new(identifier: impl Into<String>, adapter: RegisteredAdapter) -> Self {
        Self {
            identifier: identifier.into(),
            adapter,
            attempt_count: 0,
        }
    }
}

/// Failure counts collected by a processor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorReport {
    /// Tasks (or bulk calls) that ended in an error or timeout
    pub failed_tasks: usize,
    /// Per-identifier errors inside otherwise successful bulk calls
    pub bulk_item_errors: usize,
}

impl ProcessorReport {
    /// Sum two reports.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            failed_tasks: self.failed_tasks + other.failed_tasks,
            bulk_item_errors: self.bulk_item_errors + other.bulk_item_errors,
        }
    }
}

/// Single-identifier call under the source's rate limiter and a task timeout.
///
/// The timeout covers waiting for the limiter as well as the call itself.
pub(crate) async fn scan_once(
    context: &ScanContext,
    adapter: &RegisteredAdapter,
    identifier: &str,
    timeout: Duration,
) -> Result<ScanOutcome> {
    let call = async {
        let _permit = match context.rate_limiter(adapter.name()) {
            Some(limiter) => Some(limiter.acquire().await?),
            None => None,
        };
        adapter.adapter().scan(identifier).await
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ScanError::Timeout {
            source_name: adapter.name().clone(),
            identifier: identifier.to_string(),
            after: timeout,
        }),
    }
}
