//! Error types for scan orchestration.

use nickscan_core::{NickscanError, SourceName};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by adapters and by the orchestrator itself.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The source asked us to back off
    #[error("Rate limited by {source_name}, retry after {retry_after:?}")]
    RateLimited {
        /// Source that signalled the limit
        source_name: SourceName,
        /// How long the source asked us to wait
        retry_after: Duration,
    },

    /// A call did not finish within its deadline
    #[error("Scan of {identifier} on {source_name} timed out after {after:?}")]
    Timeout {
        /// Source being called
        source_name: SourceName,
        /// Identifier being looked up
        identifier: String,
        /// Deadline that elapsed
        after: Duration,
    },

    /// Network or HTTP-level failure
    #[error("Transport error from {source_name}: {message}")]
    Transport {
        /// Source being called
        source_name: SourceName,
        /// Failure description
        message: String,
    },

    /// The source answered with something we could not interpret
    #[error("Unexpected response from {source_name}: {message}")]
    InvalidResponse {
        /// Source being called
        source_name: SourceName,
        /// What was wrong with the response
        message: String,
    },

    /// The adapter lacks the requested capability
    #[error("{source_name} does not support {operation}")]
    Unsupported {
        /// Adapter that was asked
        source_name: SourceName,
        /// Operation it cannot perform
        operation: &'static str,
    },

    /// The adapter's `initialize` hook failed
    #[error("Failed to initialize {source_name}: {reason}")]
    Init {
        /// Adapter being initialized
        source_name: SourceName,
        /// Why initialization failed
        reason: String,
    },

    /// The strategy table cannot be applied to the registered adapters
    #[error("Invalid source partition: {0}")]
    Partition(String),

    /// The limiter's semaphore was closed
    #[error("Rate limiter for {source_name} is closed")]
    LimiterClosed {
        /// Source the limiter belongs to
        source_name: SourceName,
    },

    /// The spawned session task panicked or was cancelled
    #[error("Scan session task failed: {0}")]
    SessionAborted(String),

    /// HTTP client construction or request errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Errors from the core crate (validation, configuration)
    #[error(transparent)]
    Core(#[from] NickscanError),
}

impl ScanError {
    /// Build a transport error from anything displayable.
    pub fn transport(source_name: &SourceName, message: impl ToString) -> Self {
        Self::Transport {
            source_name: source_name.clone(),
            message: message.to_string(),
        }
    }

    /// Build an unexpected-response error from anything displayable.
    pub fn invalid_response(source_name: &SourceName, message: impl ToString) -> Self {
        Self::InvalidResponse {
            source_name: source_name.clone(),
            message: message.to_string(),
        }
    }

    /// The wait a rate-limit signal asks for, if this is one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Result type alias using `ScanError`.
pub type Result<T> = std::result::Result<T, ScanError>;
