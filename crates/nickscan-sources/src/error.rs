//! Error types for source construction and the registry.

use nickscan_scanner::ScanError;
use thiserror::Error;

/// Errors that can occur while building or selecting sources.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A source name that no adapter answers to
    #[error("unknown source: {name}")]
    UnknownSource {
        /// Requested name
        name: String,
    },

    /// Adapter construction or lifecycle failure
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
