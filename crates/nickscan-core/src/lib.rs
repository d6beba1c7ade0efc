//! Nickscan Core - Foundation crate for the Nickscan username scanner.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other Nickscan crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`SessionId`, `SourceName`, `Strategy`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use nickscan_core::{AppConfig, Strategy};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.scanning.parallel.max_concurrent, 10);
//!
//! let strategy: Strategy = "sequential".parse()?;
//! assert_eq!(strategy, Strategy::Sequential);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, HttpConfig, ParallelConfig, RateLimitConfig, ScanningConfig, SequentialConfig,
    SourceConfig, SourcesConfig,
};
pub use error::{ConfigError, ConfigResult, NickscanError, Result};
pub use types::{SessionId, SourceName, Strategy, Timestamp};
