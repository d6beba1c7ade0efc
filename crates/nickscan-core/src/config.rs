//! Configuration management for Nickscan.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Strategy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/nickscan/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Shared HTTP client settings
    pub http: HttpConfig,
    /// Scan orchestration settings
    pub scanning: ScanningConfig,
    /// Per-source settings and credentials
    pub sources: SourcesConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of a loaded configuration.
    ///
    /// Supports the following environment variables:
    /// - `NICKSCAN_VK_TOKEN`: VK API access token
    /// - `NICKSCAN_GITHUB_TOKEN`: GitHub personal access token
    /// - `NICKSCAN_PARALLEL_MAX_CONCURRENT`: Override the parallel admission limit
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var("NICKSCAN_VK_TOKEN") {
            if !token.is_empty() {
                self.sources.vk.token = Some(token);
                tracing::debug!("Override sources.vk.token from env");
            }
        }

        if let Ok(token) = std::env::var("NICKSCAN_GITHUB_TOKEN") {
            if !token.is_empty() {
                self.sources.github.token = Some(token);
                tracing::debug!("Override sources.github.token from env");
            }
        }

        if let Ok(val) = std::env::var("NICKSCAN_PARALLEL_MAX_CONCURRENT") {
            if let Ok(max) = val.parse() {
                self.scanning.parallel.max_concurrent = max;
                tracing::debug!("Override scanning.parallel.max_concurrent from env: {}", max);
            }
        }

        self
    }

    /// Load configuration from the default location with environment variable overrides.
    pub fn load_with_env() -> ConfigResult<Self> {
        let config = Self::load()?.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        let parallel = &self.scanning.parallel;
        if parallel.max_concurrent == 0 {
            return Err(invalid(
                "scanning.parallel.max_concurrent",
                "must be greater than zero",
            ));
        }

        let sequential = &self.scanning.sequential;
        if sequential.max_attempts == 0 {
            return Err(invalid(
                "scanning.sequential.max_attempts",
                "must be greater than zero",
            ));
        }
        if sequential.jitter_min_ms > sequential.jitter_max_ms {
            return Err(invalid(
                "scanning.sequential.jitter_min_ms",
                "must not exceed jitter_max_ms",
            ));
        }

        for (name, source) in self.sources.iter() {
            if let Some(limit) = &source.rate_limit {
                if limit.max_concurrent == 0 {
                    return Err(invalid(
                        &format!("sources.{name}.rate_limit.max_concurrent"),
                        "must be greater than zero",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/nickscan/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "nickscan", "nickscan").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Shared HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Transport-level request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl HttpConfig {
    /// Transport timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Nickscan/0.1.0 (+https://github.com/nickscan/nickscan)".to_string(),
        }
    }
}

/// Scan orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Upper bound on generated username variations
    pub max_variations: usize,
    /// Capacity of the session event channel
    pub event_buffer: usize,
    /// Timeout for a single bulk call in seconds
    pub bulk_timeout_secs: u64,
    /// Parallel processor settings
    pub parallel: ParallelConfig,
    /// Sequential processor settings
    pub sequential: SequentialConfig,
    /// Explicit strategy overrides keyed by source name
    pub strategies: BTreeMap<String, Strategy>,
}

impl ScanningConfig {
    /// Bulk call timeout as a `Duration`.
    #[must_use]
    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_secs(self.bulk_timeout_secs)
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            max_variations: 100,
            event_buffer: 256,
            bulk_timeout_secs: 120,
            parallel: ParallelConfig::default(),
            sequential: SequentialConfig::default(),
            strategies: BTreeMap::new(),
        }
    }
}

/// Parallel processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Maximum simultaneous in-flight tasks across all parallel sources
    pub max_concurrent: usize,
    /// Per-task timeout in seconds
    pub task_timeout_secs: u64,
}

impl ParallelConfig {
    /// Per-task timeout as a `Duration`.
    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            task_timeout_secs: 20,
        }
    }
}

/// Sequential processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequentialConfig {
    /// Per-attempt timeout in seconds
    pub task_timeout_secs: u64,
    /// Base pacing delay between tasks in milliseconds
    pub base_delay_ms: u64,
    /// Lower bound of the random jitter added to the pacing delay
    pub jitter_min_ms: u64,
    /// Upper bound of the random jitter added to the pacing delay
    pub jitter_max_ms: u64,
    /// Longest rate-limit wait that is still retried, in seconds
    pub max_retry_wait_secs: u64,
    /// Extra wait added on top of a rate-limit wait, in milliseconds
    pub retry_buffer_ms: u64,
    /// Total attempts per task, including the first one
    pub max_attempts: u32,
}

impl SequentialConfig {
    /// Per-attempt timeout as a `Duration`.
    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Base pacing delay as a `Duration`.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Rate-limit wait ceiling as a `Duration`.
    #[must_use]
    pub fn max_retry_wait(&self) -> Duration {
        Duration::from_secs(self.max_retry_wait_secs)
    }

    /// Rate-limit retry buffer as a `Duration`.
    #[must_use]
    pub fn retry_buffer(&self) -> Duration {
        Duration::from_millis(self.retry_buffer_ms)
    }
}

impl Default for SequentialConfig {
    fn default() -> Self {
        Self {
            task_timeout_secs: 60,
            base_delay_ms: 1000,
            jitter_min_ms: 500,
            jitter_max_ms: 1200,
            max_retry_wait_secs: 60,
            retry_buffer_ms: 1000,
            max_attempts: 3,
        }
    }
}

/// Settings for all known sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// GitHub REST API
    pub github: SourceConfig,
    /// VK `users.get` API
    pub vk: SourceConfig,
    /// Telegram public profile pages
    pub telegram: SourceConfig,
}

impl SourcesConfig {
    /// Iterate over `(name, config)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SourceConfig)> {
        [
            ("github", &self.github),
            ("vk", &self.vk),
            ("telegram", &self.telegram),
        ]
        .into_iter()
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            github: SourceConfig::default(),
            vk: SourceConfig {
                // users.get allows 3 requests per second per token
                rate_limit: Some(RateLimitConfig {
                    max_concurrent: 3,
                    min_interval_ms: 350,
                }),
                ..SourceConfig::default()
            },
            telegram: SourceConfig::default(),
        }
    }
}

/// Settings for a single source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Whether the source takes part in scans
    pub enabled: bool,
    /// API token, if the source needs one
    pub token: Option<String>,
    /// Process-wide admission gate for this source
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
            rate_limit: None,
        }
    }
}

/// Concurrency gate plus minimum spacing for a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum concurrent calls
    pub max_concurrent: usize,
    /// Minimum delay applied before each admitted call, in milliseconds
    pub min_interval_ms: u64,
}

impl RateLimitConfig {
    /// Minimum interval as a `Duration`.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            min_interval_ms: 350,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.scanning.parallel.max_concurrent, 10);
        assert_eq!(config.scanning.parallel.task_timeout_secs, 20);
        assert_eq!(config.scanning.sequential.task_timeout_secs, 60);
        assert_eq!(config.scanning.sequential.max_attempts, 3);
        assert!(config.sources.github.enabled);
        assert!(config.validate().is_ok());

        let vk_limit = config.sources.vk.rate_limit.expect("vk has a default limit");
        assert_eq!(vk_limit.max_concurrent, 3);
        assert_eq!(vk_limit.min_interval(), Duration::from_millis(350));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[http]"));
        assert!(toml_str.contains("[scanning.parallel]"));
        assert!(toml_str.contains("[sources.vk.rate_limit]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.http.user_agent, config.http.user_agent);
    }

    #[test]
    fn test_config_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.scanning.parallel.max_concurrent = 4;
        config.sources.telegram.enabled = false;
        config
            .scanning
            .strategies
            .insert("github".to_string(), Strategy::Sequential);

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        std::fs::write(&config_path, contents).expect("write config");
        let loaded = AppConfig::load_from(&config_path).expect("load config");

        assert_eq!(loaded.scanning.parallel.max_concurrent, 4);
        assert!(!loaded.sources.telegram.enabled);
        assert_eq!(
            loaded.scanning.strategies.get("github"),
            Some(&Strategy::Sequential)
        );
    }

    #[test]
    fn test_load_from_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = AppConfig::load_from(&tmp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scanning.sequential]
base_delay_ms = 250

[scanning.strategies]
vk = "parallel"

[sources.vk]
token = "secret"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scanning.sequential.base_delay_ms, 250);
        assert_eq!(config.scanning.sequential.jitter_max_ms, 1200);
        assert_eq!(config.sources.vk.token.as_deref(), Some("secret"));
        assert_eq!(
            config.scanning.strategies.get("vk"),
            Some(&Strategy::Parallel)
        );
        // Defaults survive for untouched sections
        assert_eq!(config.scanning.parallel.max_concurrent, 10);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.scanning.parallel.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scanning.sequential.jitter_min_ms = 2000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.sources.telegram.rate_limit = Some(RateLimitConfig {
            max_concurrent: 0,
            min_interval_ms: 0,
        });
        let err = config.validate().expect_err("zero capacity is invalid");
        assert!(err.to_string().contains("sources.telegram.rate_limit"));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("NICKSCAN_PARALLEL_MAX_CONCURRENT", "7");
        std::env::set_var("NICKSCAN_VK_TOKEN", "from-env");

        let config = AppConfig::default().with_env_overrides();
        assert_eq!(config.scanning.parallel.max_concurrent, 7);
        assert_eq!(config.sources.vk.token.as_deref(), Some("from-env"));

        std::env::remove_var("NICKSCAN_PARALLEL_MAX_CONCURRENT");
        std::env::remove_var("NICKSCAN_VK_TOKEN");
    }
}
