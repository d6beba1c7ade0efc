//! Source registry: builds adapters from configuration and runs their
//! lifecycle hooks.

use crate::error::{Result, SourceError};
use crate::github::{self, GithubSource};
use crate::telegram::{self, TelegramSource};
use crate::vk::{self, VkSource};
use nickscan_core::SourcesConfig;
use nickscan_scanner::{ScanContext, SessionOrchestrator, SourceAdapter};
use std::sync::Arc;

/// Names of every adapter this crate provides.
pub const KNOWN_SOURCES: [&str; 3] = [github::NAME, vk::NAME, telegram::NAME];

struct Entry {
    name: String,
    adapter: Arc<dyn SourceAdapter>,
}

/// Active adapters, in registration order.
///
/// Adapters whose `initialize` hook fails are dropped for the rest of the
/// session; the remaining ones keep working.
#[derive(Default)]
pub struct SourceRegistry {
    entries: Vec<Entry>,
}

impl SourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every enabled adapter from configuration.
    ///
    /// # Errors
    /// Returns error if an adapter cannot be constructed.
    pub fn from_config(config: &SourcesConfig, http: &reqwest::Client) -> Result<Self> {
        let mut registry = Self::new();

        if config.github.enabled {
            registry.register(Arc::new(GithubSource::new(
                http.clone(),
                config.github.token.clone(),
            )?));
        }
        if config.vk.enabled {
            registry.register(Arc::new(VkSource::new(
                http.clone(),
                config.vk.token.clone(),
            )?));
        }
        if config.telegram.enabled {
            registry.register(Arc::new(TelegramSource::new(http.clone())?));
        }

        for (name, source) in config.iter() {
            if !source.enabled {
                tracing::info!(source = name, "source disabled in configuration");
            }
        }

        Ok(registry)
    }

    /// Add an adapter.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let name = adapter.descriptor().name.to_string();
        self.entries.push(Entry { name, adapter });
    }

    /// Keep only the named sources.
    ///
    /// An empty list keeps everything. Known names that are not active
    /// (disabled in configuration) are skipped with a warning.
    ///
    /// # Errors
    /// Returns [`SourceError::UnknownSource`] for a name no adapter answers to.
    pub fn retain_named(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }

        let wanted: Vec<String> = names.iter().map(|n| n.trim().to_lowercase()).collect();
        for name in &wanted {
            let known = KNOWN_SOURCES.contains(&name.as_str())
                || self.entries.iter().any(|entry| &entry.name == name);
            if !known {
                return Err(SourceError::UnknownSource { name: name.clone() });
            }
            if !self.entries.iter().any(|entry| &entry.name == name) {
                tracing::warn!(source = %name, "requested source is disabled");
            }
        }

        self.entries.retain(|entry| wanted.contains(&entry.name));
        Ok(())
    }

    /// Run `initialize` on every adapter, dropping the ones that fail.
    ///
    /// Returns the names of the dropped adapters.
    pub async fn initialize_all(&mut self) -> Vec<String> {
        let mut active = Vec::with_capacity(self.entries.len());
        let mut disabled = Vec::new();

        for entry in std::mem::take(&mut self.entries) {
            match entry.adapter.initialize().await {
                Ok(()) => {
                    tracing::info!(source = %entry.name, "source initialized");
                    active.push(entry);
                }
                Err(e) => {
                    tracing::warn!(
                        source = %entry.name,
                        error = %e,
                        "source disabled for this session"
                    );
                    disabled.push(entry.name);
                }
            }
        }

        self.entries = active;
        disabled
    }

    /// Call `shutdown` on every active adapter. Failures are logged only.
    pub async fn shutdown_all(&self) {
        for entry in &self.entries {
            match entry.adapter.shutdown().await {
                Ok(()) => tracing::debug!(source = %entry.name, "source shut down"),
                Err(e) => {
                    tracing::warn!(source = %entry.name, error = %e, "source shutdown failed");
                }
            }
        }
    }

    /// Build an orchestrator with every active adapter registered.
    #[must_use]
    pub fn orchestrator(&self, context: Arc<ScanContext>) -> SessionOrchestrator {
        self.entries
            .iter()
            .fold(SessionOrchestrator::new(context), |orchestrator, entry| {
                orchestrator.with_adapter(entry.adapter.clone())
            })
    }

    /// Names of active adapters.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Number of active adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no adapter is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nickscan_core::SourceName;
    use nickscan_scanner::{AdapterDescriptor, Capability, ScanError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Lifecycle {
        name: &'static str,
        fail_init: bool,
        shutdowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for Lifecycle {
        fn descriptor(&self) -> AdapterDescriptor {
            AdapterDescriptor::new(SourceName::new(self.name).expect("valid name"))
                .with_capability(Capability::SingleScan)
        }

        async fn initialize(&self) -> nickscan_scanner::Result<()> {
            if self.fail_init {
                return Err(ScanError::Init {
                    source_name: self.descriptor().name,
                    reason: "no credentials".into(),
                });
            }
            Ok(())
        }

        async fn shutdown(&self) -> nickscan_scanner::Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Err(ScanError::transport(&self.descriptor().name, "already closed"))
        }
    }

    #[test]
    fn test_from_default_config_builds_all_sources() {
        let registry =
            SourceRegistry::from_config(&SourcesConfig::default(), &reqwest::Client::new())
                .expect("build registry");
        assert_eq!(registry.names(), vec!["github", "vk", "telegram"]);
    }

    #[test]
    fn test_disabled_sources_are_skipped() {
        let mut config = SourcesConfig::default();
        config.telegram.enabled = false;

        let registry =
            SourceRegistry::from_config(&config, &reqwest::Client::new()).expect("build registry");
        assert_eq!(registry.names(), vec!["github", "vk"]);
    }

    #[tokio::test]
    async fn test_vk_without_token_is_disabled_on_initialize() {
        let mut registry =
            SourceRegistry::from_config(&SourcesConfig::default(), &reqwest::Client::new())
                .expect("build registry");

        let disabled = registry.initialize_all().await;

        assert_eq!(disabled, vec!["vk".to_string()]);
        assert_eq!(registry.names(), vec!["github", "telegram"]);
    }

    #[tokio::test]
    async fn test_failed_init_only_drops_that_source() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let mut registry = SourceRegistry::new();
        for (name, fail_init) in [("alpha", false), ("beta", true), ("gamma", false)] {
            registry.register(Arc::new(Lifecycle {
                name,
                fail_init,
                shutdowns: shutdowns.clone(),
            }));
        }

        registry.initialize_all().await;
        assert_eq!(registry.names(), vec!["alpha", "gamma"]);

        // failing shutdowns are logged, not propagated
        registry.shutdown_all().await;
        assert_eq!(shutdowns.load(Ordering::SeqCst), 2);

        let orchestrator = registry.orchestrator(Arc::new(ScanContext::default()));
        assert_eq!(orchestrator.adapters().len(), 2);
    }

    #[test]
    fn test_retain_named() {
        let mut registry =
            SourceRegistry::from_config(&SourcesConfig::default(), &reqwest::Client::new())
                .expect("build registry");

        registry
            .retain_named(&["GitHub".to_string()])
            .expect("known source");
        assert_eq!(registry.names(), vec!["github"]);

        let err = registry.retain_named(&["myspace".to_string()]).unwrap_err();
        assert!(matches!(err, SourceError::UnknownSource { .. }));
    }
}
