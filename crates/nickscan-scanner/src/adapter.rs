//! Source adapter capability contract.
//!
//! Every data source the orchestrator can scan implements [`SourceAdapter`].
//! An adapter declares what it can do once, through its [`AdapterDescriptor`];
//! the orchestrator resolves an execution strategy from that declaration at
//! registration time and never asks the adapter again per call.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use nickscan_core::SourceName;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// JSON object returned by a source for a found identifier.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Per-identifier outcomes of a bulk call.
pub type BulkResults = HashMap<String, Result<ScanOutcome>>;

/// What a source can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Answers one identifier per call (`scan`).
    SingleScan,
    /// Answers a whole batch in one call (`scan_bulk`).
    BulkScan,
    /// Must be called strictly one request at a time, with pacing.
    StrictPacing,
}

/// Static description of a source, produced once at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDescriptor {
    /// Unique source name, used to tag result envelopes
    pub name: SourceName,
    /// Declared capabilities
    pub capabilities: BTreeSet<Capability>,
}

impl AdapterDescriptor {
    /// Create a descriptor with no capabilities.
    #[must_use]
    pub fn new(name: SourceName) -> Self {
        Self {
            name,
            capabilities: BTreeSet::new(),
        }
    }

    /// Add a capability.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Whether the source declared `capability`.
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Result of a successful single-identifier lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// The identifier exists at the source.
    Found(Payload),
    /// The identifier does not exist at the source. Not an error.
    Absent,
}

impl ScanOutcome {
    /// Returns the payload if the identifier was found.
    #[must_use]
    pub fn into_payload(self) -> Option<Payload> {
        match self {
            Self::Found(payload) => Some(payload),
            Self::Absent => None,
        }
    }
}

/// Trait implemented by every scannable data source.
///
/// Implementations must be thread-safe (Send + Sync); one instance is shared
/// by all tasks of a session.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Describe the source. Called once when the adapter is registered.
    fn descriptor(&self) -> AdapterDescriptor;

    /// Prepare the adapter for a session.
    ///
    /// A failure here disables the adapter for the session; other adapters
    /// are unaffected.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Look up a single identifier.
    async fn scan(&self, identifier: &str) -> Result<ScanOutcome> {
        let _ = identifier;
        Err(ScanError::Unsupported {
            source_name: self.descriptor().name,
            operation: "single scanning",
        })
    }

    /// Look up a whole batch in one call.
    ///
    /// Identifiers missing from the returned map are treated as absent.
    async fn scan_bulk(&self, identifiers: &[String]) -> Result<BulkResults> {
        let _ = identifiers;
        Err(ScanError::Unsupported {
            source_name: self.descriptor().name,
            operation: "bulk scanning",
        })
    }

    /// Release resources held for the session.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// An adapter together with the descriptor captured at registration.
#[derive(Clone)]
pub struct RegisteredAdapter {
    descriptor: AdapterDescriptor,
    adapter: Arc<dyn SourceAdapter>,
}

impl RegisteredAdapter {
    /// Capture the adapter's descriptor.
    #[must_use]
    pub fn new(adapter: Arc<dyn SourceAdapter>) -> Self {
        Self {
            descriptor: adapter.descriptor(),
            adapter,
        }
    }

    /// Descriptor captured at registration.
    #[must_use]
    pub fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    /// Source name.
    #[must_use]
    pub fn name(&self) -> &SourceName {
        &self.descriptor.name
    }

    /// The underlying adapter.
    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn SourceAdapter> {
        &self.adapter
    }
}

impl std::fmt::Debug for RegisteredAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAdapter")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BulkOnly;

    #[async_trait]
    impl SourceAdapter for BulkOnly {
        fn descriptor(&self) -> AdapterDescriptor {
            AdapterDescriptor::new(SourceName::new("bulk-only").expect("valid name"))
                .with_capability(Capability::BulkScan)
        }
    }

    #[test]
    fn test_descriptor_capabilities() {
        let descriptor = AdapterDescriptor::new(SourceName::new("vk").expect("valid name"))
            .with_capability(Capability::SingleScan)
            .with_capability(Capability::BulkScan)
            .with_capability(Capability::SingleScan);

        assert!(descriptor.supports(Capability::BulkScan));
        assert!(!descriptor.supports(Capability::StrictPacing));
        assert_eq!(descriptor.capabilities.len(), 2);
    }

    #[tokio::test]
    async fn test_default_operations_are_unsupported() {
        let adapter = BulkOnly;
        assert!(adapter.initialize().await.is_ok());
        assert!(matches!(
            adapter.scan("alice").await,
            Err(ScanError::Unsupported { .. })
        ));
        assert!(matches!(
            adapter.scan_bulk(&["alice".to_string()]).await,
            Err(ScanError::Unsupported { .. })
        ));
        assert!(adapter.shutdown().await.is_ok());
    }

    #[test]
    fn test_registered_adapter_captures_descriptor() {
        let registered = RegisteredAdapter::new(Arc::new(BulkOnly));
        assert_eq!(registered.name().as_str(), "bulk-only");
        assert!(registered.descriptor().supports(Capability::BulkScan));
    }

    #[test]
    fn test_outcome_into_payload() {
        let mut payload = Payload::new();
        payload.insert("login".into(), serde_json::json!("alice"));
        assert_eq!(
            ScanOutcome::Found(payload.clone()).into_payload(),
            Some(payload)
        );
        assert_eq!(ScanOutcome::Absent.into_payload(), None);
    }
}
