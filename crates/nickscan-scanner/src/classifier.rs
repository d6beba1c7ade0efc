//! Strategy classification and adapter partitioning.

use crate::adapter::{AdapterDescriptor, Capability, RegisteredAdapter};
use crate::error::{Result, ScanError};
use nickscan_core::{SourceName, Strategy};
use std::collections::{BTreeMap, HashSet};

/// Maps each adapter to exactly one execution strategy.
///
/// Capability-based inference can be overridden per source name through an
/// explicit strategy table. Sources absent from the table fall back to
/// inference, and inference itself falls back to [`Strategy::Parallel`].
#[derive(Debug, Clone, Default)]
pub struct StrategyClassifier {
    overrides: BTreeMap<String, Strategy>,
}

impl StrategyClassifier {
    /// Classifier with no explicit table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier with an explicit strategy table keyed by source name.
    #[must_use]
    pub fn with_overrides(overrides: BTreeMap<String, Strategy>) -> Self {
        Self { overrides }
    }

    /// Resolve the strategy for a descriptor. Never fails.
    #[must_use]
    pub fn classify(&self, descriptor: &AdapterDescriptor) -> Strategy {
        if let Some(strategy) = self.overrides.get(descriptor.name.as_str()) {
            return *strategy;
        }

        if descriptor.supports(Capability::BulkScan) {
            Strategy::Bulk
        } else if descriptor.supports(Capability::StrictPacing) {
            Strategy::Sequential
        } else {
            Strategy::Parallel
        }
    }

    /// Split registered adapters into the three strategy groups.
    ///
    /// Registration order is preserved within each group.
    ///
    /// # Errors
    /// Returns [`ScanError::Partition`] on duplicate source names, on adapters
    /// that cannot scan at all, or when the explicit table forces a strategy
    /// the adapter has no capability for.
    pub fn partition(&self, adapters: &[RegisteredAdapter]) -> Result<Partition> {
        let mut seen: HashSet<&SourceName> = HashSet::new();
        let mut partition = Partition::default();

        for registered in adapters {
            let descriptor = registered.descriptor();
            if !seen.insert(&descriptor.name) {
                return Err(ScanError::Partition(format!(
                    "source '{}' is registered more than once",
                    descriptor.name
                )));
            }

            if !descriptor.supports(Capability::SingleScan)
                && !descriptor.supports(Capability::BulkScan)
            {
                return Err(ScanError::Partition(format!(
                    "source '{}' declares neither single nor bulk scanning",
                    descriptor.name
                )));
            }

            let strategy = self.classify(descriptor);
            let required = match strategy {
                Strategy::Bulk => Capability::BulkScan,
                Strategy::Parallel | Strategy::Sequential => Capability::SingleScan,
            };
            if !descriptor.supports(required) {
                return Err(ScanError::Partition(format!(
                    "source '{}' cannot run with the {strategy} strategy",
                    descriptor.name
                )));
            }

            tracing::debug!(source = %descriptor.name, %strategy, "classified source");
            partition.push(strategy, registered.clone());
        }

        Ok(partition)
    }
}

/// Adapters grouped by execution strategy.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Adapters answering whole batches
    pub bulk: Vec<RegisteredAdapter>,
    /// Adapters scanned with bounded concurrency
    pub parallel: Vec<RegisteredAdapter>,
    /// Adapters scanned one request at a time
    pub sequential: Vec<RegisteredAdapter>,
}

impl Partition {
    fn push(&mut self, strategy: Strategy, adapter: RegisteredAdapter) {
        match strategy {
            Strategy::Bulk => self.bulk.push(adapter),
            Strategy::Parallel => self.parallel.push(adapter),
            Strategy::Sequential => self.sequential.push(adapter),
        }
    }

    /// Total number of adapters across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bulk.len() + self.parallel.len() + self.sequential.len()
    }

    /// Whether no adapter was partitioned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Progress units a session over `identifiers` will report:
    /// one per bulk adapter plus one per (identifier, non-bulk adapter) pair.
    #[must_use]
    pub fn expected_units(&self, identifiers: usize) -> usize {
        self.bulk.len() + (self.parallel.len() + self.sequential.len()) * identifiers
    }
}
