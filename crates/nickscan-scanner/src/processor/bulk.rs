//! Bulk processor: one batched call per source for the whole batch.

use super::ProcessorReport;
use crate::adapter::{BulkResults, RegisteredAdapter, ScanOutcome};
use crate::context::ScanContext;
use crate::error::{Result, ScanError};
use crate::sink::ScanSink;
use crate::types::ScanBatch;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::time::Duration;

/// Issues exactly one `scan_bulk` call per adapter.
#[derive(Debug, Clone)]
pub struct BulkProcessor {
    timeout: Duration,
}

impl BulkProcessor {
    /// Create a processor with a per-call timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Scan the batch on every adapter, one progress unit per adapter.
    ///
    /// Adapters run concurrently with each other.
    pub async fn run(
        &self,
        context: &ScanContext,
        adapters: &[RegisteredAdapter],
        batch: &ScanBatch,
        sink: &ScanSink,
    ) -> ProcessorReport {
        let identifiers = batch.unique();
        let mut calls: FuturesUnordered<_> = adapters
            .iter()
            .map(|adapter| self.scan_adapter(context, adapter, &identifiers, sink))
            .collect();

        let mut report = ProcessorReport::default();
        while let Some(adapter_report) = calls.next().await {
            report = report.merge(adapter_report);
        }
        report
    }

    async fn scan_adapter(
        &self,
        context: &ScanContext,
        adapter: &RegisteredAdapter,
        identifiers: &[String],
        sink: &ScanSink,
    ) -> ProcessorReport {
        let source_name = adapter.name();
        let mut report = ProcessorReport::default();

        if identifiers.is_empty() {
            tracing::debug!(source = %source_name, "empty batch, bulk call skipped");
            sink.tick().await;
            return report;
        }

        match self.call(context, adapter, identifiers).await {
            Ok(results) => {
                let requested: HashSet<&str> = identifiers.iter().map(String::as_str).collect();
                let mut found = 0usize;

                for (identifier, entry) in results {
                    if !requested.contains(identifier.as_str()) {
                        tracing::debug!(
                            source = %source_name,
                            identifier = %identifier,
                            "unrequested bulk entry ignored"
                        );
                        continue;
                    }
                    match entry {
                        Ok(ScanOutcome::Found(payload)) => {
                            if sink.emit(&identifier, source_name, payload).await {
                                found += 1;
                            }
                        }
                        Ok(ScanOutcome::Absent) => {}
                        Err(e) => {
                            report.bulk_item_errors += 1;
                            tracing::debug!(
                                source = %source_name,
                                identifier = %identifier,
                                error = %e,
                                "bulk entry failed"
                            );
                        }
                    }
                }

                tracing::info!(
                    source = %source_name,
                    requested = identifiers.len(),
                    found,
                    item_errors = report.bulk_item_errors,
                    "bulk scan finished"
                );
            }
            Err(e) => {
                report.failed_tasks += 1;
                tracing::warn!(source = %source_name, error = %e, "bulk scan failed");
            }
        }

        sink.tick().await;
        report
    }

    async fn call(
        &self,
        context: &ScanContext,
        adapter: &RegisteredAdapter,
        identifiers: &[String],
    ) -> Result<BulkResults> {
        let call = async {
            let _permit = match context.rate_limiter(adapter.name()) {
                Some(limiter) => Some(limiter.acquire().await?),
                None => None,
            };
            adapter.adapter().scan_bulk(identifiers).await
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ScanError::Timeout {
                source_name: adapter.name().clone(),
                identifier: format!("<batch of {}>", identifiers.len()),
                after: self.timeout,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterDescriptor, Capability, Payload, SourceAdapter};
    use crate::rate_limit::RateLimiter;
    use crate::types::ScanEvent;
    use async_trait::async_trait;
    use nickscan_core::SourceName;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct FakeBulk {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SourceAdapter for FakeBulk {
        fn descriptor(&self) -> AdapterDescriptor {
            AdapterDescriptor::new(SourceName::new("fake-bulk").expect("valid name"))
                .with_capability(Capability::BulkScan)
        }

        async fn scan_bulk(&self, identifiers: &[String]) -> Result<BulkResults> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScanError::transport(&self.descriptor().name, "boom"));
            }
            let mut results = BulkResults::new();
            for id in identifiers {
                let mut payload = Payload::new();
                payload.insert("id".into(), serde_json::json!(id));
                results.insert(id.clone(), Ok(ScanOutcome::Found(payload)));
            }
            results.insert("stranger".into(), Ok(ScanOutcome::Found(Payload::new())));
            Ok(results)
        }
    }

    async fn run_fake(
        fail: bool,
        batch: &ScanBatch,
    ) -> (Arc<FakeBulk>, ProcessorReport, Vec<ScanEvent>) {
        let fake = Arc::new(FakeBulk {
            calls: AtomicUsize::new(0),
            fail,
        });
        let adapters = vec![RegisteredAdapter::new(fake.clone())];
        let (tx, mut rx) = mpsc::channel(64);
        let sink = ScanSink::new(tx, 1);

        let report = BulkProcessor::new(Duration::from_secs(5))
            .run(&ScanContext::default(), &adapters, batch, &sink)
            .await;
        drop(sink);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (fake, report, events)
    }

    #[tokio::test]
    async fn test_one_call_and_one_tick_per_adapter() {
        let batch = ScanBatch::new(["x", "y", "x"]);
        let (fake, report, events) = run_fake(false, &batch).await;

        assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report, ProcessorReport::default());

        let results = events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Result(_)))
            .count();
        let ticks = events
            .iter()
            .filter(|e| matches!(e, ScanEvent::Progress(_)))
            .count();
        // "stranger" was never requested
        assert_eq!(results, 2);
        assert_eq!(ticks, 1);
    }

    #[tokio::test]
    async fn test_adapter_failure_still_ticks() {
        let batch = ScanBatch::new(["x"]);
        let (_, report, events) = run_fake(true, &batch).await;

        assert_eq!(report.failed_tasks, 1);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ScanEvent::Progress(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_call() {
        let batch = ScanBatch::new(Vec::<String>::new());
        let (fake, _, events) = run_fake(false, &batch).await;

        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert_eq!(events.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_covers_limiter_wait() {
        let fake = Arc::new(FakeBulk {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let adapters = vec![RegisteredAdapter::new(fake.clone())];
        let name = SourceName::new("fake-bulk").expect("valid name");
        let limiter = RateLimiter::new(name.clone(), 1, Duration::ZERO);
        let context = ScanContext::default().with_rate_limiter(limiter);
        let limiter = context.rate_limiter(&name).expect("limiter registered");
        let held = limiter.acquire().await.expect("first permit");

        let (tx, mut rx) = mpsc::channel(8);
        let sink = ScanSink::new(tx, 1);
        let report = BulkProcessor::new(Duration::from_secs(5))
            .run(&context, &adapters, &ScanBatch::new(["x"]), &sink)
            .await;
        drop(sink);

        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.failed_tasks, 1);
        assert!(matches!(rx.recv().await, Some(ScanEvent::Progress(_))));
        assert!(rx.recv().await.is_none());

        drop(held);
        assert_eq!(limiter.available(), 1);
    }
}
