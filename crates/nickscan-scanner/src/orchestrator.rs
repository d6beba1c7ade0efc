//! Session orchestrator for coordinating one scan across all sources.
//!
//! This module provides the `SessionOrchestrator` which partitions the
//! registered adapters by strategy and runs the bulk, parallel and sequential
//! processors side by side. Results and progress are streamed to the caller
//! over a bounded channel as they arrive.

use crate::adapter::{RegisteredAdapter, SourceAdapter};
use crate::classifier::{Partition, StrategyClassifier};
use crate::context::ScanContext;
use crate::error::{Result, ScanError};
use crate::processor::{BulkProcessor, ParallelProcessor, ProcessorReport, SequentialProcessor};
use crate::sink::ScanSink;
use crate::types::{ScanBatch, ScanEvent};
use nickscan_core::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session the batch belonged to
    pub session_id: SessionId,
    /// Progress units announced up front
    pub expected_units: usize,
    /// Progress units actually reported
    pub completed_units: usize,
    /// Result envelopes emitted
    pub results_emitted: usize,
    /// Tasks and bulk calls that ended in an error or timeout
    pub failed_tasks: usize,
    /// Per-identifier errors reported inside successful bulk calls
    pub bulk_item_errors: usize,
    /// Wall-clock duration of the session
    pub elapsed: Duration,
}

/// Runs scan sessions over a fixed set of registered adapters.
pub struct SessionOrchestrator {
    /// Shared HTTP client, limiters and scanning settings
    context: Arc<ScanContext>,
    /// Adapters in registration order
    adapters: Vec<RegisteredAdapter>,
    /// Resolves each adapter's strategy
    classifier: StrategyClassifier,
}

impl SessionOrchestrator {
    /// Create an orchestrator with no adapters.
    ///
    /// The strategy table under `[scanning.strategies]` is applied to the
    /// classifier.
    #[must_use]
    pub fn new(context: Arc<ScanContext>) -> Self {
        let classifier = StrategyClassifier::with_overrides(context.scanning().strategies.clone());
        Self {
            context,
            adapters: Vec::new(),
            classifier,
        }
    }

    /// Register an adapter. Its descriptor is captured now.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let registered = RegisteredAdapter::new(adapter);
        tracing::debug!(source = %registered.name(), "registered source adapter");
        self.adapters.push(registered);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Replace the classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: StrategyClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Registered adapters in registration order.
    #[must_use]
    pub fn adapters(&self) -> &[RegisteredAdapter] {
        &self.adapters
    }

    /// Progress units a session over `batch` would report.
    pub fn expected_units(&self, batch: &ScanBatch) -> Result<usize> {
        Ok(self.classifier.partition(&self.adapters)?.expected_units(batch.len()))
    }

    /// Run one session to completion.
    ///
    /// Bulk, parallel and sequential processing run concurrently; the call
    /// returns once all three have finished. Per-task failures are contained
    /// by the processors and only show up in the summary.
    ///
    /// # Errors
    /// Returns [`ScanError::Partition`] if the registered adapters cannot be
    /// partitioned. Nothing is emitted in that case.
    pub async fn run(
        &self,
        batch: &ScanBatch,
        events: mpsc::Sender<ScanEvent>,
    ) -> Result<SessionSummary> {
        let span = tracing::info_span!("scan_session", session_id = %batch.session_id());
        self.run_session(batch, events).instrument(span).await
    }

    async fn run_session(
        &self,
        batch: &ScanBatch,
        events: mpsc::Sender<ScanEvent>,
    ) -> Result<SessionSummary> {
        let started = Instant::now();

        if self.adapters.is_empty() {
            tracing::info!("no sources registered, nothing to scan");
            return Ok(SessionSummary {
                session_id: batch.session_id().clone(),
                expected_units: 0,
                completed_units: 0,
                results_emitted: 0,
                failed_tasks: 0,
                bulk_item_errors: 0,
                elapsed: started.elapsed(),
            });
        }

        let partition = self.classifier.partition(&self.adapters)?;
        let expected_units = partition.expected_units(batch.len());
        tracing::info!(
            identifiers = batch.len(),
            bulk = partition.bulk.len(),
            parallel = partition.parallel.len(),
            sequential = partition.sequential.len(),
            expected_units,
            "scan session started"
        );

        let sink = ScanSink::new(events, expected_units);
        let report = self.process(&partition, batch, &sink).await;

        let summary = SessionSummary {
            session_id: batch.session_id().clone(),
            expected_units,
            completed_units: sink.completed(),
            results_emitted: sink.emitted(),
            failed_tasks: report.failed_tasks,
            bulk_item_errors: report.bulk_item_errors,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            completed_units = summary.completed_units,
            results = summary.results_emitted,
            failed = summary.failed_tasks,
            elapsed_ms = summary.elapsed.as_millis(),
            "scan session finished"
        );

        Ok(summary)
    }

    async fn process(
        &self,
        partition: &Partition,
        batch: &ScanBatch,
        sink: &ScanSink,
    ) -> ProcessorReport {
        let context = self.context.as_ref();
        let scanning = context.scanning();

        let bulk = BulkProcessor::new(scanning.bulk_timeout());
        let parallel = ParallelProcessor::from_config(&scanning.parallel);
        let sequential = SequentialProcessor::new(scanning.sequential.clone());

        let (bulk_report, parallel_report, sequential_report) = tokio::join!(
            bulk.run(context, &partition.bulk, batch, sink),
            parallel.run(context, &partition.parallel, batch, sink),
            sequential.run(context, &partition.sequential, batch, sink),
        );

        bulk_report.merge(parallel_report).merge(sequential_report)
    }

    /// Run a session on a background task.
    ///
    /// Events are buffered up to `[scanning] event_buffer`; a slow reader
    /// applies backpressure to the processors.
    #[must_use]
    pub fn spawn(self: Arc<Self>, batch: ScanBatch) -> ScanHandle {
        let buffer = self.context.scanning().event_buffer.max(1);
        let (tx, rx) = mpsc::channel(buffer);

        let task = tokio::spawn(async move { self.run(&batch, tx).await });

        ScanHandle { events: rx, task }
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("adapters", &self.adapters)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

/// Handle to a session running in the background.
#[derive(Debug)]
pub struct ScanHandle {
    events: mpsc::Receiver<ScanEvent>,
    task: JoinHandle<Result<SessionSummary>>,
}

impl ScanHandle {
    /// Next event, or `None` once the session has finished.
    pub async fn next_event(&mut self) -> Option<ScanEvent> {
        self.events.recv().await
    }

    /// Wait for the session and return its summary.
    ///
    /// Events not yet read are discarded; the session itself still runs to
    /// completion.
    pub async fn finish(self) -> Result<SessionSummary> {
        drop(self.events);
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ScanError::SessionAborted(e.to_string())),
        }
    }
}
