//! Parallel processor: bounded-concurrency single-item calls.

use super::{scan_once, ProcessorReport, Task};
use crate::adapter::{RegisteredAdapter, ScanOutcome};
use crate::context::ScanContext;
use crate::sink::ScanSink;
use crate::types::ScanBatch;
use futures::stream::{FuturesUnordered, StreamExt};
use nickscan_core::ParallelConfig;
use std::time::Duration;

/// Runs one task per (adapter, identifier) with a processor-wide admission limit.
#[derive(Debug, Clone)]
pub struct ParallelProcessor {
    max_concurrent: usize,
    task_timeout: Duration,
}

impl ParallelProcessor {
    /// Create a processor admitting `max_concurrent` in-flight tasks.
    #[must_use]
    pub fn new(max_concurrent: usize, task_timeout: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            task_timeout,
        }
    }

    /// Create a processor from configuration.
    #[must_use]
    pub fn from_config(config: &ParallelConfig) -> Self {
        Self::new(config.max_concurrent, config.task_timeout())
    }

    /// Scan every identifier on every adapter.
    ///
    /// Tasks are admitted adapter by adapter, identifier by identifier, but
    /// complete in any order.
    pub async fn run(
        &self,
        context: &ScanContext,
        adapters: &[RegisteredAdapter],
        batch: &ScanBatch,
        sink: &ScanSink,
    ) -> ProcessorReport {
        let mut in_flight = FuturesUnordered::new();
        let mut report = ProcessorReport::default();

        let tasks: Vec<Task> = adapters
            .iter()
            .flat_map(|adapter| {
                batch
                    .identifiers()
                    .iter()
                    .map(move |identifier| Task::new(identifier.clone(), adapter.clone()))
            })
            .collect();

        for task in tasks {
            in_flight.push(self.run_task(context, task, sink));

            // Respect concurrency limit
            while in_flight.len() >= self.max_concurrent {
                if let Some(succeeded) = in_flight.next().await {
                    if !succeeded {
                        report.failed_tasks += 1;
                    }
                }
            }
        }

        // Collect remaining results
        while let Some(succeeded) = in_flight.next().await {
            if !succeeded {
                report.failed_tasks += 1;
            }
        }

        report
    }

    /// Returns false when the task ended in an error or timeout.
    async fn run_task(&self, context: &ScanContext, mut task: Task, sink: &ScanSink) -> bool {
        task.attempt_count += 1;
        let source_name = task.adapter.name();

        let succeeded =
            match scan_once(context, &task.adapter, &task.identifier, self.task_timeout).await {
                Ok(ScanOutcome::Found(payload)) => {
                    sink.emit(&task.identifier, source_name, payload).await;
                    true
                }
                Ok(ScanOutcome::Absent) => {
                    tracing::debug!(
                        source = %source_name,
                        identifier = %task.identifier,
                        "not found"
                    );
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        source = %source_name,
                        identifier = %task.identifier,
                        error = %e,
                        "scan task failed"
                    );
                    false
                }
            };

        sink.tick().await;
        succeeded
    }
}
