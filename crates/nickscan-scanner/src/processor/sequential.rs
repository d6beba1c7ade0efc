//! Sequential processor: one paced worker over a FIFO queue.
//!
//! Strictly-paced sources share a single queue per batch. The worker takes
//! one task at a time, retries rate-limited tasks in place, and sleeps a
//! jittered pacing delay after every task, successful or not. Once the queue
//! is empty the worker drains its last task and stops; there is no idle wait
//! to cancel.

use super::{scan_once, ProcessorReport, Task};
use crate::adapter::{RegisteredAdapter, ScanOutcome};
use crate::context::ScanContext;
use crate::error::{Result, ScanError};
use crate::sink::ScanSink;
use crate::types::ScanBatch;
use nickscan_core::SequentialConfig;
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::watch;

/// Lifecycle of the sequential worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Not started yet
    Idle,
    /// Taking tasks from the queue
    Running,
    /// Queue is empty, finishing the last task
    Draining,
    /// Finished; no further tasks will run
    Stopped,
}

/// Single-worker FIFO processor with pacing and rate-limit backoff.
#[derive(Debug)]
pub struct SequentialProcessor {
    config: SequentialConfig,
    state: watch::Sender<WorkerState>,
}

impl SequentialProcessor {
    /// Create a processor in the [`WorkerState::Idle`] state.
    #[must_use]
    pub fn new(config: SequentialConfig) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self { config, state }
    }

    /// Observe worker state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Current worker state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Build the queue and run the worker until it drains.
    pub async fn run(
        &self,
        context: &ScanContext,
        adapters: &[RegisteredAdapter],
        batch: &ScanBatch,
        sink: &ScanSink,
    ) -> ProcessorReport {
        let queue = Self::build_queue(adapters, batch);
        self.work(context, queue, sink).await
    }

    /// Interleave tasks: for each identifier, every adapter in registration order.
    fn build_queue(adapters: &[RegisteredAdapter], batch: &ScanBatch) -> VecDeque<Task> {
        batch
            .identifiers()
            .iter()
            .flat_map(|identifier| {
                adapters
                    .iter()
                    .map(move |adapter| Task::new(identifier.clone(), adapter.clone()))
            })
            .collect()
    }

    async fn work(
        &self,
        context: &ScanContext,
        mut queue: VecDeque<Task>,
        sink: &ScanSink,
    ) -> ProcessorReport {
        let mut report = ProcessorReport::default();
        if queue.is_empty() {
            self.transition(WorkerState::Stopped);
            return report;
        }

        self.transition(WorkerState::Running);
        tracing::debug!(queued = queue.len(), "sequential worker started");

        while let Some(mut task) = queue.pop_front() {
            if queue.is_empty() {
                self.transition(WorkerState::Draining);
            }

            let source_name = task.adapter.name().clone();
            match self.execute(context, &mut task).await {
                Ok(ScanOutcome::Found(payload)) => {
                    sink.emit(&task.identifier, &source_name, payload).await;
                }
                Ok(ScanOutcome::Absent) => {
                    tracing::debug!(
                        source = %source_name,
                        identifier = %task.identifier,
                        "not found"
                    );
                }
                Err(e) => {
                    report.failed_tasks += 1;
                    tracing::warn!(
                        source = %source_name,
                        identifier = %task.identifier,
                        attempts = task.attempt_count,
                        error = %e,
                        "sequential task failed"
                    );
                }
            }

            sink.tick().await;

            if !queue.is_empty() {
                let delay = self.pacing_delay();
                tracing::trace!(delay_ms = delay.as_millis(), "pacing");
                tokio::time::sleep(delay).await;
            }
        }

        self.transition(WorkerState::Stopped);
        tracing::debug!(failed = report.failed_tasks, "sequential worker stopped");
        report
    }

    /// Run one task, retrying in place on rate-limit signals.
    async fn execute(&self, context: &ScanContext, task: &mut Task) -> Result<ScanOutcome> {
        let max_wait = self.config.max_retry_wait();
        loop {
            task.attempt_count += 1;
            let result = scan_once(
                context,
                &task.adapter,
                &task.identifier,
                self.config.task_timeout(),
            )
            .await;

            let retry_after = match &result {
                Err(ScanError::RateLimited { retry_after, .. }) => *retry_after,
                _ => return result,
            };

            if retry_after > max_wait {
                tracing::warn!(
                    source = %task.adapter.name(),
                    identifier = %task.identifier,
                    retry_after_secs = retry_after.as_secs(),
                    "rate-limit wait exceeds ceiling, giving up"
                );
                return result;
            }
            if task.attempt_count >= self.config.max_attempts {
                return result;
            }

            let wait = retry_after + self.config.retry_buffer();
            tracing::warn!(
                source = %task.adapter.name(),
                identifier = %task.identifier,
                attempt = task.attempt_count,
                max_attempts = self.config.max_attempts,
                wait_ms = wait.as_millis(),
                "rate limited, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Base delay plus uniform jitter.
    fn pacing_delay(&self) -> Duration {
        let (min, max) = (self.config.jitter_min_ms, self.config.jitter_max_ms);
        let jitter = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        self.config.base_delay() + Duration::from_millis(jitter)
    }

    fn transition(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::trace!(?previous, ?next, "sequential worker state");
        }
    }
}
