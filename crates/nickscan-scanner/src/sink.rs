//! Event sink shared by the three processors of a session.

use crate::adapter::Payload;
use crate::types::{ProgressUpdate, ResultEnvelope, ScanEvent};
use nickscan_core::SourceName;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Writes result envelopes and progress ticks onto the session channel.
///
/// Guarantees at most one envelope per (identifier, source) pair and keeps the
/// progress counter. A closed receiver is tolerated: events are dropped and
/// the session keeps running.
#[derive(Debug)]
pub struct ScanSink {
    events: mpsc::Sender<ScanEvent>,
    total: usize,
    completed: AtomicUsize,
    emitted: AtomicUsize,
    seen: Mutex<HashSet<(String, SourceName)>>,
}

impl ScanSink {
    /// Create a sink reporting progress against `total` units.
    #[must_use]
    pub fn new(events: mpsc::Sender<ScanEvent>, total: usize) -> Self {
        Self {
            events,
            total,
            completed: AtomicUsize::new(0),
            emitted: AtomicUsize::new(0),
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Emit an envelope unless this pair was already emitted.
    ///
    /// Returns whether the envelope was new.
    pub async fn emit(&self, identifier: &str, source_name: &SourceName, payload: Payload) -> bool {
        let is_new = self
            .seen
            .lock()
            .map(|mut seen| seen.insert((identifier.to_string(), source_name.clone())))
            .unwrap_or_else(|poisoned| {
                poisoned
                    .into_inner()
                    .insert((identifier.to_string(), source_name.clone()))
            });

        if !is_new {
            tracing::debug!(source = %source_name, identifier, "duplicate result suppressed");
            return false;
        }

        self.emitted.fetch_add(1, Ordering::SeqCst);
        let envelope = ResultEnvelope::new(identifier, source_name.clone(), payload);
        if self.events.send(ScanEvent::Result(envelope)).await.is_err() {
            tracing::debug!(
                source = %source_name,
                identifier,
                "event receiver closed, result dropped"
            );
        }
        true
    }

    /// Record one completed progress unit.
    pub async fn tick(&self) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let update = ProgressUpdate {
            completed,
            total: self.total,
        };
        if self.events.send(ScanEvent::Progress(update)).await.is_err() {
            tracing::trace!(completed, "event receiver closed, progress dropped");
        }
    }

    /// Units the session will report in total.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Units completed so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Envelopes emitted so far.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Payload {
        let mut payload = Payload::new();
        payload.insert("id".into(), serde_json::json!(1));
        payload
    }

    #[tokio::test]
    async fn test_duplicate_pairs_emitted_once() {
        let (tx, mut rx) = mpsc::channel(8);
        let sink = ScanSink::new(tx, 0);
        let github = SourceName::new("github").expect("valid name");
        let vk = SourceName::new("vk").expect("valid name");

        assert!(sink.emit("alice", &github, payload()).await);
        assert!(!sink.emit("alice", &github, payload()).await);
        assert!(sink.emit("alice", &vk, payload()).await);
        assert_eq!(sink.emitted(), 2);

        drop(sink);
        let mut results = 0;
        while let Some(event) = rx.recv().await {
            assert!(matches!(event, ScanEvent::Result(_)));
            results += 1;
        }
        assert_eq!(results, 2);
    }

    #[tokio::test]
    async fn test_ticks_count_up_to_total() {
        let (tx, mut rx) = mpsc::channel(8);
        let sink = ScanSink::new(tx, 2);
        sink.tick().await;
        sink.tick().await;
        assert_eq!(sink.completed(), 2);

        let first = rx.recv().await.expect("first tick");
        assert_eq!(
            first,
            ScanEvent::Progress(ProgressUpdate {
                completed: 1,
                total: 2
            })
        );
    }

    #[tokio::test]
    async fn test_closed_receiver_is_tolerated() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ScanSink::new(tx, 1);
        let github = SourceName::new("github").expect("valid name");

        assert!(sink.emit("alice", &github, payload()).await);
        sink.tick().await;
        assert_eq!(sink.completed(), 1);
    }
}
