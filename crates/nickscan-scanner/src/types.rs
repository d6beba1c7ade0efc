//! Session data model: batches, result envelopes and session events.

use crate::adapter::Payload;
use nickscan_core::{SessionId, SourceName, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifiers scanned in one user-initiated session.
///
/// Order is preserved and duplicates are allowed.
#[derive(Debug, Clone)]
pub struct ScanBatch {
    session_id: SessionId,
    identifiers: Vec<String>,
}

impl ScanBatch {
    /// Build a batch, trimming whitespace and dropping empty entries.
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identifiers = identifiers
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        Self {
            session_id: SessionId::generate(),
            identifiers,
        }
    }

    /// Session this batch belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Identifiers in submission order.
    #[must_use]
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Identifiers with duplicates removed, first occurrence kept.
    #[must_use]
    pub fn unique(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.identifiers
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    /// Number of identifiers, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Whether the batch holds no identifiers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// A found payload tagged with its identifier and source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Identifier the payload answers
    pub identifier: String,
    /// Source that produced it
    pub source_name: SourceName,
    /// Source-specific JSON object
    pub payload: Payload,
    /// When the orchestrator received it
    pub received_at: Timestamp,
}

impl ResultEnvelope {
    /// Create an envelope stamped with the current time.
    #[must_use]
    pub fn new(identifier: impl Into<String>, source_name: SourceName, payload: Payload) -> Self {
        Self {
            identifier: identifier.into(),
            source_name,
            payload,
            received_at: Timestamp::now(),
        }
    }
}

/// Progress after one more unit of work finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Units finished so far
    pub completed: usize,
    /// Units the session will report in total
    pub total: usize,
}

impl ProgressUpdate {
    /// Completion as a percentage in `0..=100`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

/// Event streamed to the caller while a session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A source found an identifier.
    Result(ResultEnvelope),
    /// One progress unit completed.
    Progress(ProgressUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_trims_and_drops_empty() {
        let batch = ScanBatch::new(["  alice ", "", "bob", "   "]);
        assert_eq!(batch.identifiers(), &["alice".to_string(), "bob".to_string()]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_batch_keeps_duplicates_in_order() {
        let batch = ScanBatch::new(vec!["x", "y", "x", "z"]);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.unique(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_batches_get_distinct_sessions() {
        let a = ScanBatch::new(["x"]);
        let b = ScanBatch::new(["x"]);
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_progress_percent() {
        let update = ProgressUpdate {
            completed: 7,
            total: 28,
        };
        assert!((update.percent() - 25.0).abs() < f64::EPSILON);
        let empty = ProgressUpdate {
            completed: 0,
            total: 0,
        };
        assert!((empty.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_event_serialization() {
        let mut payload = Payload::new();
        payload.insert("login".into(), serde_json::json!("alice"));
        let event = ScanEvent::Result(ResultEnvelope::new(
            "alice",
            SourceName::new("github").expect("valid name"),
            payload,
        ));

        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["type"], "result");
        assert_eq!(json["source_name"], "github");
        assert_eq!(json["payload"]["login"], "alice");
    }
}
