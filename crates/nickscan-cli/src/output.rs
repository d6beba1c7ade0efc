//! Rendering of session events for the terminal.

use nickscan_scanner::{ProgressUpdate, ResultEnvelope, SessionSummary};

/// One envelope as a single JSON line.
pub fn result_line(envelope: &ResultEnvelope) -> serde_json::Result<String> {
    serde_json::to_string(envelope)
}

/// Progress line for stderr.
#[must_use]
pub fn progress_line(update: &ProgressUpdate) -> String {
    format!(
        "[{}/{}] {:.0}%",
        update.completed,
        update.total,
        update.percent()
    )
}

/// Closing summary for stderr.
#[must_use]
pub fn summary_line(summary: &SessionSummary) -> String {
    format!(
        "done: {} found, {} failed, {}/{} units in {:.1}s",
        summary.results_emitted,
        summary.failed_tasks,
        summary.completed_units,
        summary.expected_units,
        summary.elapsed.as_secs_f64()
    )
}
