//! End-to-end session tests with fake sources on virtual time.

use async_trait::async_trait;
use nickscan_core::{ScanningConfig, SourceName, Strategy};
use nickscan_scanner::{
    AdapterDescriptor, BulkResults, Capability, Payload, ScanBatch, ScanContext, ScanError,
    ScanEvent, ScanOutcome, SessionOrchestrator, SessionSummary, SourceAdapter,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn name(value: &str) -> SourceName {
    SourceName::new(value).expect("valid source name")
}

fn payload(identifier: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("login".into(), serde_json::json!(identifier));
    payload
}

/// Bulk source answering `{x: found, y: error, z: absent}`.
struct BulkSource;

#[async_trait]
impl SourceAdapter for BulkSource {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(name("alpha")).with_capability(Capability::BulkScan)
    }

    async fn scan_bulk(&self, identifiers: &[String]) -> nickscan_scanner::Result<BulkResults> {
        let mut results = BulkResults::new();
        for identifier in identifiers {
            let entry = match identifier.as_str() {
                "x" => Ok(ScanOutcome::Found(payload(identifier))),
                "y" => Err(ScanError::invalid_response(&name("alpha"), "bad entry")),
                _ => Ok(ScanOutcome::Absent),
            };
            results.insert(identifier.clone(), entry);
        }
        Ok(results)
    }
}

/// Parallel source that hangs on `z`.
struct ParallelSource;

#[async_trait]
impl SourceAdapter for ParallelSource {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(name("beta")).with_capability(Capability::SingleScan)
    }

    async fn scan(&self, identifier: &str) -> nickscan_scanner::Result<ScanOutcome> {
        if identifier == "z" {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(ScanOutcome::Found(payload(identifier)))
    }
}

/// Strictly paced source failing on `y`; records when each call ran.
#[derive(Default)]
struct PacedSource {
    calls: Mutex<Vec<(String, Instant, Instant)>>,
}

#[async_trait]
impl SourceAdapter for PacedSource {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(name("gamma"))
            .with_capability(Capability::SingleScan)
            .with_capability(Capability::StrictPacing)
    }

    async fn scan(&self, identifier: &str) -> nickscan_scanner::Result<ScanOutcome> {
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.calls
            .lock()
            .expect("calls lock")
            .push((identifier.to_string(), started, Instant::now()));

        if identifier == "y" {
            return Err(ScanError::transport(&name("gamma"), "connection reset"));
        }
        Ok(ScanOutcome::Found(payload(identifier)))
    }
}

fn context(max_concurrent: usize) -> Arc<ScanContext> {
    let mut scanning = ScanningConfig::default();
    scanning.parallel.max_concurrent = max_concurrent;
    Arc::new(ScanContext::new(reqwest::Client::new(), scanning))
}

async fn collect(
    orchestrator: SessionOrchestrator,
    batch: ScanBatch,
) -> (Vec<ScanEvent>, SessionSummary) {
    let mut handle = Arc::new(orchestrator).spawn(batch);
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    let summary = handle.finish().await.expect("session completes");
    (events, summary)
}

fn results_from<'a>(events: &'a [ScanEvent], source: &str) -> Vec<&'a str> {
    events
        .iter()
        .filter_map(|event| match event {
            ScanEvent::Result(envelope) if envelope.source_name.as_str() == source => {
                Some(envelope.identifier.as_str())
            }
            _ => None,
        })
        .collect()
}

fn tick_count(events: &[ScanEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, ScanEvent::Progress(_)))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_mixed_strategies_session() {
    let paced = Arc::new(PacedSource::default());
    let orchestrator = SessionOrchestrator::new(context(2))
        .with_adapter(Arc::new(BulkSource))
        .with_adapter(Arc::new(ParallelSource))
        .with_adapter(paced.clone());

    let (events, summary) = collect(orchestrator, ScanBatch::new(["x", "y", "z"])).await;

    // one bulk call plus (1 parallel + 1 sequential) x 3 identifiers
    assert_eq!(summary.expected_units, 7);
    assert_eq!(tick_count(&events), 7);
    assert_eq!(summary.completed_units, 7);

    assert_eq!(results_from(&events, "alpha"), vec!["x"]);
    assert_eq!(summary.bulk_item_errors, 1);

    let mut beta = results_from(&events, "beta");
    beta.sort_unstable();
    assert_eq!(beta, vec!["x", "y"]);

    let mut gamma = results_from(&events, "gamma");
    gamma.sort_unstable();
    assert_eq!(gamma, vec!["x", "z"]);

    // beta timing out on z and gamma failing on y
    assert_eq!(summary.failed_tasks, 2);
    assert_eq!(summary.results_emitted, 5);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_failure_keeps_pacing() {
    let paced = Arc::new(PacedSource::default());
    let orchestrator = SessionOrchestrator::new(context(2)).with_adapter(paced.clone());

    let (events, summary) = collect(orchestrator, ScanBatch::new(["x", "y", "z"])).await;

    assert_eq!(tick_count(&events), 3);
    assert_eq!(summary.failed_tasks, 1);

    let calls = paced.calls.lock().expect("calls lock").clone();
    let order: Vec<_> = calls.iter().map(|(id, _, _)| id.as_str()).collect();
    assert_eq!(order, vec!["x", "y", "z"]);

    let base_delay = ScanningConfig::default().sequential.base_delay();
    for pair in calls.windows(2) {
        assert!(pair[1].1 - pair[0].2 >= base_delay);
    }
}

#[tokio::test(start_paused = true)]
async fn test_parallel_timeout_is_isolated() {
    let orchestrator = SessionOrchestrator::new(context(2))
        .with_adapter(Arc::new(BulkSource))
        .with_adapter(Arc::new(ParallelSource));

    let (events, summary) = collect(orchestrator, ScanBatch::new(["x", "y", "z"])).await;

    assert_eq!(tick_count(&events), 4);
    assert!(!results_from(&events, "beta").contains(&"z"));
    assert_eq!(results_from(&events, "alpha"), vec!["x"]);
    assert_eq!(summary.failed_tasks, 1);
    // 20 s default task timeout, not the hour the source would hang for
    assert!(summary.elapsed < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_no_duplicate_envelopes_for_repeated_identifiers() {
    let orchestrator = SessionOrchestrator::new(context(4))
        .with_adapter(Arc::new(BulkSource))
        .with_adapter(Arc::new(ParallelSource));

    let (events, summary) = collect(orchestrator, ScanBatch::new(["x", "x", "y"])).await;

    let mut seen = HashSet::new();
    for event in &events {
        if let ScanEvent::Result(envelope) = event {
            assert!(
                seen.insert((envelope.identifier.clone(), envelope.source_name.clone())),
                "duplicate envelope for {} on {}",
                envelope.identifier,
                envelope.source_name
            );
        }
    }
    // ticks still count every (identifier, source) pair
    assert_eq!(summary.expected_units, 1 + 3);
    assert_eq!(tick_count(&events), 4);
}

#[tokio::test]
async fn test_empty_registry_emits_nothing() {
    let orchestrator = SessionOrchestrator::new(context(2));

    let (events, summary) = collect(orchestrator, ScanBatch::new(["x"])).await;

    assert!(events.is_empty());
    assert_eq!(summary.expected_units, 0);
}

#[tokio::test]
async fn test_strategy_table_mismatch_is_fatal() {
    let mut scanning = ScanningConfig::default();
    scanning.strategies = BTreeMap::from([("beta".to_string(), Strategy::Bulk)]);
    let context = Arc::new(ScanContext::new(reqwest::Client::new(), scanning));

    let orchestrator = SessionOrchestrator::new(context).with_adapter(Arc::new(ParallelSource));
    let mut handle = Arc::new(orchestrator).spawn(ScanBatch::new(["x"]));

    assert!(handle.next_event().await.is_none());
    assert!(matches!(handle.finish().await, Err(ScanError::Partition(_))));
}
