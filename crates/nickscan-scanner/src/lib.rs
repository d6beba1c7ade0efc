//! Nickscan Scanner - Multi-strategy scan orchestration.
//!
//! This crate fans a batch of usernames out to a set of independently-behaving
//! sources. Each source declares what it can do and is routed to one of three
//! processors:
//!
//! - **Bulk**: one call carrying the whole batch
//! - **Parallel**: one call per identifier, with a processor-wide concurrency cap
//! - **Sequential**: a single paced worker with rate-limit backoff
//!
//! The three processors run concurrently. Per-task failures are contained and
//! logged; every unit of work reports exactly one progress tick, and found
//! profiles are streamed back over a bounded channel as they arrive.
//!
//! # Example
//!
//! ```rust,ignore
//! use nickscan_scanner::{ScanBatch, ScanContext, ScanEvent, SessionOrchestrator};
//! use std::sync::Arc;
//!
//! let context = Arc::new(ScanContext::from_config(&config)?);
//! let orchestrator = Arc::new(
//!     SessionOrchestrator::new(context)
//!         .with_adapter(github)
//!         .with_adapter(vk),
//! );
//!
//! let mut handle = orchestrator.spawn(ScanBatch::new(["alice", "bob"]));
//! while let Some(event) = handle.next_event().await {
//!     if let ScanEvent::Result(envelope) = event {
//!         println!("{} on {}", envelope.identifier, envelope.source_name);
//!     }
//! }
//! let summary = handle.finish().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod classifier;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod processor;
pub mod rate_limit;
pub mod sink;
pub mod types;

// Re-export commonly used types
pub use adapter::{
    AdapterDescriptor, BulkResults, Capability, Payload, RegisteredAdapter, ScanOutcome,
    SourceAdapter,
};
pub use classifier::{Partition, StrategyClassifier};
pub use context::ScanContext;
pub use error::{Result, ScanError};
pub use orchestrator::{ScanHandle, SessionOrchestrator, SessionSummary};
pub use processor::{
    BulkProcessor, ParallelProcessor, ProcessorReport, SequentialProcessor, WorkerState,
};
pub use rate_limit::{RateLimitPermit, RateLimiter, RateLimiterRegistry};
pub use sink::ScanSink;
pub use types::{ProgressUpdate, ResultEnvelope, ScanBatch, ScanEvent};
