//! Analysis modules.
//!
//! The orchestrator fans an observable out to every applicable analyzer;
//! the aggregator folds the outcomes into a report.

pub mod aggregator;
pub mod orchestrator;

pub use orchestrator::{BulkAnalyzer, BulkOutcome};
