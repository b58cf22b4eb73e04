//! Cortex REST API access.
//!
//! [`CortexApi`] is the seam between the MCP layer / bulk orchestrator and
//! the HTTP client, so both can be exercised against an in-memory double.

pub mod client;
pub mod error;

pub use client::{ClientConfig, CortexClient};
pub use error::CortexError;

use crate::models::{Analyzer, Job, Observable, Responder, ResponderAction, ResponderRequest};
use async_trait::async_trait;
use std::time::Duration;

/// Operations the bridge needs from a Cortex instance.
#[async_trait]
pub trait CortexApi: Send + Sync {
    /// List every analyzer enabled in the organization.
    async fn list_analyzers(&self) -> Result<Vec<Analyzer>, CortexError>;

    async fn get_analyzer(&self, analyzer_id: &str) -> Result<Analyzer, CortexError>;

    /// Submit an observable; the returned job is usually still `Waiting`.
    async fn run_analyzer(
        &self,
        analyzer_id: &str,
        observable: &Observable,
    ) -> Result<Job, CortexError>;

    async fn get_job(&self, job_id: &str) -> Result<Job, CortexError>;

    /// Block until the job finishes or `timeout` elapses, returning the job
    /// with its report. A job still running at the deadline is an error.
    ///
    /// The HTTP client allows the server a short grace period past `timeout`
    /// to answer; a server that stalls beyond that yields
    /// [`CortexError::Timeout`] carrying the full transport bound.
    async fn wait_for_report(&self, job_id: &str, timeout: Duration) -> Result<Job, CortexError>;

    async fn list_responders(&self) -> Result<Vec<Responder>, CortexError>;

    async fn run_responder(
        &self,
        responder_id: &str,
        request: &ResponderRequest,
    ) -> Result<ResponderAction, CortexError>;
}

/// Find an analyzer by case-insensitive substring of its name.
///
/// When `data_type` is given, only analyzers supporting it are considered.
pub fn find_analyzer_by_name<'a>(
    analyzers: &'a [Analyzer],
    name: &str,
    data_type: Option<&str>,
) -> Option<&'a Analyzer> {
    let needle = name.to_lowercase();
    analyzers
        .iter()
        .filter(|a| data_type.map_or(true, |t| a.supports(t)))
        .find(|a| a.name.to_lowercase().contains(&needle))
}

/// Resolve an analyzer reference that may be an id or a name fragment.
pub fn resolve_analyzer<'a>(
    analyzers: &'a [Analyzer],
    reference: &str,
    data_type: Option<&str>,
) -> Option<&'a Analyzer> {
    analyzers
        .iter()
        .find(|a| a.id == reference)
        .or_else(|| find_analyzer_by_name(analyzers, reference, data_type))
}

/// Resolve a responder reference that may be an id or a name fragment.
pub fn resolve_responder<'a>(responders: &'a [Responder], reference: &str) -> Option<&'a Responder> {
    let needle = reference.to_lowercase();
    responders
        .iter()
        .find(|r| r.id == reference)
        .or_else(|| {
            responders
                .iter()
                .find(|r| r.name.to_lowercase().contains(&needle))
        })
}
