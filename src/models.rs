//! Data models for the Cortex bridge.
//!
//! This module contains the Cortex API resources (analyzers, responders,
//! jobs and their reports) as well as the outcome and report types produced
//! by the bulk analysis workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Level attached to a taxonomy entry in an analyzer report.
///
/// The levels are independent categories with no ordering between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyLevel {
    Info,
    Safe,
    Suspicious,
    Malicious,
}

impl TaxonomyLevel {
    /// All levels, in the order they are reported in summaries.
    pub const ALL: [TaxonomyLevel; 4] = [
        TaxonomyLevel::Info,
        TaxonomyLevel::Safe,
        TaxonomyLevel::Suspicious,
        TaxonomyLevel::Malicious,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyLevel::Info => "info",
            TaxonomyLevel::Safe => "safe",
            TaxonomyLevel::Suspicious => "suspicious",
            TaxonomyLevel::Malicious => "malicious",
        }
    }
}

impl fmt::Display for TaxonomyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single categorized judgment emitted by an analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    pub level: TaxonomyLevel,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub predicate: String,
    /// Cortex analyzers emit both strings and numbers here.
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub value: String,
}

impl Taxonomy {
    /// Render as `[level] namespace:predicate = value`.
    pub fn render(&self) -> String {
        format!(
            "[{}] {}:{} = {}",
            self.level, self.namespace, self.predicate, self.value
        )
    }
}

fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A Cortex analyzer: the capability descriptor used by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analyzer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Data types this analyzer accepts (e.g. `ip`, `domain`, `hash`).
    #[serde(default)]
    pub data_type_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tlp: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pap: Option<u8>,
}

impl Analyzer {
    /// Exact membership test against the declared data types.
    pub fn supports(&self, data_type: &str) -> bool {
        self.data_type_list.iter().any(|t| t == data_type)
    }
}

/// A Cortex responder (active response unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Responder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_type_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tlp: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pap: Option<u8>,
}

impl Responder {
    pub fn supports(&self, data_type: &str) -> bool {
        self.data_type_list.iter().any(|t| t == data_type)
    }
}

/// The value under analysis together with its type and classification.
///
/// Serializes to the body Cortex expects for `POST /analyzer/{id}/run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observable {
    pub data_type: String,
    pub data: String,
    /// Traffic Light Protocol level (0-3).
    pub tlp: u8,
    /// Permissible Actions Protocol level (0-3).
    pub pap: u8,
}

/// Lifecycle status of a Cortex job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Waiting,
    InProgress,
    Success,
    Failure,
    Deleted,
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Waiting | JobStatus::InProgress)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Waiting => write!(f, "Waiting"),
            JobStatus::InProgress => write!(f, "InProgress"),
            JobStatus::Success => write!(f, "Success"),
            JobStatus::Failure => write!(f, "Failure"),
            JobStatus::Deleted => write!(f, "Deleted"),
        }
    }
}

/// A Cortex job, optionally carrying its report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub analyzer_id: String,
    #[serde(default)]
    pub analyzer_name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub data_type: String,
    /// Absent for file observables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tlp: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pap: Option<u8>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<JobReport>,
}

impl Job {
    /// Taxonomies from the report summary, empty when there is no report.
    pub fn taxonomies(&self) -> &[Taxonomy] {
        self.report
            .as_ref()
            .map(|r| r.summary.taxonomies.as_slice())
            .unwrap_or(&[])
    }

    /// Wall-clock duration of the job, when both ends are known.
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    pub fn into_payload(self) -> ResultPayload {
        let findings = self.taxonomies().to_vec();
        ResultPayload {
            status: self.status,
            findings,
        }
    }
}

/// Report attached to a finished job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub summary: ReportSummary,
    /// Analyzer-specific full report.
    #[serde(default)]
    pub full: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    #[serde(default)]
    pub taxonomies: Vec<Taxonomy>,
}

/// Body of `POST /responder/{id}/run`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderRequest {
    pub responder_id: String,
    pub label: String,
    /// Object type the responder acts on, e.g. `thehive:case`.
    pub data_type: String,
    pub data: Value,
    pub tlp: u8,
    pub pap: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub parameters: Value,
}

/// An action created by running a responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderAction {
    pub id: String,
    #[serde(default)]
    pub responder_id: String,
    #[serde(default)]
    pub responder_name: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of submitting an observable to one analyzer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Submitted { analyzer: String, job_id: String },
    Rejected { analyzer: String, error: String },
}

/// Status and findings of a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPayload {
    pub status: JobStatus,
    pub findings: Vec<Taxonomy>,
}

/// Outcome of waiting for one submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed {
        analyzer: String,
        payload: ResultPayload,
    },
    Failed {
        analyzer: String,
        error: String,
    },
}

/// Per-level taxonomy counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomySummary {
    pub info: usize,
    pub safe: usize,
    pub suspicious: usize,
    pub malicious: usize,
}

impl TaxonomySummary {
    pub fn record(&mut self, level: TaxonomyLevel) {
        match level {
            TaxonomyLevel::Info => self.info += 1,
            TaxonomyLevel::Safe => self.safe += 1,
            TaxonomyLevel::Suspicious => self.suspicious += 1,
            TaxonomyLevel::Malicious => self.malicious += 1,
        }
    }

    pub fn count(&self, level: TaxonomyLevel) -> usize {
        match level {
            TaxonomyLevel::Info => self.info,
            TaxonomyLevel::Safe => self.safe,
            TaxonomyLevel::Suspicious => self.suspicious,
            TaxonomyLevel::Malicious => self.malicious,
        }
    }

    pub fn total(&self) -> usize {
        self.info + self.safe + self.suspicious + self.malicious
    }
}

/// Per-analyzer entry of an aggregate report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub analyzer: String,
    /// Job status, or `Error` when the job could not be collected.
    pub status: String,
    pub taxonomies: Vec<String>,
}

/// An analyzer that rejected the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionError {
    pub analyzer: String,
    pub error: String,
}

/// Combined result of running every applicable analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub observable: Observable,
    pub analyzers_run: usize,
    pub analyzers_failed: usize,
    pub summary: TaxonomySummary,
    pub results: Vec<AnalyzerResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub submission_errors: Vec<SubmissionError>,
}
