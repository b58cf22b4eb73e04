//! Text rendering for tool results.
//!
//! Structured results (aggregate reports, job reports) are rendered as
//! pretty JSON; listings are rendered as Markdown so agents can skim them.

use crate::models::{AggregateReport, Analyzer, Job, Responder, ResponderAction};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Message returned when no analyzer supports a data type.
pub fn generate_no_analyzers_message(data_type: &str) -> String {
    format!(
        "No analyzers found for data type '{}'. Use list_analyzers to see supported data types.",
        data_type
    )
}

/// Render an aggregate report as pretty JSON.
pub fn generate_aggregate_report(report: &AggregateReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize aggregate report")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JobReportView<'a> {
    job_id: &'a str,
    analyzer: &'a str,
    status: String,
    data_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
    taxonomies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
    #[serde(skip_serializing_if = "is_null")]
    report: &'a Value,
}

fn is_null(value: &&Value) -> bool {
    value.is_null()
}

/// Render a finished job and its report as pretty JSON.
pub fn generate_job_report(job: &Job) -> Result<String> {
    let report = job.report.as_ref();
    let view = JobReportView {
        job_id: &job.id,
        analyzer: if job.analyzer_name.is_empty() {
            &job.analyzer_id
        } else {
            &job.analyzer_name
        },
        status: job.status.to_string(),
        data_type: &job.data_type,
        data: job.data.as_deref(),
        duration_seconds: job.duration_seconds(),
        taxonomies: job.taxonomies().iter().map(|t| t.render()).collect(),
        error_message: report.and_then(|r| r.error_message.as_deref()),
        report: report.map(|r| &r.full).unwrap_or(&Value::Null),
    };

    serde_json::to_string_pretty(&view).context("Failed to serialize job report")
}

/// Render the status of a job without its report.
pub fn generate_job_status(job: &Job) -> String {
    let mut output = String::new();

    output.push_str(&format!("## Job {}\n\n", job.id));
    if !job.analyzer_name.is_empty() {
        output.push_str(&format!("- **Analyzer:** {}\n", job.analyzer_name));
    }
    output.push_str(&format!("- **Status:** {}\n", job.status));
    if let Some(ref data) = job.data {
        output.push_str(&format!("- **Observable:** {} `{}`\n", job.data_type, data));
    }
    if let Some(created) = job.created_at {
        output.push_str(&format!("- **Created:** {}\n", format_date(created)));
    }
    if let Some(ended) = job.end_date {
        output.push_str(&format!("- **Finished:** {}\n", format_date(ended)));
    }
    if let Some(duration) = job.duration_seconds() {
        output.push_str(&format!("- **Duration:** {:.1}s\n", duration));
    }

    output
}

/// Render the analyzer list.
pub fn generate_analyzer_list(analyzers: &[Analyzer], data_type: Option<&str>) -> String {
    if analyzers.is_empty() {
        return match data_type {
            Some(t) => generate_no_analyzers_message(t),
            None => "No analyzers are enabled in Cortex.".to_string(),
        };
    }

    let mut output = String::new();
    match data_type {
        Some(t) => output.push_str(&format!(
            "# Analyzers for '{}' ({})\n\n",
            t,
            analyzers.len()
        )),
        None => output.push_str(&format!("# Analyzers ({})\n\n", analyzers.len())),
    }

    for analyzer in analyzers {
        output.push_str(&format!("- **{}** (`{}`)", analyzer.name, analyzer.id));
        if !analyzer.data_type_list.is_empty() {
            output.push_str(&format!(" [{}]", analyzer.data_type_list.join(", ")));
        }
        output.push('\n');
        if !analyzer.description.is_empty() {
            output.push_str(&format!("  {}\n", analyzer.description));
        }
    }

    output
}

/// Render a single analyzer's details.
pub fn generate_analyzer_detail(analyzer: &Analyzer) -> String {
    let mut output = format!("## {}\n\n", analyzer.name);

    output.push_str(&format!("- **Id:** `{}`\n", analyzer.id));
    if !analyzer.version.is_empty() {
        output.push_str(&format!("- **Version:** {}\n", analyzer.version));
    }
    output.push_str(&format!(
        "- **Data types:** {}\n",
        analyzer.data_type_list.join(", ")
    ));
    if let Some(tlp) = analyzer.max_tlp {
        output.push_str(&format!("- **Max TLP:** {}\n", tlp));
    }
    if let Some(pap) = analyzer.max_pap {
        output.push_str(&format!("- **Max PAP:** {}\n", pap));
    }
    if !analyzer.description.is_empty() {
        output.push_str(&format!("\n{}\n", analyzer.description));
    }

    output
}

/// Render the responder list.
pub fn generate_responder_list(responders: &[Responder]) -> String {
    if responders.is_empty() {
        return "No responders are enabled in Cortex.".to_string();
    }

    let mut output = format!("# Responders ({})\n\n", responders.len());
    for responder in responders {
        output.push_str(&format!(
            "- **{}** (`{}`) [{}]\n",
            responder.name,
            responder.id,
            responder.data_type_list.join(", ")
        ));
        if !responder.description.is_empty() {
            output.push_str(&format!("  {}\n", responder.description));
        }
    }

    output
}

/// Render a launched responder action.
pub fn generate_responder_action(action: &ResponderAction) -> String {
    let mut output = format!("Responder action {} created.\n", action.id);
    if !action.responder_name.is_empty() {
        output.push_str(&format!("- Responder: {}\n", action.responder_name));
    }
    output.push_str(&format!("- Status: {}\n", action.status));
    if let Some(ref object_type) = action.object_type {
        output.push_str(&format!(
            "- Target: {} {}\n",
            object_type,
            action.object_id.as_deref().unwrap_or("")
        ));
    }
    output
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
