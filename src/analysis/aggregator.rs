//! Result aggregation and statistics.
//!
//! This module folds per-analyzer outcomes into an [`AggregateReport`].
//! Everything here is pure and order-preserving.

use crate::models::{
    AggregateReport, AnalyzerResult, CompletionOutcome, Observable, SubmissionError,
    SubmissionOutcome, TaxonomyLevel, TaxonomySummary,
};

/// Status reported for jobs that were submitted but could not be collected.
pub const ERROR_STATUS: &str = "Error";

/// Split submission outcomes into submitted `(analyzer, job_id)` pairs and
/// rejections, preserving order within each list.
pub fn partition_submissions(
    outcomes: Vec<SubmissionOutcome>,
) -> (Vec<(String, String)>, Vec<SubmissionError>) {
    let mut submitted = Vec::new();
    let mut rejected = Vec::new();

    for outcome in outcomes {
        match outcome {
            SubmissionOutcome::Submitted { analyzer, job_id } => submitted.push((analyzer, job_id)),
            SubmissionOutcome::Rejected { analyzer, error } => {
                rejected.push(SubmissionError { analyzer, error })
            }
        }
    }

    (submitted, rejected)
}

/// Build the per-analyzer result entry for one completion outcome.
pub fn summarize_outcome(outcome: &CompletionOutcome) -> AnalyzerResult {
    match outcome {
        CompletionOutcome::Completed { analyzer, payload } => AnalyzerResult {
            analyzer: analyzer.clone(),
            status: payload.status.to_string(),
            taxonomies: payload.findings.iter().map(|t| t.render()).collect(),
        },
        CompletionOutcome::Failed { analyzer, error } => AnalyzerResult {
            analyzer: analyzer.clone(),
            status: ERROR_STATUS.to_string(),
            taxonomies: vec![error.clone()],
        },
    }
}

/// Count taxonomy levels across completed outcomes. Failures count nothing.
pub fn tally_levels(outcomes: &[CompletionOutcome]) -> TaxonomySummary {
    let mut summary = TaxonomySummary::default();

    for outcome in outcomes {
        if let CompletionOutcome::Completed { payload, .. } = outcome {
            for finding in &payload.findings {
                summary.record(finding.level);
            }
        }
    }

    summary
}

/// Assemble the final report.
///
/// `completions` must hold exactly one entry per submitted job.
pub fn aggregate(
    observable: Observable,
    completions: &[CompletionOutcome],
    rejected: Vec<SubmissionError>,
) -> AggregateReport {
    AggregateReport {
        observable,
        analyzers_run: completions.len(),
        analyzers_failed: rejected.len(),
        summary: tally_levels(completions),
        results: completions.iter().map(summarize_outcome).collect(),
        submission_errors: rejected,
    }
}

/// Generate a short text summary of an aggregate report.
pub fn generate_summary_text(report: &AggregateReport) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "{} '{}': {} analyzer(s) run, {} failed to submit",
        report.observable.data_type,
        report.observable.data,
        report.analyzers_run,
        report.analyzers_failed
    ));
    let levels: Vec<String> = TaxonomyLevel::ALL
        .iter()
        .map(|level| format!("{}: {}", level, report.summary.count(*level)))
        .collect();
    lines.push(format!(
        "- {} taxonomies ({})",
        report.summary.total(),
        levels.join(" | ")
    ));

    let errored = report
        .results
        .iter()
        .filter(|r| r.status == ERROR_STATUS)
        .count();
    if errored > 0 {
        lines.push(format!("- {} job(s) did not complete", errored));
    }

    lines.join("\n")
}
