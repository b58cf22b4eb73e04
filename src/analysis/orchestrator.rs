//! Bulk analysis: run an observable through every applicable analyzer.
//!
//! The workflow resolves analyzers, submits to all of them concurrently,
//! waits for every submitted job concurrently, then aggregates. Per-analyzer
//! failures at either stage are recorded as data; only failing to list the
//! analyzers aborts the run.

use super::aggregator::{aggregate, generate_summary_text, partition_submissions};
use crate::cortex::{CortexApi, CortexError};
use crate::models::{AggregateReport, Analyzer, CompletionOutcome, Observable, SubmissionOutcome};
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a bulk run that reached a terminal state.
#[derive(Debug, Clone)]
pub enum BulkOutcome {
    /// No analyzer declares support for the data type; nothing was submitted.
    NoAnalyzers { data_type: String },
    Report(AggregateReport),
}

/// Runs the submit/collect/aggregate workflow against a Cortex instance.
pub struct BulkAnalyzer<'a, C: CortexApi + ?Sized> {
    client: &'a C,
}

impl<'a, C: CortexApi + ?Sized> BulkAnalyzer<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Analyzers whose declared data types contain `data_type` exactly.
    ///
    /// The list is fetched on every call so enable/disable changes in Cortex
    /// are picked up immediately.
    pub async fn applicable_analyzers(&self, data_type: &str) -> Result<Vec<Analyzer>, CortexError> {
        let analyzers = self.client.list_analyzers().await?;
        Ok(analyzers
            .into_iter()
            .filter(|a| a.supports(data_type))
            .collect())
    }

    /// Submit the observable to each analyzer concurrently.
    ///
    /// Returns one outcome per analyzer, in input order.
    pub async fn submit_all(
        &self,
        analyzers: &[Analyzer],
        observable: &Observable,
    ) -> Vec<SubmissionOutcome> {
        let submissions = analyzers.iter().map(|analyzer| async move {
            match self.client.run_analyzer(&analyzer.id, observable).await {
                Ok(job) => {
                    debug!("{} accepted job {}", analyzer.name, job.id);
                    SubmissionOutcome::Submitted {
                        analyzer: analyzer.name.clone(),
                        job_id: job.id,
                    }
                }
                Err(e) => {
                    warn!("Submission to {} failed: {}", analyzer.name, e);
                    SubmissionOutcome::Rejected {
                        analyzer: analyzer.name.clone(),
                        error: e.to_string(),
                    }
                }
            }
        });

        join_all(submissions).await
    }

    /// Wait for each submitted job concurrently, each bounded by `timeout`.
    ///
    /// Returns one outcome per `(analyzer, job_id)`, in input order.
    pub async fn collect_all(
        &self,
        submitted: &[(String, String)],
        timeout: Duration,
    ) -> Vec<CompletionOutcome> {
        let waits = submitted.iter().map(|(analyzer, job_id)| async move {
            match self.client.wait_for_report(job_id, timeout).await {
                Ok(job) => {
                    debug!("{} finished job {} with {}", analyzer, job_id, job.status);
                    CompletionOutcome::Completed {
                        analyzer: analyzer.clone(),
                        payload: job.into_payload(),
                    }
                }
                Err(e) => {
                    warn!("Collecting job {} from {} failed: {}", job_id, analyzer, e);
                    CompletionOutcome::Failed {
                        analyzer: analyzer.clone(),
                        error: format!("Failed to get report: {}", e),
                    }
                }
            }
        });

        join_all(waits).await
    }

    /// Run the whole workflow for one observable.
    pub async fn run(
        &self,
        observable: Observable,
        timeout: Duration,
    ) -> Result<BulkOutcome, CortexError> {
        let analyzers = self.applicable_analyzers(&observable.data_type).await?;

        if analyzers.is_empty() {
            info!("No analyzers support data type '{}'", observable.data_type);
            return Ok(BulkOutcome::NoAnalyzers {
                data_type: observable.data_type,
            });
        }

        info!(
            "Running {} analyzer(s) on {} '{}'",
            analyzers.len(),
            observable.data_type,
            observable.data
        );

        let submissions = self.submit_all(&analyzers, &observable).await;
        let (submitted, rejected) = partition_submissions(submissions);
        debug!(
            "{} submitted, {} rejected",
            submitted.len(),
            rejected.len()
        );

        let completions = self.collect_all(&submitted, timeout).await;
        let report = aggregate(observable, &completions, rejected);

        info!("{}", generate_summary_text(&report));
        Ok(BulkOutcome::Report(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaxonomyLevel;
    use crate::testing::{taxonomy, MockCortex};

    fn observable(data_type: &str, data: &str) -> Observable {
        Observable {
            data_type: data_type.to_string(),
            data: data.to_string(),
            tlp: 2,
            pap: 2,
        }
    }

    fn expect_report(outcome: BulkOutcome) -> AggregateReport {
        match outcome {
            BulkOutcome::Report(report) => report,
            BulkOutcome::NoAnalyzers { data_type } => {
                panic!("expected a report, got no analyzers for {}", data_type)
            }
        }
    }

    #[tokio::test]
    async fn test_all_analyzers_complete() {
        let cortex = MockCortex::new()
            .with_analyzer("a1", "AbuseIPDB_1_0", &["ip"])
            .with_analyzer("a2", "Shodan_Host_1_0", &["ip", "domain"])
            .with_analyzer("a3", "Urlscan_io_Scan_0_1_0", &["url"])
            .submits("a1", "j1")
            .submits("a2", "j2")
            .completes(
                "j1",
                vec![taxonomy(TaxonomyLevel::Malicious, "AbuseIPDB", "Records", "12")],
            )
            .completes(
                "j2",
                vec![taxonomy(TaxonomyLevel::Suspicious, "Shodan", "Ports", "3")],
            );

        let outcome = BulkAnalyzer::new(&cortex)
            .run(observable("ip", "1.2.3.4"), Duration::from_secs(60))
            .await
            .unwrap();
        let report = expect_report(outcome);

        assert_eq!(report.analyzers_run, 2);
        assert_eq!(report.analyzers_failed, 0);
        assert_eq!(report.summary.malicious, 1);
        assert_eq!(report.summary.suspicious, 1);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].analyzer, "AbuseIPDB_1_0");
        assert_eq!(
            report.results[0].taxonomies,
            vec!["[malicious] AbuseIPDB:Records = 12".to_string()]
        );
        assert!(report.submission_errors.is_empty());
        assert!(!cortex.calls().contains(&"run_analyzer:a3".to_string()));
    }

    #[tokio::test]
    async fn test_no_applicable_analyzers_short_circuits() {
        let cortex = MockCortex::new().with_analyzer("a1", "AbuseIPDB_1_0", &["ip"]);

        let outcome = BulkAnalyzer::new(&cortex)
            .run(observable("registry", "HKLM\\Run"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(outcome, BulkOutcome::NoAnalyzers { ref data_type } if data_type == "registry"));
        assert_eq!(cortex.calls(), vec!["list_analyzers".to_string()]);
    }

    #[tokio::test]
    async fn test_rate_limited_submission_reported_separately() {
        let cortex = MockCortex::new()
            .with_analyzer("a1", "AbuseIPDB_1_0", &["ip"])
            .with_analyzer("a2", "VirusTotal_GetReport_3_1", &["ip"])
            .submits("a1", "j1")
            .rate_limits("a2", "Analyzer rate limited")
            .completes(
                "j1",
                vec![taxonomy(TaxonomyLevel::Safe, "AbuseIPDB", "Records", "0")],
            );

        let report = expect_report(
            BulkAnalyzer::new(&cortex)
                .run(observable("ip", "8.8.8.8"), Duration::from_secs(60))
                .await
                .unwrap(),
        );

        assert_eq!(report.analyzers_run, 1);
        assert_eq!(report.analyzers_failed, 1);
        assert_eq!(report.submission_errors.len(), 1);
        assert_eq!(report.submission_errors[0].analyzer, "VirusTotal_GetReport_3_1");
        assert!(report.submission_errors[0]
            .error
            .contains("Analyzer rate limited"));
        assert_eq!(report.summary.safe, 1);
        assert_eq!(report.results.len(), 1);
        let waits = cortex
            .calls()
            .iter()
            .filter(|c| c.starts_with("wait_for_report:"))
            .count();
        assert_eq!(waits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_timeout_is_isolated() {
        let cortex = MockCortex::new()
            .with_analyzer("a1", "Slow_1_0", &["domain"])
            .with_analyzer("a2", "Fast_1_0", &["domain"])
            .submits("a1", "j1")
            .submits("a2", "j2")
            .completes_after(
                "j1",
                vec![taxonomy(TaxonomyLevel::Malicious, "Slow", "Hit", "1")],
                Duration::from_secs(120),
            )
            .completes(
                "j2",
                vec![taxonomy(TaxonomyLevel::Info, "Fast", "Seen", "yes")],
            );

        let report = expect_report(
            BulkAnalyzer::new(&cortex)
                .run(observable("domain", "example.org"), Duration::from_secs(30))
                .await
                .unwrap(),
        );

        assert_eq!(report.analyzers_run, 2);
        assert_eq!(report.results[0].analyzer, "Slow_1_0");
        assert_eq!(report.results[0].status, "Error");
        assert_eq!(report.results[0].taxonomies.len(), 1);
        assert!(report.results[0].taxonomies[0].contains("did not complete within 30s"));
        assert_eq!(report.summary.malicious, 0);
        assert_eq!(report.results[1].status, "Success");
        assert_eq!(report.summary.info, 1);
    }

    #[tokio::test]
    async fn test_directory_failure_is_fatal() {
        let cortex = MockCortex::new()
            .with_analyzer("a1", "AbuseIPDB_1_0", &["ip"])
            .unreachable();

        let result = BulkAnalyzer::new(&cortex)
            .run(observable("ip", "1.2.3.4"), Duration::from_secs(60))
            .await;

        assert!(matches!(result, Err(CortexError::Connection { .. })));
        assert_eq!(cortex.calls(), vec!["list_analyzers".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_run_concurrently_and_keep_order() {
        let cortex = MockCortex::new()
            .with_analyzer("a1", "First", &["hash"])
            .with_analyzer("a2", "Second", &["hash"])
            .with_analyzer("a3", "Third", &["hash"])
            .submits("a1", "j1")
            .submits("a2", "j2")
            .submits("a3", "j3")
            .completes_after("j1", Vec::new(), Duration::from_secs(3))
            .completes_after("j2", Vec::new(), Duration::from_secs(1))
            .completes_after("j3", Vec::new(), Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        let report = expect_report(
            BulkAnalyzer::new(&cortex)
                .run(observable("hash", "d41d8cd98f00b204e9800998ecf8427e"), Duration::from_secs(10))
                .await
                .unwrap(),
        );

        assert!(start.elapsed() < Duration::from_secs(4));
        let names: Vec<_> = report.results.iter().map(|r| r.analyzer.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submissions_run_concurrently_and_keep_order() {
        let cortex = MockCortex::new()
            .with_analyzer("a1", "First", &["ip"])
            .with_analyzer("a2", "Second", &["ip"])
            .with_analyzer("a3", "Third", &["ip"])
            .submits_after("a1", "j1", Duration::from_secs(3))
            .rejects_after("a2", "analyzer disabled", Duration::from_secs(1))
            .submits_after("a3", "j3", Duration::from_secs(2));

        let analyzer = BulkAnalyzer::new(&cortex);
        let analyzers = analyzer.applicable_analyzers("ip").await.unwrap();

        let start = tokio::time::Instant::now();
        let submissions = analyzer
            .submit_all(&analyzers, &observable("ip", "10.0.0.2"))
            .await;

        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(
            submissions,
            vec![
                SubmissionOutcome::Submitted {
                    analyzer: "First".to_string(),
                    job_id: "j1".to_string(),
                },
                SubmissionOutcome::Rejected {
                    analyzer: "Second".to_string(),
                    error: "Cortex API error 500: analyzer disabled".to_string(),
                },
                SubmissionOutcome::Submitted {
                    analyzer: "Third".to_string(),
                    job_id: "j3".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_partitions_cover_every_analyzer() {
        let cortex = MockCortex::new()
            .with_analyzer("a1", "One", &["ip"])
            .with_analyzer("a2", "Two", &["ip"])
            .with_analyzer("a3", "Three", &["ip"])
            .with_analyzer("a4", "Four", &["ip"])
            .submits("a1", "j1")
            .rejects("a2", "analyzer disabled")
            .submits("a3", "j3")
            .submits("a4", "j4")
            .completes(
                "j1",
                vec![
                    taxonomy(TaxonomyLevel::Malicious, "One", "A", "1"),
                    taxonomy(TaxonomyLevel::Malicious, "One", "B", "2"),
                ],
            )
            .collection_fails("j3", "connection reset")
            .finishes_with_failure("j4");

        let analyzer = BulkAnalyzer::new(&cortex);
        let analyzers = analyzer.applicable_analyzers("ip").await.unwrap();
        let obs = observable("ip", "10.0.0.1");

        let submissions = analyzer.submit_all(&analyzers, &obs).await;
        assert_eq!(submissions.len(), analyzers.len());

        let (submitted, rejected) = partition_submissions(submissions);
        assert_eq!(submitted.len() + rejected.len(), 4);

        let completions = analyzer.collect_all(&submitted, Duration::from_secs(5)).await;
        assert_eq!(completions.len(), submitted.len());

        let report = aggregate(obs, &completions, rejected);
        assert_eq!(report.analyzers_run, 3);
        assert_eq!(report.analyzers_failed, 1);
        assert_eq!(report.summary.malicious, 2);
        assert_eq!(report.summary.total(), 2);

        let statuses: Vec<_> = report.results.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["Success", "Error", "Failure"]);
        assert!(report.results[1].taxonomies[0].contains("connection reset"));
        assert!(report.results[2].taxonomies.is_empty());
    }
}
