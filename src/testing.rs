//! In-memory [`CortexApi`] double shared by unit tests.

use crate::cortex::{CortexApi, CortexError};
use crate::models::{
    Analyzer, Job, JobReport, JobStatus, Observable, ReportSummary, Responder, ResponderAction,
    ResponderRequest, Taxonomy, TaxonomyLevel,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Failure {
    RateLimited(String),
    Api(String),
    Unreachable,
}

impl Failure {
    fn into_error(self) -> CortexError {
        match self {
            Failure::RateLimited(m) => CortexError::RateLimited(m),
            Failure::Api(message) => CortexError::Api {
                status: 500,
                message,
            },
            Failure::Unreachable => CortexError::Connection {
                endpoint: "http://cortex.test/api".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Completion {
    Report { job: Job, delay: Duration },
    Fails(Failure),
}

#[derive(Default)]
pub struct MockCortex {
    analyzers: Vec<Analyzer>,
    responders: Vec<Responder>,
    listing_fails: bool,
    submissions: HashMap<String, Result<String, Failure>>,
    submission_delays: HashMap<String, Duration>,
    completions: HashMap<String, Completion>,
    calls: Mutex<Vec<String>>,
}

pub fn taxonomy(level: TaxonomyLevel, namespace: &str, predicate: &str, value: &str) -> Taxonomy {
    Taxonomy {
        level,
        namespace: namespace.to_string(),
        predicate: predicate.to_string(),
        value: value.to_string(),
    }
}

impl MockCortex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analyzer(mut self, id: &str, name: &str, types: &[&str]) -> Self {
        self.analyzers.push(Analyzer {
            id: id.to_string(),
            name: name.to_string(),
            version: "1.0".to_string(),
            description: format!("{} analyzer", name),
            data_type_list: types.iter().map(|t| t.to_string()).collect(),
            max_tlp: Some(3),
            max_pap: Some(3),
        });
        self
    }

    pub fn with_responder(mut self, id: &str, name: &str, types: &[&str]) -> Self {
        self.responders.push(Responder {
            id: id.to_string(),
            name: name.to_string(),
            version: "1.0".to_string(),
            description: String::new(),
            data_type_list: types.iter().map(|t| t.to_string()).collect(),
            max_tlp: None,
            max_pap: None,
        });
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    pub fn submits(mut self, analyzer_id: &str, job_id: &str) -> Self {
        self.submissions
            .insert(analyzer_id.to_string(), Ok(job_id.to_string()));
        self
    }

    pub fn submits_after(mut self, analyzer_id: &str, job_id: &str, delay: Duration) -> Self {
        self.submission_delays.insert(analyzer_id.to_string(), delay);
        self.submits(analyzer_id, job_id)
    }

    pub fn rejects_after(mut self, analyzer_id: &str, message: &str, delay: Duration) -> Self {
        self.submission_delays.insert(analyzer_id.to_string(), delay);
        self.rejects(analyzer_id, message)
    }

    pub fn rate_limits(mut self, analyzer_id: &str, message: &str) -> Self {
        self.submissions.insert(
            analyzer_id.to_string(),
            Err(Failure::RateLimited(message.to_string())),
        );
        self
    }

    pub fn rejects(mut self, analyzer_id: &str, message: &str) -> Self {
        self.submissions.insert(
            analyzer_id.to_string(),
            Err(Failure::Api(message.to_string())),
        );
        self
    }

    pub fn completes(self, job_id: &str, findings: Vec<Taxonomy>) -> Self {
        self.completes_after(job_id, findings, Duration::ZERO)
    }

    pub fn completes_after(mut self, job_id: &str, findings: Vec<Taxonomy>, delay: Duration) -> Self {
        let job = finished_job(job_id, JobStatus::Success, findings);
        self.completions
            .insert(job_id.to_string(), Completion::Report { job, delay });
        self
    }

    pub fn finishes_with_failure(mut self, job_id: &str) -> Self {
        let job = finished_job(job_id, JobStatus::Failure, Vec::new());
        self.completions.insert(
            job_id.to_string(),
            Completion::Report {
                job,
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn collection_fails(mut self, job_id: &str, message: &str) -> Self {
        self.completions.insert(
            job_id.to_string(),
            Completion::Fails(Failure::Api(message.to_string())),
        );
        self
    }

    /// Every call made so far, as `method:argument`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn find_job(&self, job_id: &str) -> Result<Job, CortexError> {
        match self.completions.get(job_id) {
            Some(Completion::Report { job, .. }) => Ok(job.clone()),
            _ => Err(CortexError::NotFound(format!("job {}", job_id))),
        }
    }
}

fn finished_job(job_id: &str, status: JobStatus, findings: Vec<Taxonomy>) -> Job {
    Job {
        id: job_id.to_string(),
        analyzer_id: String::new(),
        analyzer_name: String::new(),
        status,
        data_type: "ip".to_string(),
        data: Some("1.2.3.4".to_string()),
        tlp: Some(2),
        pap: Some(2),
        created_at: None,
        start_date: None,
        end_date: None,
        report: Some(JobReport {
            success: status == JobStatus::Success,
            summary: ReportSummary {
                taxonomies: findings,
            },
            full: json!({"raw": true}),
            error_message: None,
        }),
    }
}

#[async_trait]
impl CortexApi for MockCortex {
    async fn list_analyzers(&self) -> Result<Vec<Analyzer>, CortexError> {
        self.record("list_analyzers".to_string());
        if self.listing_fails {
            return Err(Failure::Unreachable.into_error());
        }
        Ok(self.analyzers.clone())
    }

    async fn get_analyzer(&self, analyzer_id: &str) -> Result<Analyzer, CortexError> {
        self.record(format!("get_analyzer:{}", analyzer_id));
        self.analyzers
            .iter()
            .find(|a| a.id == analyzer_id)
            .cloned()
            .ok_or_else(|| CortexError::NotFound(format!("analyzer {}", analyzer_id)))
    }

    async fn run_analyzer(
        &self,
        analyzer_id: &str,
        observable: &Observable,
    ) -> Result<Job, CortexError> {
        self.record(format!("run_analyzer:{}", analyzer_id));
        if let Some(delay) = self.submission_delays.get(analyzer_id) {
            tokio::time::sleep(*delay).await;
        }
        match self.submissions.get(analyzer_id) {
            Some(Ok(job_id)) => Ok(Job {
                id: job_id.clone(),
                analyzer_id: analyzer_id.to_string(),
                analyzer_name: String::new(),
                status: JobStatus::Waiting,
                data_type: observable.data_type.clone(),
                data: Some(observable.data.clone()),
                tlp: Some(observable.tlp),
                pap: Some(observable.pap),
                created_at: None,
                start_date: None,
                end_date: None,
                report: None,
            }),
            Some(Err(failure)) => Err(failure.clone().into_error()),
            None => Err(CortexError::NotFound(format!("analyzer {}", analyzer_id))),
        }
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, CortexError> {
        self.record(format!("get_job:{}", job_id));
        self.find_job(job_id)
    }

    async fn wait_for_report(&self, job_id: &str, timeout: Duration) -> Result<Job, CortexError> {
        self.record(format!("wait_for_report:{}", job_id));
        match self.completions.get(job_id) {
            Some(Completion::Report { job, delay }) => {
                if *delay > timeout {
                    tokio::time::sleep(timeout).await;
                    return Err(CortexError::JobTimeout {
                        job_id: job_id.to_string(),
                        seconds: timeout.as_secs(),
                        status: JobStatus::InProgress.to_string(),
                    });
                }
                tokio::time::sleep(*delay).await;
                Ok(job.clone())
            }
            Some(Completion::Fails(failure)) => Err(failure.clone().into_error()),
            None => Err(CortexError::NotFound(format!("job {}", job_id))),
        }
    }

    async fn list_responders(&self) -> Result<Vec<Responder>, CortexError> {
        self.record("list_responders".to_string());
        if self.listing_fails {
            return Err(Failure::Unreachable.into_error());
        }
        Ok(self.responders.clone())
    }

    async fn run_responder(
        &self,
        responder_id: &str,
        request: &ResponderRequest,
    ) -> Result<ResponderAction, CortexError> {
        self.record(format!("run_responder:{}", responder_id));
        Ok(ResponderAction {
            id: format!("action-{}", responder_id),
            responder_id: responder_id.to_string(),
            responder_name: request.label.clone(),
            status: JobStatus::Waiting,
            object_type: Some(request.data_type.clone()),
            object_id: request
                .data
                .get("id")
                .and_then(|v| v.as_str())
                .map(String::from),
            message: request.message.clone(),
        })
    }
}
