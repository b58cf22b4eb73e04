//! HTTP client for the Cortex REST API.

use super::{CortexApi, CortexError};
use crate::models::{Analyzer, Job, Observable, Responder, ResponderAction, ResponderRequest};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Extra transport time allowed on top of a `waitreport` deadline, so the
/// server-side `atMost` expires before the HTTP request does.
const WAIT_GRACE: Duration = Duration::from_secs(10);

/// Connection settings for [`CortexClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base API URL, e.g. `http://localhost:9001/api`.
    pub endpoint: String,
    pub api_key: String,
    /// Timeout applied to every call except report waits.
    pub request_timeout_seconds: u64,
    pub accept_invalid_certs: bool,
}

/// Cortex API client authenticated with a static bearer key.
///
/// Cheap to share: the inner `reqwest::Client` is reference counted and the
/// configuration is never mutated after construction.
#[derive(Debug, Clone)]
pub struct CortexClient {
    config: ClientConfig,
    http_client: reqwest::Client,
    wait_grace: Duration,
}

impl CortexClient {
    pub fn new(config: ClientConfig) -> Result<Self, CortexError> {
        info!("Initializing Cortex client for {}", config.endpoint);

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| CortexError::Config("API key contains invalid characters".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            config,
            http_client,
            wait_grace: WAIT_GRACE,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn map_send_error(&self, e: reqwest::Error, timeout_seconds: u64) -> CortexError {
        if e.is_timeout() {
            CortexError::Timeout {
                seconds: timeout_seconds,
            }
        } else if e.is_connect() {
            CortexError::Connection {
                endpoint: self.config.endpoint.clone(),
            }
        } else {
            CortexError::Http(e)
        }
    }

    /// Send a request and decode a JSON body, mapping HTTP failures.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        timeout_seconds: u64,
    ) -> Result<T, CortexError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(e, timeout_seconds))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CortexError::from_status(status.as_u16(), &body));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                CortexError::Timeout {
                    seconds: timeout_seconds,
                }
            } else {
                CortexError::InvalidResponse(e.to_string())
            }
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CortexError> {
        debug!("GET {}", path);
        let request = self.http_client.get(self.url(path));
        self.send(request, self.config.request_timeout_seconds).await
    }
}

#[async_trait]
impl CortexApi for CortexClient {
    async fn list_analyzers(&self) -> Result<Vec<Analyzer>, CortexError> {
        self.get("analyzer?range=all").await
    }

    async fn get_analyzer(&self, analyzer_id: &str) -> Result<Analyzer, CortexError> {
        self.get(&format!("analyzer/{}", analyzer_id)).await
    }

    async fn run_analyzer(
        &self,
        analyzer_id: &str,
        observable: &Observable,
    ) -> Result<Job, CortexError> {
        debug!(
            "Submitting {} '{}' to analyzer {}",
            observable.data_type, observable.data, analyzer_id
        );
        let request = self
            .http_client
            .post(self.url(&format!("analyzer/{}/run", analyzer_id)))
            .json(observable);
        self.send(request, self.config.request_timeout_seconds).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, CortexError> {
        self.get(&format!("job/{}", job_id)).await
    }

    async fn wait_for_report(&self, job_id: &str, timeout: Duration) -> Result<Job, CortexError> {
        let seconds = timeout.as_secs().max(1);
        debug!("Waiting up to {}s for job {}", seconds, job_id);

        let transport_bound = Duration::from_secs(seconds) + self.wait_grace;
        let request = self
            .http_client
            .get(self.url(&format!("job/{}/waitreport?atMost={}seconds", job_id, seconds)))
            .timeout(transport_bound);
        let job: Job = self.send(request, transport_bound.as_secs()).await?;

        if !job.status.is_finished() {
            return Err(CortexError::JobTimeout {
                job_id: job_id.to_string(),
                seconds,
                status: job.status.to_string(),
            });
        }

        Ok(job)
    }

    async fn list_responders(&self) -> Result<Vec<Responder>, CortexError> {
        self.get("responder?range=all").await
    }

    async fn run_responder(
        &self,
        responder_id: &str,
        request: &ResponderRequest,
    ) -> Result<ResponderAction, CortexError> {
        debug!("Running responder {} on {}", responder_id, request.data_type);
        let builder = self
            .http_client
            .post(self.url(&format!("responder/{}/run", responder_id)))
            .json(request);
        self.send(builder, self.config.request_timeout_seconds).await
    }
}
