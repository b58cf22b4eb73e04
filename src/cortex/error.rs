use thiserror::Error;

/// Errors returned by calls to the Cortex API.
#[derive(Error, Debug)]
pub enum CortexError {
    #[error("Cannot connect to Cortex at {endpoint}")]
    Connection { endpoint: String },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Job {job_id} did not complete within {seconds}s (status: {status})")]
    JobTimeout {
        job_id: String,
        seconds: u64,
        status: String,
    },

    #[error("Cortex rejected credentials ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited by Cortex: {0}")]
    RateLimited(String),

    #[error("Cortex API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from Cortex: {0}")]
    InvalidResponse(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CortexError {
    /// Map a non-success HTTP status and body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body);
        match status {
            401 | 403 => CortexError::Unauthorized { status, message },
            404 => CortexError::NotFound(message),
            429 => CortexError::RateLimited(message),
            _ => CortexError::Api { status, message },
        }
    }
}

/// Cortex error bodies look like `{"type": "...", "message": "..."}`.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
