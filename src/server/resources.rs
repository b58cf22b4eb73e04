//! Read-only MCP resources backed by Cortex listings and jobs.

use super::protocol::RpcError;
use crate::cortex::CortexApi;
use crate::report;
use serde_json::{json, Value};

pub const ANALYZERS_URI: &str = "cortex://analyzers";
pub const RESPONDERS_URI: &str = "cortex://responders";
pub const ANALYZER_URI_PREFIX: &str = "cortex://analyzers/";
pub const JOB_URI_PREFIX: &str = "cortex://jobs/";

pub fn list_resources() -> Value {
    json!({
        "resources": [
            {
                "uri": ANALYZERS_URI,
                "name": "Enabled analyzers",
                "description": "Every analyzer enabled in the Cortex organization",
                "mimeType": "text/markdown"
            },
            {
                "uri": RESPONDERS_URI,
                "name": "Enabled responders",
                "description": "Every responder enabled in the Cortex organization",
                "mimeType": "text/markdown"
            }
        ]
    })
}

pub fn list_resource_templates() -> Value {
    json!({
        "resourceTemplates": [
            {
                "uriTemplate": format!("{}{{analyzer_id}}", ANALYZER_URI_PREFIX),
                "name": "Cortex analyzer",
                "description": "Details of one analyzer: supported data types and TLP/PAP limits",
                "mimeType": "text/markdown"
            },
            {
                "uriTemplate": format!("{}{{job_id}}", JOB_URI_PREFIX),
                "name": "Cortex job",
                "description": "Status of a Cortex job and, once finished, its report",
                "mimeType": "application/json"
            }
        ]
    })
}

/// Resolve `resources/read` for `uri`.
pub async fn read_resource<C: CortexApi + ?Sized>(client: &C, uri: &str) -> Result<Value, RpcError> {
    let (mime_type, text) = if uri == ANALYZERS_URI {
        let analyzers = client
            .list_analyzers()
            .await
            .map_err(|e| RpcError::internal(e.to_string()))?;
        ("text/markdown", report::generate_analyzer_list(&analyzers, None))
    } else if uri == RESPONDERS_URI {
        let responders = client
            .list_responders()
            .await
            .map_err(|e| RpcError::internal(e.to_string()))?;
        ("text/markdown", report::generate_responder_list(&responders))
    } else if let Some(analyzer_id) = non_empty_suffix(uri, ANALYZER_URI_PREFIX) {
        let analyzer = client
            .get_analyzer(analyzer_id)
            .await
            .map_err(|e| RpcError::internal(e.to_string()))?;
        ("text/markdown", report::generate_analyzer_detail(&analyzer))
    } else if let Some(job_id) = non_empty_suffix(uri, JOB_URI_PREFIX) {
        let job = client
            .get_job(job_id)
            .await
            .map_err(|e| RpcError::internal(e.to_string()))?;
        let text =
            report::generate_job_report(&job).map_err(|e| RpcError::internal(e.to_string()))?;
        ("application/json", text)
    } else {
        return Err(RpcError::invalid_params(format!("Unknown resource: {}", uri)));
    };

    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": mime_type,
            "text": text
        }]
    }))
}

fn non_empty_suffix<'a>(uri: &'a str, prefix: &str) -> Option<&'a str> {
    uri.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}
