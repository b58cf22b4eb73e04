//! Tool definitions and execution for the MCP server.
//!
//! This module defines the tools an agent can call and maps each call onto
//! the Cortex API.

use super::protocol::text_content;
use crate::analysis::{BulkAnalyzer, BulkOutcome};
use crate::config::{AnalysisConfig, MAX_ANALYSIS_TIMEOUT, MAX_LEVEL, MIN_ANALYSIS_TIMEOUT};
use crate::cortex::{find_analyzer_by_name, resolve_analyzer, resolve_responder, CortexApi, CortexError};
use crate::models::{Observable, ResponderRequest};
use crate::report;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Tool definition as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Result of executing a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub is_error: bool,
    pub text: String,
}

impl ToolResult {
    pub fn success(text: String) -> Self {
        Self {
            is_error: false,
            text,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            is_error: true,
            text: message,
        }
    }

    /// Shape of a `tools/call` result.
    pub fn to_value(&self) -> Value {
        json!({
            "content": [text_content(self.text.clone())],
            "isError": self.is_error
        })
    }
}

/// Errors raised while executing a tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Cortex(#[from] CortexError),

    #[error("Failed to render result: {0}")]
    Render(#[from] anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct ObservableArgs {
    data_type: String,
    data: String,
    #[serde(flatten)]
    levels: LevelArgs,
}

/// Classification and wait settings shared by every submitting tool.
#[derive(Debug, Default, Deserialize)]
struct LevelArgs {
    tlp: Option<i64>,
    pap: Option<i64>,
    timeout_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RunAnalyzerArgs {
    analyzer: String,
    data_type: String,
    data: String,
    #[serde(flatten)]
    levels: LevelArgs,
}

#[derive(Debug, Default, Deserialize)]
struct DataTypeFilter {
    data_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobArgs {
    job_id: String,
    timeout_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RunResponderArgs {
    responder: String,
    object_type: String,
    data: Value,
    tlp: Option<i64>,
    pap: Option<i64>,
    message: Option<String>,
    parameters: Option<Value>,
}

/// A tool that runs one analyzer found by name.
struct NamedAnalyzer {
    /// Case-insensitive fragment of the analyzer name.
    name_fragment: &'static str,
    /// Fixed data type, or `None` when the caller supplies `data_type`.
    data_type: Option<&'static str>,
    /// Argument holding the observable value.
    value_key: &'static str,
}

fn named_analyzer(tool: &str) -> Option<NamedAnalyzer> {
    let named = match tool {
        "analyze_ip_with_abuseipdb" => NamedAnalyzer {
            name_fragment: "abuseipdb",
            data_type: Some("ip"),
            value_key: "ip",
        },
        "analyze_with_abusefinder" => NamedAnalyzer {
            name_fragment: "abuse_finder",
            data_type: None,
            value_key: "data",
        },
        "scan_url_with_virustotal" => NamedAnalyzer {
            name_fragment: "virustotal_scan",
            data_type: Some("url"),
            value_key: "url",
        },
        "analyze_url_with_urlscan_io" => NamedAnalyzer {
            name_fragment: "urlscan",
            data_type: Some("url"),
            value_key: "url",
        },
        _ => return None,
    };
    Some(named)
}

/// Executes tool calls against a Cortex instance.
pub struct ToolExecutor<C: CortexApi + ?Sized> {
    client: Arc<C>,
    defaults: AnalysisConfig,
}

impl<C: CortexApi + ?Sized> ToolExecutor<C> {
    pub fn new(client: Arc<C>, defaults: AnalysisConfig) -> Self {
        Self { client, defaults }
    }

    /// Execute a known tool. Failures become error results, never panics.
    pub async fn execute(&self, name: &str, args: &Map<String, Value>) -> ToolResult {
        debug!("Executing tool: {} with args: {:?}", name, args);

        let outcome = match name {
            "analyze_observable_with_all_analyzers" => self.analyze_with_all(args).await,
            "list_analyzers" => self.list_analyzers(args).await,
            "run_analyzer" => self.run_analyzer(args).await,
            "get_job_status" => self.get_job_status(args).await,
            "get_job_report" => self.get_job_report(args).await,
            "list_responders" => self.list_responders(args).await,
            "run_responder" => self.run_responder(args).await,
            other => match named_analyzer(other) {
                Some(named) => self.run_named_analyzer(&named, args).await,
                None => Err(ToolError::NotFound(format!("Unknown tool: {}", other))),
            },
        };

        match outcome {
            Ok(text) => ToolResult::success(text),
            Err(e) => {
                info!("Tool {} failed: {}", name, e);
                ToolResult::error(e.to_string())
            }
        }
    }

    async fn analyze_with_all(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let parsed: ObservableArgs = parse_args(args)?;
        let observable = self.observable(parsed.data_type, parsed.data, &parsed.levels)?;
        let timeout = self.timeout(parsed.levels.timeout_seconds)?;

        match BulkAnalyzer::new(self.client.as_ref())
            .run(observable, timeout)
            .await?
        {
            BulkOutcome::NoAnalyzers { data_type } => {
                Ok(report::generate_no_analyzers_message(&data_type))
            }
            BulkOutcome::Report(aggregate) => Ok(report::generate_aggregate_report(&aggregate)?),
        }
    }

    async fn list_analyzers(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let filter: DataTypeFilter = parse_args(args)?;
        let mut analyzers = self.client.list_analyzers().await?;

        if let Some(ref data_type) = filter.data_type {
            analyzers.retain(|a| a.supports(data_type));
        }

        Ok(report::generate_analyzer_list(
            &analyzers,
            filter.data_type.as_deref(),
        ))
    }

    async fn run_analyzer(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let parsed: RunAnalyzerArgs = parse_args(args)?;
        let observable = self.observable(parsed.data_type, parsed.data, &parsed.levels)?;
        let timeout = self.timeout(parsed.levels.timeout_seconds)?;

        let analyzers = self.client.list_analyzers().await?;
        let analyzer = resolve_analyzer(&analyzers, &parsed.analyzer, Some(&observable.data_type))
            .ok_or_else(|| {
                ToolError::NotFound(format!("No analyzer matches '{}'", parsed.analyzer))
            })?;

        if !analyzer.supports(&observable.data_type) {
            return Err(ToolError::InvalidArguments(format!(
                "Analyzer {} does not support data type '{}' (supported: {})",
                analyzer.name,
                observable.data_type,
                analyzer.data_type_list.join(", ")
            )));
        }

        self.submit_and_wait(&analyzer.id, &analyzer.name, &observable, timeout)
            .await
    }

    async fn run_named_analyzer(
        &self,
        named: &NamedAnalyzer,
        args: &Map<String, Value>,
    ) -> Result<String, ToolError> {
        let levels: LevelArgs = parse_args(args)?;
        let data = required_str(args, named.value_key)?;
        let data_type = match named.data_type {
            Some(t) => t.to_string(),
            None => required_str(args, "data_type")?,
        };
        let observable = self.observable(data_type, data, &levels)?;
        let timeout = self.timeout(levels.timeout_seconds)?;

        let analyzers = self.client.list_analyzers().await?;
        let analyzer = find_analyzer_by_name(
            &analyzers,
            named.name_fragment,
            Some(&observable.data_type),
        )
        .ok_or_else(|| {
            ToolError::NotFound(format!(
                "No enabled analyzer matching '{}' supports data type '{}'",
                named.name_fragment, observable.data_type
            ))
        })?;

        self.submit_and_wait(&analyzer.id, &analyzer.name, &observable, timeout)
            .await
    }

    async fn submit_and_wait(
        &self,
        analyzer_id: &str,
        analyzer_name: &str,
        observable: &Observable,
        timeout: Duration,
    ) -> Result<String, ToolError> {
        info!(
            "Running {} on {} '{}'",
            analyzer_name, observable.data_type, observable.data
        );
        let job = self.client.run_analyzer(analyzer_id, observable).await?;
        let mut finished = self.client.wait_for_report(&job.id, timeout).await?;
        if finished.analyzer_name.is_empty() {
            finished.analyzer_name = analyzer_name.to_string();
        }
        Ok(report::generate_job_report(&finished)?)
    }

    async fn get_job_status(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let parsed: JobArgs = parse_args(args)?;
        non_empty("job_id", &parsed.job_id)?;
        let job = self.client.get_job(&parsed.job_id).await?;
        Ok(report::generate_job_status(&job))
    }

    async fn get_job_report(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let parsed: JobArgs = parse_args(args)?;
        non_empty("job_id", &parsed.job_id)?;
        let timeout = self.timeout(parsed.timeout_seconds)?;
        let job = self.client.wait_for_report(&parsed.job_id, timeout).await?;
        Ok(report::generate_job_report(&job)?)
    }

    async fn list_responders(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let filter: DataTypeFilter = parse_args(args)?;
        let mut responders = self.client.list_responders().await?;

        if let Some(ref data_type) = filter.data_type {
            responders.retain(|r| r.supports(data_type));
        }

        Ok(report::generate_responder_list(&responders))
    }

    async fn run_responder(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let parsed: RunResponderArgs = parse_args(args)?;
        non_empty("object_type", &parsed.object_type)?;
        if !parsed.data.is_object() {
            return Err(ToolError::InvalidArguments(
                "data must be a JSON object describing the target".to_string(),
            ));
        }
        let tlp = level("tlp", parsed.tlp, self.defaults.default_tlp)?;
        let pap = level("pap", parsed.pap, self.defaults.default_pap)?;

        let responders = self.client.list_responders().await?;
        let responder = resolve_responder(&responders, &parsed.responder).ok_or_else(|| {
            ToolError::NotFound(format!("No responder matches '{}'", parsed.responder))
        })?;

        if !responder.supports(&parsed.object_type) {
            return Err(ToolError::InvalidArguments(format!(
                "Responder {} does not handle '{}' (supported: {})",
                responder.name,
                parsed.object_type,
                responder.data_type_list.join(", ")
            )));
        }

        let request = ResponderRequest {
            responder_id: responder.id.clone(),
            label: responder.name.clone(),
            data_type: parsed.object_type,
            data: parsed.data,
            tlp,
            pap,
            message: parsed.message,
            parameters: parsed.parameters.unwrap_or_else(|| json!({})),
        };

        let action = self.client.run_responder(&responder.id, &request).await?;
        Ok(report::generate_responder_action(&action))
    }

    fn observable(
        &self,
        data_type: String,
        data: String,
        levels: &LevelArgs,
    ) -> Result<Observable, ToolError> {
        non_empty("data_type", &data_type)?;
        non_empty("data", &data)?;

        Ok(Observable {
            data_type,
            data,
            tlp: level("tlp", levels.tlp, self.defaults.default_tlp)?,
            pap: level("pap", levels.pap, self.defaults.default_pap)?,
        })
    }

    fn timeout(&self, requested: Option<i64>) -> Result<Duration, ToolError> {
        let seconds = match requested {
            None => self.defaults.default_timeout_seconds,
            Some(s) if (MIN_ANALYSIS_TIMEOUT as i64..=MAX_ANALYSIS_TIMEOUT as i64).contains(&s) => {
                s as u64
            }
            Some(s) => {
                return Err(ToolError::InvalidArguments(format!(
                    "timeout_seconds must be between {} and {}, got {}",
                    MIN_ANALYSIS_TIMEOUT, MAX_ANALYSIS_TIMEOUT, s
                )))
            }
        };
        Ok(Duration::from_secs(seconds))
    }
}

fn parse_args<T: DeserializeOwned>(args: &Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn required_str(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing required parameter: {}", key)))
}

fn non_empty(name: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::InvalidArguments(format!("{} must not be empty", name)));
    }
    Ok(())
}

fn level(name: &str, value: Option<i64>, default: u8) -> Result<u8, ToolError> {
    match value {
        None => Ok(default),
        Some(v) if (0..=MAX_LEVEL as i64).contains(&v) => Ok(v as u8),
        Some(v) => Err(ToolError::InvalidArguments(format!(
            "{} must be between 0 and {}, got {}",
            name, MAX_LEVEL, v
        ))),
    }
}

fn level_schema(name: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": 0,
        "maximum": 3,
        "default": 2,
        "description": format!("{} level: 0=white/clear, 1=green, 2=amber, 3=red", name)
    })
}

fn timeout_schema() -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "maximum": 3600,
        "default": 300,
        "description": "Seconds to wait for the analyzer report"
    })
}

fn observable_schema(value_key: &str, value_description: &str, with_data_type: bool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    if with_data_type {
        properties.insert(
            "data_type".to_string(),
            json!({
                "type": "string",
                "description": "Observable data type, e.g. ip, domain, url, hash, mail, fqdn"
            }),
        );
        required.push("data_type");
    }
    properties.insert(
        value_key.to_string(),
        json!({ "type": "string", "description": value_description }),
    );
    required.push(value_key);
    properties.insert("tlp".to_string(), level_schema("TLP"));
    properties.insert("pap".to_string(), level_schema("PAP"));
    properties.insert("timeout_seconds".to_string(), timeout_schema());

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

/// Get the tool definitions advertised to MCP clients.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "analyze_observable_with_all_analyzers",
            description: "Run an observable through every enabled Cortex analyzer that supports its data type, wait for all reports and return a combined summary with taxonomy counts per level.",
            input_schema: observable_schema("data", "Observable value to analyze", true),
        },
        ToolDefinition {
            name: "list_analyzers",
            description: "List enabled Cortex analyzers, optionally only those supporting a data type.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "data_type": {
                        "type": "string",
                        "description": "Only list analyzers supporting this data type"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "run_analyzer",
            description: "Run one Cortex analyzer (by id or name fragment) on an observable and return its report.",
            input_schema: {
                let mut schema = observable_schema("data", "Observable value to analyze", true);
                schema["properties"]["analyzer"] = json!({
                    "type": "string",
                    "description": "Analyzer id, or a case-insensitive fragment of its name"
                });
                schema["required"] = json!(["analyzer", "data_type", "data"]);
                schema
            },
        },
        ToolDefinition {
            name: "analyze_ip_with_abuseipdb",
            description: "Check an IP address reputation with the AbuseIPDB analyzer.",
            input_schema: observable_schema("ip", "IP address to check", false),
        },
        ToolDefinition {
            name: "analyze_with_abusefinder",
            description: "Find abuse contacts for an observable with the Abuse_Finder analyzer.",
            input_schema: observable_schema("data", "Observable value (ip, domain, fqdn, url or mail)", true),
        },
        ToolDefinition {
            name: "scan_url_with_virustotal",
            description: "Submit a URL to VirusTotal for scanning.",
            input_schema: observable_schema("url", "URL to scan", false),
        },
        ToolDefinition {
            name: "analyze_url_with_urlscan_io",
            description: "Scan a URL with urlscan.io.",
            input_schema: observable_schema("url", "URL to scan", false),
        },
        ToolDefinition {
            name: "get_job_status",
            description: "Get the status of a Cortex job without waiting for it.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job_id": { "type": "string", "description": "Cortex job id" }
                },
                "required": ["job_id"]
            }),
        },
        ToolDefinition {
            name: "get_job_report",
            description: "Wait for a Cortex job to finish and return its report.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job_id": { "type": "string", "description": "Cortex job id" },
                    "timeout_seconds": timeout_schema()
                },
                "required": ["job_id"]
            }),
        },
        ToolDefinition {
            name: "list_responders",
            description: "List enabled Cortex responders, optionally only those handling an object type.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "data_type": {
                        "type": "string",
                        "description": "Object type, e.g. thehive:case or thehive:alert"
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "run_responder",
            description: "Launch a Cortex responder (by id or name fragment) against a case, alert or observable.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "responder": {
                        "type": "string",
                        "description": "Responder id, or a case-insensitive fragment of its name"
                    },
                    "object_type": {
                        "type": "string",
                        "description": "Object type the responder acts on, e.g. thehive:case"
                    },
                    "data": {
                        "type": "object",
                        "description": "The target object as the responder expects it"
                    },
                    "tlp": level_schema("TLP"),
                    "pap": level_schema("PAP"),
                    "message": { "type": "string", "description": "Optional message for the responder" },
                    "parameters": { "type": "object", "description": "Optional responder parameters" }
                },
                "required": ["responder", "object_type", "data"]
            }),
        },
    ]
}

/// Whether `name` is one of the advertised tools.
pub fn is_known_tool(name: &str) -> bool {
    get_tool_definitions().iter().any(|t| t.name == name)
}
