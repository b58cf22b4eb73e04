//! Canned investigation prompts.

use super::protocol::{text_content, RpcError};
use serde_json::{json, Map, Value};

pub fn list_prompts() -> Value {
    json!({
        "prompts": [
            {
                "name": "investigate_observable",
                "description": "Run every applicable analyzer on an observable and assess the verdict",
                "arguments": [
                    { "name": "data_type", "description": "Observable data type (ip, domain, url, hash...)", "required": true },
                    { "name": "data", "description": "Observable value", "required": true }
                ]
            },
            {
                "name": "triage_ip",
                "description": "Triage an IP address using reputation analyzers",
                "arguments": [
                    { "name": "ip", "description": "IP address to triage", "required": true }
                ]
            }
        ]
    })
}

/// Render `prompts/get` for `name` with the caller's arguments.
pub fn get_prompt(name: &str, args: &Map<String, Value>) -> Result<Value, RpcError> {
    let (description, text) = match name {
        "investigate_observable" => {
            let data_type = argument(args, "data_type")?;
            let data = argument(args, "data")?;
            (
                format!("Investigate {} {}", data_type, data),
                format!(
                    "Investigate the {data_type} observable `{data}`.\n\n\
                     1. Call analyze_observable_with_all_analyzers with data_type \"{data_type}\" and data \"{data}\".\n\
                     2. Summarize the malicious and suspicious taxonomies per analyzer.\n\
                     3. Mention analyzers that errored or rejected the submission.\n\
                     4. Give an overall verdict (malicious, suspicious, safe or unknown) with your confidence."
                ),
            )
        }
        "triage_ip" => {
            let ip = argument(args, "ip")?;
            (
                format!("Triage IP {}", ip),
                format!(
                    "Triage the IP address `{ip}`.\n\n\
                     1. Call analyze_ip_with_abuseipdb with ip \"{ip}\".\n\
                     2. If more context is needed, call analyze_observable_with_all_analyzers with data_type \"ip\".\n\
                     3. Report abuse confidence, known abuse categories and whether the IP should be blocked."
                ),
            )
        }
        other => return Err(RpcError::invalid_params(format!("Unknown prompt: {}", other))),
    };

    Ok(json!({
        "description": description,
        "messages": [{
            "role": "user",
            "content": text_content(text)
        }]
    }))
}

fn argument<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, RpcError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| RpcError::invalid_params(format!("Missing prompt argument: {}", key)))
}
