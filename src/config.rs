//! Configuration file handling.
//!
//! This module handles loading `.cortex-mcp.toml` files and merging them
//! with environment variables and command-line arguments.

use crate::cortex::ClientConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = ".cortex-mcp.toml";

/// Bounds for the per-job completion wait, in seconds.
pub const MIN_ANALYSIS_TIMEOUT: u64 = 1;
pub const MAX_ANALYSIS_TIMEOUT: u64 = 3600;

/// Highest TLP/PAP level.
pub const MAX_LEVEL: u8 = 3;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cortex connection settings.
    #[serde(default)]
    pub cortex: CortexConfig,

    /// Defaults applied to analysis tools.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// MCP server identity.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Cortex connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexConfig {
    /// Base API URL, including the `/api` prefix.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key. Usually supplied through `CORTEX_API_KEY` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Timeout for ordinary API calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Skip TLS certificate validation (self-signed lab instances).
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            request_timeout_seconds: default_request_timeout(),
            accept_invalid_certs: false,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:9001/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Defaults for observable submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// How long to wait for each job's report.
    #[serde(default = "default_analysis_timeout")]
    pub default_timeout_seconds: u64,

    #[serde(default = "default_level")]
    pub default_tlp: u8,

    #[serde(default = "default_level")]
    pub default_pap: u8,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: default_analysis_timeout(),
            default_tlp: default_level(),
            default_pap: default_level(),
        }
    }
}

fn default_analysis_timeout() -> u64 {
    300
}

fn default_level() -> u8 {
    2
}

/// MCP server identity reported on `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
        }
    }
}

fn default_server_name() -> String {
    "cortex-mcp".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and the environment variables clap reads for them)
    /// take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.cortex.endpoint = endpoint.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.cortex.api_key = Some(api_key.clone());
        }
        if let Some(timeout) = args.request_timeout {
            self.cortex.request_timeout_seconds = timeout;
        }
        if let Some(timeout) = args.analysis_timeout {
            self.analysis.default_timeout_seconds = timeout;
        }

        // Flags always override
        if args.insecure {
            self.cortex.accept_invalid_certs = true;
        }
    }

    /// Check the merged configuration before connecting.
    pub fn validate(&self) -> Result<()> {
        let endpoint = &self.cortex.endpoint;
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            bail!("Cortex endpoint must start with 'http://' or 'https://'");
        }

        match self.cortex.api_key.as_deref() {
            None | Some("") => {
                bail!("Cortex API key is required (set CORTEX_API_KEY or [cortex].api_key)")
            }
            Some(_) => {}
        }

        if self.cortex.request_timeout_seconds == 0 {
            bail!("Request timeout must be at least 1 second");
        }

        let timeout = self.analysis.default_timeout_seconds;
        if !(MIN_ANALYSIS_TIMEOUT..=MAX_ANALYSIS_TIMEOUT).contains(&timeout) {
            bail!(
                "Analysis timeout must be between {} and {} seconds",
                MIN_ANALYSIS_TIMEOUT,
                MAX_ANALYSIS_TIMEOUT
            );
        }

        if self.analysis.default_tlp > MAX_LEVEL || self.analysis.default_pap > MAX_LEVEL {
            bail!("Default TLP and PAP must be between 0 and {}", MAX_LEVEL);
        }

        Ok(())
    }

    /// Connection settings for the Cortex client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.cortex.endpoint.clone(),
            api_key: self.cortex.api_key.clone().unwrap_or_default(),
            request_timeout_seconds: self.cortex.request_timeout_seconds,
            accept_invalid_certs: self.cortex.accept_invalid_certs,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
