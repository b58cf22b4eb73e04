//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// cortex-mcp - Cortex analyzers and responders as MCP tools
///
/// Runs a Model Context Protocol server on stdio that lets an LLM agent
/// list Cortex analyzers, run them on observables (IPs, domains, URLs,
/// hashes...) and launch responders.
///
/// Examples:
///   CORTEX_API_KEY=... cortex-mcp --endpoint http://cortex:9001/api
///   cortex-mcp --config ./cortex-mcp.toml --verbose
///   cortex-mcp --check
///   cortex-mcp --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Cortex API endpoint, including the /api prefix
    #[arg(long, value_name = "URL", env = "CORTEX_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Cortex API key
    #[arg(long, value_name = "KEY", env = "CORTEX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cortex-mcp.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Timeout for ordinary Cortex API calls, in seconds
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Default time to wait for analyzer reports, in seconds (1-3600)
    #[arg(long, value_name = "SECS")]
    pub analysis_timeout: Option<u64>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Enable verbose logging output (written to stderr)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Verify connectivity by listing analyzers, then exit
    #[arg(long)]
    pub check: bool,

    /// Generate a default .cortex-mcp.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Cortex endpoint must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.request_timeout == Some(0) {
            return Err("Request timeout must be at least 1 second".to_string());
        }

        if let Some(timeout) = self.analysis_timeout {
            if !(1..=3600).contains(&timeout) {
                return Err("Analysis timeout must be between 1 and 3600 seconds".to_string());
            }
        }

        if let Some(ref path) = self.config {
            if !path.is_file() {
                return Err(format!("Config file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            endpoint: Some("http://localhost:9001/api".to_string()),
            api_key: Some("key".to_string()),
            config: None,
            request_timeout: None,
            analysis_timeout: None,
            insecure: false,
            verbose: false,
            quiet: false,
            check: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "cortex-mcp",
            "--endpoint",
            "https://cortex.local/api",
            "--api-key",
            "abc",
            "--analysis-timeout",
            "60",
            "--insecure",
        ])
        .unwrap();

        assert_eq!(args.endpoint.as_deref(), Some("https://cortex.local/api"));
        assert_eq!(args.analysis_timeout, Some(60));
        assert!(args.insecure);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_endpoint() {
        let mut args = make_args();
        args.endpoint = Some("cortex.local".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_analysis_timeout_range() {
        let mut args = make_args();
        args.analysis_timeout = Some(0);
        assert!(args.validate().is_err());
        args.analysis_timeout = Some(3601);
        assert!(args.validate().is_err());
        args.analysis_timeout = Some(3600);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
