//! Daemon configuration
//!
//! Settings come from environment variables with defaults; command-line flags
//! override them. The process definitions themselves live in the YAML file
//! named by `config_file`.

use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

const ENV_CONFIG_FILE: &str = "SIDEKICK_CONFIG_FILE";
const ENV_LOG_LEVEL: &str = "SIDEKICK_LOG_LEVEL";
const ENV_SHUTDOWN_TIMEOUT: &str = "SIDEKICK_SHUTDOWN_TIMEOUT_SECS";

/// Supervise Dapr sidecar and control-plane processes
#[derive(Parser, Debug, Clone)]
#[command(name = "sidekickd")]
#[command(about = "Launch and supervise Dapr processes")]
pub struct Args {
    /// YAML file describing the processes to run
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `sidekick_engine=debug`
    #[arg(long)]
    pub log_level: Option<String>,

    /// Seconds allowed for all processes to stop before they are killed
    #[arg(long)]
    pub shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub config_file: Option<PathBuf>,
    pub log_level: String,
    pub shutdown_timeout: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self {
            config_file: env::var(ENV_CONFIG_FILE).ok().map(PathBuf::from),
            log_level: Self::parse_log_level(),
            shutdown_timeout: Duration::from_secs(
                Self::parse_u64(ENV_SHUTDOWN_TIMEOUT).unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            ),
        }
    }

    /// Flags win over the environment
    pub fn with_args(mut self, args: Args) -> Self {
        if let Some(config) = args.config {
            self.config_file = Some(config);
        }
        if let Some(level) = args.log_level {
            self.log_level = level;
        }
        if let Some(secs) = args.shutdown_timeout_secs {
            self.shutdown_timeout = Duration::from_secs(secs);
        }
        self
    }

    fn parse_u64(var_name: &str) -> Option<u64> {
        env::var(var_name).ok().and_then(|s| s.trim().parse().ok())
    }

    fn parse_log_level() -> String {
        // Priority: SIDEKICK_LOG_LEVEL > RUST_LOG > default
        env::var(ENV_LOG_LEVEL)
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.config_file.is_none() {
            return Err(format!(
                "No process configuration given (set {} or pass --config)",
                ENV_CONFIG_FILE
            ));
        }
        if self.shutdown_timeout.is_zero() {
            return Err("Shutdown timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
