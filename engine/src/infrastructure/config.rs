//! Configuration loading from YAML files
//!
//! One file describes every process the sidekick supervises. Each section is
//! optional; an absent section means the process is not managed at all.
//!
//! ```yaml
//! sidecar:
//!   app_id: orders
//!   app_port: 8080
//! placement:
//!   port: 6050
//! ```

use crate::domain::{PlacementOptions, ProcessOptions, SchedulerOptions, SentryOptions, SidecarOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SidekickConfig {
    pub sidecar: Option<SidecarOptions>,
    pub placement: Option<PlacementOptions>,
    pub sentry: Option<SentryOptions>,
    pub scheduler: Option<SchedulerOptions>,
}

impl SidekickConfig {
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!(
            path = %path.display(),
            processes = ?config.process_names(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Names of the configured sections, in start order
    pub fn process_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if let Some(ref o) = self.placement {
            names.push(o.process_name());
        }
        if let Some(ref o) = self.sentry {
            names.push(o.process_name());
        }
        if let Some(ref o) = self.scheduler {
            names.push(o.process_name());
        }
        if let Some(ref o) = self.sidecar {
            names.push(o.process_name());
        }
        names
    }

    /// Rejects empty configurations and ports claimed twice by enabled processes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_names().is_empty() {
            return Err(ConfigError::Invalid(
                "no processes configured (expected at least one of sidecar, placement, sentry, scheduler)"
                    .to_string(),
            ));
        }

        let mut claimed: HashMap<u16, String> = HashMap::new();
        for (owner, port) in self.enabled_ports() {
            if let Some(previous) = claimed.insert(port, owner.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "port {} is used by both {} and {}",
                    port, previous, owner
                )));
            }
        }
        Ok(())
    }

    fn enabled_ports(&self) -> Vec<(String, u16)> {
        let mut ports = Vec::new();
        if let Some(o) = enabled(&self.placement) {
            push_ports(&mut ports, o, &[("port", Some(o.port)), ("health_port", Some(o.health_port))]);
        }
        if let Some(o) = enabled(&self.sentry) {
            push_ports(&mut ports, o, &[("port", Some(o.port)), ("health_port", Some(o.health_port))]);
        }
        if let Some(o) = enabled(&self.scheduler) {
            push_ports(&mut ports, o, &[("port", Some(o.port)), ("health_port", Some(o.health_port))]);
        }
        if let Some(o) = enabled(&self.sidecar) {
            push_ports(
                &mut ports,
                o,
                &[
                    ("dapr_http_port", Some(o.dapr_http_port)),
                    ("dapr_grpc_port", Some(o.dapr_grpc_port)),
                    ("dapr_internal_grpc_port", o.dapr_internal_grpc_port),
                    ("profile_port", o.profile_port),
                ],
            );
        }
        ports
    }
}

fn enabled<O: ProcessOptions>(options: &Option<O>) -> Option<&O> {
    options.as_ref().filter(|o| o.common().enabled)
}

fn push_ports<O: ProcessOptions>(out: &mut Vec<(String, u16)>, options: &O, ports: &[(&str, Option<u16>)]) {
    let metrics = options
        .common()
        .metrics
        .enabled
        .then(|| options.metrics_port());
    let all = ports
        .iter()
        .copied()
        .chain(std::iter::once(("metrics_port", metrics)));
    for (field, port) in all {
        if let Some(port) = port {
            out.push((format!("{}.{}", options.process_name(), field), port));
        }
    }
}

/// Load and validate the configuration at `config_path`
pub fn load_config_from_path(config_path: impl AsRef<Path>) -> Result<SidekickConfig, ConfigError> {
    SidekickConfig::load(config_path)
}
