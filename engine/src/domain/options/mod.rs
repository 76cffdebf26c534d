//! Process options model
//!
//! One options type per process kind. Every type shares `CommonOptions`
//! (binary location, logging, metrics, lifecycle timings) and knows how to
//! render itself into a `CommandLine` and which URIs the supervisor uses.

pub mod command_line;
pub mod placement;
pub mod scheduler;
pub mod sentry;
pub mod sidecar;

pub use command_line::{CommandLine, CommandLineBuilder};
pub use placement::PlacementOptions;
pub use scheduler::SchedulerOptions;
pub use sentry::SentryOptions;
pub use sidecar::SidecarOptions;

use crate::constants::{self, health_check, process};
use crate::domain::SensitiveString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;

/// Metrics sub-options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsOptions {
    pub enabled: bool,
    /// Labels added to every metric line proxied by `write_metrics`
    pub labels: BTreeMap<String, String>,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            labels: BTreeMap::new(),
        }
    }
}

/// Options shared by every process kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonOptions {
    pub enabled: bool,

    /// Full path to the executable; derived from `runtime_directory` or PATH when unset
    pub binary_path: Option<PathBuf>,

    /// Dapr installation directory containing `bin/`
    pub runtime_directory: Option<PathBuf>,

    pub working_directory: Option<PathBuf>,

    /// Host the supervisor uses to reach the process
    pub host: String,

    pub log_level: Option<String>,
    pub log_as_json: Option<bool>,

    /// Raw arguments appended verbatim after all computed flags
    pub custom_arguments: Option<String>,

    /// Extra environment variables for the child process
    pub environment: BTreeMap<String, String>,

    pub metrics: MetricsOptions,

    /// Seconds to wait for exit after a graceful stop; kind-specific default when unset
    pub wait_for_shutdown_seconds: Option<u64>,

    /// Seconds the readiness poll probes before giving up
    pub startup_timeout_seconds: u64,

    /// Milliseconds between readiness probes
    pub health_poll_interval_ms: u64,

    /// Restart this long after an unexpected exit; never restart when unset
    pub restart_after_millis: Option<u64>,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            binary_path: None,
            runtime_directory: None,
            working_directory: None,
            host: constants::DEFAULT_HOST.to_string(),
            log_level: None,
            log_as_json: None,
            custom_arguments: None,
            environment: BTreeMap::new(),
            metrics: MetricsOptions::default(),
            wait_for_shutdown_seconds: None,
            startup_timeout_seconds: process::DEFAULT_STARTUP_TIMEOUT_SEC,
            health_poll_interval_ms: health_check::DEFAULT_POLL_INTERVAL_MS,
            restart_after_millis: None,
        }
    }
}

impl CommonOptions {
    /// Executable for `process_name`: explicit path, then `<runtime_directory>/bin`, then PATH lookup
    pub fn executable(&self, process_name: &str) -> PathBuf {
        let file_name = format!("{}{}", process_name, std::env::consts::EXE_SUFFIX);
        match (&self.binary_path, &self.runtime_directory) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join("bin").join(file_name),
            (None, None) => PathBuf::from(file_name),
        }
    }

    pub fn http_uri(&self, port: u16, path: &str) -> String {
        format!("http://{}:{}/{}", self.host, port, path.trim_start_matches('/'))
    }

    /// Appends flags every Dapr binary understands
    pub fn append_common_flags(
        &self,
        builder: CommandLineBuilder,
        metrics_port: u16,
    ) -> CommandLineBuilder {
        let metrics_enabled = self.metrics.enabled;
        builder
            .add_str("log-level", self.log_level.as_deref())
            .add_flag("log-as-json", self.log_as_json)
            .add_flag("enable-metrics", Some(metrics_enabled))
            .add("metrics-port", metrics_enabled.then_some(metrics_port))
            .environment(&self.environment)
            .custom_arguments(self.custom_arguments.as_deref())
    }
}

/// Launch configuration for one process kind
pub trait ProcessOptions:
    Clone + Debug + PartialEq + Serialize + Send + Sync + 'static
{
    /// Executable base name, also used as the host's display name
    fn process_name(&self) -> &'static str;

    fn common(&self) -> &CommonOptions;

    fn common_mut(&mut self) -> &mut CommonOptions;

    /// Port of the Prometheus metrics endpoint
    fn metrics_port(&self) -> u16;

    /// Seconds to wait for exit when `wait_for_shutdown_seconds` is unset
    fn default_wait_for_shutdown_seconds(&self) -> u64 {
        process::DEFAULT_WAIT_FOR_SHUTDOWN_SEC
    }

    /// Render arguments and environment
    fn command_line(&self) -> CommandLine;

    /// URI probed for readiness and on-demand health checks
    fn health_uri(&self) -> String;

    /// `Some` when the process should not be spawned
    fn disabled_reason(&self) -> Option<String> {
        if self.common().enabled {
            None
        } else {
            Some("Disabled by configuration".to_string())
        }
    }

    fn metrics_uri(&self) -> Option<String> {
        let common = self.common();
        common
            .metrics
            .enabled
            .then(|| common.http_uri(self.metrics_port(), constants::METRICS_PATH))
    }

    fn metadata_uri(&self) -> Option<String> {
        None
    }

    /// Endpoint accepting a graceful shutdown request, if the process has one
    fn shutdown_uri(&self) -> Option<String> {
        None
    }

    /// Token sent with management requests to the process
    fn api_token(&self) -> Option<&SensitiveString> {
        None
    }

    fn executable(&self) -> PathBuf {
        self.common().executable(self.process_name())
    }

    fn wait_for_shutdown(&self) -> Duration {
        Duration::from_secs(
            self.common()
                .wait_for_shutdown_seconds
                .unwrap_or_else(|| self.default_wait_for_shutdown_seconds()),
        )
    }

    fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.common().startup_timeout_seconds)
    }

    fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.common().health_poll_interval_ms.max(1))
    }

    fn restart_after(&self) -> Option<Duration> {
        self.common().restart_after_millis.map(Duration::from_millis)
    }

    fn metric_labels(&self) -> &BTreeMap<String, String> {
        &self.common().metrics.labels
    }
}
