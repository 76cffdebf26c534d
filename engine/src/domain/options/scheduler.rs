//! Scheduler service options

use super::{CommandLine, CommandLineBuilder, CommonOptions, ProcessOptions};
use crate::constants::{scheduler, CONTROL_PLANE_HEALTH_PATH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    #[serde(flatten)]
    pub common: CommonOptions,

    pub port: u16,
    pub health_port: u16,
    pub metrics_port: u16,

    pub id: Option<String>,
    pub listen_address: Option<String>,
    pub etcd_data_dir: Option<PathBuf>,
    pub replica_count: Option<u32>,
    pub initial_cluster: Option<String>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            port: scheduler::DEFAULT_PORT,
            health_port: scheduler::DEFAULT_HEALTH_PORT,
            metrics_port: scheduler::DEFAULT_METRICS_PORT,
            id: None,
            listen_address: None,
            etcd_data_dir: None,
            replica_count: None,
            initial_cluster: None,
        }
    }
}

impl SchedulerOptions {
    /// Address the sidecar uses for `--scheduler-host-address`
    pub fn host_address(&self) -> String {
        format!("{}:{}", self.common.host, self.port)
    }
}

impl ProcessOptions for SchedulerOptions {
    fn process_name(&self) -> &'static str {
        scheduler::PROCESS_NAME
    }

    fn common(&self) -> &CommonOptions {
        &self.common
    }

    fn common_mut(&mut self) -> &mut CommonOptions {
        &mut self.common
    }

    fn metrics_port(&self) -> u16 {
        self.metrics_port
    }

    fn command_line(&self) -> CommandLine {
        let builder = CommandLineBuilder::new()
            .add("port", Some(self.port))
            .add("healthz-port", Some(self.health_port))
            .add_str("id", self.id.as_deref())
            .add_str("listen-address", self.listen_address.as_deref())
            .add_path("etcd-data-dir", self.etcd_data_dir.as_deref())
            .add("replica-count", self.replica_count)
            .add_str("initial-cluster", self.initial_cluster.as_deref());

        self.common
            .append_common_flags(builder, self.metrics_port)
            .build()
    }

    fn health_uri(&self) -> String {
        self.common
            .http_uri(self.health_port, CONTROL_PLANE_HEALTH_PATH)
    }
}
