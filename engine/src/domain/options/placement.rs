//! Placement service options

use super::{CommandLine, CommandLineBuilder, CommonOptions, ProcessOptions};
use crate::constants::{placement, CONTROL_PLANE_HEALTH_PATH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementOptions {
    #[serde(flatten)]
    pub common: CommonOptions,

    pub port: u16,
    pub health_port: u16,
    pub metrics_port: u16,

    /// Raft node id
    pub id: Option<String>,
    pub initial_cluster: Option<String>,
    pub raft_logstore_path: Option<PathBuf>,
    pub inmem_store_enabled: Option<bool>,
    pub replication_factor: Option<u32>,
    pub mtls: Option<bool>,
    pub trust_domain: Option<String>,
    pub certs_directory: Option<PathBuf>,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            port: placement::DEFAULT_PORT,
            health_port: placement::DEFAULT_HEALTH_PORT,
            metrics_port: placement::DEFAULT_METRICS_PORT,
            id: None,
            initial_cluster: None,
            raft_logstore_path: None,
            inmem_store_enabled: None,
            replication_factor: None,
            mtls: None,
            trust_domain: None,
            certs_directory: None,
        }
    }
}

impl PlacementOptions {
    /// Address the sidecar uses for `--placement-host-address`
    pub fn host_address(&self) -> String {
        format!("{}:{}", self.common.host, self.port)
    }
}

impl ProcessOptions for PlacementOptions {
    fn process_name(&self) -> &'static str {
        placement::PROCESS_NAME
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
            .add_str("initial-cluster", self.initial_cluster.as_deref())
            .add_path("raft-logstore-path", self.raft_logstore_path.as_deref())
            .add_flag("inmem-store-enabled", self.inmem_store_enabled)
            .add("replicationFactor", self.replication_factor)
            .add_flag("tls-enabled", self.mtls)
            .add_str("trust-domain", self.trust_domain.as_deref())
            .add_path("certchain", self.certs_directory.as_deref());

        self.common
            .append_common_flags(builder, self.metrics_port)
            .build()
    }

    fn health_uri(&self) -> String {
        self.common
            .http_uri(self.health_port, CONTROL_PLANE_HEALTH_PATH)
    }
}
