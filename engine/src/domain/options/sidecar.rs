//! Sidecar (`daprd`) options

use super::{CommandLine, CommandLineBuilder, CommonOptions, ProcessOptions};
use crate::constants::{env, process, sidecar};
use crate::domain::SensitiveString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarOptions {
    #[serde(flatten)]
    pub common: CommonOptions,

    /// Required; the sidecar is disabled without it
    pub app_id: Option<String>,
    pub app_port: Option<u16>,
    pub app_protocol: Option<String>,
    pub app_ssl: Option<bool>,
    pub app_max_concurrency: Option<u32>,
    pub app_health_check_path: Option<String>,

    pub components_directory: Option<PathBuf>,
    pub resources_directory: Option<PathBuf>,
    pub config_file: Option<PathBuf>,

    pub dapr_http_port: u16,
    pub dapr_grpc_port: u16,
    pub dapr_internal_grpc_port: Option<u16>,
    pub dapr_http_max_request_size: Option<u32>,
    pub dapr_graceful_shutdown_seconds: Option<u64>,
    pub metrics_port: u16,
    pub profile_port: Option<u16>,

    pub mode: Option<String>,
    pub mtls: Option<bool>,
    pub placement_host_address: Option<String>,
    pub sentry_address: Option<String>,
    pub scheduler_host_address: Option<String>,
    pub control_plane_address: Option<String>,

    /// Environment only
    pub namespace: Option<String>,
    /// Environment only; filled from the token manager when unset
    pub dapr_api_token: Option<SensitiveString>,
    /// Environment only; filled from the token manager when unset
    pub app_api_token: Option<SensitiveString>,
}

impl Default for SidecarOptions {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            app_id: None,
            app_port: None,
            app_protocol: None,
            app_ssl: None,
            app_max_concurrency: None,
            app_health_check_path: None,
            components_directory: None,
            resources_directory: None,
            config_file: None,
            dapr_http_port: sidecar::DEFAULT_HTTP_PORT,
            dapr_grpc_port: sidecar::DEFAULT_GRPC_PORT,
            dapr_internal_grpc_port: None,
            dapr_http_max_request_size: None,
            dapr_graceful_shutdown_seconds: None,
            metrics_port: sidecar::DEFAULT_METRICS_PORT,
            profile_port: None,
            mode: None,
            mtls: None,
            placement_host_address: None,
            sentry_address: None,
            scheduler_host_address: None,
            control_plane_address: None,
            namespace: None,
            dapr_api_token: None,
            app_api_token: None,
        }
    }
}

impl SidecarOptions {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            ..Self::default()
        }
    }

    pub fn with_app_port(mut self, port: u16) -> Self {
        self.app_port = Some(port);
        self
    }

    pub fn with_ports(mut self, http_port: u16, grpc_port: u16) -> Self {
        self.dapr_http_port = http_port;
        self.dapr_grpc_port = grpc_port;
        self
    }
}

impl ProcessOptions for SidecarOptions {
    fn process_name(&self) -> &'static str {
        sidecar::PROCESS_NAME
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

    fn default_wait_for_shutdown_seconds(&self) -> u64 {
        process::DEFAULT_SIDECAR_WAIT_FOR_SHUTDOWN_SEC
    }

    fn disabled_reason(&self) -> Option<String> {
        if !self.common.enabled {
            return Some("Disabled by configuration".to_string());
        }
        match self.app_id.as_deref() {
            Some(id) if !id.trim().is_empty() => None,
            _ => Some("Sidecar requires an app_id".to_string()),
        }
    }

    fn command_line(&self) -> CommandLine {
        let builder = CommandLineBuilder::new()
            .add_str("app-id", self.app_id.as_deref())
            .add("app-port", self.app_port)
            .add_str("app-protocol", self.app_protocol.as_deref())
            .add_flag("app-ssl", self.app_ssl)
            .add("app-max-concurrency", self.app_max_concurrency)
            .add_str("app-health-check-path", self.app_health_check_path.as_deref())
            .add_path("components-path", self.components_directory.as_deref())
            .add_path("resources-path", self.resources_directory.as_deref())
            .add_path("config", self.config_file.as_deref())
            .add("dapr-http-port", Some(self.dapr_http_port))
            .add("dapr-grpc-port", Some(self.dapr_grpc_port))
            .add("dapr-internal-grpc-port", self.dapr_internal_grpc_port)
            .add("dapr-http-max-request-size", self.dapr_http_max_request_size)
            .add(
                "dapr-graceful-shutdown-seconds",
                self.dapr_graceful_shutdown_seconds,
            )
            .add_switch("enable-profiling", self.profile_port.is_some())
            .add("profile-port", self.profile_port)
            .add_str("mode", self.mode.as_deref())
            .add_flag("enable-mtls", self.mtls)
            .add_str("placement-host-address", self.placement_host_address.as_deref())
            .add_str("sentry-address", self.sentry_address.as_deref())
            .add_str("scheduler-host-address", self.scheduler_host_address.as_deref())
            .add_str("control-plane-address", self.control_plane_address.as_deref())
            .env(env::DAPR_HTTP_PORT, Some(self.dapr_http_port))
            .env(env::DAPR_GRPC_PORT, Some(self.dapr_grpc_port))
            .env(env::NAMESPACE, self.namespace.as_deref())
            .env_sensitive(env::DAPR_API_TOKEN, self.dapr_api_token.as_ref())
            .env_sensitive(env::APP_API_TOKEN, self.app_api_token.as_ref());

        self.common
            .append_common_flags(builder, self.metrics_port)
            .build()
    }

    fn health_uri(&self) -> String {
        self.common.http_uri(self.dapr_http_port, sidecar::HEALTH_PATH)
    }

    fn metadata_uri(&self) -> Option<String> {
        Some(self.common.http_uri(self.dapr_http_port, sidecar::METADATA_PATH))
    }

    fn shutdown_uri(&self) -> Option<String> {
        Some(self.common.http_uri(self.dapr_http_port, sidecar::SHUTDOWN_PATH))
    }

    fn api_token(&self) -> Option<&SensitiveString> {
        self.dapr_api_token.as_ref().filter(|t| !t.is_blank())
    }
}
