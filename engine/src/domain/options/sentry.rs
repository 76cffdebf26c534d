//! Sentry (certificate authority) options

use super::{CommandLine, CommandLineBuilder, CommonOptions, ProcessOptions};
use crate::constants::{sentry, CONTROL_PLANE_HEALTH_PATH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryOptions {
    #[serde(flatten)]
    pub common: CommonOptions,

    pub port: u16,
    pub health_port: u16,
    pub metrics_port: u16,

    pub config_file: Option<PathBuf>,
    /// Directory holding the issuer certificate and key
    pub issuer_credentials_directory: Option<PathBuf>,
    pub trust_domain: Option<String>,
}

impl Default for SentryOptions {
    fn default() -> Self {
        Self {
            common: CommonOptions::default(),
            port: sentry::DEFAULT_PORT,
            health_port: sentry::DEFAULT_HEALTH_PORT,
            metrics_port: sentry::DEFAULT_METRICS_PORT,
            config_file: None,
            issuer_credentials_directory: None,
            trust_domain: None,
        }
    }
}

impl SentryOptions {
    /// Address the sidecar uses for `--sentry-address`
    pub fn address(&self) -> String {
        format!("{}:{}", self.common.host, self.port)
    }
}

impl ProcessOptions for SentryOptions {
    fn process_name(&self) -> &'static str {
        sentry::PROCESS_NAME
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
            .add_path("config", self.config_file.as_deref())
            .add_path(
                "issuer-credentials",
                self.issuer_credentials_directory.as_deref(),
            )
            .add_str("trust-domain", self.trust_domain.as_deref());

        self.common
            .append_common_flags(builder, self.metrics_port)
            .build()
    }

    fn health_uri(&self) -> String {
        self.common
            .http_uri(self.health_port, CONTROL_PLANE_HEALTH_PATH)
    }
}
