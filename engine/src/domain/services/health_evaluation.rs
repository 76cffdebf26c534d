//! Health evaluation for status endpoints
//! Combines the stored lifecycle status with a fresh probe result

use crate::domain::{HealthResult, ProcessInfo, ProcessStatus};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "description", rename_all = "lowercase")]
pub enum HealthReport {
    Healthy(String),
    Unhealthy(String),
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy(_))
    }

    /// Status code for an HTTP health endpoint
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Healthy(_) => 200,
            Self::Unhealthy(_) => 503,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Healthy(d) | Self::Unhealthy(d) => d,
        }
    }
}

/// A disabled process counts as healthy; a started one is judged by the probe
pub fn evaluate(info: &ProcessInfo, probe: &HealthResult) -> HealthReport {
    match info.status() {
        ProcessStatus::Disabled => HealthReport::Healthy("disabled".to_string()),
        ProcessStatus::Started if probe.is_healthy() => {
            HealthReport::Healthy(info.description().to_string())
        }
        ProcessStatus::Started => HealthReport::Unhealthy(format!(
            "{} health probe returned {}",
            info.name(),
            probe
        )),
        _ => HealthReport::Unhealthy(info.description().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_healthy() {
        let info = ProcessInfo::initial("placement");
        let report = evaluate(&info, &HealthResult::unreachable());
        assert_eq!(report, HealthReport::Healthy("disabled".to_string()));
        assert_eq!(report.http_status(), 200);
    }

    #[test]
    fn test_started_uses_probe() {
        let info = ProcessInfo::new("daprd", ProcessStatus::Started, "Process is healthy");

        assert!(evaluate(&info, &HealthResult::from_status(204)).is_healthy());

        let report = evaluate(&info, &HealthResult::from_status(500));
        assert!(!report.is_healthy());
        assert_eq!(report.http_status(), 503);
    }

    #[test]
    fn test_other_states_report_description() {
        let info = ProcessInfo::new("sentry", ProcessStatus::Failed, "Process exited unexpectedly");
        let report = evaluate(&info, &HealthResult::from_status(200));
        assert_eq!(
            report,
            HealthReport::Unhealthy("Process exited unexpectedly".to_string())
        );
    }

    #[test]
    fn test_serializes_tagged() {
        let report = HealthReport::Healthy("disabled".to_string());
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"status":"healthy","description":"disabled"}"#);
    }
}
