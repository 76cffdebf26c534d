//! Interceptors
//! Runs lifecycle interceptors in registration order, plus the built-in ones

use crate::domain::ports::ProcessInterceptor;
use crate::domain::{DomainError, ProcessInfo, Result, SidecarOptions};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Notification stages that cannot veto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorStage {
    Started,
    Stopping,
    Stopped,
}

impl fmt::Display for InterceptorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Run every `on_starting` hook; the first error stops the chain
pub fn run_on_starting<O>(
    interceptors: &[Arc<dyn ProcessInterceptor<O>>],
    options: &mut O,
    process_name: &str,
) -> Result<()> {
    for interceptor in interceptors {
        debug!(
            process = %process_name,
            interceptor = %interceptor.name(),
            "Running starting interceptor"
        );
        interceptor.on_starting(options).map_err(|e| {
            warn!(
                process = %process_name,
                interceptor = %interceptor.name(),
                error = %e,
                "Interceptor rejected start"
            );
            match e {
                rejected @ DomainError::InterceptorRejected { .. } => rejected,
                other => DomainError::InterceptorRejected {
                    name: interceptor.name().to_string(),
                    reason: other.to_string(),
                },
            }
        })?;
    }
    Ok(())
}

pub fn notify<O>(
    interceptors: &[Arc<dyn ProcessInterceptor<O>>],
    stage: InterceptorStage,
    info: &ProcessInfo,
) {
    for interceptor in interceptors {
        debug!(
            process = %info.name(),
            interceptor = %interceptor.name(),
            stage = %stage,
            "Notifying interceptor"
        );
        match stage {
            InterceptorStage::Started => interceptor.on_started(info),
            InterceptorStage::Stopping => interceptor.on_stopping(info),
            InterceptorStage::Stopped => interceptor.on_stopped(info),
        }
    }
}

/// Points the sidecar at the control-plane services supervised alongside it.
/// Addresses set explicitly in the sidecar options are left alone.
#[derive(Debug, Clone, Default)]
pub struct ControlPlaneAddresses {
    pub placement: Option<String>,
    pub sentry: Option<String>,
    pub scheduler: Option<String>,
}

impl ControlPlaneAddresses {
    pub fn is_empty(&self) -> bool {
        self.placement.is_none() && self.sentry.is_none() && self.scheduler.is_none()
    }
}

impl ProcessInterceptor<SidecarOptions> for ControlPlaneAddresses {
    fn name(&self) -> &str {
        "control-plane-addresses"
    }

    fn on_starting(&self, options: &mut SidecarOptions) -> Result<()> {
        fill(&mut options.placement_host_address, &self.placement);
        fill(&mut options.sentry_address, &self.sentry);
        fill(&mut options.scheduler_host_address, &self.scheduler);
        Ok(())
    }
}

fn fill(target: &mut Option<String>, value: &Option<String>) {
    if target.as_deref().map_or(true, |t| t.trim().is_empty()) {
        if let Some(value) = value {
            *target = Some(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProcessStatus, SidecarOptions};
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        reject: bool,
    }

    impl ProcessInterceptor<SidecarOptions> for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn on_starting(&self, options: &mut SidecarOptions) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:starting", self.name));
            if self.reject {
                return Err(DomainError::ConfigurationInvalid("no".to_string()));
            }
            options.app_port = Some(8080);
            Ok(())
        }

        fn on_stopped(&self, _info: &ProcessInfo) {
            self.log.lock().unwrap().push(format!("{}:stopped", self.name));
        }
    }

    fn recorder(
        name: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        reject: bool,
    ) -> Arc<dyn ProcessInterceptor<SidecarOptions>> {
        Arc::new(Recorder {
            name,
            log: Arc::clone(log),
            reject,
        })
    }

    #[test]
    fn test_starting_runs_in_order_and_mutates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![recorder("a", &log, false), recorder("b", &log, false)];
        let mut options = SidecarOptions::new("orders");

        run_on_starting(&chain, &mut options, "daprd").unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["a:starting", "b:starting"]);
        assert_eq!(options.app_port, Some(8080));
    }

    #[test]
    fn test_rejection_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![recorder("a", &log, true), recorder("b", &log, false)];
        let mut options = SidecarOptions::new("orders");

        let err = run_on_starting(&chain, &mut options, "daprd").unwrap_err();

        assert!(matches!(err, DomainError::InterceptorRejected { ref name, .. } if name == "a"));
        assert_eq!(*log.lock().unwrap(), vec!["a:starting"]);
    }

    #[test]
    fn test_control_plane_addresses_fill_missing_only() {
        let addresses = ControlPlaneAddresses {
            placement: Some("127.0.0.1:6050".to_string()),
            sentry: Some("127.0.0.1:6052".to_string()),
            scheduler: None,
        };
        let mut options = SidecarOptions::new("orders");
        options.sentry_address = Some("sentry.internal:443".to_string());

        addresses.on_starting(&mut options).unwrap();

        assert_eq!(options.placement_host_address.as_deref(), Some("127.0.0.1:6050"));
        assert_eq!(options.sentry_address.as_deref(), Some("sentry.internal:443"));
        assert_eq!(options.scheduler_host_address, None);
        assert!(!addresses.is_empty());
        assert!(ControlPlaneAddresses::default().is_empty());
    }

    #[test]
    fn test_notify_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![recorder("a", &log, false), recorder("b", &log, false)];
        let info = ProcessInfo::new("daprd", ProcessStatus::Stopped, "Stopped");

        notify(&chain, InterceptorStage::Started, &info);
        notify(&chain, InterceptorStage::Stopped, &info);

        assert_eq!(*log.lock().unwrap(), vec!["a:stopped", "b:stopped"]);
    }
}
