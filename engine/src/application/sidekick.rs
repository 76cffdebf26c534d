//! Sidekick composition root
//!
//! Wires one host per configured Dapr process and drives them as a group:
//! control-plane services first, the sidecar last (and gated on the control
//! plane being up), shutdown in reverse.

use crate::constants::{placement, scheduler, sentry, sidecar};
use crate::domain::ports::{DaprHttpClient, OptionsFactory, ProcessExecutor, ProcessInterceptor};
use crate::domain::services::{
    evaluate, ApiTokenInterceptor, ApiTokenManager, ControlPlaneAddresses, HealthReport,
    ProcessStatusSource, StaticOptions,
};
use crate::domain::{
    DaprProcessHost, DependentProcessHost, DomainError, PlacementOptions, ProcessHost,
    ProcessOptions, ProcessStatusResponse, Result, SchedulerOptions, SentryOptions, SidecarOptions,
};
use crate::infrastructure::SidekickConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A host together with the factory it is (re)started from
struct Managed<O: ProcessOptions> {
    host: Arc<dyn ProcessHost<O>>,
    factory: Arc<dyn OptionsFactory<O>>,
}

impl<O: ProcessOptions> Managed<O> {
    async fn start(&self, cancel: CancellationToken) {
        self.host.start(Arc::clone(&self.factory), cancel).await;
    }

    async fn health(&self, cancel: CancellationToken) -> (String, HealthReport) {
        let info = self.host.process_info();
        let probe = self.host.health(cancel).await;
        (info.name().to_string(), evaluate(&info, &probe))
    }
}

/// Per-process status, absent sections were never configured
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidekickStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<ProcessStatusResponse<PlacementOptions>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentry: Option<ProcessStatusResponse<SentryOptions>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<ProcessStatusResponse<SchedulerOptions>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<ProcessStatusResponse<SidecarOptions>>,
}

/// Aggregated health of every managed process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidekickHealth {
    pub healthy: bool,
    pub processes: BTreeMap<String, HealthReport>,
}

impl SidekickHealth {
    fn from_reports(reports: impl IntoIterator<Item = (String, HealthReport)>) -> Self {
        let processes: BTreeMap<_, _> = reports.into_iter().collect();
        Self {
            healthy: processes.values().all(HealthReport::is_healthy),
            processes,
        }
    }

    pub fn http_status(&self) -> u16 {
        if self.healthy {
            200
        } else {
            503
        }
    }
}

/// Owns every supervised Dapr process of one hosting application
pub struct Sidekick {
    placement: Option<Managed<PlacementOptions>>,
    sentry: Option<Managed<SentryOptions>>,
    scheduler: Option<Managed<SchedulerOptions>>,
    sidecar: Option<Managed<SidecarOptions>>,
    tokens: Arc<ApiTokenManager>,
    http: Arc<dyn DaprHttpClient>,
}

impl Sidekick {
    pub fn builder(
        executor: Arc<dyn ProcessExecutor>,
        http: Arc<dyn DaprHttpClient>,
    ) -> SidekickBuilder {
        SidekickBuilder::new(executor, http)
    }

    /// Start the control plane, then the sidecar.
    ///
    /// Each host publishes its own failures, so this never fails. Cancelling
    /// only cuts waits short; every configured process is still launched.
    pub async fn start_all(&self, cancel: CancellationToken) {
        info!(processes = ?self.process_names(), "Starting Dapr processes");

        if let Some(ref m) = self.placement {
            m.start(cancel.clone()).await;
        }
        if let Some(ref m) = self.sentry {
            m.start(cancel.clone()).await;
        }
        if let Some(ref m) = self.scheduler {
            m.start(cancel.clone()).await;
        }
        if let Some(ref m) = self.sidecar {
            m.start(cancel).await;
        }
    }

    /// Stop in reverse start order
    pub async fn stop_all(&self, cancel: CancellationToken) {
        info!("Stopping Dapr processes");

        if let Some(ref m) = self.sidecar {
            m.host.stop(cancel.clone()).await;
        }
        if let Some(ref m) = self.scheduler {
            m.host.stop(cancel.clone()).await;
        }
        if let Some(ref m) = self.sentry {
            m.host.stop(cancel.clone()).await;
        }
        if let Some(ref m) = self.placement {
            m.host.stop(cancel).await;
        }
        info!("All Dapr processes stopped");
    }

    /// Restart every process whose resolved options changed
    pub async fn refresh_all(&self, cancel: CancellationToken) {
        if let Some(ref m) = self.placement {
            m.host.refresh(cancel.clone()).await;
        }
        if let Some(ref m) = self.sentry {
            m.host.refresh(cancel.clone()).await;
        }
        if let Some(ref m) = self.scheduler {
            m.host.refresh(cancel.clone()).await;
        }
        if let Some(ref m) = self.sidecar {
            m.host.refresh(cancel).await;
        }
    }

    pub fn status(&self) -> SidekickStatus {
        SidekickStatus {
            placement: self.placement.as_ref().map(|m| m.host.status()),
            sentry: self.sentry.as_ref().map(|m| m.host.status()),
            scheduler: self.scheduler.as_ref().map(|m| m.host.status()),
            sidecar: self.sidecar.as_ref().map(|m| m.host.status()),
        }
    }

    pub async fn health(&self, cancel: CancellationToken) -> SidekickHealth {
        let mut reports = Vec::new();
        if let Some(ref m) = self.placement {
            reports.push(m.health(cancel.clone()).await);
        }
        if let Some(ref m) = self.sentry {
            reports.push(m.health(cancel.clone()).await);
        }
        if let Some(ref m) = self.scheduler {
            reports.push(m.health(cancel.clone()).await);
        }
        if let Some(ref m) = self.sidecar {
            reports.push(m.health(cancel).await);
        }
        SidekickHealth::from_reports(reports)
    }

    /// Names of the managed processes, in start order
    pub fn process_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.placement.is_some() {
            names.push(placement::PROCESS_NAME);
        }
        if self.sentry.is_some() {
            names.push(sentry::PROCESS_NAME);
        }
        if self.scheduler.is_some() {
            names.push(scheduler::PROCESS_NAME);
        }
        if self.sidecar.is_some() {
            names.push(sidecar::PROCESS_NAME);
        }
        names
    }

    pub fn sidecar(&self) -> Option<&Arc<dyn ProcessHost<SidecarOptions>>> {
        self.sidecar.as_ref().map(|m| &m.host)
    }

    pub fn placement(&self) -> Option<&Arc<dyn ProcessHost<PlacementOptions>>> {
        self.placement.as_ref().map(|m| &m.host)
    }

    pub fn sentry(&self) -> Option<&Arc<dyn ProcessHost<SentryOptions>>> {
        self.sentry.as_ref().map(|m| &m.host)
    }

    pub fn scheduler(&self) -> Option<&Arc<dyn ProcessHost<SchedulerOptions>>> {
        self.scheduler.as_ref().map(|m| &m.host)
    }

    pub fn tokens(&self) -> &Arc<ApiTokenManager> {
        &self.tokens
    }

    pub fn http_client(&self) -> &Arc<dyn DaprHttpClient> {
        &self.http
    }
}

pub struct SidekickBuilder {
    executor: Arc<dyn ProcessExecutor>,
    http: Arc<dyn DaprHttpClient>,
    tokens: Option<Arc<ApiTokenManager>>,
    placement: Option<Arc<dyn OptionsFactory<PlacementOptions>>>,
    sentry: Option<Arc<dyn OptionsFactory<SentryOptions>>>,
    scheduler: Option<Arc<dyn OptionsFactory<SchedulerOptions>>>,
    sidecar: Option<Arc<dyn OptionsFactory<SidecarOptions>>>,
    addresses: ControlPlaneAddresses,
    sidecar_interceptors: Vec<Arc<dyn ProcessInterceptor<SidecarOptions>>>,
    dependency_poll_interval: Option<Duration>,
}

impl SidekickBuilder {
    pub fn new(executor: Arc<dyn ProcessExecutor>, http: Arc<dyn DaprHttpClient>) -> Self {
        Self {
            executor,
            http,
            tokens: None,
            placement: None,
            sentry: None,
            scheduler: None,
            sidecar: None,
            addresses: ControlPlaneAddresses::default(),
            sidecar_interceptors: Vec::new(),
            dependency_poll_interval: None,
        }
    }

    /// Use static options for every section present in `config`.
    ///
    /// Enabled control-plane sections also provide the addresses the sidecar
    /// connects to, unless the sidecar section sets them itself.
    pub fn from_config(mut self, config: SidekickConfig) -> Self {
        if let Some(options) = config.placement {
            if options.common.enabled {
                self.addresses.placement = Some(options.host_address());
            }
            self = self.placement(Arc::new(StaticOptions(options)));
        }
        if let Some(options) = config.sentry {
            if options.common.enabled {
                self.addresses.sentry = Some(options.address());
            }
            self = self.sentry(Arc::new(StaticOptions(options)));
        }
        if let Some(options) = config.scheduler {
            if options.common.enabled {
                self.addresses.scheduler = Some(options.host_address());
            }
            self = self.scheduler(Arc::new(StaticOptions(options)));
        }
        if let Some(options) = config.sidecar {
            self = self.sidecar(Arc::new(StaticOptions(options)));
        }
        self
    }

    pub fn tokens(mut self, tokens: Arc<ApiTokenManager>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn placement(mut self, factory: Arc<dyn OptionsFactory<PlacementOptions>>) -> Self {
        self.placement = Some(factory);
        self
    }

    pub fn sentry(mut self, factory: Arc<dyn OptionsFactory<SentryOptions>>) -> Self {
        self.sentry = Some(factory);
        self
    }

    pub fn scheduler(mut self, factory: Arc<dyn OptionsFactory<SchedulerOptions>>) -> Self {
        self.scheduler = Some(factory);
        self
    }

    pub fn sidecar(mut self, factory: Arc<dyn OptionsFactory<SidecarOptions>>) -> Self {
        self.sidecar = Some(factory);
        self
    }

    pub fn control_plane_addresses(mut self, addresses: ControlPlaneAddresses) -> Self {
        self.addresses = addresses;
        self
    }

    /// Runs after the built-in token and address interceptors
    pub fn sidecar_interceptor(
        mut self,
        interceptor: Arc<dyn ProcessInterceptor<SidecarOptions>>,
    ) -> Self {
        self.sidecar_interceptors.push(interceptor);
        self
    }

    pub fn dependency_poll_interval(mut self, interval: Duration) -> Self {
        self.dependency_poll_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<Sidekick> {
        if self.placement.is_none()
            && self.sentry.is_none()
            && self.scheduler.is_none()
            && self.sidecar.is_none()
        {
            return Err(DomainError::InvalidArgument(
                "at least one process must be configured".to_string(),
            ));
        }

        let tokens = self.tokens.unwrap_or_default();
        let mut dependencies: Vec<Arc<dyn ProcessStatusSource>> = Vec::new();

        let placement = match self.placement {
            Some(factory) => {
                let host = Arc::new(DaprProcessHost::<PlacementOptions>::new(
                    placement::PROCESS_NAME,
                    Arc::clone(&self.executor),
                    Arc::clone(&self.http),
                )?);
                dependencies.push(host.clone());
                Some(Managed { host, factory })
            }
            None => None,
        };

        let sentry = match self.sentry {
            Some(factory) => {
                let host = Arc::new(DaprProcessHost::<SentryOptions>::new(
                    sentry::PROCESS_NAME,
                    Arc::clone(&self.executor),
                    Arc::clone(&self.http),
                )?);
                dependencies.push(host.clone());
                Some(Managed { host, factory })
            }
            None => None,
        };

        let scheduler = match self.scheduler {
            Some(factory) => {
                let host = Arc::new(DaprProcessHost::<SchedulerOptions>::new(
                    scheduler::PROCESS_NAME,
                    Arc::clone(&self.executor),
                    Arc::clone(&self.http),
                )?);
                dependencies.push(host.clone());
                Some(Managed { host, factory })
            }
            None => None,
        };

        let sidecar = match self.sidecar {
            Some(factory) => {
                let mut builder = DaprProcessHost::<SidecarOptions>::builder(
                    sidecar::PROCESS_NAME,
                    Arc::clone(&self.executor),
                    Arc::clone(&self.http),
                )
                .interceptor(Arc::new(ApiTokenInterceptor::new(Arc::clone(&tokens))));
                if !self.addresses.is_empty() {
                    builder = builder.interceptor(Arc::new(self.addresses.clone()));
                }
                for interceptor in self.sidecar_interceptors {
                    builder = builder.interceptor(interceptor);
                }
                let base: Arc<dyn ProcessHost<SidecarOptions>> = Arc::new(builder.build()?);

                let host: Arc<dyn ProcessHost<SidecarOptions>> = if dependencies.is_empty() {
                    base
                } else {
                    debug!(
                        dependencies = dependencies.len(),
                        "Sidecar start gated on control-plane services"
                    );
                    let mut dependent = DependentProcessHost::new(base, dependencies)?;
                    if let Some(interval) = self.dependency_poll_interval {
                        dependent = dependent.with_poll_interval(interval);
                    }
                    Arc::new(dependent)
                };
                Some(Managed { host, factory })
            }
            None => None,
        };

        Ok(Sidekick {
            placement,
            sentry,
            scheduler,
            sidecar,
            tokens,
            http: self.http,
        })
    }
}
