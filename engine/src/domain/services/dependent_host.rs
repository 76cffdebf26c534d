//! Dependent process host
//! Delays a host's start until the processes it depends on are running

use crate::constants::process::DEPENDENCY_POLL_INTERVAL_MS;
use crate::domain::ports::OptionsFactory;
use crate::domain::services::process_host::{
    BodyWriter, HostSnapshot, ProcessHost, ProcessStatusSource,
};
use crate::domain::{
    DomainError, HealthResult, ProcessInfo, ProcessOptions, ProcessStatus, Result,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Wraps a host so that `start` first waits for every dependency to be
/// running or disabled. A cancelled wait still starts the wrapped host.
/// All other operations delegate unchanged.
pub struct DependentProcessHost<O: ProcessOptions> {
    inner: Arc<dyn ProcessHost<O>>,
    dependencies: Vec<Arc<dyn ProcessStatusSource>>,
    poll_interval: Duration,
}

impl<O: ProcessOptions> DependentProcessHost<O> {
    pub fn new(
        inner: Arc<dyn ProcessHost<O>>,
        dependencies: Vec<Arc<dyn ProcessStatusSource>>,
    ) -> Result<Self> {
        if dependencies.is_empty() {
            return Err(DomainError::InvalidArgument(
                "a dependent host needs at least one dependency".to_string(),
            ));
        }
        Ok(Self {
            inner,
            dependencies,
            poll_interval: Duration::from_millis(DEPENDENCY_POLL_INTERVAL_MS),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Names of dependencies that are neither running nor disabled
    fn pending(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|d| d.current_info())
            .filter(|info| !info.is_running() && info.status() != ProcessStatus::Disabled)
            .map(|info| info.name().to_string())
            .collect()
    }

    /// `false` when cancelled before every dependency was ready
    async fn wait_for_dependencies(&self, cancel: &CancellationToken) -> bool {
        loop {
            let pending = self.pending();
            if pending.is_empty() {
                return true;
            }
            debug!(pending = ?pending, "Waiting for dependencies");

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.cancelled() => return false,
            }
        }
    }
}

#[async_trait]
impl<O: ProcessOptions> ProcessHost<O> for DependentProcessHost<O> {
    async fn start(&self, factory: Arc<dyn OptionsFactory<O>>, cancel: CancellationToken) {
        if !self.wait_for_dependencies(&cancel).await {
            info!(
                process = %self.inner.process_info().name(),
                pending = ?self.pending(),
                "Dependency wait cancelled, starting anyway"
            );
        }
        self.inner.start(factory, cancel).await;
    }

    async fn stop(&self, cancel: CancellationToken) {
        self.inner.stop(cancel).await;
    }

    async fn restart(&self, cancel: CancellationToken) {
        self.inner.restart(cancel).await;
    }

    async fn refresh(&self, cancel: CancellationToken) {
        self.inner.refresh(cancel).await;
    }

    fn process_info(&self) -> ProcessInfo {
        self.inner.process_info()
    }

    fn process_options(&self) -> Option<O> {
        self.inner.process_options()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<HostSnapshot<O>>> {
        self.inner.subscribe()
    }

    async fn health(&self, cancel: CancellationToken) -> HealthResult {
        self.inner.health(cancel).await
    }

    async fn write_metadata(&self, writer: BodyWriter<'_>, cancel: CancellationToken) -> u64 {
        self.inner.write_metadata(writer, cancel).await
    }

    async fn write_metrics(&self, writer: BodyWriter<'_>, cancel: CancellationToken) -> u64 {
        self.inner.write_metrics(writer, cancel).await
    }
}

impl<O: ProcessOptions> ProcessStatusSource for DependentProcessHost<O> {
    fn current_info(&self) -> ProcessInfo {
        self.inner.process_info()
    }
}
