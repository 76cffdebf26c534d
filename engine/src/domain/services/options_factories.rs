//! Options factory implementations

use crate::domain::ports::OptionsFactory;
use crate::domain::{DomainError, Result, SidecarOptions};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Always yields a clone of the same options
#[derive(Debug, Clone)]
pub struct StaticOptions<O>(pub O);

#[async_trait]
impl<O: Clone + Send + Sync> OptionsFactory<O> for StaticOptions<O> {
    async fn resolve(&self, _cancel: &CancellationToken) -> Result<O> {
        Ok(self.0.clone())
    }
}

/// Calls a closure on every start, e.g. to re-read a configuration file
pub struct FnOptionsFactory<F>(pub F);

#[async_trait]
impl<O, F> OptionsFactory<O> for FnOptionsFactory<F>
where
    O: Send + 'static,
    F: Fn() -> Result<O> + Send + Sync,
{
    async fn resolve(&self, _cancel: &CancellationToken) -> Result<O> {
        (self.0)()
    }
}

/// Fills in the sidecar's app port once the hosting application publishes it.
///
/// The web layer sends `Some(port)` on the watch channel when it is listening.
/// If nothing arrives within `timeout` the sidecar starts without an app port.
pub struct AppPortOptionsFactory {
    inner: Arc<dyn OptionsFactory<SidecarOptions>>,
    app_port: watch::Receiver<Option<u16>>,
    timeout: Duration,
}

impl AppPortOptionsFactory {
    pub fn new(
        inner: Arc<dyn OptionsFactory<SidecarOptions>>,
        app_port: watch::Receiver<Option<u16>>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner,
            app_port,
            timeout,
        }
    }

    async fn wait_for_port(&self, cancel: &CancellationToken) -> Result<Option<u16>> {
        let mut rx = self.app_port.clone();
        let wait = async {
            rx.wait_for(|port| port.is_some())
                .await
                .map(|port| *port)
                .ok()
                .flatten()
        };

        tokio::select! {
            port = tokio::time::timeout(self.timeout, wait) => match port {
                Ok(port) => Ok(port),
                Err(_) => {
                    warn!(
                        timeout_ms = self.timeout.as_millis() as u64,
                        "App port was not published in time, starting sidecar without it"
                    );
                    Ok(None)
                }
            },
            _ = cancel.cancelled() => Err(DomainError::Cancelled),
        }
    }
}

#[async_trait]
impl OptionsFactory<SidecarOptions> for AppPortOptionsFactory {
    async fn resolve(&self, cancel: &CancellationToken) -> Result<SidecarOptions> {
        let mut options = self.inner.resolve(cancel).await?;
        if options.app_port.is_some() {
            return Ok(options);
        }

        debug!("Waiting for the application to publish its port");
        if let Some(port) = self.wait_for_port(cancel).await? {
            info!(app_port = port, "Using published application port");
            options.app_port = Some(port);
        }
        Ok(options)
    }
}
