//! Process host
//!
//! `DaprProcessHost` supervises exactly one logical child process. It resolves
//! options through a factory on every start, lets interceptors adjust them,
//! spawns through the `ProcessExecutor` port and then keeps the published
//! `ProcessInfo` snapshot current from background tasks (readiness poll, exit
//! watcher, version detection).
//!
//! All transitions are serialized by one async mutex. Snapshots are published
//! on a `watch` channel so readers never wait on a transition. Every start and
//! stop opens a new generation; background tasks carry the generation they
//! were spawned for and drop their update when it is no longer current.

use crate::constants::process::{DEFAULT_WAIT_FOR_SHUTDOWN_SEC, FORCE_KILL_WAIT_SEC};
use crate::domain::ports::{
    DaprHttpClient, ManagedProcess, OptionsFactory, ProcessExecutor, ProcessInterceptor,
    ResponseBody, SpawnConfig,
};
use crate::domain::services::interceptors::{self, InterceptorStage};
use crate::domain::services::metrics_enrichment::enrich_line;
use crate::domain::services::process_output::LoggingOutputHandler;
use crate::domain::{
    DomainError, HealthResult, ProcessInfo, ProcessOptions, ProcessStatus, Result,
};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Writer handed to the metadata and metrics proxies
pub type BodyWriter<'a> = &'a mut (dyn AsyncWrite + Send + Unpin);

/// Published on every transition
#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot<O> {
    pub info: ProcessInfo,
    /// Options the current (or last) process was started with
    pub options: Option<O>,
}

/// Status endpoint payload for one process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStatusResponse<O> {
    pub process: ProcessInfo,
    pub options: Option<O>,
}

/// Anything whose lifecycle status another host can wait on
pub trait ProcessStatusSource: Send + Sync {
    fn current_info(&self) -> ProcessInfo;
}

/// Lifecycle operations of a supervised process.
///
/// `start` and `stop` never return errors: faults end up in the published
/// `ProcessInfo` as `Failed` with a description.
#[async_trait]
pub trait ProcessHost<O: ProcessOptions>: Send + Sync {
    async fn start(&self, factory: Arc<dyn OptionsFactory<O>>, cancel: CancellationToken);

    async fn stop(&self, cancel: CancellationToken);

    /// Stop, then start again with the last factory
    async fn restart(&self, cancel: CancellationToken);

    /// Re-resolve options and restart only when they changed
    async fn refresh(&self, cancel: CancellationToken);

    fn process_info(&self) -> ProcessInfo;

    fn process_options(&self) -> Option<O>;

    fn subscribe(&self) -> watch::Receiver<Arc<HostSnapshot<O>>>;

    async fn health(&self, cancel: CancellationToken) -> HealthResult;

    /// Copy the metadata endpoint body into `writer`, returning bytes written
    async fn write_metadata(&self, writer: BodyWriter<'_>, cancel: CancellationToken) -> u64;

    /// Copy the metrics endpoint body into `writer` with labels added
    async fn write_metrics(&self, writer: BodyWriter<'_>, cancel: CancellationToken) -> u64;

    fn status(&self) -> ProcessStatusResponse<O> {
        ProcessStatusResponse {
            process: self.process_info(),
            options: self.process_options(),
        }
    }
}

struct HostState<O> {
    generation: u64,
    generation_token: CancellationToken,
    process: Option<Arc<dyn ManagedProcess>>,
    factory: Option<Arc<dyn OptionsFactory<O>>>,
    /// Factory output before interceptors ran, compared on refresh
    resolved: Option<O>,
}

impl<O> HostState<O> {
    /// Invalidate every background task of the previous generation
    fn begin_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation_token.cancel();
        self.generation_token = CancellationToken::new();
        self.generation
    }
}

struct HostInner<O: ProcessOptions> {
    name: String,
    executor: Arc<dyn ProcessExecutor>,
    http: Arc<dyn DaprHttpClient>,
    interceptors: Vec<Arc<dyn ProcessInterceptor<O>>>,
    state: Mutex<HostState<O>>,
    snapshot: watch::Sender<Arc<HostSnapshot<O>>>,
}

/// Supervisor for one Dapr process kind
pub struct DaprProcessHost<O: ProcessOptions> {
    inner: Arc<HostInner<O>>,
}

impl<O: ProcessOptions> Clone for DaprProcessHost<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub struct ProcessHostBuilder<O: ProcessOptions> {
    name: String,
    executor: Arc<dyn ProcessExecutor>,
    http: Arc<dyn DaprHttpClient>,
    interceptors: Vec<Arc<dyn ProcessInterceptor<O>>>,
}

impl<O: ProcessOptions> ProcessHostBuilder<O> {
    /// Interceptors run in the order they are added
    pub fn interceptor(mut self, interceptor: Arc<dyn ProcessInterceptor<O>>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> Result<DaprProcessHost<O>> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidArgument(
                "process host name must not be empty".to_string(),
            ));
        }

        let (snapshot, _) = watch::channel(Arc::new(HostSnapshot {
            info: ProcessInfo::initial(&self.name),
            options: None,
        }));

        Ok(DaprProcessHost {
            inner: Arc::new(HostInner {
                name: self.name,
                executor: self.executor,
                http: self.http,
                interceptors: self.interceptors,
                state: Mutex::new(HostState {
                    generation: 0,
                    generation_token: CancellationToken::new(),
                    process: None,
                    factory: None,
                    resolved: None,
                }),
                snapshot,
            }),
        })
    }
}

impl<O: ProcessOptions> DaprProcessHost<O> {
    pub fn builder(
        name: impl Into<String>,
        executor: Arc<dyn ProcessExecutor>,
        http: Arc<dyn DaprHttpClient>,
    ) -> ProcessHostBuilder<O> {
        ProcessHostBuilder {
            name: name.into(),
            executor,
            http,
            interceptors: Vec::new(),
        }
    }

    pub fn new(
        name: impl Into<String>,
        executor: Arc<dyn ProcessExecutor>,
        http: Arc<dyn DaprHttpClient>,
    ) -> Result<Self> {
        Self::builder(name, executor, http).build()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl<O: ProcessOptions> HostInner<O> {
    fn current(&self) -> Arc<HostSnapshot<O>> {
        Arc::clone(&self.snapshot.borrow())
    }

    fn publish(&self, info: ProcessInfo, options: Option<O>) {
        let previous = self.current().info.status();
        let next = info.status();
        if previous != next && !previous.can_transition_to(next) {
            let e = DomainError::InvalidStateTransition {
                from: previous.to_string(),
                to: next.to_string(),
            };
            warn!(process = %self.name, error = %e, "Unexpected lifecycle transition");
        }
        debug!(process = %self.name, status = %next, description = %info.description(), "Publishing process info");
        self.snapshot
            .send_replace(Arc::new(HostSnapshot { info, options }));
    }

    fn publish_info(&self, info: ProcessInfo) {
        let options = self.current().options.clone();
        self.publish(info, options);
    }

    fn fail(&self, description: String, options: Option<O>) {
        error!(process = %self.name, "{}", description);
        self.publish(
            ProcessInfo::new(&self.name, ProcessStatus::Failed, description),
            options,
        );
    }

    // Boxed so the restart path in `watch_exit` can call back into `start`
    fn start(
        self: Arc<Self>,
        factory: Arc<dyn OptionsFactory<O>>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let (generation, generation_token) = {
                let mut state = self.state.lock().await;
                let current = self.current();
                if current.info.status().is_active() {
                    debug!(
                        process = %self.name,
                        status = %current.info.status(),
                        "Process already active, ignoring start"
                    );
                    return;
                }
                let generation = state.begin_generation();
                state.factory = Some(Arc::clone(&factory));
                state.process = None;
                self.publish(
                    ProcessInfo::new(&self.name, ProcessStatus::Starting, "Resolving options"),
                    current.options.clone(),
                );
                (generation, state.generation_token.clone())
            };
            info!(process = %self.name, generation = generation, "Starting process");

            let resolved = tokio::select! {
                resolved = factory.resolve(&cancel) => resolved,
                _ = generation_token.cancelled() => Err(DomainError::Cancelled),
            };

            let mut state = self.state.lock().await;
            if state.generation != generation {
                debug!(process = %self.name, "Start superseded by a newer transition");
                return;
            }

            let mut options = match resolved {
                Ok(options) => options,
                Err(e) => {
                    self.fail(format!("Failed to resolve options: {}", e), None);
                    return;
                }
            };
            state.resolved = Some(options.clone());

            if let Some(reason) = options.disabled_reason() {
                info!(process = %self.name, reason = %reason, "Process disabled, not spawning");
                self.publish(
                    ProcessInfo::new(&self.name, ProcessStatus::Disabled, reason),
                    Some(options),
                );
                return;
            }

            if let Err(e) = interceptors::run_on_starting(&self.interceptors, &mut options, &self.name)
            {
                self.fail(format!("Failed to start: {}", e), Some(options));
                return;
            }

            let (version_tx, version_rx) = mpsc::unbounded_channel();
            let output = Arc::new(LoggingOutputHandler::new(self.name.clone(), version_tx));
            let config = SpawnConfig::from_options(&options).with_output(output);
            debug!(
                process = %self.name,
                command = %config.command.display(),
                args = ?config.args,
                env = ?config.env_vars.keys().collect::<Vec<_>>(),
                "Spawning process"
            );

            let process = match self.executor.spawn(config).await {
                Ok(process) => process,
                Err(e) => {
                    self.fail(format!("Failed to start: {}", e), Some(options));
                    return;
                }
            };

            let pid = process.pid();
            state.process = Some(Arc::clone(&process));
            let started = ProcessInfo::new(
                &self.name,
                ProcessStatus::Started,
                "Process started, waiting for readiness",
            )
            .with_pid(Some(pid));
            self.publish(started.clone(), Some(options.clone()));
            info!(process = %self.name, pid = pid, "Process started");
            interceptors::notify(&self.interceptors, InterceptorStage::Started, &started);
            drop(state);

            tokio::spawn(Arc::clone(&self).watch_exit(
                generation,
                Arc::clone(&process),
                generation_token.clone(),
            ));
            tokio::spawn(Arc::clone(&self).track_version(
                generation,
                version_rx,
                generation_token.clone(),
            ));
            tokio::spawn(self.wait_for_readiness(generation, options, process, cancel, generation_token));
        })
    }

    async fn stop(&self, cancel: CancellationToken) {
        let mut state = self.state.lock().await;
        // Also cancels a pending delayed restart
        state.begin_generation();

        let current = self.current();
        if !current.info.status().can_stop() {
            debug!(
                process = %self.name,
                status = %current.info.status(),
                "Process not running, nothing to stop"
            );
            return;
        }

        let stopping = current
            .info
            .transition(ProcessStatus::Stopping, "Stopping process");
        self.publish_info(stopping.clone());
        info!(process = %self.name, pid = ?stopping.pid(), "Stopping process");
        interceptors::notify(&self.interceptors, InterceptorStage::Stopping, &stopping);

        let description = match state.process.take() {
            Some(process) => {
                self.shutdown(process, current.options.as_ref(), &cancel)
                    .await
            }
            None => "Stopped before the process was spawned".to_string(),
        };

        let stopped = stopping
            .transition(ProcessStatus::Stopped, description)
            .with_pid(None);
        self.publish_info(stopped.clone());
        interceptors::notify(&self.interceptors, InterceptorStage::Stopped, &stopped);
        info!(process = %self.name, "Process stopped");
    }

    /// Graceful request, bounded wait, then a single forced kill
    async fn shutdown(
        &self,
        process: Arc<dyn ManagedProcess>,
        options: Option<&O>,
        cancel: &CancellationToken,
    ) -> String {
        if !process.is_running() {
            return "Process had already exited".to_string();
        }

        let wait = options
            .map(|o| o.wait_for_shutdown())
            .unwrap_or(Duration::from_secs(DEFAULT_WAIT_FOR_SHUTDOWN_SEC));
        self.request_shutdown(process.as_ref(), options, cancel).await;

        let reason = tokio::select! {
            exit = process.wait_for_exit() => {
                debug!(process = %self.name, exit_code = ?exit.code, "Process exited gracefully");
                return "Process stopped".to_string();
            }
            _ = tokio::time::sleep(wait) => {
                DomainError::GracefulShutdownTimeout(wait.as_secs()).to_string()
            }
            _ = cancel.cancelled() => "Stop cancelled".to_string(),
        };

        warn!(
            process = %self.name,
            pid = process.pid(),
            reason = %reason,
            "Forcing process kill"
        );
        if let Err(e) = process.kill() {
            error!(process = %self.name, pid = process.pid(), error = %e, "Failed to kill process");
        }
        let force_wait = Duration::from_secs(FORCE_KILL_WAIT_SEC);
        if tokio::time::timeout(force_wait, process.wait_for_exit())
            .await
            .is_err()
        {
            error!(
                process = %self.name,
                pid = process.pid(),
                "Process still running after kill"
            );
        }
        format!("Process killed: {}", reason)
    }

    async fn request_shutdown(
        &self,
        process: &dyn ManagedProcess,
        options: Option<&O>,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() {
            debug!(process = %self.name, "Stop already cancelled, skipping graceful request");
            return;
        }

        if let Some(uri) = options.and_then(|o| o.shutdown_uri()) {
            let token = options.and_then(|o| o.api_token());
            let posted = tokio::select! {
                posted = self.http.post(&uri, token) => posted,
                _ = cancel.cancelled() => {
                    debug!(process = %self.name, "Stop cancelled during shutdown request");
                    return;
                }
            };
            match posted {
                Ok(status) if (200..300).contains(&status) => {
                    debug!(process = %self.name, status = status, "Shutdown request accepted");
                    return;
                }
                Ok(status) => warn!(
                    process = %self.name,
                    status = status,
                    "Shutdown request rejected, sending termination signal"
                ),
                Err(e) => warn!(
                    process = %self.name,
                    error = %e,
                    "Shutdown request failed, sending termination signal"
                ),
            }
        }

        if let Err(e) = process.terminate() {
            warn!(process = %self.name, error = %e, "Failed to send termination signal");
        }
    }

    async fn restart(self: &Arc<Self>, cancel: CancellationToken) {
        let factory = self.state.lock().await.factory.clone();
        self.stop(cancel.clone()).await;
        match factory {
            Some(factory) => Arc::clone(self).start(factory, cancel).await,
            None => debug!(process = %self.name, "Never started, nothing to restart"),
        }
    }

    async fn refresh(self: &Arc<Self>, cancel: CancellationToken) {
        let (factory, running) = {
            let state = self.state.lock().await;
            (state.factory.clone(), state.resolved.clone())
        };
        let Some(factory) = factory else {
            debug!(process = %self.name, "Never started, nothing to refresh");
            return;
        };
        if !self.current().info.status().is_active() {
            debug!(process = %self.name, "Process not active, skipping refresh");
            return;
        }

        let resolved = match factory.resolve(&cancel).await {
            Ok(options) => options,
            Err(e) => {
                warn!(process = %self.name, error = %e, "Failed to resolve options for refresh");
                return;
            }
        };
        if running.as_ref() == Some(&resolved) {
            debug!(process = %self.name, "Options unchanged");
            return;
        }

        info!(process = %self.name, "Options changed, restarting process");
        self.stop(cancel.clone()).await;
        Arc::clone(self).start(factory, cancel).await;
    }

    async fn wait_for_readiness(
        self: Arc<Self>,
        generation: u64,
        options: O,
        process: Arc<dyn ManagedProcess>,
        cancel: CancellationToken,
        generation_token: CancellationToken,
    ) {
        let uri = options.health_uri();
        let interval = options.health_poll_interval();
        let timeout = options.startup_timeout();
        let deadline = Instant::now() + timeout;

        loop {
            // The exit watcher reports the failure
            if !process.is_running() {
                return;
            }

            let probe = tokio::select! {
                probe = self.http.check_health(&uri) => probe,
                _ = cancel.cancelled() => {
                    self.readiness_cancelled(generation).await;
                    return;
                }
                _ = generation_token.cancelled() => return,
            };

            if probe.is_healthy() {
                if self.update_started(generation, "Process is healthy").await {
                    info!(process = %self.name, pid = process.pid(), "Process is ready");
                }
                return;
            }

            if Instant::now() >= deadline {
                let e = DomainError::HealthCheckFailure(format!("last probe {}", probe));
                warn!(
                    process = %self.name,
                    timeout_secs = timeout.as_secs(),
                    error = %e,
                    "Process did not become healthy in time"
                );
                self.update_started(
                    generation,
                    format!("Process did not report healthy within {}s", timeout.as_secs()),
                )
                .await;
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => {
                    self.readiness_cancelled(generation).await;
                    return;
                }
                _ = generation_token.cancelled() => return,
            }
        }
    }

    async fn readiness_cancelled(&self, generation: u64) {
        debug!(process = %self.name, "Readiness wait cancelled, process left running");
        self.update_started(generation, "Readiness wait cancelled")
            .await;
    }

    /// Replace the description while the process is still `Started` in `generation`
    async fn update_started(&self, generation: u64, description: impl Into<String>) -> bool {
        let state = self.state.lock().await;
        let current = self.current();
        if state.generation != generation || current.info.status() != ProcessStatus::Started {
            debug!(process = %self.name, generation = generation, "Dropping stale readiness update");
            return false;
        }
        self.publish_info(current.info.transition(ProcessStatus::Started, description));
        true
    }

    async fn watch_exit(
        self: Arc<Self>,
        generation: u64,
        process: Arc<dyn ManagedProcess>,
        generation_token: CancellationToken,
    ) {
        let exit = tokio::select! {
            exit = process.wait_for_exit() => exit,
            _ = generation_token.cancelled() => return,
        };

        let (factory, delay) = {
            let mut state = self.state.lock().await;
            let current = self.current();
            if state.generation != generation || !current.info.status().is_active() {
                return;
            }
            state.process = None;
            let e = DomainError::UnexpectedProcessExit(exit.code);
            error!(
                process = %self.name,
                pid = process.pid(),
                exit_code = ?exit.code,
                "Process exited unexpectedly"
            );
            self.publish_info(current.info.transition(ProcessStatus::Failed, e.to_string()));
            (
                state.factory.clone(),
                current.options.as_ref().and_then(|o| o.restart_after()),
            )
        };

        let (Some(factory), Some(delay)) = (factory, delay) else {
            return;
        };
        info!(
            process = %self.name,
            delay_ms = delay.as_millis() as u64,
            "Scheduling restart"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = generation_token.cancelled() => return,
        }
        if self.state.lock().await.generation != generation {
            return;
        }
        self.start(factory, CancellationToken::new()).await;
    }

    async fn track_version(
        self: Arc<Self>,
        generation: u64,
        mut versions: mpsc::UnboundedReceiver<String>,
        generation_token: CancellationToken,
    ) {
        let version = tokio::select! {
            version = versions.recv() => version,
            _ = generation_token.cancelled() => None,
        };
        let Some(version) = version else {
            return;
        };

        let state = self.state.lock().await;
        if state.generation != generation {
            return;
        }
        info!(process = %self.name, version = %version, "Detected runtime version");
        let current = self.current();
        self.publish_info(current.info.clone().with_version(Some(version)));
    }

    async fn health(&self, cancel: CancellationToken) -> HealthResult {
        let current = self.current();
        let uri = match current.options.as_ref() {
            Some(options) if current.info.status().is_active() => options.health_uri(),
            _ => return HealthResult::unreachable(),
        };
        tokio::select! {
            result = self.http.check_health(&uri) => result,
            _ = cancel.cancelled() => HealthResult::unreachable(),
        }
    }

    /// Options of a `Started` process
    fn running_options(&self) -> Option<O> {
        let current = self.current();
        if current.info.is_running() {
            current.options.clone()
        } else {
            None
        }
    }

    async fn open(&self, uri: &str, options: &O, cancel: &CancellationToken) -> Option<ResponseBody> {
        let body = tokio::select! {
            body = self.http.get_stream(uri, options.api_token()) => body,
            _ = cancel.cancelled() => return None,
        };
        match body {
            Ok(body) => Some(body),
            Err(e) => {
                debug!(process = %self.name, error = %e, "Endpoint unavailable");
                None
            }
        }
    }

    async fn write_metadata(&self, writer: BodyWriter<'_>, cancel: CancellationToken) -> u64 {
        let Some(options) = self.running_options() else {
            return 0;
        };
        let Some(uri) = options.metadata_uri() else {
            return 0;
        };
        let Some(mut body) = self.open(&uri, &options, &cancel).await else {
            return 0;
        };

        let mut buf = vec![0u8; 8 * 1024];
        let mut written = 0u64;
        loop {
            let read = tokio::select! {
                read = body.read(&mut buf) => read,
                _ = cancel.cancelled() => break,
            };
            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!(process = %self.name, error = %e, "Metadata read failed");
                    break;
                }
            };
            if let Err(e) = writer.write_all(&buf[..n]).await {
                debug!(process = %self.name, error = %e, "Metadata write failed");
                break;
            }
            written += n as u64;
        }
        if let Err(e) = writer.flush().await {
            debug!(process = %self.name, error = %e, "Metadata flush failed");
        }
        written
    }

    async fn write_metrics(&self, writer: BodyWriter<'_>, cancel: CancellationToken) -> u64 {
        let Some(options) = self.running_options() else {
            return 0;
        };
        let Some(uri) = options.metrics_uri() else {
            return 0;
        };
        let Some(body) = self.open(&uri, &options, &cancel).await else {
            return 0;
        };

        let labels = options.metric_labels();
        let mut lines = BufReader::new(body).lines();
        let mut written = 0u64;
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = cancel.cancelled() => break,
            };
            let mut line = match line {
                Ok(Some(line)) => enrich_line(&line, labels),
                Ok(None) => break,
                Err(e) => {
                    debug!(process = %self.name, error = %e, "Metrics read failed");
                    break;
                }
            };
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                debug!(process = %self.name, error = %e, "Metrics write failed");
                break;
            }
            written += line.len() as u64;
        }
        if let Err(e) = writer.flush().await {
            debug!(process = %self.name, error = %e, "Metrics flush failed");
        }
        written
    }
}

#[async_trait]
impl<O: ProcessOptions> ProcessHost<O> for DaprProcessHost<O> {
    async fn start(&self, factory: Arc<dyn OptionsFactory<O>>, cancel: CancellationToken) {
        Arc::clone(&self.inner).start(factory, cancel).await;
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
        self.inner.current().info.clone()
    }

    fn process_options(&self) -> Option<O> {
        self.inner.current().options.clone()
    }

    fn subscribe(&self) -> watch::Receiver<Arc<HostSnapshot<O>>> {
        self.inner.snapshot.subscribe()
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

impl<O: ProcessOptions> ProcessStatusSource for DaprProcessHost<O> {
    fn current_info(&self) -> ProcessInfo {
        self.inner.current().info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockHttpClient, MockProcessExecutor, TerminateBehavior};
    use crate::domain::services::options_factories::StaticOptions;
    use crate::domain::{PlacementOptions, SidecarOptions};

    fn sidecar_host(
        executor: &Arc<MockProcessExecutor>,
        http: &Arc<MockHttpClient>,
    ) -> DaprProcessHost<SidecarOptions> {
        DaprProcessHost::new("daprd", executor.clone(), http.clone()).unwrap()
    }

    fn sidecar_factory(options: SidecarOptions) -> Arc<dyn OptionsFactory<SidecarOptions>> {
        Arc::new(StaticOptions(options))
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let result = DaprProcessHost::<SidecarOptions>::new(
            " ",
            Arc::new(MockProcessExecutor::new()),
            Arc::new(MockHttpClient::new()),
        );
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_initial_state() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        let info = host.process_info();
        assert_eq!(info.status(), ProcessStatus::Disabled);
        assert!(!info.is_running());
        assert!(host.process_options().is_none());
        assert!(!host.health(CancellationToken::new()).await.is_healthy());
    }

    #[tokio::test]
    async fn test_start_spawns_once_and_becomes_ready() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);
        let factory = sidecar_factory(SidecarOptions::new("orders"));

        host.start(factory.clone(), CancellationToken::new()).await;
        host.start(factory, CancellationToken::new()).await;

        assert_eq!(executor.spawn_count(), 1);
        let info = host.process_info();
        assert!(info.is_running());
        assert_eq!(info.pid(), Some(1000));

        wait_until(|| host.process_info().description() == "Process is healthy").await;
    }

    #[tokio::test]
    async fn test_disabled_options_do_not_spawn() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        host.start(sidecar_factory(SidecarOptions::default()), CancellationToken::new())
            .await;

        assert_eq!(executor.spawn_count(), 0);
        let info = host.process_info();
        assert_eq!(info.status(), ProcessStatus::Disabled);
        assert_eq!(info.description(), "Sidecar requires an app_id");
        assert!(host.process_options().is_some());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_captured() {
        let executor = Arc::new(MockProcessExecutor::new());
        executor.set_fail_spawn(true);
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;

        let info = host.process_info();
        assert_eq!(info.status(), ProcessStatus::Failed);
        assert!(info.description().contains("mock spawn failure"));
    }

    #[tokio::test]
    async fn test_stop_when_never_started_is_noop() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        host.stop(CancellationToken::new()).await;

        assert_eq!(host.process_info().status(), ProcessStatus::Disabled);
        assert!(http.posts().is_empty());
    }

    #[tokio::test]
    async fn test_graceful_stop_posts_shutdown() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;
        let process = executor.last_process().unwrap();
        let exiting = process.clone();
        http.on_post(move |_| exiting.exit_with(Some(0)));

        host.stop(CancellationToken::new()).await;

        let posts = http.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "http://127.0.0.1:3500/v1.0/shutdown");
        assert_eq!(process.kill_calls(), 0);
        assert_eq!(process.terminate_calls(), 0);
        let info = host.process_info();
        assert_eq!(info.status(), ProcessStatus::Stopped);
        assert_eq!(info.pid(), None);
    }

    #[tokio::test]
    async fn test_stop_without_shutdown_uri_terminates() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        let host: DaprProcessHost<PlacementOptions> =
            DaprProcessHost::new("placement", executor.clone(), http.clone()).unwrap();

        host.start(
            Arc::new(StaticOptions(PlacementOptions::default())),
            CancellationToken::new(),
        )
        .await;
        host.stop(CancellationToken::new()).await;

        let process = executor.last_process().unwrap();
        assert_eq!(process.terminate_calls(), 1);
        assert_eq!(process.kill_calls(), 0);
        assert!(http.posts().is_empty());
        assert_eq!(host.process_info().status(), ProcessStatus::Stopped);
    }

    #[tokio::test]
    async fn test_stop_timeout_kills_exactly_once() {
        let executor = Arc::new(MockProcessExecutor::new());
        executor.set_terminate_behavior(TerminateBehavior::Ignore);
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        let mut options = SidecarOptions::new("orders");
        options.common.wait_for_shutdown_seconds = Some(0);
        host.start(sidecar_factory(options), CancellationToken::new())
            .await;
        host.stop(CancellationToken::new()).await;

        let process = executor.last_process().unwrap();
        assert_eq!(process.kill_calls(), 1);
        let info = host.process_info();
        assert_eq!(info.status(), ProcessStatus::Stopped);
        assert!(info.description().starts_with("Process killed"));
    }

    #[tokio::test]
    async fn test_cancelled_stop_kills() {
        let executor = Arc::new(MockProcessExecutor::new());
        executor.set_terminate_behavior(TerminateBehavior::Ignore);
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        host.stop(cancel).await;

        let process = executor.last_process().unwrap();
        assert_eq!(process.kill_calls(), 1);
        assert!(http.posts().is_empty());
        assert_eq!(host.process_info().status(), ProcessStatus::Stopped);
    }

    #[tokio::test]
    async fn test_cancel_abandons_slow_shutdown_request() {
        let executor = Arc::new(MockProcessExecutor::new());
        executor.set_terminate_behavior(TerminateBehavior::Ignore);
        let http = Arc::new(MockHttpClient::new());
        http.set_post_delay(Duration::from_secs(3));
        let host = sidecar_host(&executor, &http);

        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let began = std::time::Instant::now();
        host.stop(cancel).await;

        assert!(began.elapsed() < Duration::from_secs(1), "{:?}", began.elapsed());
        assert_eq!(http.posts().len(), 1);
        let process = executor.last_process().unwrap();
        assert_eq!(process.kill_calls(), 1);
        assert_eq!(process.terminate_calls(), 0);
        let info = host.process_info();
        assert_eq!(info.status(), ProcessStatus::Stopped);
        assert_eq!(info.description(), "Process killed: Stop cancelled");
    }

    #[tokio::test]
    async fn test_unexpected_exit_fails() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;
        executor.last_process().unwrap().exit_with(Some(3));

        wait_until(|| host.process_info().status() == ProcessStatus::Failed).await;
        assert!(host.process_info().description().contains("exit code: 3"));
        assert_eq!(executor.spawn_count(), 1);
    }

    #[tokio::test]
    async fn test_version_detected_from_output() {
        let executor = Arc::new(MockProcessExecutor::new());
        executor.set_output_lines(vec![
            r#"{"level":"info","msg":"starting Dapr Runtime -- version 1.14.4 -- commit abc"}"#
                .to_string(),
        ]);
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);

        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;

        wait_until(|| host.process_info().version() == Some("1.14.4")).await;
        assert!(host.process_info().is_running());
    }

    #[tokio::test]
    async fn test_write_metadata_streams_body() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        http.set_body("http://127.0.0.1:3500/v1.0/metadata", r#"{"id":"orders"}"#);
        let host = sidecar_host(&executor, &http);

        let mut out = Vec::new();
        assert_eq!(host.write_metadata(&mut out, CancellationToken::new()).await, 0);

        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;
        let written = host.write_metadata(&mut out, CancellationToken::new()).await;

        assert_eq!(written, 15);
        assert_eq!(out, br#"{"id":"orders"}"#);
    }

    /// Accepts writes, refuses to flush
    struct UnflushableWriter(Vec<u8>);

    impl AsyncWrite for UnflushableWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.0.extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_flush_failure_keeps_written_count() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        http.set_body("http://127.0.0.1:3500/v1.0/metadata", r#"{"id":"orders"}"#);
        http.set_body("http://127.0.0.1:9090/metrics", "up 1\n");
        let host = sidecar_host(&executor, &http);
        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;

        let mut writer = UnflushableWriter(Vec::new());
        assert_eq!(host.write_metadata(&mut writer, CancellationToken::new()).await, 15);
        assert_eq!(host.write_metrics(&mut writer, CancellationToken::new()).await, 5);
        assert_eq!(writer.0.len(), 20);
    }

    #[tokio::test]
    async fn test_subscribe_sees_transitions() {
        let executor = Arc::new(MockProcessExecutor::new());
        let http = Arc::new(MockHttpClient::new());
        let host = sidecar_host(&executor, &http);
        let mut rx = host.subscribe();

        host.start(sidecar_factory(SidecarOptions::new("orders")), CancellationToken::new())
            .await;

        let snapshot = rx
            .wait_for(|s| s.info.status() == ProcessStatus::Started)
            .await
            .unwrap()
            .clone();
        let options = snapshot.options.as_ref().unwrap();
        assert_eq!(options.app_id.as_deref(), Some("orders"));
    }
}
