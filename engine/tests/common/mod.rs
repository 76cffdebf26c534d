//! Shared helpers for engine integration tests
#![allow(dead_code)]

use sidekick_engine::domain::ports::{
    MockHttpClient, MockProcessExecutor, OptionsFactory, ProcessInterceptor,
};
use sidekick_engine::domain::services::StaticOptions;
use sidekick_engine::{DaprProcessHost, ProcessInfo, ProcessOptions, SidecarOptions};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct Harness {
    pub executor: Arc<MockProcessExecutor>,
    pub http: Arc<MockHttpClient>,
}

impl Harness {
    /// Shutdown POSTs fail, so stops fall through to a termination signal
    /// the mock process obeys immediately
    pub fn new() -> Self {
        let http = Arc::new(MockHttpClient::new());
        http.set_post_status(0);
        Self {
            executor: Arc::new(MockProcessExecutor::new()),
            http,
        }
    }

    pub fn host<O: ProcessOptions>(&self, name: &str) -> DaprProcessHost<O> {
        DaprProcessHost::new(name, self.executor.clone(), self.http.clone()).unwrap()
    }

    pub fn host_with<O: ProcessOptions>(
        &self,
        name: &str,
        interceptors: Vec<Arc<dyn ProcessInterceptor<O>>>,
    ) -> DaprProcessHost<O> {
        let mut builder = DaprProcessHost::builder(name, self.executor.clone(), self.http.clone());
        for interceptor in interceptors {
            builder = builder.interceptor(interceptor);
        }
        builder.build().unwrap()
    }
}

pub fn fixed<O: ProcessOptions>(options: O) -> Arc<dyn OptionsFactory<O>> {
    Arc::new(StaticOptions(options))
}

/// Sidecar options that poll quickly in tests
pub fn fast_sidecar(app_id: &str) -> SidecarOptions {
    let mut options = SidecarOptions::new(app_id);
    options.common.health_poll_interval_ms = 10;
    options.common.wait_for_shutdown_seconds = Some(1);
    options
}

pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Records every lifecycle callback as `"<interceptor>:<stage>"`
pub struct Recorder {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
    pub reject: bool,
}

impl Recorder {
    pub fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
            reject: false,
        })
    }

    pub fn rejecting(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
            reject: true,
        })
    }

    fn record(&self, stage: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", self.name, stage));
    }
}

impl<O: ProcessOptions> ProcessInterceptor<O> for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn on_starting(&self, _options: &mut O) -> sidekick_engine::Result<()> {
        self.record("starting");
        if self.reject {
            return Err(sidekick_engine::DomainError::ConfigurationInvalid(
                "rejected in test".to_string(),
            ));
        }
        Ok(())
    }

    fn on_started(&self, _info: &ProcessInfo) {
        self.record("started");
    }

    fn on_stopping(&self, _info: &ProcessInfo) {
        self.record("stopping");
    }

    fn on_stopped(&self, _info: &ProcessInfo) {
        self.record("stopped");
    }
}
