#[path = "daemon/config.rs"]
mod config;

use clap::Parser;
use config::{Args, DaemonConfig};
use sidekick_engine::infrastructure::{
    load_config_from_path, ReqwestDaprHttpClient, TokioProcessExecutor,
};
use sidekick_engine::Sidekick;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DaemonConfig::from_env().with_args(Args::parse());
    init_tracing(&config.log_level);
    config.validate()?;

    let Some(ref path) = config.config_file else {
        return Err("No process configuration given".into());
    };
    let processes = load_config_from_path(path)?;

    let sidekick = Sidekick::builder(
        Arc::new(TokioProcessExecutor::new()),
        Arc::new(ReqwestDaprHttpClient::new()?),
    )
    .from_config(processes)
    .build()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        processes = ?sidekick.process_names(),
        "Starting sidekickd"
    );

    let running = CancellationToken::new();
    let signal = {
        let running = running.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            running.cancel();
        })
    };

    sidekick.start_all(running.clone()).await;
    for (name, status) in [
        ("placement", sidekick.placement().map(|h| h.process_info())),
        ("sentry", sidekick.sentry().map(|h| h.process_info())),
        ("scheduler", sidekick.scheduler().map(|h| h.process_info())),
        ("daprd", sidekick.sidecar().map(|h| h.process_info())),
    ] {
        if let Some(info) = status {
            info!(process = %name, status = %info.status(), description = %info.description(), "Process launched");
        }
    }

    running.cancelled().await;
    signal.abort();

    // Bounded stop: once the deadline passes every remaining process is killed
    let stop = CancellationToken::new();
    let deadline = {
        let stop = stop.clone();
        let timeout = config.shutdown_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!(timeout_secs = timeout.as_secs(), "Shutdown deadline reached, killing processes");
            stop.cancel();
        })
    };
    sidekick.stop_all(stop).await;
    deadline.abort();

    info!("sidekickd exited");
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
