//! Tokio Process Executor
//! Real implementation of the ProcessExecutor port using `tokio::process`
//!
//! Each spawned child is owned by a waiter task that reaps it and publishes
//! the exit status. Termination uses SIGTERM on unix; a forced kill is routed
//! through the waiter task so the child handle is never shared.

use crate::domain::ports::{
    ManagedProcess, OutputStream, ProcessExecutor, ProcessExit, ProcessOutputHandler, SpawnConfig,
};
use crate::domain::{DomainError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

/// Tokio-based process executor
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessExecutor;

impl TokioProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessExecutor for TokioProcessExecutor {
    async fn spawn(&self, config: SpawnConfig) -> Result<Arc<dyn ManagedProcess>> {
        info!(
            process = %config.process_name,
            command = %config.command.display(),
            args = ?config.args,
            "Spawning process"
        );

        if config.command.as_os_str().is_empty() {
            return Err(DomainError::SpawnFailure {
                process: config.process_name,
                reason: "Empty command".to_string(),
            });
        }

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args);

        if let Some(ref dir) = config.working_dir {
            debug!(working_dir = %dir.display(), "Setting working directory");
            cmd.current_dir(dir);
        }

        if !config.env_vars.is_empty() {
            debug!(count = config.env_vars.len(), "Setting environment variables");
            cmd.envs(&config.env_vars);
        }

        let capture = config.output.is_some();
        cmd.stdin(Stdio::null());
        cmd.stdout(if capture { Stdio::piped() } else { Stdio::null() });
        cmd.stderr(if capture { Stdio::piped() } else { Stdio::null() });
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            error!(
                process = %config.process_name,
                command = %config.command.display(),
                error = %e,
                "Failed to spawn process"
            );
            DomainError::SpawnFailure {
                process: config.process_name.clone(),
                reason: e.to_string(),
            }
        })?;

        let pid = child.id().ok_or_else(|| DomainError::SpawnFailure {
            process: config.process_name.clone(),
            reason: "process exited before its pid could be read".to_string(),
        })?;

        if let Some(handler) = config.output {
            if let Some(stdout) = child.stdout.take() {
                tokio::spawn(forward_lines(stdout, OutputStream::Stdout, Arc::clone(&handler)));
            }
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(forward_lines(stderr, OutputStream::Stderr, handler));
            }
        }

        info!(process = %config.process_name, pid = pid, "Process spawned successfully");
        Ok(Arc::new(TokioManagedProcess::watch(child, pid)))
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, handler: Arc<dyn ProcessOutputHandler>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => handler.on_line(stream, &line),
            Ok(None) => break,
            Err(e) => {
                debug!(stream = %stream, error = %e, "Stopped reading process output");
                break;
            }
        }
    }
}

/// A child process reaped by a background waiter task
pub struct TokioManagedProcess {
    pid: u32,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
    kill_signal: Arc<Notify>,
}

impl TokioManagedProcess {
    fn watch(mut child: Child, pid: u32) -> Self {
        let (exit_tx, exit_rx) = watch::channel(None);
        let kill_signal = Arc::new(Notify::new());
        let kill = Arc::clone(&kill_signal);

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill.notified() => {
                    info!(pid = pid, "Killing process");
                    if let Err(e) = child.start_kill() {
                        warn!(pid = pid, error = %e, "Failed to kill process");
                    }
                    child.wait().await
                }
            };

            let exit = match status {
                Ok(status) => ProcessExit {
                    code: status.code(),
                },
                Err(e) => {
                    error!(pid = pid, error = %e, "Failed to wait for process");
                    ProcessExit { code: None }
                }
            };
            debug!(pid = pid, exit_code = ?exit.code, "Process exited");
            let _ = exit_tx.send(Some(exit));
        });

        Self {
            pid,
            exit_rx,
            kill_signal,
        }
    }
}

#[async_trait]
impl ManagedProcess for TokioManagedProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn exit(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    fn terminate(&self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            debug!(pid = self.pid, "Sending SIGTERM");
            // The waiter task has not reaped the child yet, so the pid is still ours
            let result = unsafe { libc::kill(self.pid as libc::pid_t, libc::SIGTERM) };
            if result != 0 {
                let err = std::io::Error::last_os_error();
                warn!(pid = self.pid, error = %err, "Failed to send SIGTERM");
                return Err(err.into());
            }
            Ok(())
        }

        #[cfg(not(unix))]
        {
            self.kill()
        }
    }

    fn kill(&self) -> Result<()> {
        if self.is_running() {
            self.kill_signal.notify_one();
        }
        Ok(())
    }

    async fn wait_for_exit(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        let exit = match rx.wait_for(Option::is_some).await {
            Ok(exit) => (*exit).unwrap_or(ProcessExit { code: None }),
            Err(_) => ProcessExit { code: None },
        };
        exit
    }
}
