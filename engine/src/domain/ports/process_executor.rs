//! ProcessExecutor port
//! Interface for spawning a native process and controlling the spawned instance

use crate::domain::{ProcessOptions, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Which pipe a line of child output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Receives captured child output, one line at a time
pub trait ProcessOutputHandler: Send + Sync {
    fn on_line(&self, stream: OutputStream, line: &str);
}

/// Configuration for spawning a process
#[derive(Clone)]
pub struct SpawnConfig {
    /// Name used in logs
    pub process_name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env_vars: BTreeMap<String, String>,
    /// Captures stdout/stderr when set, otherwise output is discarded
    pub output: Option<Arc<dyn ProcessOutputHandler>>,
}

impl SpawnConfig {
    pub fn from_options<O: ProcessOptions>(options: &O) -> Self {
        let command_line = options.command_line();
        Self {
            process_name: options.process_name().to_string(),
            command: options.executable(),
            args: command_line.arguments,
            working_dir: options.common().working_directory.clone(),
            env_vars: command_line.environment,
            output: None,
        }
    }

    pub fn with_output(mut self, handler: Arc<dyn ProcessOutputHandler>) -> Self {
        self.output = Some(handler);
        self
    }
}

impl fmt::Debug for SpawnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Environment values may hold API tokens
        f.debug_struct("SpawnConfig")
            .field("process_name", &self.process_name)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("working_dir", &self.working_dir)
            .field("env_keys", &self.env_vars.keys().collect::<Vec<_>>())
            .field("output", &self.output.is_some())
            .finish()
    }
}

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when terminated by a signal or when the status could not be read
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A spawned OS process, exclusively owned by one supervisor
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    fn pid(&self) -> u32;

    /// `None` while the process is running
    fn exit(&self) -> Option<ProcessExit>;

    fn is_running(&self) -> bool {
        self.exit().is_none()
    }

    /// Ask the process to terminate (SIGTERM on unix); no-op once exited
    fn terminate(&self) -> Result<()>;

    /// Forcefully kill the process; no-op once exited
    fn kill(&self) -> Result<()>;

    /// Resolves once the process has exited
    async fn wait_for_exit(&self) -> ProcessExit;
}

/// Port for spawning system processes
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn spawn(&self, config: SpawnConfig) -> Result<Arc<dyn ManagedProcess>>;
}
