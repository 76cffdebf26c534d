//! Mock process executor for testing
//! Simulated processes whose exits are driven by the test

use super::{ManagedProcess, ProcessExecutor, ProcessExit, SpawnConfig};
use crate::domain::{DomainError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// How a mock process reacts to a termination signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateBehavior {
    /// Exits with code 0
    Exit,
    /// Keeps running until killed
    Ignore,
}

pub struct MockProcess {
    pid: u32,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    on_terminate: TerminateBehavior,
    terminate_calls: AtomicUsize,
    kill_calls: AtomicUsize,
}

impl MockProcess {
    pub fn new(pid: u32, on_terminate: TerminateBehavior) -> Self {
        let (exit_tx, _) = watch::channel(None);
        Self {
            pid,
            exit_tx,
            on_terminate,
            terminate_calls: AtomicUsize::new(0),
            kill_calls: AtomicUsize::new(0),
        }
    }

    /// Simulate the process ending on its own
    pub fn exit_with(&self, code: Option<i32>) {
        self.exit_tx.send_if_modified(|exit| {
            if exit.is_some() {
                return false;
            }
            *exit = Some(ProcessExit { code });
            true
        });
    }

    pub fn terminate_calls(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }

    pub fn kill_calls(&self) -> usize {
        self.kill_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManagedProcess for MockProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn exit(&self) -> Option<ProcessExit> {
        *self.exit_tx.borrow()
    }

    fn terminate(&self) -> Result<()> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        if self.on_terminate == TerminateBehavior::Exit {
            self.exit_with(Some(0));
        }
        Ok(())
    }

    fn kill(&self) -> Result<()> {
        self.kill_calls.fetch_add(1, Ordering::SeqCst);
        self.exit_with(None);
        Ok(())
    }

    async fn wait_for_exit(&self) -> ProcessExit {
        let mut rx = self.exit_tx.subscribe();
        let exit = match rx.wait_for(Option::is_some).await {
            Ok(exit) => (*exit).unwrap_or(ProcessExit { code: None }),
            Err(_) => ProcessExit { code: None },
        };
        exit
    }
}

/// Executor that records spawn requests instead of starting anything
pub struct MockProcessExecutor {
    spawned: Mutex<Vec<(SpawnConfig, Arc<MockProcess>)>>,
    next_pid: AtomicU32,
    fail_spawn: AtomicBool,
    on_terminate: Mutex<TerminateBehavior>,
    output_lines: Mutex<Vec<String>>,
}

impl MockProcessExecutor {
    pub fn new() -> Self {
        Self {
            spawned: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(1000),
            fail_spawn: AtomicBool::new(false),
            on_terminate: Mutex::new(TerminateBehavior::Exit),
            output_lines: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn set_terminate_behavior(&self, behavior: TerminateBehavior) {
        *self.on_terminate.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Lines replayed on stdout to the output handler of every spawn
    pub fn set_output_lines(&self, lines: Vec<String>) {
        *self.output_lines.lock().unwrap_or_else(PoisonError::into_inner) = lines;
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn last_process(&self) -> Option<Arc<MockProcess>> {
        self.spawned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(_, process)| Arc::clone(process))
    }

    pub fn last_config(&self) -> Option<SpawnConfig> {
        self.spawned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(config, _)| config.clone())
    }
}

impl Default for MockProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessExecutor for MockProcessExecutor {
    async fn spawn(&self, config: SpawnConfig) -> Result<Arc<dyn ManagedProcess>> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(DomainError::SpawnFailure {
                process: config.process_name.clone(),
                reason: "mock spawn failure".to_string(),
            });
        }

        let behavior = *self.on_terminate.lock().unwrap_or_else(PoisonError::into_inner);
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let process = Arc::new(MockProcess::new(pid, behavior));

        if let Some(handler) = &config.output {
            let lines = self
                .output_lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for line in lines {
                handler.on_line(super::OutputStream::Stdout, &line);
            }
        }

        self.spawned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((config, Arc::clone(&process)));
        Ok(process)
    }
}
