//! ProcessInfo value object
//! Immutable snapshot of a supervised process, replaced on every transition

use super::ProcessStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    name: String,
    pid: Option<u32>,
    version: Option<String>,
    status: ProcessStatus,
    description: String,
}

impl ProcessInfo {
    pub fn new(name: impl Into<String>, status: ProcessStatus, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pid: None,
            version: None,
            status,
            description: description.into(),
        }
    }

    /// Initial snapshot of a host that has never been started
    pub fn initial(name: impl Into<String>) -> Self {
        Self::new(name, ProcessStatus::Disabled, "Not started")
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Derive the next snapshot, keeping identity fields
    pub fn transition(&self, status: ProcessStatus, description: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            pid: self.pid,
            version: self.version.clone(),
            status,
            description: description.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True only while the process is spawned and owned by the supervisor
    pub fn is_running(&self) -> bool {
        self.status == ProcessStatus::Started
    }
}

impl std::fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.name, self.status)?;
        if let Some(pid) = self.pid {
            write!(f, " pid={}", pid)?;
        }
        if let Some(ref version) = self.version {
            write!(f, " version={}", version)?;
        }
        write!(f, ": {}", self.description)
    }
}
