//! ProcessStatus value object
//! Represents the lifecycle state of a supervised Dapr process

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProcessStatus {
    /// Process is turned off (by configuration or a missing required field)
    #[default]
    Disabled,

    /// Options resolved, process being spawned
    Starting,

    /// Process spawned and owned by the supervisor
    Started,

    /// Graceful shutdown in progress
    Stopping,

    /// Process terminated on request
    Stopped,

    /// Spawn failure or unexpected exit
    Failed,
}

impl ProcessStatus {
    /// Starting or Started: `start` is a no-op in these states
    pub fn is_active(&self) -> bool {
        matches!(self, ProcessStatus::Starting | ProcessStatus::Started)
    }

    /// Check if the process can be stopped
    pub fn can_stop(&self) -> bool {
        self.is_active()
    }

    /// Validate state transition
    pub fn can_transition_to(&self, new_state: ProcessStatus) -> bool {
        use ProcessStatus::*;

        match (self, new_state) {
            (Disabled | Stopped | Failed, Starting) => true,
            (Starting, Started | Disabled | Failed) => true,
            (Started, Stopping | Failed) => true,
            (Starting, Stopping) => true,
            (Stopping, Stopped | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "Disabled",
            Self::Starting => "Starting",
            Self::Started => "Started",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}
