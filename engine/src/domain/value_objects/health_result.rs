//! Health check value objects

use serde::{Deserialize, Serialize};

/// Outcome of a single HTTP health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HealthResult {
    /// HTTP status code, 0 when no response was obtained
    pub status_code: u16,
}

impl HealthResult {
    pub fn from_status(status_code: u16) -> Self {
        Self { status_code }
    }

    /// No HTTP response (connection refused, timeout, process not running)
    pub fn unreachable() -> Self {
        Self { status_code: 0 }
    }

    pub fn is_healthy(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl std::fmt::Display for HealthResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status_code, self.is_healthy()) {
            (0, _) => write!(f, "unreachable"),
            (code, true) => write!(f, "healthy ({})", code),
            (code, false) => write!(f, "unhealthy ({})", code),
        }
    }
}
