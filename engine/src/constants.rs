//! Application-wide constants and default values
//!
//! Centralizes ports, paths and timings so option types and the supervisor agree

/// Loopback host every supervised process is addressed on
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Process lifecycle defaults
pub mod process {
    /// Seconds the sidecar gets to exit after a graceful shutdown request
    pub const DEFAULT_SIDECAR_WAIT_FOR_SHUTDOWN_SEC: u64 = 10;

    /// Seconds control-plane services get to exit after a termination signal
    pub const DEFAULT_WAIT_FOR_SHUTDOWN_SEC: u64 = 5;

    /// Upper bound on waiting for the OS to reap a force-killed process
    pub const FORCE_KILL_WAIT_SEC: u64 = 5;

    /// Seconds the readiness poll keeps probing before giving up
    pub const DEFAULT_STARTUP_TIMEOUT_SEC: u64 = 60;

    /// Interval used by the dependent-process ordering wrapper
    pub const DEPENDENCY_POLL_INTERVAL_MS: u64 = 250;
}

/// Health/readiness probing defaults
pub mod health_check {
    /// Interval between readiness probes during startup (milliseconds)
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

    /// Timeout for a single HTTP request to a supervised process (seconds)
    pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 5;
}

/// Sidecar (`daprd`) defaults
pub mod sidecar {
    pub const PROCESS_NAME: &str = "daprd";
    pub const DEFAULT_HTTP_PORT: u16 = 3500;
    pub const DEFAULT_GRPC_PORT: u16 = 50001;
    pub const DEFAULT_METRICS_PORT: u16 = 9090;
    pub const HEALTH_PATH: &str = "v1.0/healthz";
    pub const METADATA_PATH: &str = "v1.0/metadata";
    pub const SHUTDOWN_PATH: &str = "v1.0/shutdown";
}

/// Placement service defaults
pub mod placement {
    pub const PROCESS_NAME: &str = "placement";
    pub const DEFAULT_PORT: u16 = 6050;
    pub const DEFAULT_HEALTH_PORT: u16 = 8081;
    pub const DEFAULT_METRICS_PORT: u16 = 9091;
}

/// Sentry service defaults
pub mod sentry {
    pub const PROCESS_NAME: &str = "sentry";
    pub const DEFAULT_PORT: u16 = 6052;
    pub const DEFAULT_HEALTH_PORT: u16 = 8082;
    pub const DEFAULT_METRICS_PORT: u16 = 9092;
}

/// Scheduler service defaults
pub mod scheduler {
    pub const PROCESS_NAME: &str = "scheduler";
    pub const DEFAULT_PORT: u16 = 6060;
    pub const DEFAULT_HEALTH_PORT: u16 = 8083;
    pub const DEFAULT_METRICS_PORT: u16 = 9093;
}

/// Control-plane health path (served on the dedicated health port)
pub const CONTROL_PLANE_HEALTH_PATH: &str = "healthz";

/// Metrics path served on every metrics port
pub const METRICS_PATH: &str = "metrics";

/// Environment variables consumed by the launched processes
pub mod env {
    pub const DAPR_API_TOKEN: &str = "DAPR_API_TOKEN";
    pub const APP_API_TOKEN: &str = "APP_API_TOKEN";
    pub const NAMESPACE: &str = "NAMESPACE";
    pub const DAPR_HTTP_PORT: &str = "DAPR_HTTP_PORT";
    pub const DAPR_GRPC_PORT: &str = "DAPR_GRPC_PORT";
}

/// Header carrying the Dapr API token on management requests
pub const DAPR_API_TOKEN_HEADER: &str = "dapr-api-token";
