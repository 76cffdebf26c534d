//! Sidekick engine
//!
//! Launches, supervises and exposes management hooks for Dapr runtime
//! processes (the `daprd` sidecar and the Placement, Sentry and Scheduler
//! control-plane services) from within a hosting application.
//!
//! ## Layout
//!
//! - `domain`: options model, value objects, ports and the supervisor itself
//! - `infrastructure`: tokio process executor, reqwest HTTP client, YAML config
//! - `application`: the `Sidekick` composition root wiring hosts together

pub mod application;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::{Sidekick, SidekickBuilder, SidekickHealth, SidekickStatus};
pub use domain::{
    DaprProcessHost, DependentProcessHost, DomainError, HealthResult, PlacementOptions,
    ProcessHost, ProcessInfo, ProcessOptions, ProcessStatus, Result, SchedulerOptions,
    SensitiveString, SentryOptions, SidecarOptions,
};
