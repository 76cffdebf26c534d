pub mod error;
pub mod options;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use error::{DomainError, Result};
pub use options::{
    CommandLine, CommandLineBuilder, CommonOptions, MetricsOptions, PlacementOptions,
    ProcessOptions, SchedulerOptions, SentryOptions, SidecarOptions,
};
pub use services::{DaprProcessHost, DependentProcessHost, ProcessHost, ProcessStatusResponse};
pub use value_objects::{HealthResult, ProcessInfo, ProcessStatus, SensitiveString};
