//! Domain services
//! The process supervisor and the helpers it is built from

pub mod api_token_manager;
pub mod dependent_host;
pub mod health_evaluation;
pub mod interceptors;
pub mod metrics_enrichment;
pub mod options_factories;
pub mod process_host;
pub mod process_output;

pub use api_token_manager::{ApiTokenInterceptor, ApiTokenManager, RandomTokenProvider, TokenProvider};
pub use dependent_host::DependentProcessHost;
pub use health_evaluation::{evaluate, HealthReport};
pub use interceptors::ControlPlaneAddresses;
pub use options_factories::{AppPortOptionsFactory, FnOptionsFactory, StaticOptions};
pub use process_host::{
    BodyWriter, DaprProcessHost, HostSnapshot, ProcessHost, ProcessHostBuilder,
    ProcessStatusResponse, ProcessStatusSource,
};
pub use process_output::LoggingOutputHandler;
