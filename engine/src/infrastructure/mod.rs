pub mod config;
pub mod http_client;
pub mod tokio_executor;

pub use config::{load_config_from_path, ConfigError, SidekickConfig};
pub use http_client::ReqwestDaprHttpClient;
pub use tokio_executor::{TokioManagedProcess, TokioProcessExecutor};
