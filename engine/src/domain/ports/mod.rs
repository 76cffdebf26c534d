pub mod http_client;
pub mod interceptor;
pub mod mock_http_client;
pub mod mock_process_executor;
pub mod options_factory;
pub mod process_executor;

pub use http_client::{DaprHttpClient, ResponseBody};
pub use interceptor::ProcessInterceptor;
pub use mock_http_client::MockHttpClient;
pub use mock_process_executor::{MockProcess, MockProcessExecutor, TerminateBehavior};
pub use options_factory::OptionsFactory;
pub use process_executor::{
    ManagedProcess, OutputStream, ProcessExecutor, ProcessExit, ProcessOutputHandler, SpawnConfig,
};
