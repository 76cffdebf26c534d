//! Port for HTTP calls to supervised processes
//! Health probes, graceful shutdown requests and metadata/metrics downloads

use crate::domain::{HealthResult, Result, SensitiveString};
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Response body handed to the caller as a byte stream
pub type ResponseBody = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait DaprHttpClient: Send + Sync {
    /// GET `uri`; connection failures and timeouts are an unreachable result, never an error
    async fn check_health(&self, uri: &str) -> HealthResult;

    /// POST with an empty body, returning the status code
    async fn post(&self, uri: &str, token: Option<&SensitiveString>) -> Result<u16>;

    /// GET `uri` and stream a successful response body
    async fn get_stream(&self, uri: &str, token: Option<&SensitiveString>) -> Result<ResponseBody>;
}
