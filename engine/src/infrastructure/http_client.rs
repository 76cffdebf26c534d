//! Reqwest HTTP client
//! Real implementation of the DaprHttpClient port

use crate::constants::{health_check, DAPR_API_TOKEN_HEADER};
use crate::domain::ports::{DaprHttpClient, ResponseBody};
use crate::domain::{DomainError, HealthResult, Result, SensitiveString};
use async_trait::async_trait;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::io::StreamReader;
use tracing::debug;

#[derive(Clone)]
pub struct ReqwestDaprHttpClient {
    client: reqwest::Client,
    /// Bounds whole health probes and shutdown requests, not streamed downloads
    request_timeout: Duration,
}

impl ReqwestDaprHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(health_check::DEFAULT_REQUEST_TIMEOUT_SEC))
    }

    pub fn with_timeout(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| DomainError::ConfigurationInvalid(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            request_timeout,
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        uri: &str,
        token: Option<&SensitiveString>,
    ) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, uri);
        match token.filter(|t| !t.is_blank()) {
            Some(token) => builder.header(DAPR_API_TOKEN_HEADER, token.expose()),
            None => builder,
        }
    }
}

fn http_error(uri: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::Http {
        uri: uri.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl DaprHttpClient for ReqwestDaprHttpClient {
    async fn check_health(&self, uri: &str) -> HealthResult {
        let response = self
            .request(reqwest::Method::GET, uri, None)
            .timeout(self.request_timeout)
            .send()
            .await;
        match response {
            Ok(response) => HealthResult::from_status(response.status().as_u16()),
            Err(e) => {
                debug!(uri = %uri, error = %e, "Health probe got no response");
                HealthResult::unreachable()
            }
        }
    }

    async fn post(&self, uri: &str, token: Option<&SensitiveString>) -> Result<u16> {
        let response = self
            .request(reqwest::Method::POST, uri, token)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| http_error(uri, e))?;
        Ok(response.status().as_u16())
    }

    async fn get_stream(&self, uri: &str, token: Option<&SensitiveString>) -> Result<ResponseBody> {
        let response = self
            .request(reqwest::Method::GET, uri, token)
            .send()
            .await
            .map_err(|e| http_error(uri, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_error(uri, format!("unexpected status {}", status)));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(StreamReader::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response and return the raw request
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_health_status_code() {
        let (base, server) =
            serve_once("HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
        let client = ReqwestDaprHttpClient::new().unwrap();

        let result = client.check_health(&format!("{}/v1.0/healthz", base)).await;

        assert_eq!(result.status_code, 204);
        assert!(result.is_healthy());
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /v1.0/healthz"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ReqwestDaprHttpClient::with_timeout(Duration::from_secs(1)).unwrap();
        let result = client.check_health(&format!("http://{}/healthz", addr)).await;

        assert_eq!(result, HealthResult::unreachable());
    }

    #[tokio::test]
    async fn test_post_sends_token_header() {
        let (base, server) =
            serve_once("HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
        let client = ReqwestDaprHttpClient::new().unwrap();
        let token = SensitiveString::new("secret-token");

        let status = client
            .post(&format!("{}/v1.0/shutdown", base), Some(&token))
            .await
            .unwrap();

        assert_eq!(status, 202);
        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("post /v1.0/shutdown"));
        assert!(request.contains("dapr-api-token: secret-token"));
    }

    #[tokio::test]
    async fn test_get_stream_reads_body() {
        let (base, _server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 11\r\nConnection: close\r\n\r\nup 1\nfoo 2\n",
        )
        .await;
        let client = ReqwestDaprHttpClient::new().unwrap();

        let mut body = client
            .get_stream(&format!("{}/metrics", base), None)
            .await
            .unwrap();
        let mut text = String::new();
        body.read_to_string(&mut text).await.unwrap();

        assert_eq!(text, "up 1\nfoo 2\n");
    }

    #[tokio::test]
    async fn test_get_stream_error_status() {
        let (base, _server) =
            serve_once("HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
        let client = ReqwestDaprHttpClient::new().unwrap();

        let result = client.get_stream(&format!("{}/v1.0/metadata", base), None).await;

        assert!(matches!(result, Err(DomainError::Http { .. })));
    }
}
