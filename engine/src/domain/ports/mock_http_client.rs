//! Mock HTTP client for testing
//! Canned health codes and response bodies, with call recording

use super::{DaprHttpClient, ResponseBody};
use crate::domain::{DomainError, HealthResult, Result, SensitiveString};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

type PostHook = Box<dyn Fn(&str) + Send + Sync>;

pub struct MockHttpClient {
    health_status: AtomicU16,
    healthy_at: Mutex<Option<Instant>>,
    health_calls: AtomicUsize,
    post_status: AtomicU16,
    post_delay: Mutex<Option<Duration>>,
    posts: Mutex<Vec<(String, Option<String>)>>,
    on_post: Mutex<Option<PostHook>>,
    bodies: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            health_status: AtomicU16::new(200),
            healthy_at: Mutex::new(None),
            health_calls: AtomicUsize::new(0),
            post_status: AtomicU16::new(200),
            post_delay: Mutex::new(None),
            posts: Mutex::new(Vec::new()),
            on_post: Mutex::new(None),
            bodies: Mutex::new(HashMap::new()),
        }
    }

    /// Status returned by health probes; 0 simulates an unreachable endpoint
    pub fn set_health_status(&self, status: u16) {
        self.health_status.store(status, Ordering::SeqCst);
    }

    /// Probes report unreachable until `delay` from now has elapsed
    pub fn healthy_after(&self, delay: Duration) {
        *self.healthy_at.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Instant::now() + delay);
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// Status returned by POST; 0 makes POST fail with an HTTP error
    pub fn set_post_status(&self, status: u16) {
        self.post_status.store(status, Ordering::SeqCst);
    }

    /// POST responses arrive only after `delay`
    pub fn set_post_delay(&self, delay: Duration) {
        *self.post_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Called with the URI after every recorded POST
    pub fn on_post(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_post.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Recorded POSTs as `(uri, exposed token)`
    pub fn posts(&self) -> Vec<(String, Option<String>)> {
        self.posts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_body(&self, uri: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uri.into(), body.into());
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DaprHttpClient for MockHttpClient {
    async fn check_health(&self, _uri: &str) -> HealthResult {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let healthy_at = *self
            .healthy_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let pending = healthy_at.is_some_and(|at| Instant::now() < at);
        if pending {
            return HealthResult::unreachable();
        }
        HealthResult::from_status(self.health_status.load(Ordering::SeqCst))
    }

    async fn post(&self, uri: &str, token: Option<&SensitiveString>) -> Result<u16> {
        self.posts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((uri.to_string(), token.map(|t| t.expose().to_string())));

        let delay = *self.post_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let status = self.post_status.load(Ordering::SeqCst);
        if status == 0 {
            return Err(DomainError::Http {
                uri: uri.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        if let Some(hook) = self
            .on_post
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            hook(uri);
        }
        Ok(status)
    }

    async fn get_stream(&self, uri: &str, _token: Option<&SensitiveString>) -> Result<ResponseBody> {
        let body = self
            .bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned();
        match body {
            Some(bytes) => Ok(Box::pin(std::io::Cursor::new(bytes))),
            None => Err(DomainError::Http {
                uri: uri.to_string(),
                reason: "404 Not Found".to_string(),
            }),
        }
    }
}
