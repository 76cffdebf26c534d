//! API token management
//! Holds the Dapr and app API tokens shared by the sidecar and the hosting app

use crate::domain::ports::ProcessInterceptor;
use crate::domain::{Result, SensitiveString, SidecarOptions};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Source of freshly generated tokens
pub trait TokenProvider: Send + Sync {
    fn generate(&self) -> SensitiveString;
}

/// Random UUID tokens
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenProvider;

impl TokenProvider for RandomTokenProvider {
    fn generate(&self) -> SensitiveString {
        SensitiveString::new(uuid::Uuid::new_v4().simple().to_string())
    }
}

/// Current token values; readers always see a complete value
pub struct ApiTokenManager {
    dapr_api_token: RwLock<Arc<SensitiveString>>,
    app_api_token: RwLock<Arc<SensitiveString>>,
}

impl ApiTokenManager {
    pub fn new(provider: &dyn TokenProvider) -> Self {
        Self {
            dapr_api_token: RwLock::new(Arc::new(provider.generate())),
            app_api_token: RwLock::new(Arc::new(provider.generate())),
        }
    }

    pub fn dapr_api_token(&self) -> Arc<SensitiveString> {
        Arc::clone(&self.dapr_api_token.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_dapr_api_token(&self, token: SensitiveString) {
        *self
            .dapr_api_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(token);
    }

    pub fn app_api_token(&self) -> Arc<SensitiveString> {
        Arc::clone(&self.app_api_token.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_app_api_token(&self, token: SensitiveString) {
        *self
            .app_api_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(token);
    }
}

impl Default for ApiTokenManager {
    fn default() -> Self {
        Self::new(&RandomTokenProvider)
    }
}

/// Fills in sidecar tokens that were not configured explicitly
pub struct ApiTokenInterceptor {
    tokens: Arc<ApiTokenManager>,
}

impl ApiTokenInterceptor {
    pub fn new(tokens: Arc<ApiTokenManager>) -> Self {
        Self { tokens }
    }
}

fn is_unset(token: &Option<SensitiveString>) -> bool {
    token.as_ref().map_or(true, SensitiveString::is_blank)
}

impl ProcessInterceptor<SidecarOptions> for ApiTokenInterceptor {
    fn name(&self) -> &str {
        "api-tokens"
    }

    fn on_starting(&self, options: &mut SidecarOptions) -> Result<()> {
        if is_unset(&options.dapr_api_token) {
            debug!("Assigning managed Dapr API token to sidecar");
            options.dapr_api_token = Some(self.tokens.dapr_api_token().as_ref().clone());
        }
        if is_unset(&options.app_api_token) {
            debug!("Assigning managed app API token to sidecar");
            options.app_api_token = Some(self.tokens.app_api_token().as_ref().clone());
        }
        Ok(())
    }
}
