//! Port for resolving process options
//! Invoked on every start so configuration changes are picked up

use crate::domain::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait OptionsFactory<O>: Send + Sync {
    /// Produce the options for the next start. May wait (for example on a
    /// port that is not known yet) but must honor `cancel`.
    async fn resolve(&self, cancel: &CancellationToken) -> Result<O>;
}
