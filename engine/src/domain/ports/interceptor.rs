//! Port for lifecycle interceptors
//! Hooks invoked synchronously, in registration order, by the supervisor

use crate::domain::{ProcessInfo, Result};

pub trait ProcessInterceptor<O>: Send + Sync {
    /// Name used in logs and in the failure description
    fn name(&self) -> &str;

    /// Runs before the command line is built; may mutate options.
    /// An error fails the start without spawning.
    fn on_starting(&self, _options: &mut O) -> Result<()> {
        Ok(())
    }

    fn on_started(&self, _info: &ProcessInfo) {}

    fn on_stopping(&self, _info: &ProcessInfo) {}

    fn on_stopped(&self, _info: &ProcessInfo) {}
}
