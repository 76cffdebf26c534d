//! Application layer
//! Composition root that wires the per-process hosts together

pub mod sidekick;

pub use sidekick::{Sidekick, SidekickBuilder, SidekickHealth, SidekickStatus};
