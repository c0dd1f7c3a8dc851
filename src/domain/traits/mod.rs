//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod extension;

pub use bot::{Instance, InstanceFactory};
pub use extension::{Extension, HookError, HookResult};
