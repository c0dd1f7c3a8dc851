//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Errors: typed failures of every operation
//! - Locks: per-key mutual exclusion
//! - Plugins: the plugin runtime (handles, registry, generations)
//! - Messaging: command parsing and dispatching
//! - Services: the host object and built-in commands

pub mod errors;
pub mod locks;
pub mod messaging;
pub mod plugins;
pub mod services;
