//! Plugin runtime - loaded extension modules and their per-instance bindings
//!
//! The [`PluginRegistry`] maps a plugin name to one live [`PluginHandle`].
//! Each successful load produces a new [`Generation`]; unloading or
//! rebooting a plugin drops the old generation once its hooks finished.

pub mod handle;
pub mod registry;

use std::fmt;

pub use handle::PluginHandle;
pub use registry::{DiscoveredPlugin, PluginOrigin, PluginRegistry};

/// Monotonic id of one instantiation of a plugin module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}
