//! Application services - the host object, its instance directory and the built-in commands

pub mod builtins;
pub mod directory;
pub mod help;
pub mod host;

pub use directory::{DirectoryEntry, InstanceDirectory};
pub use host::{Host, HostOptions, ProcessSignal, MAINTAINERS};
