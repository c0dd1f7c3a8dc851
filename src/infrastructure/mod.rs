//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: YAML host configuration
//! - Storage: per-instance binding records and runtime parameters
//! - Plugins: locating and loading extension modules
//! - Adapters: protocol client integrations (console)

pub mod adapters;
pub mod config;
pub mod plugins;
pub mod storage;
