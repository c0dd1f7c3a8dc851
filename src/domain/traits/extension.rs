//! Extension trait - the lifecycle surface of a plugin module
//!
//! One module value is created per loaded generation and shared by every
//! instance it is enabled on. Extensions must key any mutable state by
//! [`InstanceId`](crate::domain::entities::InstanceId).

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::Instance;

/// Outcome of a lifecycle hook
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// The extension does not provide this hook
    #[error("hook not implemented")]
    NotImplemented,

    #[error("{0}")]
    Failed(String),
}

pub type HookResult = Result<(), HookError>;

/// Plugin module with three optional lifecycle hooks
#[async_trait]
pub trait Extension: Send + Sync {
    /// Start serving `instance`
    async fn enable(&self, _instance: Arc<dyn Instance>) -> HookResult {
        Err(HookError::NotImplemented)
    }

    /// Stop serving `instance`
    async fn disable(&self, _instance: Arc<dyn Instance>) -> HookResult {
        Err(HookError::NotImplemented)
    }

    /// Release module-wide resources before the module is dropped
    async fn destroy(&self) -> HookResult {
        Err(HookError::NotImplemented)
    }
}
