//! Runtime parameter store - the protocol client settings of each instance

use std::path::PathBuf;

use serde_json::Value;
use tokio::fs;
use tracing::warn;

use super::write_atomic;
use crate::application::errors::{BotError, StorageError};
use crate::application::locks::KeyedLocks;
use crate::domain::entities::{InstanceId, RuntimeParams};
use crate::domain::traits::Instance;

/// File name of the runtime parameters inside an instance's working directory
pub const PARAMS_FILE: &str = "confbot";

pub struct ParamStore {
    locks: KeyedLocks<InstanceId>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self {
            locks: KeyedLocks::new(),
        }
    }

    pub fn path(instance: &dyn Instance) -> PathBuf {
        instance.data_dir().join(PARAMS_FILE)
    }

    /// Saved parameters, or the defaults when none are saved
    pub async fn load(&self, instance: &dyn Instance) -> RuntimeParams {
        match fs::read(Self::path(instance)).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                warn!(instance = %instance.id(), error = %e, "malformed runtime parameters, using defaults");
                RuntimeParams::default()
            }),
            Err(_) => RuntimeParams::default(),
        }
    }

    pub async fn save(&self, instance: &dyn Instance, params: &RuntimeParams) -> Result<(), StorageError> {
        let _guard = self.locks.lock(&instance.id()).await;
        write_atomic(&Self::path(instance), &serde_json::to_vec_pretty(params)?).await?;
        Ok(())
    }

    /// Change one existing key and persist; returns the coerced value
    pub async fn set(&self, instance: &dyn Instance, key: &str, raw: &str) -> Result<Value, BotError> {
        let _guard = self.locks.lock(&instance.id()).await;
        let mut params = self.load(instance).await;
        let value = params.set(key, raw)?.clone();
        write_atomic(&Self::path(instance), &serde_json::to_vec_pretty(&params).map_err(StorageError::from)?)
            .await
            .map_err(StorageError::from)?;
        Ok(value)
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new()
    }
}
