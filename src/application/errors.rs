//! Application layer errors

use thiserror::Error;

use crate::domain::entities::InstanceId;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Command(#[from] CommandError),

    #[error("{0}")]
    Plugin(#[from] PluginError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Plugin runtime errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin not found: {0}")]
    NotFound(String),

    #[error("invalid plugin {name}: {reason}")]
    InvalidPlugin { name: String, reason: String },

    #[error("plugin {plugin} is already enabled on {instance}")]
    AlreadyBound { plugin: String, instance: InstanceId },

    #[error("plugin {plugin} is not enabled on {instance}")]
    NotBound { plugin: String, instance: InstanceId },

    #[error("plugin {0} has no enable hook")]
    NoEnableHook(String),

    #[error("plugin {plugin} failed on {instance}: {message}")]
    HookFailed {
        plugin: String,
        instance: InstanceId,
        message: String,
    },

    #[error("failed to persist bindings of {instance}: {source}")]
    PersistFailed {
        instance: InstanceId,
        #[source]
        source: StorageError,
    },

    #[error("plugin {plugin} restarted, but could not be restored on {}", format_failed(.failed))]
    PartialReboot {
        plugin: String,
        failed: Vec<(InstanceId, String)>,
    },
}

fn format_failed(failed: &[(InstanceId, String)]) -> String {
    failed
        .iter()
        .map(|(id, reason)| format!("{} ({})", id, reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown parameter: {0}")]
    UnknownParam(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no such instance: {0}")]
    NoSuchInstance(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Failed to write config: {0}")]
    Write(#[from] std::io::Error),
}
