use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::errors::BotError;
use crate::domain::entities::{InstanceEvent, InstanceId, InstanceStatus, MessageTarget};

/// Instance trait - one authenticated bot identity provided by a protocol client
#[async_trait]
pub trait Instance: Send + Sync {
    /// Stable numeric identity
    fn id(&self) -> InstanceId;

    /// Display name, falls back to the identity
    fn nickname(&self) -> String {
        self.id().to_string()
    }

    fn is_online(&self) -> bool;

    /// Private working directory of this instance
    fn data_dir(&self) -> &Path;

    /// Traffic counters for status listings
    fn status(&self) -> InstanceStatus {
        InstanceStatus::default()
    }

    /// Send a text message
    async fn send_message(&self, target: MessageTarget, text: &str) -> Result<(), BotError>;

    async fn login(&self) -> Result<(), BotError>;

    async fn logout(&self) -> Result<(), BotError>;

    /// Drop the connection without a graceful logout
    fn terminate(&self);

    /// Subscribe to lifecycle and inbound message events
    fn subscribe(&self) -> broadcast::Receiver<InstanceEvent>;

    /// Apply a runtime parameter change to the live client
    fn reconfigure(&self, _key: &str, _value: &Value) {}
}

/// Creates protocol-client instances for new identities
#[async_trait]
pub trait InstanceFactory: Send + Sync {
    async fn create(&self, id: InstanceId, data_dir: PathBuf) -> Result<Arc<dyn Instance>, BotError>;
}
