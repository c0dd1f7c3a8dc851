use std::fmt;
use std::sync::Arc;

use super::{InboundMessage, InstanceId, MessageKind, PermissionLevel, UserId};
use crate::domain::traits::Instance;

/// Routing scope a command handler is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Accepted from any message kind
    Any,
    /// Group conversations only
    Group,
    /// Direct messages only
    Private,
}

impl Scope {
    /// Kind-specific scope of a message, and the scope of the other kind
    pub fn of(kind: &MessageKind) -> (Scope, Scope) {
        if kind.is_group() {
            (Scope::Group, Scope::Private)
        } else {
            (Scope::Private, Scope::Group)
        }
    }
}

/// One parsed command, alive for the duration of a single dispatch
#[derive(Clone)]
pub struct Invocation {
    pub raw: String,
    pub command: String,
    pub params: Vec<String>,
    pub instance: Arc<dyn Instance>,
    pub sender: UserId,
    pub kind: MessageKind,
    pub level: PermissionLevel,
}

impl Invocation {
    pub fn instance_id(&self) -> InstanceId {
        self.instance.id()
    }

    /// Positional parameter, if present
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn from_message(
        message: &InboundMessage,
        command: String,
        params: Vec<String>,
        instance: Arc<dyn Instance>,
        level: PermissionLevel,
    ) -> Self {
        Self {
            raw: message.text.clone(),
            command,
            params,
            instance,
            sender: message.sender,
            kind: message.kind.clone(),
            level,
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.command)
            .field("params", &self.params)
            .field("instance", &self.instance.id())
            .field("sender", &self.sender)
            .field("kind", &self.kind)
            .field("level", &self.level)
            .finish()
    }
}
