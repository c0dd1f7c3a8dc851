use chrono::{DateTime, Utc};

/// Account number of a chat user
pub type UserId = u64;

/// Identity of a group conversation
pub type GroupId = u64;

/// Role of the sender inside a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Owner,
    Admin,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

/// Where an inbound message came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Direct message
    Private,
    /// Group message with the sender's role and activity level
    Group {
        group_id: GroupId,
        role: Role,
        activity_level: u32,
    },
}

impl MessageKind {
    pub fn group(group_id: GroupId) -> Self {
        MessageKind::Group {
            group_id,
            role: Role::Member,
            activity_level: 0,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, MessageKind::Group { .. })
    }

    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            MessageKind::Group { group_id, .. } => Some(*group_id),
            MessageKind::Private => None,
        }
    }
}

/// Destination of an outgoing text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    Private(UserId),
    Group(GroupId),
}

/// Inbound text message as delivered by the protocol client
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub sender: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn private(sender: UserId, text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Private,
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn group(group_id: GroupId, sender: UserId, text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::group(group_id),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        if let MessageKind::Group { role: r, .. } = &mut self.kind {
            *r = role;
        }
        self
    }

    pub fn with_activity_level(mut self, level: u32) -> Self {
        if let MessageKind::Group { activity_level, .. } = &mut self.kind {
            *activity_level = level;
        }
        self
    }

    /// Where a reply to this message should go
    pub fn reply_target(&self) -> MessageTarget {
        match self.kind {
            MessageKind::Private => MessageTarget::Private(self.sender),
            MessageKind::Group { group_id, .. } => MessageTarget::Group(group_id),
        }
    }
}
