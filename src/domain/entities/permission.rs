use super::{MessageKind, Role, UserId};

/// Caller privilege, lowest first so that `Ord` follows the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PermissionLevel {
    Member,
    ActiveMember,
    HighlyActiveMember,
    GroupAdmin,
    GroupOwner,
    Master,
    Maintainer,
}

impl PermissionLevel {
    /// Resolve the level of `sender` for one message.
    ///
    /// `maintainers` is the process-wide allow-list and `masters` the
    /// invoked instance's configured list. Role and activity only exist
    /// for group messages.
    pub fn resolve(
        sender: UserId,
        kind: &MessageKind,
        maintainers: &[UserId],
        masters: &[UserId],
    ) -> Self {
        if maintainers.contains(&sender) {
            return PermissionLevel::Maintainer;
        }
        if masters.contains(&sender) {
            return PermissionLevel::Master;
        }

        let (role, activity) = match kind {
            MessageKind::Group {
                role,
                activity_level,
                ..
            } => (*role, *activity_level),
            MessageKind::Private => (Role::Member, 0),
        };

        match role {
            Role::Owner => PermissionLevel::GroupOwner,
            Role::Admin => PermissionLevel::GroupAdmin,
            Role::Member if activity > 4 => PermissionLevel::HighlyActiveMember,
            Role::Member if activity > 2 => PermissionLevel::ActiveMember,
            Role::Member => PermissionLevel::Member,
        }
    }

    /// Minimum level needed before a command from `kind` is even parsed
    pub fn required_for(kind: &MessageKind) -> Self {
        if kind.is_group() {
            PermissionLevel::GroupAdmin
        } else {
            PermissionLevel::Master
        }
    }
}
