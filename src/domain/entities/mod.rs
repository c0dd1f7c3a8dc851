//! Domain entities - Core business objects with no external dependencies

pub mod binding;
pub mod command;
pub mod instance;
pub mod message;
pub mod params;
pub mod permission;

pub use binding::{BindingRecord, GroupSettings, PluginSetting};
pub use command::{Invocation, Scope};
pub use instance::{InstanceEvent, InstanceId, InstanceStatus};
pub use message::{GroupId, InboundMessage, MessageKind, MessageTarget, Role, UserId};
pub use params::RuntimeParams;
pub use permission::PermissionLevel;
