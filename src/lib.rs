//! carik-hub - a multi-tenant chat-bot host
//!
//! Keeps a set of bot instances alive, routes their command messages to
//! permission-gated handlers and hot-loads extension plugins per instance.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::errors::{BotError, PluginError};
pub use application::services::{Host, HostOptions, ProcessSignal};
pub use domain::traits::{Extension, HookError, HookResult, Instance, InstanceFactory};
