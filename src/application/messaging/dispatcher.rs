//! Message dispatcher - Routes command messages to handlers

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, Instrument};

use super::parser::parse_command_line;
use crate::application::errors::BotError;
use crate::domain::entities::{InboundMessage, Invocation, MessageKind, PermissionLevel, Scope, UserId};
use crate::domain::traits::Instance;

/// Handler result
pub type HandlerResult = Result<String, BotError>;

/// Boxed future returned by a handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Handler function type; `C` is the shared context handlers operate on
pub type Handler<C> = Arc<dyn Fn(C, Invocation) -> HandlerFuture + Send + Sync>;

/// Outcome of looking a command token up
pub enum Route<'a, C> {
    Handler(&'a Handler<C>),
    /// Registered, but for the other message kind
    Unsupported,
    Unknown,
}

/// Explicit routing table: scope -> command token -> handler
pub struct CommandDispatcher<C> {
    routes: HashMap<Scope, HashMap<String, Handler<C>>>,
    maintainers: Vec<UserId>,
}

impl<C: Send + 'static> CommandDispatcher<C> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            maintainers: Vec::new(),
        }
    }

    /// Identities that always resolve to the maintainer level
    pub fn with_maintainers(mut self, maintainers: impl Into<Vec<UserId>>) -> Self {
        self.maintainers = maintainers.into();
        self
    }

    pub fn maintainers(&self) -> &[UserId] {
        &self.maintainers
    }

    /// Register a command handler under `scope`
    pub fn register<F, Fut>(&mut self, scope: Scope, command: impl Into<String>, handler: F)
    where
        F: Fn(C, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: Handler<C> = Arc::new(move |ctx, inv| Box::pin(handler(ctx, inv)));
        self.routes
            .entry(scope)
            .or_default()
            .insert(command.into(), handler);
    }

    /// Command tokens registered under `scope`, sorted
    pub fn commands(&self, scope: Scope) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .routes
            .get(&scope)
            .map(|r| r.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    fn lookup(&self, scope: Scope, command: &str) -> Option<&Handler<C>> {
        self.routes.get(&scope).and_then(|r| r.get(command))
    }

    /// Find the handler for `command`: any-kind scope first, then the message kind's own scope
    pub fn route(&self, command: &str, kind: &MessageKind) -> Route<'_, C> {
        let (own, other) = Scope::of(kind);
        if let Some(handler) = self.lookup(Scope::Any, command).or_else(|| self.lookup(own, command)) {
            return Route::Handler(handler);
        }
        if self.lookup(other, command).is_some() {
            Route::Unsupported
        } else {
            Route::Unknown
        }
    }

    /// Turn one inbound message into at most one reply.
    ///
    /// Returns `None` for ordinary chat and for callers below the required
    /// level. Handler errors and panics become `Error: ...` replies.
    pub async fn dispatch(
        &self,
        ctx: C,
        instance: Arc<dyn Instance>,
        message: &InboundMessage,
        prefix: &str,
        masters: &[UserId],
    ) -> Option<String> {
        let line = parse_command_line(prefix, &message.text)?;

        let level = PermissionLevel::resolve(message.sender, &message.kind, &self.maintainers, masters);
        if level < PermissionLevel::required_for(&message.kind) {
            debug!(sender = message.sender, ?level, "ignoring command below required level");
            return None;
        }

        let span = tracing::info_span!(
            "dispatch",
            id = %uuid::Uuid::new_v4(),
            instance = %instance.id(),
            command = %line.command,
        );

        async move {
            info!(raw = %message.text, "received command");

            let reply = match self.route(&line.command, &message.kind) {
                Route::Unknown => format!("Error: unknown command: {}", line.command),
                Route::Unsupported => format!(
                    "Error: command {} is not supported in {}",
                    line.command,
                    if message.kind.is_group() { "group chats" } else { "direct messages" }
                ),
                Route::Handler(handler) => {
                    let invocation = Invocation::from_message(message, line.command.clone(), line.params, instance, level);
                    match tokio::spawn(handler(ctx, invocation)).await {
                        Ok(Ok(reply)) => reply,
                        Ok(Err(e)) => format!("Error: {}", e),
                        Err(e) if e.is_panic() => "Error: command handler panicked".to_string(),
                        Err(e) => format!("Error: {}", e),
                    }
                }
            };

            info!(%reply, "command handled");
            Some(reply)
        }
        .instrument(span)
        .await
    }
}

impl<C: Send + 'static> Default for CommandDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}
