//! Host - owns every instance, the plugin runtime and the command routes
//!
//! One `Host` is built at start-up and shared as `Arc<Host>`; command
//! handlers receive it as their context.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use super::builtins;
use super::directory::InstanceDirectory;
use crate::application::errors::{BotError, CommandError};
use crate::application::messaging::CommandDispatcher;
use crate::application::plugins::PluginRegistry;
use crate::domain::entities::{InboundMessage, InstanceEvent, InstanceId, MessageTarget, UserId};
use crate::domain::traits::{Instance, InstanceFactory};
use crate::infrastructure::config::{Config, ConfigStore};
use crate::infrastructure::plugins::{ModuleLoader, PluginResolver};
use crate::infrastructure::storage::{BindingStore, ParamStore};

/// Maintenance operators compiled into the binary
pub const MAINTAINERS: &[UserId] = &[];

/// What the process should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Running,
    Restart,
    Shutdown,
}

/// Tunables of a [`Host`]
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub maintainers: Vec<UserId>,
    /// Wait before the start-up notice goes to the masters
    pub notify_delay: Duration,
    /// Wait between a restart/shutdown reply and the signal
    pub exit_delay: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            maintainers: MAINTAINERS.to_vec(),
            notify_delay: Duration::from_secs(1),
            exit_delay: Duration::from_secs(3),
        }
    }
}

pub struct Host {
    config: ConfigStore,
    registry: PluginRegistry,
    params: ParamStore,
    directory: InstanceDirectory,
    factory: Arc<dyn InstanceFactory>,
    dispatcher: CommandDispatcher<Arc<Host>>,
    signal: watch::Sender<ProcessSignal>,
    options: HostOptions,
}

impl Host {
    pub fn new(
        config_path: impl Into<PathBuf>,
        config: Config,
        loader: Arc<dyn ModuleLoader>,
        factory: Arc<dyn InstanceFactory>,
        options: HostOptions,
    ) -> Arc<Self> {
        let resolver = PluginResolver::new(config.plugins_dir.clone(), config.modules_dir.clone());
        let registry = PluginRegistry::new(resolver, loader, Arc::new(BindingStore::new()));

        let mut dispatcher = CommandDispatcher::new().with_maintainers(options.maintainers.clone());
        builtins::register(&mut dispatcher);

        let (signal, _) = watch::channel(ProcessSignal::Running);

        Arc::new(Self {
            config: ConfigStore::new(config_path, config),
            registry,
            params: ParamStore::new(),
            directory: InstanceDirectory::new(),
            factory,
            dispatcher,
            signal,
            options,
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn bindings(&self) -> &BindingStore {
        self.registry.store()
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    pub fn directory(&self) -> &InstanceDirectory {
        &self.directory
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<Arc<Host>> {
        &self.dispatcher
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    /// Watch for restart/shutdown requests
    pub fn signals(&self) -> watch::Receiver<ProcessSignal> {
        self.signal.subscribe()
    }

    /// Command prefix of an instance
    pub async fn prefix(&self, id: InstanceId) -> String {
        self.config.bot(id).await.unwrap_or_default().prefix
    }

    /// Log in every configured bot that has auto-login on.
    ///
    /// A bot that fails to come up is logged and skipped. Returns how many
    /// instances were attached.
    pub async fn start(self: &Arc<Self>) -> usize {
        let config = self.config.snapshot().await;
        let mut attached = 0;

        for (id, bot) in &config.bots {
            if !bot.auto_login {
                info!(instance = %id, "auto-login disabled, skipping");
                continue;
            }
            let instance = match self.factory.create(*id, config.instance_dir(*id)).await {
                Ok(instance) => instance,
                Err(e) => {
                    error!(instance = %id, error = %e, "failed to create instance");
                    continue;
                }
            };

            info!(instance = %id, "logging in");
            let _guard = self.directory.lock(*id).await;
            if let Err(e) = instance.login().await {
                error!(instance = %id, error = %e, "login failed");
                instance.terminate();
                continue;
            }
            self.attach_locked(instance).await;
            attached += 1;
        }

        attached
    }

    /// Register a logged-in instance, start its event task and restore its plugins.
    /// Returns how many plugins ended up enabled.
    pub async fn attach(self: &Arc<Self>, instance: Arc<dyn Instance>) -> usize {
        let _guard = self.directory.lock(instance.id()).await;
        self.attach_locked(instance).await
    }

    async fn attach_locked(self: &Arc<Self>, instance: Arc<dyn Instance>) -> usize {
        let id = instance.id();
        let events = instance.subscribe();
        let task = tokio::spawn(Self::pump(Arc::downgrade(self), Arc::clone(&instance), events));
        self.directory.insert(Arc::clone(&instance), task).await;

        self.bindings().restore_all(&self.registry, Arc::clone(&instance)).await;
        let enabled = self.registry.bound_count(instance.as_ref());

        let host = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(host.options.notify_delay).await;
            let prefix = host.prefix(id).await;
            let notice = format!(
                "Started, {} plugin(s) enabled, send {}help for commands",
                enabled, prefix
            );
            host.notify_masters(instance.as_ref(), &notice).await;
        });

        info!(instance = %id, enabled, "instance attached");
        enabled
    }

    /// Process one instance's events strictly in arrival order
    async fn pump(host: Weak<Host>, instance: Arc<dyn Instance>, mut events: broadcast::Receiver<InstanceEvent>) {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(instance = %instance.id(), skipped, "event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(host) = host.upgrade() else { break };
            host.handle_event(&instance, event).await;
        }
    }

    async fn handle_event(self: &Arc<Self>, instance: &Arc<dyn Instance>, event: InstanceEvent) {
        match event {
            InstanceEvent::Online => {
                info!(instance = %instance.id(), "instance back online");
                self.notify_masters(
                    instance.as_ref(),
                    "This account recovered from going offline, everything is back to normal",
                )
                .await;
            }
            InstanceEvent::Offline { reason } => {
                warn!(instance = %instance.id(), %reason, "instance offline");
                self.broadcast_all(&format!("{} went offline, reason: {}", instance.id(), reason))
                    .await;
            }
            InstanceEvent::Message(message) => {
                self.handle_message(instance, &message).await;
            }
        }
    }

    /// Dispatch one inbound message and send the reply, if any
    pub async fn handle_message(self: &Arc<Self>, instance: &Arc<dyn Instance>, message: &InboundMessage) -> Option<String> {
        let bot = self.config.bot(instance.id()).await.unwrap_or_default();
        let reply = self
            .dispatcher
            .dispatch(Arc::clone(self), Arc::clone(instance), message, &bot.prefix, &bot.masters)
            .await?;

        if let Err(e) = instance.send_message(message.reply_target(), &reply).await {
            warn!(instance = %instance.id(), error = %e, "failed to deliver reply");
        }
        Some(reply)
    }

    /// Send a notice from `instance` to its own masters
    pub async fn notify_masters(&self, instance: &dyn Instance, text: &str) {
        let masters = self.config.bot(instance.id()).await.map(|b| b.masters).unwrap_or_default();
        for master in masters {
            if let Err(e) = instance.send_message(MessageTarget::Private(master), &format!("Notice: {}", text)).await {
                warn!(instance = %instance.id(), master, error = %e, "failed to notify master");
            }
        }
    }

    /// Every online instance tells every configured master
    pub async fn broadcast_all(&self, text: &str) {
        let masters: BTreeSet<UserId> = self
            .config
            .snapshot()
            .await
            .bots
            .values()
            .flat_map(|b| b.masters.iter().copied())
            .collect();

        for instance in self.directory.instances().await {
            if !instance.is_online() {
                continue;
            }
            for master in &masters {
                let notice = format!("Notice: {}", text);
                if let Err(e) = instance.send_message(MessageTarget::Private(*master), &notice).await {
                    warn!(instance = %instance.id(), master, error = %e, "failed to broadcast");
                }
            }
        }
    }

    /// Start logging a new identity in.
    ///
    /// Returns once the instance exists; the login itself runs in the
    /// background and its outcome is sent to `reply_to` through `origin`.
    pub async fn login(
        self: &Arc<Self>,
        id: InstanceId,
        requester: UserId,
        origin: Arc<dyn Instance>,
        reply_to: MessageTarget,
    ) -> Result<String, BotError> {
        if self.directory.contains(id).await {
            return Err(CommandError::InvalidArgs(format!("{} is already logged in", id)).into());
        }

        let data_dir = self.config.instance_dir(id).await;
        let instance = self.factory.create(id, data_dir).await?;

        let host = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match host.complete_login(instance, requester).await {
                Ok(_) => "Login succeeded".to_string(),
                Err(e) => {
                    error!(instance = %id, error = %e, "login failed");
                    format!("Error: login of {} failed: {}", id, e)
                }
            };
            if let Err(e) = origin.send_message(reply_to, &outcome).await {
                warn!(instance = %origin.id(), error = %e, "failed to report login outcome");
            }
        });

        Ok(format!("Starting login of {}", id))
    }

    async fn complete_login(self: &Arc<Self>, instance: Arc<dyn Instance>, requester: UserId) -> Result<usize, BotError> {
        let id = instance.id();
        let _guard = self.directory.lock(id).await;
        if self.directory.contains(id).await {
            instance.terminate();
            return Err(CommandError::InvalidArgs(format!("{} is already logged in", id)).into());
        }

        if let Err(e) = instance.login().await {
            instance.terminate();
            return Err(e);
        }

        if self.config.bot(id).await.is_none() {
            if let Err(e) = self.config.add_bot(id, requester).await {
                instance.terminate();
                return Err(e.into());
            }
        }

        Ok(self.attach_locked(instance).await)
    }

    /// Attached instance by identity
    pub async fn instance(&self, id: InstanceId) -> Result<Arc<dyn Instance>, BotError> {
        self.directory
            .get(id)
            .await
            .ok_or_else(|| CommandError::NoSuchInstance(id.to_string()).into())
    }

    /// Delete an offline instance: disable all its plugins and forget it.
    /// Returns how many plugins were disabled cleanly.
    pub async fn delete(&self, id: InstanceId) -> Result<usize, BotError> {
        let _guard = self.directory.lock(id).await;
        let instance = self.instance(id).await?;
        if instance.is_online() {
            return Err(CommandError::InvalidArgs(format!("{} is online, take it offline before deleting", id)).into());
        }

        let disabled = self.registry.disable_all(&instance).await;
        let stale = self.registry.release(&instance).await;
        if stale > 0 {
            warn!(instance = %id, stale, "plugins failed to disable and were released");
        }
        self.directory.remove(id).await;
        info!(instance = %id, disabled, "instance deleted");
        Ok(disabled)
    }

    /// Log every instance out and drop the connections
    pub async fn shutdown_all(&self) {
        for instance in self.directory.instances().await {
            if instance.is_online() {
                if let Err(e) = instance.logout().await {
                    warn!(instance = %instance.id(), error = %e, "logout failed");
                }
            }
            instance.terminate();
        }
    }

    /// Publish `signal` after the exit delay so the current reply goes out first
    pub fn schedule(self: &Arc<Self>, signal: ProcessSignal) {
        let host = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(host.options.exit_delay).await;
            info!(?signal, "process signal");
            host.signal.send_replace(signal);
        });
    }
}
