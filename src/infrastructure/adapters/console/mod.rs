//! Console adapter for development/testing
//!
//! A loopback [`Instance`]: inbound events are pushed in by the caller (stdin
//! in dev mode, the test body in tests) and outgoing messages are printed
//! and kept in an outbox.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::application::errors::BotError;
use crate::domain::entities::{InboundMessage, InstanceEvent, InstanceId, InstanceStatus, MessageTarget};
use crate::domain::traits::{Instance, InstanceFactory};

const EVENT_CAPACITY: usize = 64;

/// Console bot instance for local development
pub struct ConsoleAdapter {
    id: InstanceId,
    nickname: String,
    data_dir: PathBuf,
    online: AtomicBool,
    login_error: Mutex<Option<String>>,
    events: broadcast::Sender<InstanceEvent>,
    outbox: Mutex<Vec<(MessageTarget, String)>>,
    echo: bool,
}

impl ConsoleAdapter {
    pub fn new(id: InstanceId, data_dir: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            nickname: format!("console-{}", id),
            data_dir: data_dir.into(),
            online: AtomicBool::new(false),
            login_error: Mutex::new(None),
            events,
            outbox: Mutex::new(Vec::new()),
            echo: false,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    /// Print outgoing messages to stdout
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Make the next logins fail with `reason`
    pub fn fail_login(&self, reason: impl Into<String>) {
        *self.login_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Publish an event to subscribers; returns false when nobody listens
    pub fn emit(&self, event: InstanceEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn push_message(&self, message: InboundMessage) -> bool {
        self.emit(InstanceEvent::Message(message))
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<(MessageTarget, String)> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drain the outbox
    pub fn take_sent(&self) -> Vec<(MessageTarget, String)> {
        std::mem::take(&mut *self.outbox.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[async_trait]
impl Instance for ConsoleAdapter {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn nickname(&self) -> String {
        self.nickname.clone()
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn status(&self) -> InstanceStatus {
        InstanceStatus {
            groups: 0,
            friends: 1,
            messages_per_minute: 0,
        }
    }

    async fn send_message(&self, target: MessageTarget, text: &str) -> Result<(), BotError> {
        if self.echo {
            println!("[BOT {}] {}", self.id, text);
        }
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target, text.to_string()));
        Ok(())
    }

    async fn login(&self) -> Result<(), BotError> {
        if let Some(reason) = self.login_error.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(BotError::Auth(reason));
        }
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| BotError::Internal(e.to_string()))?;
        self.set_online(true);
        let _ = self.events.send(InstanceEvent::Online);
        tracing::info!("Console instance {} online", self.id);
        Ok(())
    }

    async fn logout(&self) -> Result<(), BotError> {
        self.set_online(false);
        let _ = self.events.send(InstanceEvent::Offline {
            reason: "logged out".to_string(),
        });
        Ok(())
    }

    fn terminate(&self) {
        self.set_online(false);
    }

    fn subscribe(&self) -> broadcast::Receiver<InstanceEvent> {
        self.events.subscribe()
    }
}

/// Creates console instances; keeps them so callers can drive them later
#[derive(Default)]
pub struct ConsoleFactory {
    created: Mutex<Vec<Arc<ConsoleAdapter>>>,
    echo: bool,
}

impl ConsoleFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn created(&self) -> Vec<Arc<ConsoleAdapter>> {
        self.created.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get(&self, id: InstanceId) -> Option<Arc<ConsoleAdapter>> {
        self.created().into_iter().rev().find(|c| c.id() == id)
    }
}

#[async_trait]
impl InstanceFactory for ConsoleFactory {
    async fn create(&self, id: InstanceId, data_dir: PathBuf) -> Result<Arc<dyn Instance>, BotError> {
        let mut adapter = ConsoleAdapter::new(id, data_dir);
        if self.echo {
            adapter = adapter.with_echo();
        }
        let adapter = Arc::new(adapter);
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&adapter));
        Ok(adapter)
    }
}
