//! Host integration tests: chat commands end to end over console instances
//! Run with: cargo test --test host

mod common;

use std::sync::Arc;
use std::time::Duration;

use carik_hub::application::services::{Host, HostOptions, ProcessSignal};
use carik_hub::domain::entities::{
    BindingRecord, InboundMessage, InstanceEvent, InstanceId, MessageTarget, Role, UserId,
};
use carik_hub::domain::traits::Instance;
use carik_hub::infrastructure::adapters::{ConsoleAdapter, ConsoleFactory};
use carik_hub::infrastructure::config::{BotConfig, Config};
use carik_hub::infrastructure::storage::BindingStore;
use common::{eventually, Recorder, Workspace};

const BOT: InstanceId = InstanceId(10001);
const MASTER: UserId = 42;
const MAINTAINER: UserId = 1;
const GROUP: u64 = 777;

struct Harness {
    ws: Workspace,
    factory: Arc<ConsoleFactory>,
    host: Arc<Host>,
    dice: Arc<Recorder>,
}

impl Harness {
    fn new() -> Self {
        let ws = Workspace::new();
        let dice = ws.install("dice");

        let mut config = Config {
            plugins_dir: ws.plugins_dir(),
            modules_dir: ws.modules_dir(),
            data_dir: ws.data_dir(),
            ..Config::default()
        };
        config.bots.insert(BOT, BotConfig::new(MASTER));

        let factory = Arc::new(ConsoleFactory::new());
        let options = HostOptions {
            maintainers: vec![MAINTAINER],
            notify_delay: Duration::ZERO,
            exit_delay: Duration::ZERO,
        };
        let host = Host::new(
            ws.dir.path().join("carik.yaml"),
            config,
            ws.loader.clone(),
            factory.clone(),
            options,
        );

        Self { ws, factory, host, dice }
    }

    async fn started() -> Self {
        let harness = Self::new();
        assert_eq!(harness.host.start().await, 1);
        harness
    }

    fn console(&self, id: InstanceId) -> Arc<ConsoleAdapter> {
        self.factory.get(id).unwrap()
    }

    async fn instance(&self, id: InstanceId) -> Arc<dyn Instance> {
        self.host.directory().get(id).await.unwrap()
    }

    /// Direct message from `sender` to the main bot
    async fn private(&self, sender: UserId, text: &str) -> Option<String> {
        let bot = self.instance(BOT).await;
        self.host.handle_message(&bot, &InboundMessage::private(sender, text)).await
    }

    async fn group(&self, message: InboundMessage) -> Option<String> {
        let bot = self.instance(BOT).await;
        self.host.handle_message(&bot, &message).await
    }

    async fn admin(&self, text: &str) -> Option<String> {
        self.group(InboundMessage::group(GROUP, 5, text).with_role(Role::Admin))
            .await
    }
}

fn sent_to(console: &ConsoleAdapter, target: MessageTarget, needle: &str) -> bool {
    console
        .sent()
        .iter()
        .any(|(t, text)| *t == target && text.contains(needle))
}

#[tokio::test]
async fn test_start_attaches_and_notifies_masters() {
    let h = Harness::started().await;
    let console = h.console(BOT);

    assert!(console.is_online());
    assert!(h.host.directory().contains(BOT).await);
    assert!(
        eventually(|| sent_to(
            &console,
            MessageTarget::Private(MASTER),
            "Started, 0 plugin(s) enabled, send >help for commands"
        ))
        .await
    );
}

#[tokio::test]
async fn test_start_restores_bindings() {
    let h = Harness::new();
    let mut record = BindingRecord::default();
    record.insert("dice");
    BindingStore::new()
        .save(h.ws.instance(BOT.0).as_ref(), &record)
        .await
        .unwrap();

    h.host.start().await;
    assert_eq!(h.dice.enabled_on(), vec![BOT]);
    let console = h.console(BOT);
    assert!(eventually(|| sent_to(&console, MessageTarget::Private(MASTER), "Started, 1 plugin(s) enabled")).await);
}

#[tokio::test]
async fn test_auto_login_off_is_skipped() {
    let h = Harness::new();
    h.host.config().set_auto_login(BOT, false).await.unwrap();

    assert_eq!(h.host.start().await, 0);
    assert!(h.host.directory().is_empty().await);
}

#[tokio::test]
async fn test_group_commands_need_admin() {
    let h = Harness::started().await;

    let member = InboundMessage::group(GROUP, 5, ">echo hi");
    assert_eq!(h.group(member.clone()).await, None);

    let active = member.clone().with_activity_level(5);
    assert_eq!(h.group(active).await, None);

    assert_eq!(h.group(member.with_role(Role::Admin)).await.as_deref(), Some("hi"));
    assert!(sent_to(&h.console(BOT), MessageTarget::Group(GROUP), "hi"));
}

#[tokio::test]
async fn test_private_commands_need_master() {
    let h = Harness::started().await;

    assert_eq!(h.private(5, ">echo hi").await, None);
    assert_eq!(h.private(MASTER, ">echo hi").await.as_deref(), Some("hi"));
    assert_eq!(h.private(MAINTAINER, ">echo hi").await.as_deref(), Some("hi"));
    assert_eq!(h.private(MASTER, "echo hi").await, None);
}

#[tokio::test]
async fn test_unknown_and_unsupported_commands() {
    let h = Harness::started().await;

    assert_eq!(
        h.private(MASTER, ">bogus").await.as_deref(),
        Some("Error: unknown command: bogus")
    );
    assert_eq!(
        h.admin(">conf").await.as_deref(),
        Some("Error: command conf is not supported in group chats")
    );
    assert_eq!(
        h.private(MASTER, ">list").await.as_deref(),
        Some("Error: command list is not supported in direct messages")
    );
}

#[tokio::test]
async fn test_plug_commands() {
    let h = Harness::started().await;

    let reply = h.private(MASTER, ">plug on dice").await.unwrap();
    assert_eq!(reply, "Success: console-10001 (10001) enabled dice");
    assert_eq!(h.dice.enabled_on(), vec![BOT]);

    let overview = h.private(MASTER, ">plug").await.unwrap();
    assert!(overview.contains("▼ dice (local, loaded g"));
    assert!(overview.contains("\tconsole-10001 (10001)"));
    assert!(overview.ends_with("※ 1 plugin(s) found"));

    let reply = h.private(MASTER, ">plug on dice").await.unwrap();
    assert!(reply.starts_with("Error: plugin dice is already enabled on 10001"));

    let reply = h.private(MASTER, ">plug restart dice").await.unwrap();
    assert_eq!(reply, "Success: dice restarted as g2");
    assert_eq!(h.dice.instantiated(), 2);

    let reply = h.private(MASTER, ">plug off dice").await.unwrap();
    assert_eq!(reply, "Success: console-10001 (10001) disabled dice");
    assert!(h.dice.enabled_on().is_empty());

    assert_eq!(
        h.private(MASTER, ">plug del dice").await.as_deref(),
        Some("Success: dice unloaded")
    );
    assert_eq!(
        h.private(MASTER, ">plug on ghost").await.as_deref(),
        Some("Error: plugin not found: ghost")
    );
    assert_eq!(
        h.private(MASTER, ">plug on").await.as_deref(),
        Some("Error: invalid arguments: missing plugin name")
    );
    assert_eq!(
        h.private(MASTER, ">plug fly dice").await.as_deref(),
        Some("Error: unknown parameter: fly")
    );
}

#[tokio::test]
async fn test_plug_on_all_covers_every_instance() {
    let h = Harness::started().await;
    let other = Arc::new(ConsoleAdapter::new(InstanceId(10002), h.ws.data_dir().join("10002")));
    other.login().await.unwrap();
    h.host.attach(other).await;

    let reply = h.private(MASTER, ">plug on-all dice").await.unwrap();
    assert_eq!(reply, "Success: dice enabled on every bot");
    assert_eq!(h.dice.enabled_on(), vec![BOT, InstanceId(10002)]);

    h.dice.fail_disable.store(true, std::sync::atomic::Ordering::SeqCst);
    let reply = h.private(MASTER, ">plug off-all dice").await.unwrap();
    assert!(reply.starts_with("Error: Execution failed: 10001 (plugin dice failed on 10001: teardown failed)"));
}

#[tokio::test]
async fn test_group_settings() {
    let h = Harness::started().await;
    h.private(MASTER, ">plug on dice").await.unwrap();

    assert_eq!(
        h.admin(">setting off dice").await.as_deref(),
        Some("Success: dice switched off in this group")
    );
    let list = h.admin(">list").await.unwrap();
    assert!(list.contains("\"list\": {\n  \"dice\": false\n}"));

    assert_eq!(
        h.admin(">setting lock dice").await.as_deref(),
        Some("Error: permission denied: only masters can lock settings")
    );
    let from_master = InboundMessage::group(GROUP, MASTER, ">setting lock dice");
    assert_eq!(h.group(from_master).await.as_deref(), Some("Success: dice locked in this group"));

    assert_eq!(
        h.admin(">setting on dice").await.as_deref(),
        Some("Error: permission denied: settings of dice are locked")
    );
    let shown = h.admin(">setting").await.unwrap();
    assert!(shown.starts_with("\"777\": {"));
    assert!(shown.contains("\"lock\": true"));

    assert_eq!(
        h.admin(">setting on rss").await.as_deref(),
        Some("Error: invalid arguments: plugin rss is not enabled on this bot")
    );
}

#[tokio::test]
async fn test_conf_and_runtime_params() {
    let h = Harness::started().await;

    assert_eq!(
        h.private(MASTER, ">conf prefix !").await.as_deref(),
        Some("Success: prefix '>' >>> '!'")
    );
    assert_eq!(h.private(MASTER, ">echo hi").await, None);
    assert_eq!(h.private(MASTER, "!echo hi").await.as_deref(), Some("hi"));

    assert_eq!(
        h.private(MASTER, "!conf add-master 7").await.as_deref(),
        Some("Success: masters: 42, 7")
    );
    assert_eq!(h.private(7, "!echo promoted").await.as_deref(), Some("promoted"));

    let saved = Config::load(h.ws.dir.path().join("carik.yaml")).unwrap();
    assert_eq!(saved.bots[&BOT].prefix, "!");
    assert_eq!(saved.bots[&BOT].masters, vec![MASTER, 7]);

    assert!(h.private(MASTER, "!conf platform 9").await.unwrap().starts_with("Error: "));
    assert!(h.private(MASTER, "!conf").await.unwrap().starts_with("Settings of 10001:\n"));

    assert_eq!(
        h.private(MASTER, "!set resend false").await.as_deref(),
        Some("Success: resend = false")
    );
    assert_eq!(
        h.private(MASTER, "!set nope 1").await.as_deref(),
        Some("Error: invalid arguments: unknown key: nope")
    );
    assert!(h.private(MASTER, "!set").await.unwrap().contains("\"resend\": false"));
}

#[tokio::test]
async fn test_bot_login_registers_new_instance() {
    let h = Harness::started().await;
    let id = InstanceId(10002);

    assert_eq!(
        h.private(MASTER, ">bot login 10002").await.as_deref(),
        Some("Starting login of 10002")
    );

    let console = h.console(BOT);
    assert!(eventually(|| sent_to(&console, MessageTarget::Private(MASTER), "Login succeeded")).await);
    assert!(h.host.directory().contains(id).await);
    assert_eq!(h.host.config().bot(id).await.unwrap().masters, vec![MASTER]);

    assert_eq!(
        h.private(MASTER, ">bot login 10002").await.as_deref(),
        Some("Error: invalid arguments: 10002 is already logged in")
    );
    assert_eq!(
        h.private(MASTER, ">bot login").await.as_deref(),
        Some("Error: invalid arguments: missing account number")
    );

    let listing = h.private(MASTER, ">bot").await.unwrap();
    assert!(listing.contains("▼ console-10001 (10001)"));
    assert!(listing.contains("▼ console-10002 (10002)\n\tstatus: online"));
}

#[tokio::test]
async fn test_bot_delete_requires_offline() {
    let h = Harness::started().await;
    h.private(MASTER, ">plug on dice").await.unwrap();

    assert_eq!(
        h.private(MASTER, ">bot del 10001").await.as_deref(),
        Some("Error: invalid arguments: 10001 is online, take it offline before deleting")
    );
    assert_eq!(
        h.private(MASTER, ">bot off 10001").await.as_deref(),
        Some("Success: 10001 is offline")
    );
    assert_eq!(
        h.private(MASTER, ">bot del 10001").await.as_deref(),
        Some("Success: deleted 10001, 1 plugin(s) disabled")
    );

    assert!(h.host.directory().is_empty().await);
    assert!(h.dice.enabled_on().is_empty());
    assert!(!h.host.registry().get("dice").unwrap().is_bound(BOT));
}

#[tokio::test]
async fn test_bot_delete_releases_failed_plugins() {
    let h = Harness::started().await;
    h.private(MASTER, ">plug on dice").await.unwrap();
    h.dice.fail_disable.store(true, std::sync::atomic::Ordering::SeqCst);

    h.private(MASTER, ">bot off 10001").await.unwrap();
    assert_eq!(
        h.private(MASTER, ">bot del 10001").await.as_deref(),
        Some("Success: deleted 10001, 0 plugin(s) disabled")
    );
    assert!(!h.host.registry().get("dice").unwrap().is_bound(BOT));

    // Logging the same account in again starts from a clean binding
    let again = Arc::new(ConsoleAdapter::new(BOT, h.ws.data_dir().join("10001")));
    again.login().await.unwrap();
    assert_eq!(h.host.attach(again.clone()).await, 0);
    h.host.registry().enable("dice", again).await.unwrap();
}

#[tokio::test]
async fn test_events_flow_in_order() {
    let h = Harness::started().await;
    let console = h.console(BOT);

    for i in 0..5 {
        console.push_message(InboundMessage::private(MASTER, format!(">echo line {}", i)));
    }
    assert!(eventually(|| sent_to(&console, MessageTarget::Private(MASTER), "line 4")).await);
    let echoed: Vec<_> = console
        .sent()
        .into_iter()
        .filter(|(_, text)| text.starts_with("line "))
        .map(|(_, text)| text)
        .collect();
    assert_eq!(echoed, vec!["line 0", "line 1", "line 2", "line 3", "line 4"]);

    console.emit(InstanceEvent::Offline {
        reason: "network lost".to_string(),
    });
    assert!(
        eventually(|| sent_to(
            &console,
            MessageTarget::Private(MASTER),
            "Notice: 10001 went offline, reason: network lost"
        ))
        .await
    );

    console.emit(InstanceEvent::Online);
    assert!(eventually(|| sent_to(&console, MessageTarget::Private(MASTER), "recovered from going offline")).await);
}

#[tokio::test]
async fn test_shutdown_is_signalled_after_reply() {
    let h = Harness::started().await;
    let mut signals = h.host.signals();
    assert_eq!(*signals.borrow(), ProcessSignal::Running);

    assert_eq!(
        h.private(MASTER, ">shutdown").await.as_deref(),
        Some("Shutting down...")
    );
    tokio::time::timeout(Duration::from_secs(2), signals.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*signals.borrow(), ProcessSignal::Shutdown);

    h.host.shutdown_all().await;
    assert!(!h.console(BOT).is_online());
}

#[tokio::test]
async fn test_help_topics() {
    let h = Harness::started().await;

    let overview = h.private(MASTER, ">help").await.unwrap();
    assert!(overview.contains(">bot login <uin>"));
    assert!(overview.contains(">shutdown"));

    let plug = h.private(MASTER, ">help plug").await.unwrap();
    assert!(plug.starts_with("Plugin commands:"));
    assert_eq!(h.private(MASTER, ">plug help").await, Some(plug));

    let setting = h.admin(">setting help").await.unwrap();
    assert!(setting.contains(">setting lock|unlock <plug>"));
}
