//! Built-in chat commands
//!
//! Plain functions over the [`Host`] operations; each returns the reply
//! text or an error the dispatcher turns into an `Error: ...` reply.

use std::sync::Arc;

use super::help;
use super::host::{Host, ProcessSignal};
use crate::application::errors::{BotError, CommandError, ConfigError, PluginError, StorageError};
use crate::application::messaging::{CommandDispatcher, HandlerResult};
use crate::application::plugins::{PluginHandle, PluginOrigin};
use crate::domain::entities::{
    InstanceId, Invocation, MessageTarget, PermissionLevel, PluginSetting, Scope, UserId,
};
use crate::infrastructure::config::{LOG_LEVELS, PLATFORMS};

/// Install every built-in command
pub fn register(d: &mut CommandDispatcher<Arc<Host>>) {
    d.register(Scope::Any, "echo", echo);

    d.register(Scope::Group, "setting", setting);
    d.register(Scope::Group, "list", list);

    d.register(Scope::Private, "help", show_help);
    d.register(Scope::Private, "conf", conf);
    d.register(Scope::Private, "plug", plug);
    d.register(Scope::Private, "set", set);
    d.register(Scope::Private, "bot", bot);
    d.register(Scope::Private, "restart", restart);
    d.register(Scope::Private, "shutdown", shutdown);
}

fn usage(message: impl Into<String>) -> BotError {
    CommandError::InvalidArgs(message.into()).into()
}

fn unknown(param: &str) -> BotError {
    CommandError::UnknownParam(param.to_string()).into()
}

fn parse_id(raw: Option<&str>) -> Result<InstanceId, BotError> {
    let raw = raw.ok_or_else(|| usage("missing account number"))?;
    raw.parse().map_err(|_| usage(format!("not an account number: {}", raw)))
}

fn parse_user(raw: Option<&str>) -> Result<UserId, BotError> {
    parse_id(raw).map(|id| id.0)
}

fn join_ids(ids: &[UserId]) -> String {
    ids.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ")
}

async fn echo(_: Arc<Host>, inv: Invocation) -> HandlerResult {
    Ok(inv.params.join(" "))
}

async fn show_help(host: Arc<Host>, inv: Invocation) -> HandlerResult {
    let prefix = host.prefix(inv.instance_id()).await;
    Ok(help::lookup(inv.param(0), &prefix))
}

async fn restart(host: Arc<Host>, _: Invocation) -> HandlerResult {
    host.schedule(ProcessSignal::Restart);
    Ok("Restarting...".to_string())
}

async fn shutdown(host: Arc<Host>, _: Invocation) -> HandlerResult {
    host.schedule(ProcessSignal::Shutdown);
    Ok("Shutting down...".to_string())
}

// Group settings

async fn setting(host: Arc<Host>, inv: Invocation) -> HandlerResult {
    let group_id = inv.kind.group_id().ok_or_else(|| usage("group only"))?;
    let instance = inv.instance.as_ref();

    let action = match inv.param(0) {
        None => {
            let record = host.bindings().load(instance).await;
            let settings = record.group(group_id).cloned().unwrap_or_default();
            let json = serde_json::to_string_pretty(&settings).map_err(StorageError::from)?;
            return Ok(format!("\"{}\": {}", group_id, json));
        }
        Some("help") => {
            let prefix = host.prefix(inv.instance_id()).await;
            return Ok(help::lookup(Some("setting"), &prefix));
        }
        Some(action @ ("default" | "on" | "off" | "lock" | "unlock")) => action,
        Some(other) => return Err(unknown(other)),
    };

    let plugin = inv.param(1).ok_or_else(|| usage("missing plugin name"))?;
    let is_master = inv.level >= PermissionLevel::Master;
    if matches!(action, "lock" | "unlock") && !is_master {
        return Err(CommandError::PermissionDenied("only masters can lock settings".to_string()).into());
    }

    let outcome = host
        .bindings()
        .update(instance, |record| -> Result<String, CommandError> {
            if !record.contains(plugin) {
                return Err(CommandError::InvalidArgs(format!("plugin {} is not enabled on this bot", plugin)));
            }
            let entry = record
                .group_mut(group_id)
                .setting
                .entry(plugin.to_string())
                .or_default();
            if entry.lock && !is_master && !matches!(action, "lock" | "unlock") {
                return Err(CommandError::PermissionDenied(format!("settings of {} are locked", plugin)));
            }

            Ok(match action {
                "default" => {
                    *entry = PluginSetting::default();
                    format!("{} reset to defaults in this group", plugin)
                }
                "on" | "off" => {
                    entry.switch = action == "on";
                    format!("{} switched {} in this group", plugin, action)
                }
                _ => {
                    entry.lock = action == "lock";
                    format!("{} {}ed in this group", plugin, action)
                }
            })
        })
        .await??;

    Ok(format!("Success: {}", outcome))
}

async fn list(host: Arc<Host>, inv: Invocation) -> HandlerResult {
    let group_id = inv.kind.group_id().ok_or_else(|| usage("group only"))?;
    let record = host.bindings().load(inv.instance.as_ref()).await;
    let prefix = host.prefix(inv.instance_id()).await;

    let mut lines = vec![format!("// send {}setting for details", prefix), "\"list\": {".to_string()];
    if let Some(group) = record.group(group_id) {
        for (name, setting) in &group.setting {
            lines.push(format!("  \"{}\": {}", name, setting.switch));
        }
    }
    lines.push("}".to_string());
    Ok(lines.join("\n"))
}

// Host configuration

async fn conf(host: Arc<Host>, inv: Invocation) -> HandlerResult {
    let id = inv.instance_id();
    let config = host.config();

    let changed = match inv.param(0) {
        None => {
            let bot = config
                .bot(id)
                .await
                .ok_or_else(|| CommandError::NoSuchInstance(id.to_string()))?;
            let yaml = serde_yaml::to_string(&bot).map_err(|e| ConfigError::Parse(e.to_string()))?;
            return Ok(format!("Settings of {}:\n{}", id, yaml));
        }
        Some("help") => {
            let prefix = host.prefix(id).await;
            return Ok(help::lookup(Some("conf"), &prefix));
        }
        Some("autologin") => {
            let enabled = match inv.param(1) {
                Some("on") => true,
                Some("off") => false,
                _ => return Err(usage("expected on or off")),
            };
            config.set_auto_login(id, enabled).await?;
            format!("auto-login {}", if enabled { "enabled" } else { "disabled" })
        }
        Some("add-master") => {
            let masters = config.add_master(id, parse_user(inv.param(1))?).await?;
            format!("masters: {}", join_ids(&masters))
        }
        Some("del-master") => {
            let masters = config.remove_master(id, parse_user(inv.param(1))?).await?;
            format!("masters: {}", join_ids(&masters))
        }
        Some("prefix") => {
            let prefix = inv.param(1).unwrap_or_default();
            let old = config.set_prefix(id, prefix).await?;
            format!("prefix '{}' >>> '{}'", old, prefix)
        }
        Some("platform") => {
            let platform: u8 = inv
                .param(1)
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| usage(format!("platform must be one of {:?}", PLATFORMS)))?;
            let old = config.set_platform(id, platform).await?;
            format!("platform {} >>> {}", old, platform)
        }
        Some("log-level") => {
            let level = inv
                .param(1)
                .ok_or_else(|| usage(format!("log level must be one of {:?}", LOG_LEVELS)))?;
            let old = config.set_log_level(id, level).await?;
            format!("log-level '{}' >>> '{}'", old, level)
        }
        Some(other) => return Err(unknown(other)),
    };

    Ok(format!("Success: {}", changed))
}

async fn set(host: Arc<Host>, inv: Invocation) -> HandlerResult {
    let instance = inv.instance.as_ref();

    let Some(key) = inv.param(0) else {
        let prefix = host.prefix(inv.instance_id()).await;
        let params = host.params().load(instance).await;
        return Ok(format!(
            "// change with {}set <key> <value>\n// a new platform takes effect on the next login\n\"{}\": {}",
            prefix,
            inv.instance_id(),
            params.to_pretty()
        ));
    };
    let raw = inv.param(1).ok_or_else(|| usage("missing value"))?;

    let value = host.params().set(instance, key, raw).await?;
    instance.reconfigure(key, &value);
    Ok(format!("Success: {} = {}", key, value))
}

// Plugins

async fn plug(host: Arc<Host>, inv: Invocation) -> HandlerResult {
    let Some(action) = inv.param(0) else {
        return Ok(plugin_overview(&host).await);
    };
    if action == "help" {
        let prefix = host.prefix(inv.instance_id()).await;
        return Ok(help::lookup(Some("plug"), &prefix));
    }

    let name = inv.param(1).ok_or_else(|| usage("missing plugin name"))?;
    let registry = host.registry();

    let done = match action {
        "on" | "off" => {
            let instance = match inv.param(2) {
                Some(raw) => host.instance(parse_id(Some(raw))?).await?,
                None => Arc::clone(&inv.instance),
            };
            if action == "on" {
                registry.enable(name, Arc::clone(&instance)).await?;
            } else {
                registry.disable(name, &instance).await?;
            }
            format!("{} ({}) {} {}", instance.nickname(), instance.id(), if action == "on" { "enabled" } else { "disabled" }, name)
        }
        "on-all" | "off-all" => {
            let mut failed = Vec::new();
            for instance in host.directory().instances().await {
                let result = if action == "on-all" {
                    registry.enable(name, Arc::clone(&instance)).await
                } else {
                    registry.disable(name, &instance).await
                };
                match result {
                    Ok(()) | Err(PluginError::AlreadyBound { .. }) | Err(PluginError::NotBound { .. }) => {}
                    Err(e) => failed.push(format!("{} ({})", instance.id(), e)),
                }
            }
            if !failed.is_empty() {
                return Err(CommandError::ExecutionFailed(failed.join(", ")).into());
            }
            format!("{} {} on every bot", name, if action == "on-all" { "enabled" } else { "disabled" })
        }
        "del" => {
            registry.unload(name).await?;
            format!("{} unloaded", name)
        }
        "restart" => {
            let generation = registry.reboot(name).await?;
            format!("{} restarted as {}", name, generation)
        }
        other => return Err(unknown(other)),
    };

    Ok(format!("Success: {}", done))
}

fn push_handle(lines: &mut Vec<String>, label: String, handle: &PluginHandle) {
    lines.push(format!("▼ {} ({}, loaded {})", handle.name(), label, handle.generation()));
    for instance in handle.bound_instances() {
        lines.push(format!("\t{} ({})", instance.nickname(), instance.id()));
    }
}

async fn plugin_overview(host: &Host) -> String {
    let registry = host.registry();
    let discovered = registry.list_discoverable().await;
    let mut lines = vec!["Available plugins:".to_string()];

    for plugin in &discovered {
        let origin = match plugin.origin {
            PluginOrigin::Local => "local",
            PluginOrigin::Shared => "shared",
        };
        match registry.get(&plugin.name) {
            Some(handle) => push_handle(&mut lines, origin.to_string(), &handle),
            None => lines.push(format!("▼ {} ({}, not loaded)", plugin.name, origin)),
        }
    }

    // Loaded plugins without a manifest on disk
    for handle in registry.handles() {
        if !discovered.iter().any(|p| p.name == handle.name()) {
            push_handle(&mut lines, "built-in".to_string(), &handle);
        }
    }

    lines.push(format!("\n※ {} plugin(s) found", discovered.len()));
    lines.join("\n")
}

// Instances

async fn bot(host: Arc<Host>, inv: Invocation) -> HandlerResult {
    let Some(action) = inv.param(0) else {
        return Ok(instance_overview(&host).await);
    };

    match action {
        "help" => {
            let prefix = host.prefix(inv.instance_id()).await;
            Ok(help::lookup(Some("bot"), &prefix))
        }
        "login" => {
            let id = parse_id(inv.param(1))?;
            host.login(id, inv.sender, Arc::clone(&inv.instance), MessageTarget::Private(inv.sender))
                .await
        }
        "off" => {
            let id = parse_id(inv.param(1))?;
            host.instance(id).await?.logout().await?;
            Ok(format!("Success: {} is offline", id))
        }
        "on" => {
            let id = parse_id(inv.param(1))?;
            host.instance(id).await?.login().await?;
            Ok(format!("Success: {} is online", id))
        }
        "del" => {
            let id = parse_id(inv.param(1))?;
            let disabled = host.delete(id).await?;
            Ok(format!("Success: deleted {}, {} plugin(s) disabled", id, disabled))
        }
        other => Err(unknown(other)),
    }
}

async fn instance_overview(host: &Host) -> String {
    let mut lines = vec!["Logged-in accounts:".to_string()];
    for entry in host.directory().entries().await {
        let instance = &entry.instance;
        let status = instance.status();
        lines.push(format!(
            "▼ {} ({})\n\tstatus: {}\n\tgroups: {}\n\tfriends: {}\n\tmessages: {} / min\n\tsince: {}",
            instance.nickname(),
            instance.id(),
            if instance.is_online() { "online" } else { "offline" },
            status.groups,
            status.friends,
            status.messages_per_minute,
            entry.attached_at.format("%Y-%m-%d %H:%M:%S"),
        ));
    }
    lines.join("\n")
}
