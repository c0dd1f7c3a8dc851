//! Help texts for the built-in commands

const RULE: &str = "--------------------";

fn bot(p: &str) -> String {
    format!(
        "{RULE}
{p}bot  ## list all bot instances
{p}bot login <uin>  ## log a new bot in
{p}bot off <uin>  ## take a bot offline
{p}bot on <uin>  ## bring a bot back online
{p}bot del <uin>  ## delete an offline bot
{p}bot help  ## show this help

※ <uin> is an account number
"
    )
}

fn plug(p: &str) -> String {
    format!(
        "{RULE}
{p}plug  ## list plugins and the bots using them
{p}plug on <name> [uin]  ## enable a plugin on this bot (or <uin>)
{p}plug off <name> [uin]  ## disable a plugin on this bot (or <uin>)
{p}plug on-all <name>  ## enable a plugin on every bot
{p}plug off-all <name>  ## disable a plugin on every bot
{p}plug del <name>  ## unload a plugin
{p}plug restart <name>  ## reload a plugin from disk
{p}plug help  ## show this help

※ <name> is a plugin name
"
    )
}

fn conf(p: &str) -> String {
    format!(
        "{RULE}
{p}conf  ## show this bot's settings
{p}conf autologin on|off  ## toggle automatic login
{p}conf add-master <uin>  ## add a master
{p}conf del-master <uin>  ## remove a master
{p}conf prefix <prefix>  ## change the command prefix
{p}conf platform <1-5>  ## change the login platform
{p}conf log-level <level>  ## change the client log level
{p}conf help  ## show this help

※ <uin> is an account number
"
    )
}

fn setting(p: &str) -> String {
    format!(
        "{RULE}
{p}setting  ## show plugin settings of this group
{p}setting default <plug>  ## reset a plugin's settings
{p}setting on|off <plug>  ## switch a plugin on or off here
{p}setting lock|unlock <plug>  ## freeze a plugin's settings (masters only)
{p}list  ## show which plugins are on in this group

※ <plug> is a plugin name
"
    )
}

/// Help for `topic`, or the overview when the topic is unknown or absent
pub fn lookup(topic: Option<&str>, prefix: &str) -> String {
    match topic {
        Some("bot") => format!("Bot commands:\n{}", bot(prefix)),
        Some("plug") => format!("Plugin commands:\n{}", plug(prefix)),
        Some("conf") => format!("Settings commands:\n{}", conf(prefix)),
        Some("setting") => format!("Group plugin commands:\n{}", setting(prefix)),
        _ => overview(prefix),
    }
}

fn overview(p: &str) -> String {
    format!(
        "Management commands (carik-hub v{}):
{}{}{}{RULE}
{p}echo <msg>  ## repeat a message
{p}set [key] [value]  ## show or change runtime parameters
{p}restart  ## restart the process
{p}shutdown  ## stop the process",
        env!("CARGO_PKG_VERSION"),
        bot(p),
        plug(p),
        conf(p),
    )
}
