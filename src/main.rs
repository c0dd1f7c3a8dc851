use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use carik_hub::application::errors::{BotError, ConfigError};
use carik_hub::application::services::{Host, HostOptions, ProcessSignal};
use carik_hub::domain::entities::{InboundMessage, InstanceId};
use carik_hub::infrastructure::adapters::ConsoleFactory;
use carik_hub::infrastructure::config::{BotConfig, Config};
use carik_hub::infrastructure::plugins::{LibraryLoader, StaticLoader};
use carik_hub::infrastructure::storage::write_atomic;

/// Identity of the console bot used when no bot is configured
const CONSOLE_ID: InstanceId = InstanceId(10000);

#[derive(Parser)]
#[command(name = "carik-hub")]
#[command(about = "A multi-tenant chat-bot host with hot-loadable plugins", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "carik.yaml")]
    config: PathBuf,

    /// Read commands from stdin as private messages of the first master
    #[arg(long)]
    console: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the host
    Run,
    /// Show version
    Version,
    /// Write a default config file
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => run(cli.config, cli.console),
        Commands::Version => {
            println!("carik-hub v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(&cli.config),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config_path: PathBuf, console: bool) -> Result<(), BotError> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(e.to_string()))?;
    let signal = rt.block_on(serve(config_path, console))?;
    drop(rt);

    if signal == ProcessSignal::Restart {
        let exe = std::env::current_exe().map_err(|e| BotError::Internal(e.to_string()))?;
        tracing::info!("Restarting {}", exe.display());
        std::process::Command::new(exe)
            .args(std::env::args_os().skip(1))
            .spawn()
            .map_err(|e| BotError::Internal(format!("Failed to restart: {}", e)))?;
    }
    Ok(())
}

async fn serve(config_path: PathBuf, console: bool) -> Result<ProcessSignal, BotError> {
    let mut config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", config_path.display());
        Config::default()
    };

    // Dev mode: one console bot, kept out of the config file until something changes it
    let console = console || config.bots.is_empty();
    if console && config.bots.is_empty() {
        config.bots.insert(CONSOLE_ID, BotConfig::new(0));
    }

    let factory = Arc::new(ConsoleFactory::new().with_echo());
    let loader = Arc::new(StaticLoader::new().with_fallback(Arc::new(LibraryLoader::default())));
    let host = Host::new(&config_path, config, loader, factory.clone(), HostOptions::default());

    let attached = host.start().await;
    tracing::info!("carik-hub started with {} instance(s)", attached);

    if console {
        spawn_console(Arc::clone(&host), Arc::clone(&factory));
    }

    let mut signals = host.signals();
    let signal = loop {
        tokio::select! {
            changed = signals.changed() => {
                if changed.is_err() {
                    break ProcessSignal::Shutdown;
                }
                let signal = *signals.borrow();
                if signal != ProcessSignal::Running {
                    break signal;
                }
            }
            _ = tokio::signal::ctrl_c() => break ProcessSignal::Shutdown,
        }
    };

    tracing::info!("Stopping all instances ({:?})", signal);
    host.shutdown_all().await;
    Ok(signal)
}

/// Feed stdin lines to the first console instance as private messages
fn spawn_console(host: Arc<Host>, factory: Arc<ConsoleFactory>) {
    tokio::spawn(async move {
        let Some(instance) = host.directory().instances().await.into_iter().next() else {
            tracing::warn!("No instance attached, console input disabled");
            return;
        };
        let Some(adapter) = factory.get(instance.id()) else {
            return;
        };
        let sender = host
            .config()
            .bot(instance.id())
            .await
            .and_then(|b| b.masters.first().copied())
            .unwrap_or_default();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    adapter.push_message(InboundMessage::private(sender, line.trim()));
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
}

fn init_config(path: &Path) -> Result<(), BotError> {
    if path.exists() {
        return Err(ConfigError::InvalidValue(format!("{} already exists", path.display())).into());
    }

    let yaml = Config::default().to_yaml()?;
    let rt = tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(e.to_string()))?;
    rt.block_on(write_atomic(path, yaml.as_bytes()))
        .map_err(ConfigError::from)?;

    println!("{}", yaml);
    println!("\nSaved to {}, add your bots under `bots` and adjust as needed.", path.display());
    Ok(())
}
