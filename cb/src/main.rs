//! campusbot - university services chat bot
//!
//! CLI entry point: run the bot, print menu trees, or check configuration.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use campusbot::backend::{Backend, HttpBackend};
use campusbot::bot::{ActionTable, FormRegistry, LaneDispatcher, MenuNode, MenuRegistry, Service};
use campusbot::cli::{Cli, Command, generate_after_help, get_log_path};
use campusbot::clock::Clock;
use campusbot::config::{Config, MessengerKind};
use campusbot::domain::{Language, Role};
use campusbot::messenger::{ConsoleMessenger, MaxMessenger, Messenger};
use campusbot::notifier::LogSender;
use campusbot::state::SessionStore;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, to_file: bool) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_file {
        let log_path = get_log_path();
        let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), cli.log_file)
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(&config).await,
        Command::Menu { role, lang } => cmd_menu(&config, role, lang),
        Command::Check => cmd_check(&config),
    }
}

async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    config.validate().context("Invalid configuration")?;

    let menus = Arc::new(MenuRegistry::load(config.menus.path.as_deref()).context("Failed to load menus")?);
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(&config.backend)?);
    let messenger: Arc<dyn Messenger> = match config.messenger.kind {
        MessengerKind::Max => Arc::new(MaxMessenger::new(&config.messenger, config.messenger.token()?)?),
        MessengerKind::Console => Arc::new(ConsoleMessenger::new(config.messenger.console_chat_id)),
    };

    let clock = Clock::system();
    let store = SessionStore::spawn(clock.clone());
    let service = Arc::new(Service::new(
        config,
        store.clone(),
        menus,
        backend,
        messenger.clone(),
        Arc::new(LogSender),
        clock,
    ));
    let lanes = Arc::new(LaneDispatcher::new(service, &config.bot));

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let signals = tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            warn!(error = %e, "Signal handler failed");
        }
        let _ = shutdown_tx.send(()).await;
    });

    info!(messenger = ?config.messenger.kind, backend = %config.backend.base_url, "campusbot running");
    let result = messenger.run(lanes.clone(), shutdown_rx).await;
    signals.abort();

    info!("campusbot shutting down...");
    lanes.shutdown().await;
    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "Session store did not shut down cleanly");
    }
    result.context("Messenger stopped with an error")
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        warn!("Ctrl+C received");
    }

    Ok(())
}

fn cmd_menu(config: &Config, role: Option<Role>, language: Language) -> Result<()> {
    debug!(?role, %language, "cmd_menu: called");
    let menus = MenuRegistry::load(config.menus.path.as_deref()).context("Failed to load menus")?;
    let roles: Vec<Role> = match role {
        Some(role) => vec![role],
        None => Role::ALL.to_vec(),
    };

    for role in roles {
        println!("{}", role.as_str().to_uppercase().bold());
        if let Some(root) = menus.root(role) {
            print_node(&menus, root, language, 0);
        }
        println!();
    }
    Ok(())
}

fn print_node(menus: &MenuRegistry, node: &MenuNode, language: Language, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.action {
        Some(action) => println!(
            "{}{} {}",
            indent,
            node.title(language),
            format!("[{}]", action).dimmed()
        ),
        None => println!("{}{} {}", indent, node.title(language).cyan(), node.id.dimmed()),
    }
    for child in menus.children(node) {
        print_node(menus, child, language, depth + 1);
    }
}

fn cmd_check(config: &Config) -> Result<()> {
    debug!("cmd_check: called");
    let menus = MenuRegistry::load(config.menus.path.as_deref()).context("Failed to load menus")?;
    let actions = ActionTable::builtin();
    let forms = FormRegistry::builtin();

    println!("{} {}", "messenger:".bold(), format!("{:?}", config.messenger.kind).to_lowercase());
    println!("{} {}", "backend:".bold(), config.backend.base_url);
    println!("{} {} nodes", "menus:".bold(), menus.len());

    for role in Role::ALL {
        let mut leaves = Vec::new();
        if let Some(root) = menus.root(role) {
            collect_leaves(&menus, root, &mut leaves);
        }
        let pending: Vec<_> = leaves
            .iter()
            .filter_map(|node| node.action)
            .filter(|action| !actions.contains(*action) && !forms.contains(*action))
            .collect();
        println!(
            "  {:<11} {} actions, {} coming soon",
            role.as_str(),
            leaves.len(),
            pending.len()
        );
    }

    match config.validate() {
        Ok(()) => {
            println!("{}", "configuration OK".green());
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "configuration invalid:".red(), e);
            Err(e)
        }
    }
}

fn collect_leaves<'a>(menus: &'a MenuRegistry, node: &'a MenuNode, out: &mut Vec<&'a MenuNode>) {
    if node.is_leaf() {
        out.push(node);
    }
    for child in menus.children(node) {
        collect_leaves(menus, child, out);
    }
}
