//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{Language, Role};

/// campusbot - university services chat bot
#[derive(Parser)]
#[command(
    name = "campusbot",
    about = "University services chat bot for the MAX messenger",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Write logs to the data directory instead of stderr
    #[arg(long = "log-file", global = true)]
    pub log_file: bool,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the bot and serve updates until interrupted
    Run,

    /// Print the menu tree for one role or all of them
    Menu {
        /// Role whose tree to print (applicant, student, employee, leadership)
        #[arg(short, long)]
        role: Option<Role>,

        /// Title language
        #[arg(long = "lang", default_value = "ru", value_parser = parse_language)]
        lang: Language,
    },

    /// Validate configuration and menus, then exit
    Check,
}

fn parse_language(value: &str) -> Result<Language, String> {
    Language::parse(value).ok_or_else(|| format!("unknown language '{}', expected ru or en", value))
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("campusbot")
        .join("logs")
        .join("campusbot.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Footer for `--help` pointing at the log file
pub fn generate_after_help() -> String {
    format!("Logs (with --log-file):\n  {}\n", get_log_path().display())
}
