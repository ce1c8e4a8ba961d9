//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and edit the chat overlay settings file.
#[derive(Parser, Debug)]
#[command(name = "chat-settings", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the settings file and legacy configs.
    #[arg(short, long, default_value = "UserData", env = "CHAT_SETTINGS_DIR", global = true)]
    pub user_data: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level based on verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the normalized settings file.
    Show,

    /// Change a single setting and save it.
    Set {
        /// Setting key as written in the file (e.g. MaxChatLines).
        key: String,
        /// New value.
        value: String,
    },

    /// Manage the song request blacklist.
    #[command(subcommand)]
    Blacklist(BlacklistCommand),

    /// Watch the settings file and log every external edit.
    Watch(WatchArgs),
}

/// Blacklist subcommands.
#[derive(Subcommand, Debug)]
pub enum BlacklistCommand {
    /// List blacklisted song ids.
    List,
    /// Add a song id to the blacklist.
    Add { id: String },
    /// Remove a song id from the blacklist.
    Remove { id: String },
}

/// Arguments for the watch subcommand.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Milliseconds to wait after a change before reloading.
    #[arg(long, default_value = "500")]
    pub debounce_ms: u64,
}
