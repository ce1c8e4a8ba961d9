//! Chat Overlay Settings - persisted, hot-reloaded settings for a Twitch chat overlay.
//!
//! This library loads and saves the overlay's key=value settings file,
//! migrates legacy settings sources, and reloads the settings when the file
//! is edited outside the game.

pub mod cli;
pub mod error;
pub mod settings;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{BlacklistCommand, Cli, Commands, WatchArgs};
use crate::settings::{codec, SettingsEvent, SettingsPaths, SettingsStore, WatchOptions};

/// Runs the settings tool with the provided CLI arguments.
pub async fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.log_level())?;

    let paths = SettingsPaths::in_user_data(&cli.user_data);

    match cli.command {
        Commands::Show => show_settings(paths),
        Commands::Set { key, value } => set_setting(paths, &key, &value),
        Commands::Blacklist(command) => edit_blacklist(paths, command),
        Commands::Watch(args) => watch_settings(paths, args).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
fn setup_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Ok(())
}

fn open_store(paths: SettingsPaths) -> Result<SettingsStore> {
    let settings_file = paths.settings_file.clone();
    SettingsStore::open(paths)
        .with_context(|| format!("Failed to open settings at {}", settings_file.display()))
}

/// Prints the normalized settings file.
fn show_settings(paths: SettingsPaths) -> Result<()> {
    let store = open_store(paths)?;
    let text = store.read(|s| codec::render(s))?;
    print!("{}", text);
    Ok(())
}

/// Changes one setting.
fn set_setting(paths: SettingsPaths, key: &str, value: &str) -> Result<()> {
    let store = open_store(paths)?;
    store.set_value(key, value)?;
    println!("{} updated.", key);
    Ok(())
}

/// Lists or edits the song blacklist.
fn edit_blacklist(paths: SettingsPaths, command: BlacklistCommand) -> Result<()> {
    let store = open_store(paths)?;

    match command {
        BlacklistCommand::List => {
            let blacklist = store.read(|s| s.blacklist());
            if blacklist.is_empty() {
                println!("Blacklist is empty.");
            } else {
                println!("Blacklist ({} songs):", blacklist.len());
                for id in blacklist {
                    println!("  {}", id);
                }
            }
        }
        BlacklistCommand::Add { id } => {
            if store.modify(|s| s.add_to_blacklist(&id))? {
                println!("Added {} to the blacklist.", id);
            } else {
                println!("{} is already blacklisted.", id);
            }
        }
        BlacklistCommand::Remove { id } => {
            if store.modify(|s| s.remove_from_blacklist(&id))? {
                println!("Removed {} from the blacklist.", id);
            } else {
                println!("{} is not blacklisted.", id);
            }
        }
    }

    Ok(())
}

/// Watches the settings file until Ctrl+C, logging every reload.
async fn watch_settings(paths: SettingsPaths, args: WatchArgs) -> Result<()> {
    let store = open_store(paths)?;
    let mut events = store.subscribe();

    let options = WatchOptions {
        debounce: Duration::from_millis(args.debounce_ms),
    };
    let _watcher = store.watch(options).context("Failed to start settings watcher")?;

    info!("Watching settings. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            // Handle graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }

            Some(event) = events.recv() => {
                match event {
                    SettingsEvent::Reloaded(settings) => {
                        info!(
                            channel = %settings.twitch_channel_name,
                            max_chat_lines = settings.max_chat_lines,
                            song_request_bot = settings.song_request_bot,
                            "Settings reloaded"
                        );
                        println!("Settings reloaded.");
                    }
                    SettingsEvent::ReloadFailed { message } => {
                        warn!(error = %message, "Settings reload failed");
                    }
                }
            }
        }
    }

    Ok(())
}
