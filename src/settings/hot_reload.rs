//! Settings hot-reload functionality.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::model::Settings;
use super::{ReloadOutcome, SettingsStore};
use crate::error::WatcherError;

/// Events delivered to settings subscribers.
#[derive(Debug, Clone)]
pub enum SettingsEvent {
    /// The settings file was edited externally and has been reloaded.
    Reloaded(Settings),
    /// The settings file changed but could not be reloaded.
    ReloadFailed { message: String },
}

/// Tuning for the settings watcher.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Quiet period after a change before the file is read.
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Watches the settings file and reloads the store on external edits.
///
/// Dropping the handle stops watching.
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl SettingsWatcher {
    pub(crate) fn start(store: SettingsStore, options: WatchOptions) -> Result<Self, WatcherError> {
        let settings_file = store.paths().settings_file.clone();

        let runtime = Handle::try_current().map_err(|e| WatcherError::WatchFailed {
            path: settings_file.clone(),
            message: e.to_string(),
        })?;

        let file_name = settings_file
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| WatcherError::WatchFailed {
                path: settings_file.clone(),
                message: "settings path has no file name".to_string(),
            })?;

        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_settings_change(&event, &file_name) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => warn!(error = %e, "Settings watcher error"),
            },
            Config::default(),
        )?;

        // Watch the directory so editors that save by renaming are seen too.
        let watch_dir = watch_dir(&settings_file);
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        info!(path = ?settings_file, debounce = ?options.debounce, "Watching settings file");

        let task = runtime.spawn(handle_changes(store, rx, options.debounce));

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for SettingsWatcher {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Stopped watching settings file");
    }
}

/// Handles file change events with debouncing.
async fn handle_changes(
    store: SettingsStore,
    mut rx: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
) {
    while rx.recv().await.is_some() {
        // Wait a bit for the file to be fully written
        tokio::time::sleep(debounce).await;
        while rx.try_recv().is_ok() {}

        match store.reload_from_disk() {
            Ok(ReloadOutcome::Reloaded(settings)) => {
                store.publish(SettingsEvent::Reloaded(settings));
            }
            Ok(ReloadOutcome::Unchanged) => {
                debug!("Ignoring self-generated settings change");
            }
            Ok(ReloadOutcome::Missing) => {
                warn!("Settings file disappeared, keeping current settings");
            }
            Err(e) => {
                error!(error = %e, "Settings reload failed");
                store.publish(SettingsEvent::ReloadFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    warn!("Settings watcher channel closed");
}

fn is_settings_change(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

fn watch_dir(settings_file: &Path) -> PathBuf {
    match settings_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn only_changes_to_the_settings_file_count() {
        let name = OsString::from("EnhancedTwitchChat.ini");

        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/data/EnhancedTwitchChat.ini"));
        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/data/EnhancedTwitchChat.ini"));
        let other_file = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/data/AsyncTwitchConfig.json"));
        let removed = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/data/EnhancedTwitchChat.ini"));

        assert!(is_settings_change(&modify, &name));
        assert!(is_settings_change(&create, &name));
        assert!(!is_settings_change(&other_file, &name));
        assert!(!is_settings_change(&removed, &name));
    }

    #[test]
    fn bare_file_name_watches_current_dir() {
        assert_eq!(watch_dir(Path::new("settings.ini")), PathBuf::from("."));
        assert_eq!(watch_dir(Path::new("/a/b/settings.ini")), PathBuf::from("/a/b"));
    }
}
