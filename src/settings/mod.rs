//! Overlay settings loading, persistence, migration and hot-reload.

pub mod codec;
pub mod hot_reload;
pub mod legacy;
pub mod model;
pub mod normalize;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use sha2::{Digest, Sha256};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::{SettingsError, WatcherError};
pub use hot_reload::{SettingsEvent, SettingsWatcher, WatchOptions};
pub use model::{Color, Settings, Vec3};

/// File name of the settings file inside the user data directory.
pub const SETTINGS_FILE_NAME: &str = "EnhancedTwitchChat.ini";

/// Buffered events per subscriber before new events are dropped.
const SUBSCRIBER_CAPACITY: usize = 16;

/// Locations of the settings file and the legacy credentials it may import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPaths {
    pub settings_file: PathBuf,
    pub legacy_credentials: PathBuf,
}

impl SettingsPaths {
    /// Standard file names inside a user data directory.
    pub fn in_user_data(dir: &Path) -> Self {
        Self {
            settings_file: dir.join(SETTINGS_FILE_NAME),
            legacy_credentials: legacy::async_twitch_path(dir),
        }
    }
}

/// Result of re-reading the settings file.
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadOutcome {
    /// The file held new content, which is now loaded.
    Reloaded(Settings),
    /// The file content is what this store last wrote or loaded.
    Unchanged,
    /// The file no longer exists; the in-memory settings are kept.
    Missing,
}

/// Owns the overlay settings and keeps them in sync with the settings file.
///
/// Cloning is cheap and every clone shares the same state, which is how the
/// watcher task reloads into the store the rest of the plugin reads from.
#[derive(Clone)]
pub struct SettingsStore {
    shared: Arc<Shared>,
}

struct Shared {
    paths: SettingsPaths,
    settings: RwLock<Settings>,
    /// SHA-256 of the content last written or loaded.
    last_digest: Mutex<Option<String>>,
    subscribers: Mutex<Vec<mpsc::Sender<SettingsEvent>>>,
}

impl SettingsStore {
    /// Loads the settings file, applies migrations and corrections, and
    /// writes the corrected state back.
    ///
    /// A missing directory is created and a missing file means defaults.
    pub fn open(paths: SettingsPaths) -> Result<Self, SettingsError> {
        ensure_parent_dir(&paths.settings_file)?;

        let mut settings = Settings::default();
        match read_if_exists(&paths.settings_file)? {
            Some(raw) => {
                settings = codec::load_into(&settings, &raw)?;
                legacy::import_legacy_channel(&raw, &mut settings);
                info!(path = ?paths.settings_file, "Loaded settings");
            }
            None => {
                info!(path = ?paths.settings_file, "No settings file found, using defaults");
            }
        }

        normalize::normalize(&mut settings, &paths.legacy_credentials);

        let store = Self {
            shared: Arc::new(Shared {
                paths,
                settings: RwLock::new(settings),
                last_digest: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
            }),
        };

        store.save()?;
        Ok(store)
    }

    pub fn paths(&self) -> &SettingsPaths {
        &self.shared.paths
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.read_settings().clone()
    }

    /// Runs `f` against the current settings without copying them.
    pub fn read<R>(&self, f: impl FnOnce(&Settings) -> R) -> R {
        f(&self.read_settings())
    }

    /// Mutates the settings in memory only. Call [`save`](Self::save) once the
    /// batch of changes is complete.
    pub fn update<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> R {
        f(&mut self.write_settings())
    }

    /// Mutates the settings and persists them without letting a reload in
    /// between.
    pub fn modify<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> Result<R, SettingsError> {
        let mut settings = self.write_settings();
        let result = f(&mut settings);
        self.persist(&mut settings)?;
        Ok(result)
    }

    /// Assigns one setting from its file key and textual value, then saves.
    pub fn set_value(&self, key: &str, raw: &str) -> Result<(), SettingsError> {
        let mut settings = self.write_settings();
        settings.reset_non_finite();
        *settings = codec::assign(&*settings, key, raw)?;
        info!(key, "Setting changed");
        self.persist(&mut settings)
    }

    /// Writes the current settings to the settings file.
    pub fn save(&self) -> Result<(), SettingsError> {
        self.persist(&mut self.write_settings())
    }

    /// Re-reads the settings file if its content differs from what this
    /// store last wrote or loaded.
    ///
    /// New content is loaded over the current settings and normalized;
    /// corrections are saved right away. The settings lock is held for the
    /// whole reload, so in-process updates land either before or after it.
    pub fn reload_from_disk(&self) -> Result<ReloadOutcome, SettingsError> {
        let path = &self.shared.paths.settings_file;
        let mut settings = self.write_settings();

        let raw = {
            let mut last_digest = self.lock_digest();
            let raw = match read_if_exists(path)? {
                Some(raw) => raw,
                None => return Ok(ReloadOutcome::Missing),
            };

            let digest = compute_digest(&raw);
            if last_digest.as_deref() == Some(digest.as_str()) {
                return Ok(ReloadOutcome::Unchanged);
            }
            *last_digest = Some(digest);
            raw
        };

        settings.reset_non_finite();
        let mut reloaded = codec::load_into(&*settings, &raw)?;
        let corrected = normalize::normalize(&mut reloaded, &self.shared.paths.legacy_credentials);
        *settings = reloaded.clone();

        if corrected {
            self.persist(&mut settings)?;
        }

        info!(path = ?path, corrected, "Reloaded settings from disk");
        Ok(ReloadOutcome::Reloaded(reloaded))
    }

    /// Registers a new subscriber for change notifications.
    ///
    /// The receiver can be polled with `try_recv` from the owning thread or
    /// awaited from async code.
    pub fn subscribe(&self) -> mpsc::Receiver<SettingsEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.lock_subscribers().push(tx);
        rx
    }

    /// Starts watching the settings file for external edits.
    ///
    /// Must be called from within a Tokio runtime. Watching stops when the
    /// returned handle is dropped.
    pub fn watch(&self, options: WatchOptions) -> Result<SettingsWatcher, WatcherError> {
        SettingsWatcher::start(self.clone(), options)
    }

    /// Delivers `event` to every live subscriber.
    pub(crate) fn publish(&self, event: SettingsEvent) {
        self.lock_subscribers().retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Settings subscriber is not keeping up, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Renders, writes and records the digest of `settings`.
    ///
    /// Callers hold the settings write lock; the digest lock is taken second
    /// and held across the write, so the watcher recognizes the resulting
    /// event as this store's own.
    fn persist(&self, settings: &mut Settings) -> Result<(), SettingsError> {
        settings.reset_non_finite();
        let text = codec::render(&*settings)?;
        let path = &self.shared.paths.settings_file;

        let mut last_digest = self.lock_digest();
        ensure_parent_dir(path)?;
        std::fs::write(path, &text).map_err(|e| SettingsError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;
        *last_digest = Some(compute_digest(&text));

        debug!(path = ?path, "Saved settings");
        Ok(())
    }

    fn read_settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.shared.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_settings(&self) -> RwLockWriteGuard<'_, Settings> {
        self.shared.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_digest(&self) -> MutexGuard<'_, Option<String>> {
        self.shared.last_digest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<mpsc::Sender<SettingsEvent>>> {
        self.shared.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), SettingsError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            std::fs::create_dir_all(dir).map_err(|e| SettingsError::CreateDirFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;
            info!(path = ?dir, "Created settings directory");
            Ok(())
        }
        _ => Ok(()),
    }
}

fn read_if_exists(path: &Path) -> Result<Option<String>, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SettingsError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Computes the SHA256 hash of the given content.
fn compute_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> SettingsStore {
        SettingsStore::open(SettingsPaths::in_user_data(dir)).unwrap()
    }

    #[test]
    fn own_save_is_not_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store.modify(|s| s.chat_scale = 2.0).unwrap();

        assert_eq!(store.reload_from_disk().unwrap(), ReloadOutcome::Unchanged);
    }

    #[test]
    fn external_edit_is_reloaded_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let path = store.paths().settings_file.clone();

        let edited = std::fs::read_to_string(&path)
            .unwrap()
            .replace("MaxChatLines=30", "MaxChatLines=0");
        std::fs::write(&path, edited).unwrap();

        match store.reload_from_disk().unwrap() {
            ReloadOutcome::Reloaded(settings) => assert_eq!(settings.max_chat_lines, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(store.snapshot().max_chat_lines, 1);

        // The correction was written back, so the next check sees our own content.
        assert!(std::fs::read_to_string(&path).unwrap().contains("MaxChatLines=1\n"));
        assert_eq!(store.reload_from_disk().unwrap(), ReloadOutcome::Unchanged);
    }

    #[test]
    fn update_does_not_persist_until_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let path = store.paths().settings_file.clone();

        store.update(|s| s.font_name = "Arial".to_string());
        assert!(!std::fs::read_to_string(&path).unwrap().contains("FontName=Arial"));

        store.save().unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("FontName=Arial\n"));
    }

    #[test]
    fn deleted_file_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.modify(|s| s.request_limit = 9).unwrap();

        std::fs::remove_file(&store.paths().settings_file).unwrap();

        assert_eq!(store.reload_from_disk().unwrap(), ReloadOutcome::Missing);
        assert_eq!(store.snapshot().request_limit, 9);
    }

    #[test]
    fn publish_prunes_closed_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut live = store.subscribe();
        drop(store.subscribe());

        store.publish(SettingsEvent::ReloadFailed {
            message: "boom".to_string(),
        });

        assert_eq!(store.lock_subscribers().len(), 1);
        assert!(matches!(live.try_recv(), Ok(SettingsEvent::ReloadFailed { .. })));
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = compute_digest("MaxChatLines=30\n");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, compute_digest("MaxChatLines=30\n"));
        assert_ne!(digest, compute_digest("MaxChatLines=31\n"));
    }
}
