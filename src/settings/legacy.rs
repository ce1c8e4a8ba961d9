//! Migration from older settings sources.
//!
//! Two sources are recognized: the single-field format that predates the
//! current file (detected by its `TwitchChannel` key) and the credentials
//! file written by the AsyncTwitch library.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use super::codec::parse_pairs;
use super::model::Settings;
use crate::error::LegacyError;

/// Key that only the legacy single-field format writes.
pub const LEGACY_CHANNEL_KEY: &str = "TwitchChannel";

/// File name of the AsyncTwitch credentials, next to the settings file.
pub const ASYNC_TWITCH_FILE_NAME: &str = "AsyncTwitchConfig.json";

/// Twitch credentials read from the AsyncTwitch config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyCredentials {
    pub username: Option<String>,
    pub channel_name: Option<String>,
    pub oauth_key: Option<String>,
}

/// Copies the legacy channel into `settings` if `raw` carries the sentinel key.
///
/// Returns true when the sentinel was found. Saving afterwards drops the
/// legacy key, so running this again on the saved file is a no-op.
pub fn import_legacy_channel(raw: &str, settings: &mut Settings) -> bool {
    let legacy = parse_pairs(raw)
        .into_iter()
        .rev()
        .find(|(key, _)| key == LEGACY_CHANNEL_KEY);

    match legacy {
        Some((_, channel)) => {
            info!(channel = %channel, "Imported channel from legacy settings format");
            settings.twitch_channel_name = channel;
            true
        }
        None => false,
    }
}

/// Reads the AsyncTwitch credentials file.
///
/// A missing file is `Ok(None)`. Only string values are taken; a document
/// that is not a JSON object yields empty credentials.
pub fn read_async_twitch_config(path: &Path) -> Result<Option<LegacyCredentials>, LegacyError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| LegacyError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let document: Value = serde_json::from_str(&content).map_err(|e| LegacyError::ParseFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let string_field = |name: &str| document.get(name).and_then(Value::as_str).map(str::to_string);

    Ok(Some(LegacyCredentials {
        username: string_field("Username"),
        channel_name: string_field("ChannelName"),
        oauth_key: string_field("OauthKey"),
    }))
}

/// Fills empty credential fields from the AsyncTwitch config at `path`.
///
/// Existing values are never overwritten. Read and parse failures are
/// logged and leave `settings` untouched. Returns true if any field changed.
pub fn backfill_credentials(path: &Path, settings: &mut Settings) -> bool {
    let credentials = match read_async_twitch_config(path) {
        Ok(Some(credentials)) => credentials,
        Ok(None) => return false,
        Err(e) => {
            warn!(error = %e, "Error when trying to parse AsyncTwitchConfig");
            return false;
        }
    };

    let mut changed = false;
    changed |= fill_if_empty(&mut settings.twitch_username, credentials.username);
    changed |= fill_if_empty(&mut settings.twitch_channel_name, credentials.channel_name);
    changed |= fill_if_empty(&mut settings.twitch_oauth_token, credentials.oauth_key);

    if changed {
        info!(path = ?path, "Imported Twitch credentials from AsyncTwitchConfig");
    }

    changed
}

/// Default location of the AsyncTwitch config for a user data directory.
pub fn async_twitch_path(user_data: &Path) -> PathBuf {
    user_data.join(ASYNC_TWITCH_FILE_NAME)
}

fn fill_if_empty(field: &mut String, value: Option<String>) -> bool {
    match value {
        Some(value) if field.is_empty() && !value.is_empty() => {
            *field = value;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_key_imports_channel() {
        let mut settings = Settings::default();
        assert!(import_legacy_channel("TwitchChannel=OldChannel\n", &mut settings));
        assert_eq!(settings.twitch_channel_name, "OldChannel");
    }

    #[test]
    fn current_format_is_not_mistaken_for_legacy() {
        let mut settings = Settings::default();
        assert!(!import_legacy_channel("TwitchChannelName=someone\n", &mut settings));
        assert_eq!(settings.twitch_channel_name, "");
    }

    #[test]
    fn backfill_only_touches_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = async_twitch_path(dir.path());
        std::fs::write(
            &path,
            r#"{"Username":"botname","ChannelName":"Streamer","OauthKey":"xyz","Extra":1}"#,
        )
        .unwrap();

        let mut settings = Settings {
            twitch_username: "me".to_string(),
            ..Settings::default()
        };

        assert!(backfill_credentials(&path, &mut settings));
        assert_eq!(settings.twitch_username, "me");
        assert_eq!(settings.twitch_channel_name, "Streamer");
        assert_eq!(settings.twitch_oauth_token, "xyz");

        assert!(!backfill_credentials(&path, &mut settings));
    }

    #[test]
    fn non_string_values_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = async_twitch_path(dir.path());
        std::fs::write(&path, r#"{"Username":42,"ChannelName":null}"#).unwrap();

        let credentials = read_async_twitch_config(&path).unwrap().unwrap();
        assert_eq!(credentials, LegacyCredentials::default());
    }

    #[test]
    fn malformed_json_is_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = async_twitch_path(dir.path());
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            read_async_twitch_config(&path),
            Err(LegacyError::ParseFailed { .. })
        ));

        let mut settings = Settings::default();
        assert!(!backfill_credentials(&path, &mut settings));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_async_twitch_config(&async_twitch_path(dir.path()))
            .unwrap()
            .is_none());
    }
}
