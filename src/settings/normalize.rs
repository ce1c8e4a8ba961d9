//! Corrections applied after every load.

use std::path::Path;

use tracing::info;

use super::legacy::backfill_credentials;
use super::model::Settings;

/// Prefix Twitch chat expects on OAuth tokens.
pub const OAUTH_PREFIX: &str = "oauth:";

const PATH_SEPARATORS: &[char] = &['/', '\\'];

/// Brings `settings` back within its invariants.
///
/// `legacy_credentials` is the AsyncTwitch config used to backfill empty
/// credentials. Returns true if anything changed.
pub fn normalize(settings: &mut Settings, legacy_credentials: &Path) -> bool {
    let before = settings.clone();

    settings.reset_non_finite();
    if settings.background_padding < 0.0 {
        settings.background_padding = 0.0;
    }
    if settings.max_chat_lines < 1 {
        settings.max_chat_lines = 1;
    }

    backfill_credentials(legacy_credentials, settings);

    settings.twitch_oauth_token = normalize_oauth_token(&settings.twitch_oauth_token);
    settings.twitch_channel_name = normalize_channel_name(&settings.twitch_channel_name);

    *settings != before
}

/// Adds the `oauth:` prefix to a non-empty token that lacks it.
pub fn normalize_oauth_token(token: &str) -> String {
    if token.is_empty() || token.starts_with(OAUTH_PREFIX) {
        token.to_string()
    } else {
        format!("{}{}", OAUTH_PREFIX, token)
    }
}

/// Reduces a channel name or channel URL to a bare, lowercase channel name.
///
/// `HTTPS://twitch.tv/SomeUser/` becomes `someuser`.
pub fn normalize_channel_name(channel: &str) -> String {
    if channel.is_empty() {
        return String::new();
    }

    let mut name = channel;
    if name.contains(PATH_SEPARATORS) {
        name = name
            .trim_end_matches(PATH_SEPARATORS)
            .rsplit(PATH_SEPARATORS)
            .next()
            .unwrap_or_default();
        info!(channel = %name, "Changing twitch channel");
    }

    name.to_lowercase().replace(' ', "")
}
