//! Settings data structures.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// An RGBA color with components in the 0.0 to 1.0 range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// A point or set of Euler angles in engine world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// User-configurable overlay settings, persisted one field per line.
///
/// Field order here is the line order of the backing file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    /// Channel whose chat is displayed.
    pub twitch_channel_name: String,

    /// Account used to log into chat.
    pub twitch_username: String,

    /// Chat token, stored with the `oauth:` prefix.
    #[serde(rename = "TwitchOAuthToken")]
    pub twitch_oauth_token: String,

    pub font_name: String,
    pub chat_scale: f32,
    pub chat_width: f32,
    pub message_spacing: f32,

    /// Number of messages kept on screen (at least 1).
    pub max_chat_lines: i32,

    /// Minimum song rating accepted by the request bot.
    pub minimum_rating: f32,

    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,

    pub rotation_x: f32,
    pub rotation_y: f32,
    pub rotation_z: f32,

    pub text_color_r: f32,
    pub text_color_g: f32,
    pub text_color_b: f32,
    pub text_color_a: f32,

    pub background_color_r: f32,
    pub background_color_g: f32,
    pub background_color_b: f32,
    pub background_color_a: f32,

    /// Padding around the chat background (never negative).
    pub background_padding: f32,

    pub lock_chat_position: bool,
    pub reverse_chat_order: bool,
    pub animated_emotes: bool,
    pub draw_shadows: bool,
    pub song_request_bot: bool,
    pub skip_confirmation: bool,

    /// Comma-separated chat commands that trigger a song request.
    pub request_command_aliases: String,

    /// Maximum pending requests per user.
    pub request_limit: i32,
    pub request_cooldown_minutes: i32,

    /// Comma-separated song ids, see [`Settings::blacklist`].
    pub song_blacklist: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            twitch_channel_name: String::new(),
            twitch_username: String::new(),
            twitch_oauth_token: String::new(),
            font_name: "Segoe UI".to_string(),
            chat_scale: 1.1,
            chat_width: 160.0,
            message_spacing: 2.0,
            max_chat_lines: 30,
            minimum_rating: 50.0,
            position_x: 2.024_414_3,
            position_y: 0.373_768,
            position_z: 0.082_354_32,
            rotation_x: 2.026_023,
            rotation_y: 97.586_16,
            rotation_z: 1.190_764,
            text_color_r: 1.0,
            text_color_g: 1.0,
            text_color_b: 1.0,
            text_color_a: 1.0,
            background_color_r: 0.0,
            background_color_g: 0.0,
            background_color_b: 0.0,
            background_color_a: 0.6,
            background_padding: 4.0,
            lock_chat_position: false,
            reverse_chat_order: false,
            animated_emotes: true,
            draw_shadows: false,
            song_request_bot: false,
            skip_confirmation: true,
            request_command_aliases: "request,bsr,add".to_string(),
            request_limit: 5,
            request_cooldown_minutes: 5,
            song_blacklist: String::new(),
        }
    }
}

impl Settings {
    pub fn text_color(&self) -> Color {
        Color::new(
            self.text_color_r,
            self.text_color_g,
            self.text_color_b,
            self.text_color_a,
        )
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.text_color_r = color.r;
        self.text_color_g = color.g;
        self.text_color_b = color.b;
        self.text_color_a = color.a;
    }

    pub fn background_color(&self) -> Color {
        Color::new(
            self.background_color_r,
            self.background_color_g,
            self.background_color_b,
            self.background_color_a,
        )
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background_color_r = color.r;
        self.background_color_g = color.g;
        self.background_color_b = color.b;
        self.background_color_a = color.a;
    }

    pub fn chat_position(&self) -> Vec3 {
        Vec3::new(self.position_x, self.position_y, self.position_z)
    }

    pub fn set_chat_position(&mut self, position: Vec3) {
        self.position_x = position.x;
        self.position_y = position.y;
        self.position_z = position.z;
    }

    pub fn chat_rotation(&self) -> Vec3 {
        Vec3::new(self.rotation_x, self.rotation_y, self.rotation_z)
    }

    pub fn set_chat_rotation(&mut self, rotation: Vec3) {
        self.rotation_x = rotation.x;
        self.rotation_y = rotation.y;
        self.rotation_z = rotation.z;
    }

    /// Returns the blacklisted song ids in insertion order, without duplicates.
    ///
    /// Entries are trimmed and empty entries are skipped.
    pub fn blacklist(&self) -> Vec<String> {
        dedup_entries(self.song_blacklist.split(','))
    }

    /// Replaces the blacklist, dropping duplicates but keeping first-seen order.
    ///
    /// This only changes memory; persist with [`super::SettingsStore::save`].
    pub fn set_blacklist<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.song_blacklist = dedup_entries(ids.iter().map(String::as_str)).join(",");
    }

    pub fn is_blacklisted(&self, id: &str) -> bool {
        let id = id.trim();
        self.song_blacklist.split(',').any(|entry| entry.trim() == id)
    }

    /// Appends a song id to the blacklist. Returns false if it was already present.
    pub fn add_to_blacklist(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.is_blacklisted(id) {
            return false;
        }

        let mut entries = self.blacklist();
        entries.push(id.to_string());
        self.set_blacklist(entries);
        true
    }

    /// Removes a song id from the blacklist. Returns false if it was not present.
    pub fn remove_from_blacklist(&mut self, id: &str) -> bool {
        let id = id.trim();
        let entries = self.blacklist();
        let before = entries.len();
        let remaining: Vec<String> = entries.into_iter().filter(|e| e != id).collect();

        if remaining.len() == before {
            return false;
        }

        self.set_blacklist(remaining);
        true
    }

    /// Chat commands (without the leading `!`) that submit a song request.
    pub fn request_command_aliases(&self) -> Vec<String> {
        dedup_entries(self.request_command_aliases.split(','))
    }
}

impl Settings {
    /// Puts every NaN or infinite float field back to its default.
    ///
    /// The settings file has no spelling for non-finite numbers. Returns
    /// true if any field was reset.
    pub fn reset_non_finite(&mut self) -> bool {
        let mut defaults = Settings::default();
        let mut changed = false;

        for ((name, value), (_, default)) in self
            .float_fields_mut()
            .into_iter()
            .zip(defaults.float_fields_mut())
        {
            if !value.is_finite() {
                warn!(field = name, value = %value, "Resetting non-finite setting to its default");
                *value = *default;
                changed = true;
            }
        }

        changed
    }

    fn float_fields_mut(&mut self) -> Vec<(&'static str, &mut f32)> {
        vec![
            ("ChatScale", &mut self.chat_scale),
            ("ChatWidth", &mut self.chat_width),
            ("MessageSpacing", &mut self.message_spacing),
            ("MinimumRating", &mut self.minimum_rating),
            ("PositionX", &mut self.position_x),
            ("PositionY", &mut self.position_y),
            ("PositionZ", &mut self.position_z),
            ("RotationX", &mut self.rotation_x),
            ("RotationY", &mut self.rotation_y),
            ("RotationZ", &mut self.rotation_z),
            ("TextColorR", &mut self.text_color_r),
            ("TextColorG", &mut self.text_color_g),
            ("TextColorB", &mut self.text_color_b),
            ("TextColorA", &mut self.text_color_a),
            ("BackgroundColorR", &mut self.background_color_r),
            ("BackgroundColorG", &mut self.background_color_g),
            ("BackgroundColorB", &mut self.background_color_b),
            ("BackgroundColorA", &mut self.background_color_a),
            ("BackgroundPadding", &mut self.background_padding),
        ]
    }
}

fn dedup_entries<'a>(entries: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::new();
    for entry in entries.map(str::trim).filter(|e| !e.is_empty()) {
        if !seen.iter().any(|s: &String| s == entry) {
            seen.push(entry.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_accessors_decompose_into_scalars() {
        let mut settings = Settings::default();

        settings.set_text_color(Color::new(0.1, 0.2, 0.3, 0.4));
        settings.set_chat_position(Vec3::new(-1.0, 2.5, 3.0));

        assert_eq!(settings.text_color_g, 0.2);
        assert_eq!(settings.text_color_a, 0.4);
        assert_eq!(settings.position_x, -1.0);
        assert_eq!(settings.chat_position(), Vec3::new(-1.0, 2.5, 3.0));
        assert_eq!(settings.background_color(), Color::new(0.0, 0.0, 0.0, 0.6));
    }

    #[test]
    fn blacklist_keeps_first_seen_order() {
        let mut settings = Settings::default();
        settings.set_blacklist(["a", "b", "a"]);

        assert_eq!(settings.song_blacklist, "a,b");
        assert_eq!(settings.blacklist(), vec!["a", "b"]);
    }

    #[test]
    fn empty_blacklist_reads_as_empty_list() {
        let settings = Settings::default();
        assert!(settings.blacklist().is_empty());

        let settings = Settings {
            song_blacklist: "1a2b, ,1a2b,3c".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.blacklist(), vec!["1a2b", "3c"]);
    }

    #[test]
    fn blacklist_add_and_remove() {
        let mut settings = Settings::default();

        assert!(settings.add_to_blacklist("ff"));
        assert!(settings.add_to_blacklist("ee"));
        assert!(!settings.add_to_blacklist("ff"));
        assert!(settings.is_blacklisted("ee"));
        assert_eq!(settings.song_blacklist, "ff,ee");

        assert!(settings.remove_from_blacklist("ff"));
        assert!(!settings.remove_from_blacklist("ff"));
        assert_eq!(settings.song_blacklist, "ee");
    }

    #[test]
    fn non_finite_floats_reset_to_defaults() {
        let mut settings = Settings {
            chat_scale: f32::NAN,
            rotation_y: f32::INFINITY,
            background_color_a: f32::NEG_INFINITY,
            chat_width: 220.0,
            ..Settings::default()
        };

        assert!(settings.reset_non_finite());
        assert_eq!(settings.chat_scale, 1.1);
        assert_eq!(settings.rotation_y, 97.586_16);
        assert_eq!(settings.background_color_a, 0.6);
        assert_eq!(settings.chat_width, 220.0);

        assert!(!settings.reset_non_finite());
    }

    #[test]
    fn default_request_aliases() {
        let settings = Settings::default();
        assert_eq!(settings.request_command_aliases(), vec!["request", "bsr", "add"]);
    }
}
