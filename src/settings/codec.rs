//! Line-oriented `Key=Value` settings format.
//!
//! Any serde struct with scalar fields can be written and read back. Each
//! field becomes one line, and the type of a value read from disk is taken
//! from the field it overrides.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::error::SettingsError;

/// Splits settings text into raw `(key, value)` pairs, in file order.
///
/// Blank lines, `#`/`;` comments, `[section]` headers and lines without `=`
/// are skipped. Keys are trimmed, values are kept verbatim.
pub fn parse_pairs(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            if trimmed.is_empty()
                || trimmed.starts_with('#')
                || trimmed.starts_with(';')
                || trimmed.starts_with('[')
            {
                return None;
            }

            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }

            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Renders every field of `value` as one `Key=Value` line.
pub fn render<T: Serialize>(value: &T) -> Result<String, SettingsError> {
    let fields = to_fields(value)?;
    let mut out = String::new();

    for (key, value) in &fields {
        out.push_str(key);
        out.push('=');
        out.push_str(&format_value(key, value)?);
        out.push('\n');
    }

    Ok(out)
}

/// Returns a copy of `current` with every known key in `text` applied.
///
/// Unknown keys and values that do not parse as the field's type are logged
/// and skipped, so a hand-edited file never loses the remaining settings.
pub fn load_into<T>(current: &T, text: &str) -> Result<T, SettingsError>
where
    T: Serialize + DeserializeOwned,
{
    let mut fields = to_fields(current)?;

    for (key, raw) in parse_pairs(text) {
        match assign_field::<T>(&mut fields, &key, &raw) {
            Ok(()) => {}
            Err(SettingsError::UnknownKey { .. }) => {
                debug!(key = %key, "Ignoring unknown setting");
            }
            Err(e) => {
                warn!(key = %key, value = %raw, error = %e, "Ignoring invalid setting");
            }
        }
    }

    from_fields(fields)
}

/// Returns a copy of `current` with a single field replaced from its text form.
pub fn assign<T>(current: &T, key: &str, raw: &str) -> Result<T, SettingsError>
where
    T: Serialize + DeserializeOwned,
{
    let mut fields = to_fields(current)?;
    assign_field::<T>(&mut fields, key, raw)?;
    from_fields(fields)
}

fn assign_field<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
    raw: &str,
) -> Result<(), SettingsError> {
    let slot = match fields.get(key) {
        Some(slot) => slot,
        None => {
            return Err(SettingsError::UnknownKey {
                key: key.to_string(),
                suggestion: find_similar_key(key, fields.keys()),
            })
        }
    };

    let invalid = |expected| SettingsError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    };

    let parsed = match slot {
        Value::String(_) => Value::String(unescape(raw)),
        Value::Bool(_) => Value::Bool(parse_bool(raw).ok_or_else(|| invalid("true or false"))?),
        // Floats are stored at single precision; anything that overflows
        // it has no finite value to hold.
        Value::Number(n) if n.is_f64() => raw
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .and_then(|v| Number::from_f64(f64::from(v)))
            .map(Value::Number)
            .ok_or_else(|| invalid("a finite number"))?,
        Value::Number(_) => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid("an integer"))?,
        _ => return Err(invalid("a scalar value")),
    };

    // Integers can still overflow the field's width; check before committing.
    let mut candidate = fields.clone();
    candidate.insert(key.to_string(), parsed.clone());
    if serde_json::from_value::<T>(Value::Object(candidate)).is_err() {
        return Err(invalid("a value in range"));
    }

    fields.insert(key.to_string(), parsed);
    Ok(())
}

fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, SettingsError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(SettingsError::EncodeFailed(format!(
            "expected a struct, got {}",
            other
        ))),
        Err(e) => Err(SettingsError::EncodeFailed(e.to_string())),
    }
}

fn from_fields<T: DeserializeOwned>(fields: Map<String, Value>) -> Result<T, SettingsError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| SettingsError::EncodeFailed(e.to_string()))
}

fn format_value(key: &str, value: &Value) -> Result<String, SettingsError> {
    match value {
        Value::String(s) => Ok(escape(s)),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(format_number(n)),
        // serde_json encodes NaN and infinities as null.
        Value::Null => Err(SettingsError::EncodeFailed(format!(
            "field '{}' has no finite value",
            key
        ))),
        Value::Array(_) | Value::Object(_) => Err(SettingsError::EncodeFailed(format!(
            "field '{}' is not a scalar",
            key
        ))),
    }
}

/// Floats that are exactly representable in single precision are written
/// in their shortest `f32` form, so `1.1f32` is stored as `1.1`.
fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }

    let v = n.as_f64().unwrap_or_default();
    let single = v as f32;
    if f64::from(single) == v {
        single.to_string()
    } else {
        v.to_string()
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            // Unknown escapes are kept as written.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

/// Finds the most similar key name using Levenshtein distance.
fn find_similar_key<'a>(input: &str, known: impl Iterator<Item = &'a String>) -> String {
    let input_lower = input.to_lowercase();
    known
        .min_by_key(|k| strsim::levenshtein(&input_lower, &k.to_lowercase()))
        .cloned()
        .unwrap_or_default()
}
