use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ENV_KEY: &str = "env";
pub const PERMISSIONS_KEY: &str = "permissions";
pub const HOOKS_KEY: &str = "hooks";
pub const UI_SETTINGS_KEY: &str = "ui_settings";
pub const SCHEMA_KEY: &str = "$schema";

pub const ENV_MODEL: &str = "ANTHROPIC_MODEL";
pub const ENV_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const ENV_AUTH_TOKEN: &str = "ANTHROPIC_AUTH_TOKEN";
pub const ENV_TIMEOUT_MS: &str = "BASH_DEFAULT_TIMEOUT_MS";
pub const ENV_MAX_OUTPUT_TOKENS: &str = "CLAUDE_CODE_MAX_OUTPUT_TOKENS";

/// The full settings file. Kept as a JSON object so keys written by other
/// tools survive a load/save cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDocument(Map<String, Value>);

impl SettingsDocument {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn env(&self) -> Option<&Map<String, Value>> {
        self.0.get(ENV_KEY).and_then(Value::as_object)
    }

    /// Non-empty string value of `env.<key>`.
    pub fn env_str(&self, key: &str) -> Option<&str> {
        self.env()?
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Value at `outer.inner` when `outer` is an object.
    pub fn nested(&self, outer: &str, inner: &str) -> Option<&Value> {
        self.0.get(outer)?.as_object()?.get(inner)
    }
}

impl From<SettingsDocument> for Value {
    fn from(doc: SettingsDocument) -> Self {
        doc.into_value()
    }
}

/// Returns the object stored under `key`, replacing a missing or non-object
/// value with an empty object.
pub(crate) fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(inner) => inner,
        _ => unreachable!("slot was just replaced with an object"),
    }
}

/// Parses an integer that may be stored either as a JSON number or as a
/// numeric string (the form `env` values take).
///
/// Strings are read like `parseInt`: the leading run of digits counts and
/// anything after it is ignored. Values past `u64::MAX` saturate.
pub fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v.round() as u64)),
        Value::String(s) => leading_integer(s),
        _ => None,
    }
}

fn leading_integer(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let digits = &unsigned[..end];
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse::<u64>().unwrap_or(u64::MAX))
}
