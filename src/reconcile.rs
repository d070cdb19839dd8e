//! Conversion between the legacy flat settings shape and the nested shape the
//! CLI reads, plus merge-on-write.
//!
//! Every lookup for a mirrored field goes env mirror, then top-level scalar,
//! then the hardcoded default. Nothing in here touches the filesystem.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::defaults::{
    DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_MODEL, DEFAULT_REQUESTS_PER_MINUTE,
    DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_MS, DEFAULT_TOKENS_PER_MINUTE, DEFAULT_TOP_P,
    MAX_OUTPUT_TOKENS_CEILING, SCHEMA_URL,
};
use crate::document::{
    object_entry, parse_u64, SettingsDocument, ENV_AUTH_TOKEN, ENV_BASE_URL, ENV_KEY,
    ENV_MAX_OUTPUT_TOKENS, ENV_MODEL, ENV_TIMEOUT_MS, HOOKS_KEY, PERMISSIONS_KEY, SCHEMA_KEY,
    UI_SETTINGS_KEY,
};
use crate::error::SettingsError;
use crate::update::SettingsUpdate;

/// Top-level keys merged key-by-key instead of replaced.
const MERGED_OBJECT_KEYS: &[&str] = &[ENV_KEY, PERMISSIONS_KEY, UI_SETTINGS_KEY, HOOKS_KEY];

/// Keys whose presence marks an input as the nested shape.
const NESTED_SHAPE_MARKERS: &[&str] = &[SCHEMA_KEY, ENV_KEY, PERMISSIONS_KEY];

/// Legacy keys that only exist for the form and are never persisted.
const LEGACY_FORM_ONLY_KEYS: &[&str] = &["auto_save", "streaming", "max_retries", "rate_limit"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            tokens_per_minute: DEFAULT_TOKENS_PER_MINUTE,
        }
    }
}

/// Flat view of the generation and credential settings used by the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyView {
    pub model: String,
    pub anthropic_base_url: String,
    pub api_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_auth_token: Option<String>,
    pub timeout: u64,
    pub max_tokens: u64,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    pub auto_save: bool,
    pub streaming: bool,
    pub max_retries: u32,
    pub rate_limit: RateLimit,
}

pub fn clamp_output_tokens(tokens: u64) -> u64 {
    tokens.min(MAX_OUTPUT_TOKENS_CEILING)
}

/// Operation A: nested document to the flat form view.
pub fn to_display_shape(doc: &SettingsDocument) -> LegacyView {
    let model = doc
        .env_str(ENV_MODEL)
        .or_else(|| doc.str_field("model"))
        .unwrap_or(DEFAULT_MODEL)
        .to_string();

    let base_url = doc
        .env_str(ENV_BASE_URL)
        .or_else(|| non_empty_str(doc.nested("api_config", "base_url")))
        .unwrap_or(DEFAULT_BASE_URL)
        .to_string();

    let auth_token = doc
        .env_str(ENV_AUTH_TOKEN)
        .or_else(|| non_empty_str(doc.nested("api_config", "auth_token")))
        .map(str::to_string);

    let timeout = env_u64(doc, ENV_TIMEOUT_MS)
        .or_else(|| doc.get("timeout").and_then(parse_u64))
        .unwrap_or(DEFAULT_TIMEOUT_MS);

    let max_tokens = env_u64(doc, ENV_MAX_OUTPUT_TOKENS)
        .or_else(|| doc.get("max_tokens").and_then(parse_u64))
        .map(clamp_output_tokens)
        .unwrap_or(MAX_OUTPUT_TOKENS_CEILING);

    LegacyView {
        api_endpoint: base_url.clone(),
        anthropic_base_url: base_url,
        anthropic_auth_token: auth_token,
        model,
        timeout,
        max_tokens,
        temperature: doc
            .get("temperature")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_TEMPERATURE),
        top_p: doc
            .get("top_p")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_TOP_P),
        system_prompt: doc.str_field("system_prompt").map(str::to_string),
        theme: non_empty_str(doc.nested(UI_SETTINGS_KEY, "theme")).map(str::to_string),
        auto_save: true,
        streaming: true,
        max_retries: DEFAULT_MAX_RETRIES,
        rate_limit: RateLimit::default(),
    }
}

/// Operation B: applies `update` on top of `existing`.
///
/// `env`, `permissions`, `ui_settings` and `hooks` merge one level deep; every
/// other key present in `update` replaces the existing value, arrays included.
pub fn merge(existing: &SettingsDocument, update: &SettingsUpdate) -> SettingsDocument {
    let mut merged = existing.as_map().clone();

    for (key, incoming) in update.fields() {
        if MERGED_OBJECT_KEYS.contains(&key.as_str()) {
            if let Value::Object(entries) = incoming {
                let target = object_entry(&mut merged, key);
                for (inner_key, value) in entries {
                    target.insert(inner_key.clone(), value.clone());
                }
                continue;
            }
        }
        merged.insert(key.clone(), incoming.clone());
    }

    if update.get(ENV_KEY).is_some() {
        if let Some(Value::Object(env)) = merged.get_mut(ENV_KEY) {
            sanitize_env(env);
        }
    }

    SettingsDocument::from_map(merged)
}

/// Drops null and empty entries and stringifies scalars so every surviving
/// value is a string.
pub fn sanitize_env(env: &mut Map<String, Value>) {
    env.retain(|_, value| match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    });
    for value in env.values_mut() {
        match value {
            Value::Number(n) => *value = Value::String(n.to_string()),
            Value::Bool(b) => *value = Value::String(b.to_string()),
            _ => {}
        }
    }
}

/// True when the input carries any of the markers of the nested shape.
pub fn is_nested_shape(input: &Map<String, Value>) -> bool {
    NESTED_SHAPE_MARKERS
        .iter()
        .any(|marker| input.contains_key(*marker))
}

/// Operation C: turns whatever shape the caller sent into a validated update
/// in the nested shape. Rejects the whole input on any validation error.
pub fn normalize_for_write(input: &Value) -> Result<SettingsUpdate, SettingsError> {
    let update = SettingsUpdate::try_from(input.clone())?;

    let mut update = if is_nested_shape(update.fields()) {
        update
    } else {
        debug!("[settings:reconcile] converting legacy settings payload");
        legacy_to_nested(update)?
    };

    coerce_numeric_scalars(&mut update);
    enforce_mirrors(&mut update);
    Ok(update)
}

/// Mirrors `model` into `env` and clamps both output-token fields. Every
/// path that writes an update runs this; running it twice changes nothing.
pub(crate) fn enforce_mirrors(update: &mut SettingsUpdate) {
    mirror_model(update);
    mirror_output_tokens(update);
}

/// Form inputs often arrive as strings; top-level numeric settings are stored
/// as JSON numbers.
fn coerce_numeric_scalars(update: &mut SettingsUpdate) {
    let fields = update.fields_mut();
    for key in ["temperature", "top_p"] {
        let parsed = fields
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| s.trim().parse::<f64>().ok());
        if let Some(number) = parsed {
            fields.insert(key.to_string(), json!(number));
        }
    }
    if let Some(days) = fields
        .get("cleanupPeriodDays")
        .filter(|value| value.is_string())
        .and_then(parse_u64)
    {
        fields.insert("cleanupPeriodDays".to_string(), json!(days));
    }
}

fn legacy_to_nested(update: SettingsUpdate) -> Result<SettingsUpdate, SettingsError> {
    let mut fields = update.into_fields();
    for key in LEGACY_FORM_ONLY_KEYS {
        fields.remove(*key);
    }

    let base_url = fields.remove("anthropic_base_url");
    let api_endpoint = fields.remove("api_endpoint");
    let auth_token = fields.remove("anthropic_auth_token");
    let timeout = fields.remove("timeout");
    let theme = fields.remove("theme");

    let mut env = Map::new();

    let base_url = [base_url, api_endpoint]
        .into_iter()
        .flatten()
        .find(|value| value.as_str().is_some_and(|s| !s.is_empty()));
    if let Some(url) = base_url {
        env.insert(ENV_BASE_URL.to_string(), url);
    }

    if let Some(token) = auth_token {
        if !token.is_string() {
            return Err(SettingsError::validation(
                "anthropic_auth_token must be a string",
            ));
        }
        env.insert(ENV_AUTH_TOKEN.to_string(), token);
    }

    if let Some(timeout) = timeout {
        let millis = parse_u64(&timeout).ok_or_else(|| {
            SettingsError::validation("timeout must be a non-negative integer")
        })?;
        env.insert(ENV_TIMEOUT_MS.to_string(), Value::String(millis.to_string()));
    }

    if let Some(theme) = theme {
        let Some(theme) = theme.as_str() else {
            return Err(SettingsError::validation("theme must be a string"));
        };
        object_entry(&mut fields, UI_SETTINGS_KEY).insert("theme".to_string(), json!(theme));
    }

    fields.insert(SCHEMA_KEY.to_string(), json!(SCHEMA_URL));
    if !env.is_empty() {
        fields.insert(ENV_KEY.to_string(), Value::Object(env));
    }

    Ok(SettingsUpdate::from_fields(fields))
}

/// Keeps `model` and `env.ANTHROPIC_MODEL` in step. When both are supplied
/// the env value wins.
fn mirror_model(update: &mut SettingsUpdate) {
    let env_model = update
        .get(ENV_KEY)
        .and_then(|env| env.get(ENV_MODEL))
        .cloned();
    let top_model = non_empty_str(update.get("model")).map(str::to_string);

    match (env_model, top_model) {
        (Some(Value::String(env_model)), top) if !env_model.is_empty() => {
            if top.as_deref() != Some(env_model.as_str()) {
                update
                    .fields_mut()
                    .insert("model".to_string(), Value::String(env_model));
            }
        }
        (None, Some(top)) => {
            update
                .env_mut()
                .insert(ENV_MODEL.to_string(), Value::String(top));
        }
        _ => {}
    }
}

/// Clamps both output-token fields and keeps them in step. A blank env value
/// is left for the merge to delete; one with no leading digits is dropped.
fn mirror_output_tokens(update: &mut SettingsUpdate) {
    let env_raw = update
        .get(ENV_KEY)
        .and_then(|env| env.get(ENV_MAX_OUTPUT_TOKENS))
        .cloned();
    let env_tokens = env_raw.as_ref().and_then(parse_u64);

    let env_writable = match &env_raw {
        Some(raw) if env_tokens.is_none() => {
            if !is_blank(raw) {
                warn!(
                    "[settings:reconcile] dropping non-numeric {ENV_MAX_OUTPUT_TOKENS} value {raw}"
                );
                update.env_mut().remove(ENV_MAX_OUTPUT_TOKENS);
                true
            } else {
                false
            }
        }
        _ => true,
    };

    let top_tokens = update.get("max_tokens").and_then(parse_u64);
    let Some(requested) = env_tokens.or(top_tokens) else {
        return;
    };
    let clamped = clamp_output_tokens(requested);
    if clamped != requested {
        warn!("[settings:reconcile] clamping output token limit from {requested} to {clamped}");
    }

    if env_writable {
        update.env_mut().insert(
            ENV_MAX_OUTPUT_TOKENS.to_string(),
            Value::String(clamped.to_string()),
        );
    }
    update
        .fields_mut()
        .insert("max_tokens".to_string(), json!(clamped));
}

fn is_blank(value: &Value) -> bool {
    value.is_null() || value.as_str().is_some_and(str::is_empty)
}

fn env_u64(doc: &SettingsDocument, key: &str) -> Option<u64> {
    doc.env()?.get(key).and_then(parse_u64)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
