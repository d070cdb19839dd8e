use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::document::{
    object_entry, parse_u64, ENV_KEY, ENV_MAX_OUTPUT_TOKENS, HOOKS_KEY, PERMISSIONS_KEY,
    SCHEMA_KEY, UI_SETTINGS_KEY,
};
use crate::error::SettingsError;
use crate::reconcile::enforce_mirrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

impl PermissionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

impl FromStr for PermissionMode {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "default" => Ok(Self::Default),
            "acceptEdits" => Ok(Self::AcceptEdits),
            "plan" => Ok(Self::Plan),
            "bypassPermissions" => Ok(Self::BypassPermissions),
            other => Err(SettingsError::validation(format!(
                "permissions.defaultMode `{other}` is not a known mode"
            ))),
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook events that map a tool name to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolHookEvent {
    PreToolUse,
    PostToolUse,
}

impl ToolHookEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
        }
    }
}

/// Hook slots holding a single command.
pub const SINGLETON_HOOKS: &[&str] = &["Notification", "Stop"];

const STRING_LIST_PERMISSION_KEYS: &[&str] = &["allow", "deny", "additionalDirectories"];
const STRING_LIST_KEYS: &[&str] = &["enabledMcpjsonServers", "disabledMcpjsonServers"];
const BOOL_KEYS: &[&str] = &["includeCoAuthoredBy", "enableAllProjectMcpServers"];
const STRING_KEYS: &[&str] = &[SCHEMA_KEY, "model", "system_prompt"];
const FLOAT_KEYS: &[&str] = &["temperature", "top_p"];
const COUNT_KEYS: &[&str] = &["cleanupPeriodDays", "max_tokens"];

/// A validated partial update. Only keys present here are touched by a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsUpdate {
    fields: Map<String, Value>,
}

impl SettingsUpdate {
    pub fn builder() -> SettingsUpdateBuilder {
        SettingsUpdateBuilder::default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub(crate) fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub(crate) fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    pub(crate) fn env_mut(&mut self) -> &mut Map<String, Value> {
        object_entry(&mut self.fields, ENV_KEY)
    }
}

impl TryFrom<Value> for SettingsUpdate {
    type Error = SettingsError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut fields) = value else {
            return Err(SettingsError::validation("update must be a JSON object"));
        };

        fields.retain(|_, value| !value.is_null());
        validate_fields(&fields)?;
        Ok(Self { fields })
    }
}

fn validate_fields(fields: &Map<String, Value>) -> Result<(), SettingsError> {
    if let Some(env) = fields.get(ENV_KEY) {
        validate_env(env)?;
    }
    if let Some(permissions) = fields.get(PERMISSIONS_KEY) {
        validate_permissions(permissions)?;
    }
    if let Some(hooks) = fields.get(HOOKS_KEY) {
        validate_hooks(hooks)?;
    }
    if let Some(ui) = fields.get(UI_SETTINGS_KEY) {
        if !ui.is_object() {
            return Err(SettingsError::validation("ui_settings must be an object"));
        }
    }

    for key in STRING_LIST_KEYS {
        if let Some(value) = fields.get(*key) {
            require_string_list(value, key)?;
        }
    }
    for key in BOOL_KEYS {
        if let Some(value) = fields.get(*key) {
            if !value.is_boolean() {
                return Err(SettingsError::validation(format!("{key} must be a boolean")));
            }
        }
    }
    for key in STRING_KEYS {
        if let Some(value) = fields.get(*key) {
            if !value.is_string() {
                return Err(SettingsError::validation(format!("{key} must be a string")));
            }
        }
    }
    for key in FLOAT_KEYS {
        if let Some(value) = fields.get(*key) {
            let numeric = value.is_number()
                || value
                    .as_str()
                    .is_some_and(|s| s.trim().parse::<f64>().is_ok());
            if !numeric {
                return Err(SettingsError::validation(format!("{key} must be a number")));
            }
        }
    }
    for key in COUNT_KEYS {
        if let Some(value) = fields.get(*key) {
            let count = value.as_u64().is_some()
                || value
                    .as_str()
                    .is_some_and(|s| s.trim().parse::<u64>().is_ok());
            if !count {
                return Err(SettingsError::validation(format!(
                    "{key} must be a non-negative integer"
                )));
            }
        }
    }

    Ok(())
}

fn validate_env(env: &Value) -> Result<(), SettingsError> {
    let Some(entries) = env.as_object() else {
        return Err(SettingsError::validation("env must be an object"));
    };
    for (key, value) in entries {
        match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {}
            _ => {
                return Err(SettingsError::validation(format!(
                    "env.{key} must be a string"
                )))
            }
        }
    }
    if let Some(tokens) = entries.get(ENV_MAX_OUTPUT_TOKENS) {
        let blank = tokens.is_null() || tokens.as_str().is_some_and(|s| s.trim().is_empty());
        if !blank && parse_u64(tokens).is_none() {
            return Err(SettingsError::validation(format!(
                "env.{ENV_MAX_OUTPUT_TOKENS} must be a non-negative integer"
            )));
        }
    }
    Ok(())
}

fn validate_permissions(permissions: &Value) -> Result<(), SettingsError> {
    let Some(entries) = permissions.as_object() else {
        return Err(SettingsError::validation("permissions must be an object"));
    };
    for key in STRING_LIST_PERMISSION_KEYS {
        if let Some(value) = entries.get(*key) {
            require_string_list(value, &format!("permissions.{key}"))?;
        }
    }
    if let Some(mode) = entries.get("defaultMode") {
        let Some(mode) = mode.as_str() else {
            return Err(SettingsError::validation(
                "permissions.defaultMode must be a string",
            ));
        };
        mode.parse::<PermissionMode>()?;
    }
    Ok(())
}

fn validate_hooks(hooks: &Value) -> Result<(), SettingsError> {
    let Some(events) = hooks.as_object() else {
        return Err(SettingsError::validation("hooks must be an object"));
    };
    for (event, value) in events {
        if SINGLETON_HOOKS.contains(&event.as_str()) {
            if !value.is_string() {
                return Err(SettingsError::validation(format!(
                    "hooks.{event} must be a command string"
                )));
            }
            continue;
        }
        let Some(tools) = value.as_object() else {
            return Err(SettingsError::validation(format!(
                "hooks.{event} must map tool names to commands"
            )));
        };
        if let Some((tool, _)) = tools.iter().find(|(_, command)| !command.is_string()) {
            return Err(SettingsError::validation(format!(
                "hooks.{event}.{tool} must be a command string"
            )));
        }
    }
    Ok(())
}

fn require_string_list(value: &Value, label: &str) -> Result<(), SettingsError> {
    let valid = value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string));
    if valid {
        Ok(())
    } else {
        Err(SettingsError::validation(format!(
            "{label} must be a list of strings"
        )))
    }
}

/// Builds a [`SettingsUpdate`] from typed field paths.
#[derive(Debug, Default)]
pub struct SettingsUpdateBuilder {
    fields: Map<String, Value>,
}

impl SettingsUpdateBuilder {
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        object_entry(&mut self.fields, ENV_KEY).insert(key.into(), Value::String(value.into()));
        self
    }

    /// Marks `env.<key>` for removal.
    pub fn clear_env(mut self, key: impl Into<String>) -> Self {
        object_entry(&mut self.fields, ENV_KEY).insert(key.into(), Value::Null);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.fields.insert("model".into(), Value::String(model.into()));
        self
    }

    pub fn max_tokens(mut self, tokens: u64) -> Self {
        self.fields.insert("max_tokens".into(), json!(tokens));
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.fields.insert("temperature".into(), json!(temperature));
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.fields.insert("top_p".into(), json!(top_p));
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.fields
            .insert("system_prompt".into(), Value::String(prompt.into()));
        self
    }

    pub fn permissions_allow<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        object_entry(&mut self.fields, PERMISSIONS_KEY).insert("allow".into(), string_list(rules));
        self
    }

    pub fn permissions_deny<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        object_entry(&mut self.fields, PERMISSIONS_KEY).insert("deny".into(), string_list(rules));
        self
    }

    pub fn additional_directories<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        object_entry(&mut self.fields, PERMISSIONS_KEY)
            .insert("additionalDirectories".into(), string_list(dirs));
        self
    }

    pub fn default_mode(mut self, mode: PermissionMode) -> Self {
        object_entry(&mut self.fields, PERMISSIONS_KEY)
            .insert("defaultMode".into(), Value::String(mode.as_str().into()));
        self
    }

    pub fn tool_hook(
        mut self,
        event: ToolHookEvent,
        tool: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        let hooks = object_entry(&mut self.fields, HOOKS_KEY);
        object_entry(hooks, event.as_str()).insert(tool.into(), Value::String(command.into()));
        self
    }

    pub fn notification_hook(mut self, command: impl Into<String>) -> Self {
        object_entry(&mut self.fields, HOOKS_KEY)
            .insert("Notification".into(), Value::String(command.into()));
        self
    }

    pub fn stop_hook(mut self, command: impl Into<String>) -> Self {
        object_entry(&mut self.fields, HOOKS_KEY)
            .insert("Stop".into(), Value::String(command.into()));
        self
    }

    pub fn ui_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        object_entry(&mut self.fields, UI_SETTINGS_KEY).insert(key.into(), value);
        self
    }

    pub fn enabled_mcp_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert("enabledMcpjsonServers".into(), string_list(servers));
        self
    }

    pub fn disabled_mcp_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert("disabledMcpjsonServers".into(), string_list(servers));
        self
    }

    pub fn enable_all_project_mcp_servers(mut self, enabled: bool) -> Self {
        self.fields
            .insert("enableAllProjectMcpServers".into(), Value::Bool(enabled));
        self
    }

    pub fn cleanup_period_days(mut self, days: u32) -> Self {
        self.fields.insert("cleanupPeriodDays".into(), json!(days));
        self
    }

    pub fn include_co_authored_by(mut self, include: bool) -> Self {
        self.fields
            .insert("includeCoAuthoredBy".into(), Value::Bool(include));
        self
    }

    /// Finishes the update with the token limit clamped and `model` mirrored
    /// into `env`, the same as a normalized payload.
    pub fn build(self) -> SettingsUpdate {
        let mut update = SettingsUpdate {
            fields: self.fields,
        };
        enforce_mirrors(&mut update);
        update
    }
}

fn string_list<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Array(
        items
            .into_iter()
            .map(|item| Value::String(item.into()))
            .collect(),
    )
}
