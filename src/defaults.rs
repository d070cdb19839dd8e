use serde_json::{json, Value};

use crate::document::SettingsDocument;

pub const SCHEMA_URL: &str = "https://json.schemastore.org/claude-code-settings.json";

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 1.0;

/// Upper bound for `CLAUDE_CODE_MAX_OUTPUT_TOKENS` and the legacy `max_tokens` mirror.
pub const MAX_OUTPUT_TOKENS_CEILING: u64 = 8192;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;
pub const DEFAULT_TOKENS_PER_MINUTE: u32 = 90_000;

pub const DEFAULT_ALLOW_RULES: &[&str] = &[
    "Bash(git:*)",
    "Bash(npm:*)",
    "Bash(pnpm:*)",
    "Bash(node:*)",
    "Read(src/**)",
    "Edit(src/**)",
    "Write(src/**)",
    "Glob",
    "Grep",
    "LS",
    "Task",
    "TodoWrite",
    "MultiEdit(src/**)",
    "NotebookRead",
    "NotebookEdit(*.ipynb)",
];

/// Document written on first run when no settings file exists.
pub fn default_document() -> SettingsDocument {
    let value = json!({
        "$schema": SCHEMA_URL,
        "env": {
            "ANTHROPIC_MODEL": DEFAULT_MODEL,
            "ANTHROPIC_BASE_URL": DEFAULT_BASE_URL,
            "BASH_DEFAULT_TIMEOUT_MS": DEFAULT_TIMEOUT_MS.to_string(),
            "BASH_MAX_TIMEOUT_MS": "300000",
            "BASH_MAX_OUTPUT_LENGTH": "300000",
            "CLAUDE_CODE_MAX_OUTPUT_TOKENS": MAX_OUTPUT_TOKENS_CEILING.to_string(),
            "MAX_THINKING_TOKENS": "8192",
            "MAX_MCP_OUTPUT_TOKENS": "1000000",
            "MCP_TIMEOUT": "30000",
            "MCP_TOOL_TIMEOUT": "60000",
        },
        "model": DEFAULT_MODEL,
        "permissions": {
            "allow": DEFAULT_ALLOW_RULES,
            "deny": [],
            "additionalDirectories": [],
            "defaultMode": "acceptEdits",
        },
        "cleanupPeriodDays": 30,
        "includeCoAuthoredBy": true,
        "enableAllProjectMcpServers": false,
        "enabledMcpjsonServers": ["memory", "github"],
        "disabledMcpjsonServers": [],
        "max_tokens": MAX_OUTPUT_TOKENS_CEILING,
        "temperature": DEFAULT_TEMPERATURE,
        "top_p": DEFAULT_TOP_P,
        "ui_settings": {
            "theme": "dark",
            "preferredNotifChannel": "iterm2",
            "autoUpdates": true,
            "verbose": false,
        },
    });

    match value {
        Value::Object(map) => SettingsDocument::from_map(map),
        _ => SettingsDocument::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_document_mirrors_model_and_token_limit() {
        let doc = default_document();
        assert_eq!(doc.env_str("ANTHROPIC_MODEL"), Some(DEFAULT_MODEL));
        assert_eq!(doc.get("model"), Some(&json!(DEFAULT_MODEL)));
        assert_eq!(doc.env_str("CLAUDE_CODE_MAX_OUTPUT_TOKENS"), Some("8192"));
        assert_eq!(doc.get("max_tokens"), Some(&json!(8192)));
        assert_eq!(
            doc.get("permissions").and_then(|p| p.get("defaultMode")),
            Some(&json!("acceptEdits"))
        );
        assert!(doc
            .env()
            .map(|env| env.values().all(Value::is_string))
            .unwrap_or(false));
    }
}
