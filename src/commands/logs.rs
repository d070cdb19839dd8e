use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::logging::log_file_path;

const DEFAULT_TAIL_LINES: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub lines: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogTail {
    pub file_name: String,
    pub content: String,
    pub truncated: bool,
}

/// Tail of the server's own log file. Only populated when logging to a file.
pub async fn fetch_logs(query: &LogQuery) -> Result<LogTail, String> {
    let path = log_file_path().ok_or_else(|| "Log location unavailable".to_string())?;
    read_log_tail(&path, query.lines.unwrap_or(DEFAULT_TAIL_LINES)).await
}

pub async fn read_log_tail(path: &Path, max_lines: usize) -> Result<LogTail, String> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|err| format!("Failed to read log file: {err}"))?;

    let lines: Vec<&str> = raw.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("claude-settings.log")
        .to_string();

    Ok(LogTail {
        file_name,
        content: lines[start..].join("\n"),
        truncated: start > 0,
    })
}
