use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

#[cfg(target_os = "macos")]
const PLATFORM_LOG_SEGMENTS: &[&str] = &["Library", "Logs", "ClaudeSettings"];
#[cfg(not(target_os = "macos"))]
const PLATFORM_LOG_SEGMENTS: &[&str] = &[".config", "claude-settings", "logs"];

const LOG_FILE_NAME: &str = "claude-settings.log";

pub fn log_directory() -> Option<PathBuf> {
    let mut path = dirs::home_dir()?;
    for segment in PLATFORM_LOG_SEGMENTS {
        path.push(segment);
    }
    Some(path)
}

pub fn log_file_path() -> Option<PathBuf> {
    let mut dir = log_directory()?;
    dir.push(LOG_FILE_NAME);
    Some(dir)
}

/// Installs the global logger. `RUST_LOG` still overrides `level` per module.
/// With `to_file`, output is appended to [`log_file_path`] instead of stderr.
pub fn init_logging(level: LevelFilter, to_file: bool) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(level.to_string()));

    if to_file {
        match open_log_file() {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(err) => eprintln!("[logging] falling back to stderr: {err}"),
        }
    }

    builder.try_init().ok();
}

fn open_log_file() -> std::io::Result<fs::File> {
    let path = log_file_path()
        .ok_or_else(|| std::io::Error::other("home directory unavailable"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
