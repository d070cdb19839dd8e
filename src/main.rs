use anyhow::Result;
use clap::Parser;
use log::{info, warn};

use claude_settings::config::{AppConfig, Cli};
use claude_settings::logging::{init_logging, log_file_path};
use claude_settings::server::{run_http_server, ServerState};
use claude_settings::{ErrorKind, SettingsStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_cli(Cli::parse())?;
    init_logging(config.log_level, config.log_to_file);

    if config.log_to_file {
        if let Some(path) = log_file_path() {
            info!("[settings] logging to {}", path.display());
        }
    }

    let store = SettingsStore::new(&config.settings_path);
    match store.load().await {
        Ok(_) => info!("[settings] using {}", config.settings_path.display()),
        // Reported again on every request; saves are refused until fixed.
        Err(err) if err.kind() == ErrorKind::CorruptDocument => {
            warn!("[settings] {err}");
        }
        Err(err) => return Err(err.into()),
    }

    run_http_server(config.addr, ServerState::new(store)).await
}
