//! Command-line and environment configuration for the settings server.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::LevelFilter;
use portpicker::pick_unused_port;

use crate::path_utils::expand_tilde_path;
use crate::store::SettingsStore;

/// Local web backend for editing the coding assistant's settings.json.
#[derive(Parser, Debug)]
#[command(name = "claude-settings", version, about, long_about = None)]
pub struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "CLAUDE_SETTINGS_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on (a free port is picked when omitted)
    #[arg(short, long, env = "CLAUDE_SETTINGS_PORT")]
    pub port: Option<u16>,

    /// Settings file to edit (defaults to ~/.claude/settings.json)
    #[arg(long, env = "CLAUDE_SETTINGS_PATH")]
    pub settings_path: Option<String>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, env = "CLAUDE_SETTINGS_LOG", default_value = "info")]
    pub log_level: LevelFilter,

    /// Write logs to the per-user log directory instead of stderr
    #[arg(long)]
    pub log_file: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: SocketAddr,
    pub settings_path: PathBuf,
    pub log_level: LevelFilter,
    pub log_to_file: bool,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let settings_path = match cli.settings_path.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => expand_tilde_path(raw),
            _ => SettingsStore::default_location()
                .context("cannot determine default settings location")?,
        };

        let port = match cli.port {
            Some(port) => port,
            None => pick_unused_port().ok_or_else(|| anyhow!("No free port available"))?,
        };

        Ok(Self {
            addr: SocketAddr::new(cli.host, port),
            settings_path,
            log_level: cli.log_level,
            log_to_file: cli.log_file,
        })
    }
}
