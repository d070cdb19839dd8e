//! Best-effort detection and installation of the `claude` CLI.
//!
//! Nothing here can fail the settings service: every process error degrades to
//! "not installed" or an `unknown` version.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

const NPM_PACKAGE: &str = "@anthropic-ai/claude-code";
const BREW_FORMULA: &str = "anthropic/tap/claude-code";
const CURL_INSTALL_SCRIPT: &str = "curl -fsSL https://claude.ai/install | sh";

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

const BREW_BINARY_PATHS: &[&str] = &["/usr/local/bin/claude-code", "/opt/homebrew/bin/claude-code"];
const COMMON_BINARY_PATHS: &[&str] = &[
    "/usr/bin/claude-code",
    "/usr/local/bin/claude-code",
    "/opt/bin/claude-code",
];

const BINARY_FOUND_VERSION: &str = "installed (binary found)";
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    Npm,
    Brew,
    Curl,
}

impl InstallMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Brew => "brew",
            Self::Curl => "curl",
        }
    }
}

impl FromStr for InstallMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "npm" => Ok(Self::Npm),
            "brew" => Ok(Self::Brew),
            "curl" => Ok(Self::Curl),
            _ => Err("Invalid installation method".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallStatus {
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub config_exists: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Process-spawning seam so detection logic can be exercised without a shell.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> impl Future<Output = Result<CommandOutput, String>> + Send;

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, String> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| format!("`{program}` timed out after {}s", timeout.as_secs()))?
            .map_err(|err| format!("failed to run `{program}`: {err}"))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

pub struct Installer<R = SystemRunner> {
    runner: R,
    is_macos: bool,
    home: Option<PathBuf>,
    settings_path: PathBuf,
}

impl Installer<SystemRunner> {
    pub fn system(settings_path: impl Into<PathBuf>) -> Self {
        Self::with_runner(
            SystemRunner,
            cfg!(target_os = "macos"),
            dirs::home_dir(),
            settings_path,
        )
    }
}

impl<R: CommandRunner> Installer<R> {
    pub fn with_runner(
        runner: R,
        is_macos: bool,
        home: Option<PathBuf>,
        settings_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            is_macos,
            home,
            settings_path: settings_path.into(),
        }
    }

    pub async fn check(&self) -> InstallStatus {
        for command in ["claude", "claude-code"] {
            if let Some(path) = self.which(command).await {
                debug!("[installer] found `{command}` at {path}");
                let version = self
                    .cli_version()
                    .await
                    .or_else(|| (command == "claude-code").then(|| BINARY_FOUND_VERSION.to_string()))
                    .unwrap_or_else(|| UNKNOWN.to_string());
                return InstallStatus {
                    installed: true,
                    version: Some(version),
                    install_method: Some(self.detect_install_method().await),
                    path: Some(path),
                    config_exists: self.config_exists(),
                };
            }
        }

        if let Some(path) = self.npm_global_install().await {
            return InstallStatus {
                installed: true,
                version: Some(UNKNOWN.to_string()),
                install_method: Some(InstallMethod::Npm.as_str().to_string()),
                path,
                config_exists: self.config_exists(),
            };
        }

        if self.is_macos && self.brew_install_present().await {
            return InstallStatus {
                installed: true,
                version: Some(UNKNOWN.to_string()),
                install_method: Some(InstallMethod::Brew.as_str().to_string()),
                path: Some(BREW_BINARY_PATHS[0].to_string()),
                config_exists: self.config_exists(),
            };
        }

        InstallStatus {
            installed: false,
            config_exists: self.config_exists(),
            ..InstallStatus::default()
        }
    }

    pub async fn install(&self, method: InstallMethod) -> InstallOutcome {
        let method_name = Some(method.as_str().to_string());
        let (program, args): (&str, Vec<&str>) = match method {
            InstallMethod::Npm => ("npm", vec!["install", "-g", NPM_PACKAGE]),
            InstallMethod::Brew if !self.is_macos => {
                return InstallOutcome {
                    success: false,
                    install_method: method_name,
                    error: Some("Homebrew is only available on macOS".to_string()),
                    ..InstallOutcome::default()
                }
            }
            InstallMethod::Brew => ("brew", vec!["install", BREW_FORMULA]),
            InstallMethod::Curl => ("sh", vec!["-c", CURL_INSTALL_SCRIPT]),
        };

        info!("[installer] installing via {}", method.as_str());
        let failure = match self.runner.run(program, &args, INSTALL_TIMEOUT).await {
            Ok(output) if output.success => None,
            Ok(output) => Some(if output.stderr.is_empty() {
                format!("`{program}` exited unsuccessfully")
            } else {
                output.stderr
            }),
            Err(err) => Some(err),
        };
        if let Some(reason) = failure {
            warn!("[installer] {} install failed: {reason}", method.as_str());
            return InstallOutcome {
                success: false,
                install_method: method_name,
                error: Some(format!("Installation failed: {reason}")),
                ..InstallOutcome::default()
            };
        }

        match self.verify_install().await {
            Some(version) => InstallOutcome {
                success: true,
                version: Some(version),
                install_method: method_name,
                ..InstallOutcome::default()
            },
            None => InstallOutcome {
                success: true,
                version: Some(UNKNOWN.to_string()),
                install_method: method_name,
                warning: Some(
                    "Installation completed but the command could not be verified; \
                     restart your terminal or update PATH"
                        .to_string(),
                ),
                ..InstallOutcome::default()
            },
        }
    }

    async fn which(&self, command: &str) -> Option<String> {
        let output = self
            .runner
            .run("which", &[command], PROBE_TIMEOUT)
            .await
            .ok()?;
        let path = output.stdout.lines().next()?.trim();
        (output.success && !path.is_empty()).then(|| path.to_string())
    }

    async fn cli_version(&self) -> Option<String> {
        let output = self
            .runner
            .run("claude", &["--version"], PROBE_TIMEOUT)
            .await
            .ok()?;
        (output.success && !output.stdout.is_empty()).then_some(output.stdout)
    }

    async fn npm_prefix(&self) -> Option<PathBuf> {
        let output = self
            .runner
            .run("npm", &["config", "get", "prefix"], PROBE_TIMEOUT)
            .await
            .ok()?;
        (output.success && !output.stdout.is_empty()).then(|| PathBuf::from(output.stdout))
    }

    /// `Some(path)` when the npm global package is installed; the inner path
    /// is absent when the npm prefix could not be resolved.
    async fn npm_global_install(&self) -> Option<Option<String>> {
        let output = self
            .runner
            .run("npm", &["list", "-g", NPM_PACKAGE], PROBE_TIMEOUT)
            .await
            .ok()?;
        if !output.success || !output.stdout.contains(NPM_PACKAGE) {
            return None;
        }
        let path = self
            .npm_prefix()
            .await
            .map(|prefix| prefix.join("bin").join("claude-code").display().to_string());
        Some(path)
    }

    async fn brew_install_present(&self) -> bool {
        match self.runner.run("brew", &["list"], PROBE_TIMEOUT).await {
            Ok(output) => output.success && output.stdout.lines().any(|l| l.trim() == "claude-code"),
            Err(_) => false,
        }
    }

    async fn detect_install_method(&self) -> String {
        if let Some(prefix) = self.npm_prefix().await {
            if self.runner.file_exists(&prefix.join("bin").join("claude-code")) {
                return InstallMethod::Npm.as_str().to_string();
            }
        }
        if self.is_macos
            && BREW_BINARY_PATHS
                .iter()
                .any(|path| self.runner.file_exists(Path::new(path)))
        {
            return InstallMethod::Brew.as_str().to_string();
        }
        if self
            .binary_candidates()
            .iter()
            .any(|path| self.runner.file_exists(path))
        {
            return "binary".to_string();
        }
        UNKNOWN.to_string()
    }

    async fn verify_install(&self) -> Option<String> {
        if let Some(version) = self.cli_version().await {
            return Some(version);
        }
        if self.which("claude-code").await.is_some() {
            return Some(BINARY_FOUND_VERSION.to_string());
        }

        let mut candidates = Vec::new();
        if let Some(prefix) = self.npm_prefix().await {
            candidates.push(prefix.join("bin").join("claude-code"));
        }
        if let Some(home) = &self.home {
            candidates.push(home.join(".npm-global").join("bin").join("claude-code"));
        }
        candidates.extend(BREW_BINARY_PATHS.iter().map(PathBuf::from));

        candidates
            .iter()
            .any(|path| self.runner.file_exists(path))
            .then(|| BINARY_FOUND_VERSION.to_string())
    }

    fn binary_candidates(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = COMMON_BINARY_PATHS.iter().map(PathBuf::from).collect();
        if let Some(home) = &self.home {
            paths.push(home.join(".local").join("bin").join("claude-code"));
        }
        paths
    }

    fn config_exists(&self) -> bool {
        self.runner.file_exists(&self.settings_path)
    }
}
