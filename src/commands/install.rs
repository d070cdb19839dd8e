use serde::Deserialize;

use crate::installer::{CommandRunner, InstallMethod, InstallOutcome, InstallStatus, Installer};

#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    #[serde(default)]
    pub method: Option<String>,
}

pub async fn check_installation<R: CommandRunner>(installer: &Installer<R>) -> InstallStatus {
    installer.check().await
}

/// Runs the installer for the requested method. An unknown selector is
/// rejected before any process is spawned.
pub async fn install_cli<R: CommandRunner>(
    installer: &Installer<R>,
    request: &InstallRequest,
) -> Result<InstallOutcome, String> {
    let method = request
        .method
        .as_deref()
        .ok_or_else(|| "Invalid installation method".to_string())?
        .parse::<InstallMethod>()?;
    Ok(installer.install(method).await)
}
