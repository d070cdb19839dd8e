use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::document::SettingsDocument;
use crate::error::SettingsError;
use crate::reconcile::{normalize_for_write, to_display_shape, LegacyView};
use crate::store::SettingsStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSaveResult {
    pub success: bool,
    pub settings: SettingsDocument,
}

/// Load settings from disk in the nested shape.
pub async fn load_settings(store: &SettingsStore) -> Result<SettingsDocument, SettingsError> {
    store.load().await
}

/// Load settings flattened for the legacy form.
pub async fn load_legacy_settings(store: &SettingsStore) -> Result<LegacyView, SettingsError> {
    let settings = store.load().await?;
    Ok(to_display_shape(&settings))
}

/// Save settings with merge logic. `changes` may use either shape; it is
/// validated in full before the file is touched.
pub async fn save_settings(
    store: &SettingsStore,
    changes: &Value,
) -> Result<SettingsSaveResult, SettingsError> {
    let update = normalize_for_write(changes)?;
    let keys: Vec<&str> = update.fields().keys().map(String::as_str).collect();
    info!("[settings] saving keys: {}", keys.join(", "));

    let settings = store.apply(&update).await?;
    Ok(SettingsSaveResult {
        success: true,
        settings,
    })
}
