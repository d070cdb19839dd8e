use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;

use crate::defaults::default_document;
use crate::document::SettingsDocument;
use crate::error::SettingsError;
use crate::fs_atomic::atomic_write_file;
use crate::reconcile::{enforce_mirrors, merge};
use crate::update::SettingsUpdate;

const SETTINGS_DIR: &str = ".claude";
const SETTINGS_FILE: &str = "settings.json";

/// Owns the settings file. Construct once and share it behind an `Arc`.
///
/// Writes inside this process are serialized by `guard`; nothing protects the
/// file from a second process writing at the same time.
#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    guard: Arc<Mutex<()>>,
    last_loaded: Arc<Mutex<Option<SettingsDocument>>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Arc::new(Mutex::new(())),
            last_loaded: Arc::new(Mutex::new(None)),
        }
    }

    /// `~/.claude/settings.json`
    pub fn default_location() -> Result<PathBuf, SettingsError> {
        let mut path = dirs::home_dir().ok_or(SettingsError::HomeDirectoryUnavailable)?;
        path.push(SETTINGS_DIR);
        path.push(SETTINGS_FILE);
        Ok(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file, writing the default document first if it does not
    /// exist yet. A file that is not a JSON object is reported, never replaced.
    pub async fn load(&self) -> Result<SettingsDocument, SettingsError> {
        let _lock = self.guard.lock().await;
        self.load_unlocked().await
    }

    pub async fn save(&self, doc: &SettingsDocument) -> Result<(), SettingsError> {
        let _lock = self.guard.lock().await;
        self.write_unlocked(doc).await
    }

    /// Read-modify-write under the store lock. The file is only rewritten when
    /// `f` changes the document.
    pub async fn update_with<R, F>(&self, f: F) -> Result<(SettingsDocument, R), SettingsError>
    where
        F: FnOnce(SettingsDocument) -> (SettingsDocument, R),
    {
        let _lock = self.guard.lock().await;

        let current = self.load_unlocked().await?;
        let current_snapshot = current.clone();
        let (next, result) = f(current);

        if next != current_snapshot {
            self.write_unlocked(&next).await?;
        } else {
            debug!("[settings:store] update left {} unchanged", self.path.display());
        }

        Ok((next, result))
    }

    /// Merges `update` into the on-disk document and persists the result.
    /// The token limit is clamped and `model` mirrored before merging.
    pub async fn apply(&self, update: &SettingsUpdate) -> Result<SettingsDocument, SettingsError> {
        let mut update = update.clone();
        enforce_mirrors(&mut update);
        let (next, _) = self
            .update_with(|current| (merge(&current, &update), ()))
            .await?;
        Ok(next)
    }

    /// The document most recently read from or written to disk.
    pub async fn snapshot(&self) -> Option<SettingsDocument> {
        self.last_loaded.lock().await.clone()
    }

    async fn load_unlocked(&self) -> Result<SettingsDocument, SettingsError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "[settings:store] {} not found, writing defaults",
                    self.path.display()
                );
                let doc = default_document();
                self.write_unlocked(&doc).await?;
                return Ok(doc);
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        let value: Value = serde_json::from_slice(&bytes).map_err(|source| {
            warn!(
                "[settings:store] refusing to use corrupt settings file {}",
                self.path.display()
            );
            SettingsError::Corrupt {
                path: self.path.display().to_string(),
                source,
            }
        })?;

        let Value::Object(map) = value else {
            return Err(SettingsError::NotAnObject {
                path: self.path.display().to_string(),
            });
        };

        let doc = SettingsDocument::from_map(map);
        *self.last_loaded.lock().await = Some(doc.clone());
        Ok(doc)
    }

    async fn write_unlocked(&self, doc: &SettingsDocument) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| SettingsError::CreateDir {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let bytes = serde_json::to_vec_pretty(doc).map_err(|source| SettingsError::Encode {
            path: self.path.display().to_string(),
            source,
        })?;

        atomic_write_file(&self.path, &bytes)
            .await
            .map_err(|source| SettingsError::Write {
                path: self.path.display().to_string(),
                source,
            })?;

        info!("[settings:store] wrote {}", self.path.display());
        *self.last_loaded.lock().await = Some(doc.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn update_with_skips_write_when_nothing_changes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{\"model\":\"m\"}").expect("seed");

        let store = SettingsStore::new(&path);
        let (doc, ()) = store.update_with(|doc| (doc, ())).await.expect("update");

        assert_eq!(doc.get("model"), Some(&json!("m")));
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "{\"model\":\"m\"}"
        );
    }

    #[tokio::test]
    async fn snapshot_tracks_last_load() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(temp.path().join("settings.json"));
        assert!(store.snapshot().await.is_none());

        let loaded = store.load().await.expect("load");
        assert_eq!(store.snapshot().await, Some(loaded));
    }
}
