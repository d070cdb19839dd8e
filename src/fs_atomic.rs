use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

fn temp_path_for(path: &Path, parent: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("settings.json");
    parent.join(format!(".{file_name}.tmp-{}", Uuid::new_v4().simple()))
}

/// Writes `content` next to `path` and renames it into place, so readers see
/// either the old file or the new one.
pub async fn atomic_write_file(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => return Err(io::Error::other("path has no parent")),
    };
    let tmp_path = temp_path_for(path, parent);

    let written = async {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)
            .await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }

    sync_parent_dir(parent).await
}

#[cfg(unix)]
async fn sync_parent_dir(parent: &Path) -> io::Result<()> {
    fs::File::open(parent).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_parent_dir(_parent: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replaces_content_without_leaving_temp_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("settings.json");

        atomic_write_file(&target, b"first").await.expect("write first");
        atomic_write_file(&target, b"second").await.expect("write second");

        assert_eq!(
            std::fs::read_to_string(&target).expect("read"),
            "second"
        );
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn fails_when_parent_is_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("missing").join("settings.json");
        assert!(atomic_write_file(&target, b"{}").await.is_err());
    }
}
