//! Local persistence of per-run JSON snapshots.
//!
//! Artifacts are named `<prefix>_<MMDDYYYY>.json` inside the data directory,
//! one file per prefix and business date. Saving the same prefix and date
//! again replaces the earlier file.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;

use crate::error::CollectorError;
use crate::utils::date::artifact_date;

pub const RAW_ARTIFACT: &str = "raw";
pub const PROCESSED_ARTIFACT: &str = "processed";

#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(
        &self,
        prefix: &str,
        date: time::Date,
        content: &str,
    ) -> Result<PathBuf, CollectorError>;

    async fn load(&self, prefix: &str, date: time::Date) -> Result<String, CollectorError>;
}

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, prefix: &str, date: time::Date) -> Result<PathBuf, CollectorError> {
        let prefix = prefix.trim();
        if prefix.is_empty() || prefix.contains(['/', '\\']) || prefix.contains("..") {
            return Err(CollectorError::InvalidArgument(format!(
                "Invalid artifact prefix: {prefix:?}"
            )));
        }
        Ok(self
            .root
            .join(format!("{prefix}_{}.json", artifact_date(date)?)))
    }
}

fn storage_err(path: &Path) -> impl FnOnce(std::io::Error) -> CollectorError + '_ {
    move |source| CollectorError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

async fn write_file(path: &Path, content: &str) -> Result<(), CollectorError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(storage_err(path))?;
    file.write_all(content.as_bytes())
        .await
        .map_err(storage_err(path))?;
    file.flush().await.map_err(storage_err(path))
}

#[async_trait::async_trait]
impl ArtifactStore for LocalFileStore {
    async fn save(
        &self,
        prefix: &str,
        date: time::Date,
        content: &str,
    ) -> Result<PathBuf, CollectorError> {
        let path = self.artifact_path(prefix, date)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(storage_err(&self.root))?;

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = self
            .root
            .join(format!(".{file_name}.{}.{seed}.tmp", std::process::id()));

        if let Err(err) = write_file(&tmp_path, content).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(source) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(CollectorError::Storage { path, source });
        }
        Ok(path)
    }

    async fn load(&self, prefix: &str, date: time::Date) -> Result<String, CollectorError> {
        let path = self.artifact_path(prefix, date)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(storage_err(&path))
    }
}
