//! The cloud storage backup of the cache, via `gsutil cp`.

use crate::Result;
use async_trait::async_trait;
use crtools_core::{ToolCommand, ToolRunner};
use std::path::Path;
use tracing::info;

/// Bucket directory holding the state, cache and dataset.
pub const CLOUD_STORAGE_DIR: &str = "gs://showy-dashboard-data/pinboard";

/// Copies of cached files kept in cloud storage, by file name.
#[async_trait]
pub trait CloudStorage: Send + Sync {
    /// Copy `local` to the bucket under its file name.
    async fn upload(&self, local: &Path) -> Result<()>;

    /// Fetch the bucket copy of `local`. Returns false when there is none.
    async fn download(&self, local: &Path) -> Result<bool>;
}

/// [`CloudStorage`] backed by `gsutil`.
pub struct Gsutil {
    pub gsutil: String,
    pub bucket_dir: String,
}

impl Default for Gsutil {
    fn default() -> Self {
        Gsutil {
            gsutil: "gsutil".to_string(),
            bucket_dir: CLOUD_STORAGE_DIR.to_string(),
        }
    }
}

impl Gsutil {
    /// Remote path for a local file.
    pub fn remote_path(&self, local: &Path) -> String {
        let name = local
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", self.bucket_dir.trim_end_matches('/'), name)
    }

    fn copy(&self, from: String, to: String) -> ToolCommand {
        ToolCommand::new("gsutil cp", vec![self.gsutil.clone(), "cp".to_string(), from, to])
    }
}

#[async_trait]
impl CloudStorage for Gsutil {
    async fn upload(&self, local: &Path) -> Result<()> {
        let command = self.copy(local.display().to_string(), self.remote_path(local));
        ToolRunner::check_output(&command).await?;
        Ok(())
    }

    async fn download(&self, local: &Path) -> Result<bool> {
        let command = self.copy(self.remote_path(local), local.display().to_string());
        let output = ToolRunner::run(&command).await?;
        if output.passed() {
            info!("Downloaded copy of {} from cloud storage.", local.display());
            Ok(true)
        } else {
            info!("Failed to download copy of {} from cloud storage.", local.display());
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_path() {
        let gsutil = Gsutil::default();
        assert_eq!(
            gsutil.remote_path(Path::new("/src/tools/perf/_cached_data/pinboard/dataset.csv")),
            "gs://showy-dashboard-data/pinboard/dataset.csv"
        );
    }

    #[tokio::test]
    async fn test_failed_download_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let gsutil = Gsutil {
            gsutil: "false".to_string(),
            ..Default::default()
        };
        assert!(!gsutil.download(&dir.path().join("jobs_state.json")).await.unwrap());
    }
}
