//! Filesystem asset storage.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use vaud_models::{AudioCodec, JobId};

use crate::error::{StorageError, StorageResult};

/// Longest file extension carried over from an uploaded file name.
const MAX_EXTENSION_LEN: usize = 10;

/// Storage roots.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Where submitted assets are written
    pub upload_dir: PathBuf,
    /// Where the engine writes artifacts
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("/tmp/uploads"),
            output_dir: PathBuf::from("/tmp/outputs"),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        }
    }
}

/// A file written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub path: PathBuf,
    pub size: u64,
}

/// Local asset storage.
#[derive(Debug, Clone)]
pub struct AssetStorage {
    config: StorageConfig,
}

impl AssetStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::new(StorageConfig::from_env())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Create the upload and output roots if missing.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.config.upload_dir).await?;
        fs::create_dir_all(&self.config.output_dir).await?;
        Ok(())
    }

    /// Id-addressed location for an upload.
    ///
    /// Only a short alphanumeric extension from `original_name` is kept, so
    /// client-supplied names never influence the directory.
    pub fn upload_path(&self, job_id: &JobId, original_name: &str) -> PathBuf {
        let file_name = match sanitized_extension(original_name) {
            Some(ext) => format!("{}.{}", job_id, ext),
            None => job_id.to_string(),
        };
        self.config.upload_dir.join(file_name)
    }

    /// Deterministic artifact location for a job.
    pub fn output_path(&self, job_id: &JobId, codec: AudioCodec) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}.{}", job_id, codec.extension()))
    }

    /// Write a submitted asset.
    ///
    /// A partially written file is removed before the error is returned.
    pub async fn save_upload(
        &self,
        job_id: &JobId,
        original_name: &str,
        data: &[u8],
    ) -> StorageResult<StoredAsset> {
        fs::create_dir_all(&self.config.upload_dir).await?;
        let path = self.upload_path(job_id, original_name);

        if let Err(e) = write_file(&path, data).await {
            warn!("Failed to write upload {}: {}", path.display(), e);
            if let Err(cleanup) = self.remove(&path).await {
                warn!("Failed to remove partial upload {}: {}", path.display(), cleanup);
            }
            return Err(StorageError::upload_failed(e.to_string()));
        }

        info!("Saved upload for job {} to {}", job_id, path.display());
        Ok(StoredAsset {
            path,
            size: data.len() as u64,
        })
    }

    /// Delete a file. Missing files are not an error.
    pub async fn remove(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Size of a regular file, or `None` if it does not exist.
    pub async fn file_len(&self, path: &Path) -> Option<u64> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => None,
        }
    }

    /// Find a job's artifact.
    ///
    /// Tries the stored reference first, then the default output location.
    pub async fn resolve_artifact(
        &self,
        job_id: &JobId,
        stored: Option<&str>,
        codec: AudioCodec,
    ) -> Option<StoredAsset> {
        if let Some(stored) = stored.filter(|s| !s.is_empty()) {
            let path = PathBuf::from(stored);
            if let Some(size) = self.file_len(&path).await {
                return Some(StoredAsset { path, size });
            }
            debug!("Stored artifact {} missing for job {}", stored, job_id);
        }

        let fallback = self.output_path(job_id, codec);
        let size = self.file_len(&fallback).await?;
        Some(StoredAsset {
            path: fallback,
            size,
        })
    }

    /// Open a file for streaming.
    pub async fn open(&self, path: &Path) -> StorageResult<fs::File> {
        fs::File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::not_found(path.display().to_string()),
            _ => StorageError::Io(e),
        })
    }
}

async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

fn sanitized_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn storage(root: &Path) -> AssetStorage {
        AssetStorage::new(StorageConfig {
            upload_dir: root.join("uploads"),
            output_dir: root.join("outputs"),
        })
    }

    #[test]
    fn test_upload_path_is_id_addressed() {
        let s = storage(Path::new("/data"));
        let id = JobId::from_string("abc");

        assert_eq!(s.upload_path(&id, "Movie.MP4"), PathBuf::from("/data/uploads/abc.mp4"));
        assert_eq!(s.upload_path(&id, "noext"), PathBuf::from("/data/uploads/abc"));
        assert_eq!(
            s.upload_path(&id, "../../etc/passwd"),
            PathBuf::from("/data/uploads/abc")
        );
        assert_eq!(
            s.upload_path(&id, "evil.m p4"),
            PathBuf::from("/data/uploads/abc")
        );
    }

    #[test]
    fn test_output_path_follows_codec() {
        let s = storage(Path::new("/data"));
        let id = JobId::from_string("abc");

        assert_eq!(s.output_path(&id, AudioCodec::Mp3), PathBuf::from("/data/outputs/abc.mp3"));
        assert_eq!(s.output_path(&id, AudioCodec::Aac), PathBuf::from("/data/outputs/abc.m4a"));
    }

    #[tokio::test]
    async fn test_save_and_remove_upload() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(dir.path());
        let id = JobId::new();

        let asset = s.save_upload(&id, "clip.mp4", b"video-bytes").await.unwrap();
        assert_eq!(asset.size, 11);
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"video-bytes");

        s.remove(&asset.path).await.unwrap();
        assert!(!asset.path.exists());
        // Removing again is fine.
        s.remove(&asset.path).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(dir.path());
        let id = JobId::new();
        // A directory where the file should go makes the create fail.
        std::fs::create_dir_all(s.upload_path(&id, "clip.mp4").join("blocker")).unwrap();

        let err = s.save_upload(&id, "clip.mp4", b"data").await.unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
    }

    #[tokio::test]
    async fn test_resolve_prefers_stored_then_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(dir.path());
        s.ensure_dirs().await.unwrap();
        let id = JobId::new();

        let stored = dir.path().join("elsewhere.mp3");
        std::fs::write(&stored, b"stored").unwrap();
        let fallback = s.output_path(&id, AudioCodec::Mp3);
        std::fs::write(&fallback, b"fallback!").unwrap();

        let found = s
            .resolve_artifact(&id, stored.to_str(), AudioCodec::Mp3)
            .await
            .unwrap();
        assert_eq!(found.path, stored);
        assert_eq!(found.size, 6);

        std::fs::remove_file(&stored).unwrap();
        let found = s
            .resolve_artifact(&id, stored.to_str(), AudioCodec::Mp3)
            .await
            .unwrap();
        assert_eq!(found.path, fallback);
        assert_eq!(found.size, 9);

        std::fs::remove_file(&fallback).unwrap();
        assert!(s.resolve_artifact(&id, None, AudioCodec::Mp3).await.is_none());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("UPLOAD_DIR", "/srv/in");
        std::env::remove_var("OUTPUT_DIR");

        let config = StorageConfig::from_env();
        assert_eq!(config.upload_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/outputs"));

        std::env::remove_var("UPLOAD_DIR");
    }
}
