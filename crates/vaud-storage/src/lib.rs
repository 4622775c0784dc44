//! Local filesystem storage for submitted assets and converted artifacts.
//!
//! Uploads are id-addressed (`{upload_dir}/{job_id}{.ext}`) and artifacts
//! live at a deterministic default location (`{output_dir}/{job_id}.{ext}`)
//! so a completed job can always be resolved from its id alone.

pub mod client;
pub mod error;

pub use client::{AssetStorage, StorageConfig, StoredAsset};
pub use error::{StorageError, StorageResult};
