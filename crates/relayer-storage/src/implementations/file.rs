//! File-based storage backend.
//!
//! The whole map is stored as one JSON object. Each write goes to a sibling
//! temp file that is then renamed over the target, so a crash mid-write
//! leaves either the old or the new map on disk, never a torn one.

use crate::{Entries, StorageError, StorageInterface};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// JSON file storage implementation.
pub struct FileStorage {
	/// Path of the JSON file holding the map.
	path: PathBuf,
}

impl FileStorage {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn temp_path(&self) -> PathBuf {
		let mut name = self
			.path
			.file_name()
			.map(|n| n.to_os_string())
			.unwrap_or_default();
		name.push(".tmp");
		self.path.with_file_name(name)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn load(&self) -> Result<Entries, StorageError> {
		match fs::read(&self.path).await {
			Ok(data) => serde_json::from_slice(&data)
				.map_err(|e| StorageError::Serialization(e.to_string())),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(path = ?self.path, "No storage file, starting empty");
				Ok(Entries::new())
			}
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(entries).map_err(|e| StorageError::Serialization(e.to_string()))?;

		// Create parent directory if it doesn't exist
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let temp_path = self.temp_path();
		fs::write(&temp_path, bytes)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &self.path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}
}
