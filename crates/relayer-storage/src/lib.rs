//! Off-chain storage for the relayer.
//!
//! The relayer persists a single string-to-string map (per-sender batch
//! nonces). [`OffchainStore`] keeps that map in memory and writes every update
//! through to a [`StorageInterface`] backend before returning.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// The persisted key-value map.
pub type Entries = BTreeMap<String, String>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Backends persist the whole map at once. Callers must not invoke `persist`
/// concurrently; [`OffchainStore`] guarantees this by requiring `&mut self`
/// for writes.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Loads the persisted map. Absent storage yields an empty map.
	async fn load(&self) -> Result<Entries, StorageError>;

	/// Durably replaces the persisted map with `entries`.
	async fn persist(&self, entries: &Entries) -> Result<(), StorageError>;
}

/// In-memory view of the persisted map with write-through updates.
pub struct OffchainStore {
	backend: Box<dyn StorageInterface>,
	entries: Entries,
}

impl OffchainStore {
	/// Opens the store, hydrating the in-memory map from the backend.
	pub async fn open(backend: Box<dyn StorageInterface>) -> Result<Self, StorageError> {
		let entries = backend.load().await?;
		debug!(entries = entries.len(), "Loaded off-chain storage");
		Ok(Self { backend, entries })
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.entries.get(key).map(String::as_str)
	}

	/// Sets `key` to `value` and persists the full map before returning.
	///
	/// If persisting fails the in-memory map is restored, so memory never
	/// holds a value that was not written.
	pub async fn set(
		&mut self,
		key: impl Into<String>,
		value: impl Into<String>,
	) -> Result<(), StorageError> {
		let key = key.into();
		let previous = self.entries.insert(key.clone(), value.into());

		if let Err(e) = self.backend.persist(&self.entries).await {
			match previous {
				Some(old) => self.entries.insert(key, old),
				None => self.entries.remove(&key),
			};
			return Err(e);
		}

		Ok(())
	}

	/// Replaces the whole map with `entries`, persisting first.
	///
	/// On failure the in-memory map keeps whatever was last persisted.
	pub async fn restore(&mut self, entries: Entries) -> Result<(), StorageError> {
		self.backend.persist(&entries).await?;
		self.entries = entries;
		Ok(())
	}

	pub fn entries(&self) -> &Entries {
		&self.entries
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
