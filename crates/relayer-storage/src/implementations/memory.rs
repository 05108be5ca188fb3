//! In-memory storage backend.
//!
//! Used by tests and by deployments that accept losing nonce state on
//! restart. Clones share the same underlying map.

use crate::{Entries, StorageError, StorageInterface};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MemoryStorage {
	entries: Arc<Mutex<Entries>>,
	fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes every subsequent `persist` fail with a backend error.
	pub fn fail_writes(&self, fail: bool) {
		self.fail_writes.store(fail, Ordering::SeqCst);
	}

	/// Copy of the last persisted map.
	pub fn snapshot(&self) -> Entries {
		self.entries
			.lock()
			.map(|entries| entries.clone())
			.unwrap_or_default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn load(&self) -> Result<Entries, StorageError> {
		self.entries
			.lock()
			.map(|entries| entries.clone())
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn persist(&self, entries: &Entries) -> Result<(), StorageError> {
		if self.fail_writes.load(Ordering::SeqCst) {
			return Err(StorageError::Backend("writes disabled".to_string()));
		}

		let mut stored = self
			.entries
			.lock()
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		*stored = entries.clone();
		Ok(())
	}
}
