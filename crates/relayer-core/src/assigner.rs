//! Gas-bounded FIFO batch packing.
//!
//! Preview and commit run the same walk over the queue. A preview places one
//! extra candidate after the queued messages and discards the result; a
//! commit writes each assignment to the store and cuts the queue into
//! [`Batch`] records at the boundaries the walk produced.

use crate::error::CoreError;
use relayer_storage::{OffchainStore, StorageError};
use relayer_types::{batch_nonce_key, Address, Batch, BatchId, MetaTx};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, error, warn};

/// Batch position handed to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
	pub batch_id: BatchId,
	pub batch_nonce: u64,
}

/// Reads the next expected nonce for `key`, defaulting to 1.
fn stored_nonce(store: &OffchainStore, key: &str) -> Result<u64, StorageError> {
	match store.get(key) {
		Some(value) => value.parse::<u64>().map_err(|e| {
			StorageError::Serialization(format!("Invalid nonce '{}' for {}: {}", value, key, e))
		}),
		None => Ok(1),
	}
}

/// Value stored for `key` once `nonce` has been handed out.
fn following_nonce(key: &str, nonce: u64) -> Result<u64, StorageError> {
	nonce.checked_add(1).ok_or_else(|| {
		StorageError::Serialization(format!("Nonce for {} is exhausted at {}", key, nonce))
	})
}

/// Walk state: the open batch and the nonces handed out so far.
///
/// Nonces assigned during the walk shadow the store, so two messages from
/// the same sender in one batch get consecutive values without touching
/// storage.
struct Packer<'a> {
	store: &'a OffchainStore,
	max_gas_limit: u64,
	batch_id: BatchId,
	gas: u64,
	members: usize,
	nonces: HashMap<String, u64>,
	assignments: Vec<Assignment>,
}

impl<'a> Packer<'a> {
	fn new(store: &'a OffchainStore, max_gas_limit: u64, base: BatchId) -> Self {
		Self {
			store,
			max_gas_limit,
			batch_id: base,
			gas: 0,
			members: 0,
			nonces: HashMap::new(),
			assignments: Vec::new(),
		}
	}

	fn place(&mut self, tx_gas: u64, sender: &Address) -> Result<Assignment, StorageError> {
		if self.members > 0 && self.gas.saturating_add(tx_gas) > self.max_gas_limit {
			self.batch_id += 1;
			self.gas = 0;
			self.members = 0;
		}
		self.gas = self.gas.saturating_add(tx_gas);
		self.members += 1;

		let key = batch_nonce_key(self.batch_id, sender);
		let batch_nonce = match self.nonces.get(&key) {
			Some(nonce) => *nonce,
			None => stored_nonce(self.store, &key)?,
		};
		let following = following_nonce(&key, batch_nonce)?;
		self.nonces.insert(key, following);

		let assignment = Assignment {
			batch_id: self.batch_id,
			batch_nonce,
		};
		self.assignments.push(assignment);
		Ok(assignment)
	}

	/// Id the next unopened batch would take.
	fn next_batch_id(&self) -> BatchId {
		if self.members > 0 {
			self.batch_id + 1
		} else {
			self.batch_id
		}
	}
}

/// Packs queued messages into batches whose summed `txGas` stays within
/// `max_gas_limit`, never reordering them.
#[derive(Debug, Clone)]
pub struct BatchAssigner {
	max_gas_limit: u64,
}

impl BatchAssigner {
	pub fn new(max_gas_limit: u64) -> Self {
		Self { max_gas_limit }
	}

	pub fn max_gas_limit(&self) -> u64 {
		self.max_gas_limit
	}

	fn walk<'a>(
		&self,
		queue: &VecDeque<MetaTx>,
		base: BatchId,
		store: &'a OffchainStore,
	) -> Result<Packer<'a>, StorageError> {
		let mut packer = Packer::new(store, self.max_gas_limit, base);
		for tx in queue {
			packer.place(tx.tx_gas, &tx.from)?;
		}
		Ok(packer)
	}

	/// Ids a message of `tx_gas` from `sender` would get if it were appended
	/// to `queue` now. Nothing is mutated.
	pub fn preview_next(
		&self,
		queue: &VecDeque<MetaTx>,
		base: BatchId,
		store: &OffchainStore,
		tx_gas: u64,
		sender: &Address,
	) -> Result<Assignment, CoreError> {
		let mut packer = self.walk(queue, base, store)?;
		Ok(packer.place(tx_gas, sender)?)
	}

	/// Drains `queue` into batches starting at `next_batch_id`.
	///
	/// Every assignment is persisted as it is made. The queue and
	/// `next_batch_id` change only once the whole pass has succeeded; on a
	/// storage error the store is restored to its state before the pass.
	pub async fn commit_all(
		&self,
		queue: &mut VecDeque<MetaTx>,
		next_batch_id: &mut BatchId,
		store: &mut OffchainStore,
	) -> Result<Vec<Batch>, CoreError> {
		if queue.is_empty() {
			return Ok(Vec::new());
		}

		let (assignments, following_id) = {
			let packer = self.walk(queue, *next_batch_id, store)?;
			let following_id = packer.next_batch_id();
			(packer.assignments, following_id)
		};

		let snapshot = store.entries().clone();
		let batches = match Self::apply(queue, &assignments, store).await {
			Ok(batches) => batches,
			Err(e) => {
				if let Err(restore_err) = store.restore(snapshot).await {
					error!(error = %restore_err, "Failed to restore nonce state after aborted commit");
				}
				return Err(e.into());
			}
		};

		queue.clear();
		*next_batch_id = following_id;

		debug!(
			batches = batches.len(),
			next_batch_id = *next_batch_id,
			"Committed queue"
		);
		Ok(batches)
	}

	async fn apply(
		queue: &VecDeque<MetaTx>,
		assignments: &[Assignment],
		store: &mut OffchainStore,
	) -> Result<Vec<Batch>, StorageError> {
		let mut batches = Vec::new();
		let mut members: Vec<MetaTx> = Vec::new();
		let mut open_id = None;

		for (queued, assignment) in queue.iter().zip(assignments) {
			if queued.batch_id != assignment.batch_id || queued.batch_nonce != assignment.batch_nonce {
				warn!(
					sender = %queued.from,
					signed_batch_id = queued.batch_id,
					signed_nonce = queued.batch_nonce,
					batch_id = assignment.batch_id,
					batch_nonce = assignment.batch_nonce,
					"Assigned ids differ from the signed ids"
				);
			}

			let mut tx = queued.clone();
			tx.batch_id = assignment.batch_id;
			tx.batch_nonce = assignment.batch_nonce;

			let key = batch_nonce_key(tx.batch_id, &tx.from);
			let following = following_nonce(&key, tx.batch_nonce)?;
			store.set(key, following.to_string()).await?;

			if let Some(id) = open_id {
				if id != tx.batch_id {
					batches.push(Batch::new(id, std::mem::take(&mut members)));
				}
			}
			open_id = Some(tx.batch_id);
			members.push(tx);
		}

		if let Some(id) = open_id {
			batches.push(Batch::new(id, members));
		}

		Ok(batches)
	}
}
