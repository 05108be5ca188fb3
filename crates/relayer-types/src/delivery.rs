//! Chain submission result types.
//!
//! These describe what the settlement contract reported after a batch
//! transaction was mined, both for the transaction as a whole and for each
//! message inside it.

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::batch::{BatchId, MessageKey};

/// Execution result of one message inside a mined batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOutcome {
	pub sender: Address,
	pub batch_id: BatchId,
	pub batch_nonce: u64,
	/// Whether the inner transfer succeeded.
	pub success: bool,
	/// Raw return data, or the revert payload when `success` is false.
	pub return_data: Bytes,
}

impl MessageOutcome {
	pub fn key(&self) -> MessageKey {
		MessageKey {
			sender: self.sender,
			batch_id: self.batch_id,
			batch_nonce: self.batch_nonce,
		}
	}
}

/// Receipt of a submitted batch transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
	/// The hash of the transaction.
	pub tx_hash: B256,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the batch transaction itself executed successfully.
	pub success: bool,
	/// Per-message results decoded from the settlement contract's events.
	pub outcomes: Vec<MessageOutcome>,
}

impl BatchReceipt {
	/// Looks up the reported outcome for one message.
	pub fn outcome_for(&self, key: &MessageKey) -> Option<&MessageOutcome> {
		self.outcomes.iter().find(|o| o.key() == *key)
	}
}
