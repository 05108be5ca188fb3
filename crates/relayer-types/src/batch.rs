//! Batch and message lifecycle types.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::meta_tx::{CallData, CallParams, MetaTx};

/// Settlement-contract batch identifier.
pub type BatchId = u64;

/// Storage key holding the next expected nonce for `sender` within `batch_id`.
///
/// The sender is rendered as lowercase hex so checksummed and plain inputs
/// share one record.
pub fn batch_nonce_key(batch_id: BatchId, sender: &Address) -> String {
	format!("{}-{:#x}-batchNonce", batch_id, sender)
}

/// An immutable, gas-bounded group of meta-transactions sharing one id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
	id: BatchId,
	messages: Vec<MetaTx>,
}

impl Batch {
	pub fn new(id: BatchId, messages: Vec<MetaTx>) -> Self {
		Self { id, messages }
	}

	pub fn id(&self) -> BatchId {
		self.id
	}

	pub fn messages(&self) -> &[MetaTx] {
		&self.messages
	}

	pub fn len(&self) -> usize {
		self.messages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}

	/// Sum of member `txGas`.
	pub fn total_gas(&self) -> u64 {
		self.messages.iter().map(|m| m.tx_gas).sum()
	}

	/// Index-aligned settlement arguments, one entry per message.
	pub fn call_arrays(&self) -> (Vec<CallData>, Vec<CallParams>) {
		self.messages
			.iter()
			.map(|m| (m.call_data(), m.call_params()))
			.unzip()
	}
}

/// Identifies a message once it has been assigned a batch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
	pub sender: Address,
	pub batch_id: BatchId,
	pub batch_nonce: u64,
}

impl MessageKey {
	pub fn of(tx: &MetaTx) -> Self {
		Self {
			sender: tx.from,
			batch_id: tx.batch_id,
			batch_nonce: tx.batch_nonce,
		}
	}
}

/// Per-message lifecycle.
///
/// `Received`, `Validated` and `Queued` exist only in memory; `Confirmed` and
/// `Reverted` are terminal and come solely from the chain's execution result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageState {
	Received,
	Validated,
	Queued,
	Batched,
	Submitted,
	Confirmed,
	Reverted,
}

impl MessageState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Confirmed | Self::Reverted)
	}

	/// Whether a message may move from `self` to `next`.
	pub fn can_transition_to(self, next: MessageState) -> bool {
		use MessageState::*;

		matches!(
			(self, next),
			(Received, Validated)
				| (Validated, Queued)
				| (Queued, Batched)
				| (Batched, Submitted)
				| (Submitted, Confirmed)
				| (Submitted, Reverted)
		)
	}
}

impl std::fmt::Display for MessageState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Received => write!(f, "Received"),
			Self::Validated => write!(f, "Validated"),
			Self::Queued => write!(f, "Queued"),
			Self::Batched => write!(f, "Batched"),
			Self::Submitted => write!(f, "Submitted"),
			Self::Confirmed => write!(f, "Confirmed"),
			Self::Reverted => write!(f, "Reverted"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;

	#[test]
	fn test_nonce_key_lowercases_sender() {
		let sender = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
		assert_eq!(
			batch_nonce_key(7, &sender),
			"7-0x70997970c51812dc3a010c7d01b50e0d17dc79c8-batchNonce"
		);
	}

	#[test]
	fn test_terminal_states() {
		assert!(MessageState::Confirmed.is_terminal());
		assert!(MessageState::Reverted.is_terminal());
		assert!(!MessageState::Submitted.is_terminal());
	}

	#[test]
	fn test_state_transitions_follow_lifecycle() {
		use MessageState::*;

		let path = [Received, Validated, Queued, Batched, Submitted, Confirmed];
		for pair in path.windows(2) {
			assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
		}
		assert!(Submitted.can_transition_to(Reverted));

		assert!(!Received.can_transition_to(Queued));
		assert!(!Queued.can_transition_to(Queued));
		assert!(!Confirmed.can_transition_to(Reverted));
		assert!(!Reverted.can_transition_to(Submitted));
	}
}
