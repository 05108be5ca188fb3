//! Batch delivery to the settlement contract.
//!
//! The relayer core talks to the chain only through [`ChainClient`]. The
//! Alloy-backed implementation lives in [`implementations::evm::alloy`].

use alloy::primitives::Address;
use async_trait::async_trait;
use relayer_types::{Batch, BatchId, BatchReceipt};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur while talking to the chain.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Transport or RPC failure.
	#[error("Network error: {0}")]
	Network(String),
	/// The contract call could not be built or its result decoded.
	#[error("Contract error: {0}")]
	Contract(String),
	/// Invalid client configuration.
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Interface to the settlement contract and the chain it lives on.
///
/// `submit_batch` is the only call that waits on a mined transaction; the
/// other calls are reads.
#[async_trait]
pub trait ChainClient: Send + Sync {
	/// Address of the settlement contract batches are sent to.
	fn settlement_address(&self) -> Address;

	/// The contract's current batch id, used as the base for local ids.
	async fn current_batch_id(&self) -> Result<BatchId, DeliveryError>;

	/// Timestamp of the latest block.
	async fn latest_timestamp(&self) -> Result<u64, DeliveryError>;

	/// Sends `batch(callData[], callParams[])` for one batch and waits for the
	/// receipt.
	async fn submit_batch(
		&self,
		batch: &Batch,
		gas_limit: u64,
	) -> Result<BatchReceipt, DeliveryError>;
}

/// Shortens a hash for log output.
pub fn truncate_hash(hash: &[u8]) -> String {
	let hash_str = hex::encode(hash);
	if hash_str.len() <= 8 {
		hash_str
	} else {
		format!("{}..", &hash_str[..8])
	}
}
