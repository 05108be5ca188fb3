//! Request and response bodies for the relayer's HTTP adapter.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::batch::BatchId;

/// Query for `getBatchPreview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPreviewQuery {
	/// Address that will sign the message.
	pub sender: Address,
	/// Gas the candidate message is expected to consume.
	pub tx_gas: u64,
}

/// Ids a new message from `sender` would be assigned right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPreview {
	pub batch_id: BatchId,
	pub batch_nonce: u64,
	/// Settlement contract address, used by wallets as `verifyingContract`.
	pub relayer_address: Address,
}

/// Response for an accepted `submitMetaTx`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
	pub accepted: bool,
	pub message: String,
}

/// Error body returned by the HTTP adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Machine-readable error kind.
	pub error: String,
	/// Human-readable description.
	pub message: String,
}
