// relayer-core/src/error.rs

use relayer_delivery::DeliveryError;
use relayer_storage::StorageError;
use relayer_types::BatchId;
use relayer_validator::ValidationError;
use thiserror::Error;

/// Why an inbound message was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error(
		"Stale preview: signed batch {signed_batch_id} nonce {signed_nonce}, \
		 next assignment is batch {expected_batch_id} nonce {expected_nonce}"
	)]
	StalePreview {
		signed_batch_id: BatchId,
		signed_nonce: u64,
		expected_batch_id: BatchId,
		expected_nonce: u64,
	},
}

#[derive(Error, Debug)]
pub enum CoreError {
	#[error("Invalid message: {0}")]
	InvalidMessage(Rejection),

	#[error("Storage failure: {0}")]
	StorageFailure(#[from] StorageError),

	#[error("Chain submission failure: {0}")]
	ChainSubmissionFailure(#[from] DeliveryError),

	#[error("Service initialization error: {0}")]
	ServiceInit(String),

	#[error("Lifecycle error: {0}")]
	Lifecycle(String),
}

impl From<ValidationError> for CoreError {
	fn from(err: ValidationError) -> Self {
		Self::InvalidMessage(Rejection::Validation(err))
	}
}

impl From<Rejection> for CoreError {
	fn from(rejection: Rejection) -> Self {
		Self::InvalidMessage(rejection)
	}
}
