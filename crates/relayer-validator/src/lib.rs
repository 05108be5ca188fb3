//! Message validation for the relayer.
//!
//! [`MessageValidator`] turns an inbound [`MetaTxRequest`] into a [`MetaTx`]
//! that is safe to queue. The checks run in a fixed order and stop at the
//! first failure:
//!
//! 1. every required field is present
//! 2. `from`, `to` and `tokenContract` are non-zero
//! 3. `amount` is positive
//! 4. `expiry` has not passed at the current chain time
//! 5. `0 < txGas < max_gas_limit`
//! 6. the EIP-712 signature recovers to `from`

use alloy::primitives::Address;
use relayer_types::{MetaTx, MetaTxRequest};
use thiserror::Error;
use tracing::debug;

pub mod signature;

pub use signature::{SignatureError, SignatureVerifier};

/// Reason a message was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(&'static str),

	#[error("Field '{0}' must be a non-zero address")]
	ZeroAddress(&'static str),

	#[error("Amount must be greater than zero")]
	ZeroAmount,

	#[error("Message expired at {expiry}, chain time is {now}")]
	Expired { expiry: u64, now: u64 },

	#[error("txGas {tx_gas} must be greater than 0 and below {max}")]
	GasOutOfRange { tx_gas: u64, max: u64 },

	#[error("Invalid signature: {0}")]
	InvalidSignature(String),

	#[error("Signature recovers to {recovered}, expected {claimed}")]
	SignerMismatch { claimed: Address, recovered: Address },
}

impl From<SignatureError> for ValidationError {
	fn from(err: SignatureError) -> Self {
		match err {
			SignatureError::InvalidSignature(msg) => Self::InvalidSignature(msg),
		}
	}
}

/// Applies the structural, semantic and cryptographic checks to one message.
#[derive(Debug, Clone)]
pub struct MessageValidator {
	max_gas_limit: u64,
}

impl MessageValidator {
	pub fn new(max_gas_limit: u64) -> Self {
		Self { max_gas_limit }
	}

	pub fn max_gas_limit(&self) -> u64 {
		self.max_gas_limit
	}

	/// Validates a raw request against `now`, the latest chain timestamp.
	pub fn validate(&self, request: MetaTxRequest, now: u64) -> Result<MetaTx, ValidationError> {
		let tx = request
			.into_meta_tx()
			.map_err(|missing| ValidationError::MissingField(missing.0))?;

		self.check(&tx, now)?;
		Ok(tx)
	}

	/// Runs every check after the presence check on a complete message.
	pub fn check(&self, tx: &MetaTx, now: u64) -> Result<(), ValidationError> {
		for (field, address) in [
			("from", tx.from),
			("to", tx.to),
			("tokenContract", tx.token_contract),
		] {
			if address.is_zero() {
				return Err(ValidationError::ZeroAddress(field));
			}
		}

		if tx.amount.is_zero() {
			return Err(ValidationError::ZeroAmount);
		}

		if tx.expiry < now {
			return Err(ValidationError::Expired {
				expiry: tx.expiry,
				now,
			});
		}

		// A message at or above the limit could never fit in any batch
		if tx.tx_gas == 0 || tx.tx_gas >= self.max_gas_limit {
			return Err(ValidationError::GasOutOfRange {
				tx_gas: tx.tx_gas,
				max: self.max_gas_limit,
			});
		}

		let recovered = SignatureVerifier::recover(
			&tx.domain.eip712_domain(),
			&tx.typed_message(),
			&tx.signature,
		)?;

		if recovered != tx.from {
			debug!(claimed = %tx.from, %recovered, "Signature does not match sender");
			return Err(ValidationError::SignerMismatch {
				claimed: tx.from,
				recovered,
			});
		}

		Ok(())
	}
}
