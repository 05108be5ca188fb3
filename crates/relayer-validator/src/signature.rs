//! EIP-712 signature recovery.

use alloy::primitives::{Address, Signature, B256};
use alloy::sol_types::{Eip712Domain, SolStruct};
use relayer_types::ERC20MetaTransaction;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
	/// The signature bytes could not be decoded or did not yield a key.
	#[error("Invalid signature: {0}")]
	InvalidSignature(String),
}

/// Stateless EIP-712 v4 hash-and-recover.
///
/// Recovery only answers "who signed this"; whether that address is the
/// expected one is decided by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
	/// Digest the sender signs: `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`.
	pub fn signing_hash(domain: &Eip712Domain, message: &ERC20MetaTransaction) -> B256 {
		message.eip712_signing_hash(domain)
	}

	/// Recovers the signer of `message` under `domain` from a 65-byte
	/// `r ‖ s ‖ v` signature.
	pub fn recover(
		domain: &Eip712Domain,
		message: &ERC20MetaTransaction,
		signature: &[u8],
	) -> Result<Address, SignatureError> {
		let signature = Signature::from_raw(signature)
			.map_err(|e| SignatureError::InvalidSignature(e.to_string()))?;
		let digest = Self::signing_hash(domain, message);

		signature
			.recover_address_from_prehash(&digest)
			.map_err(|e| SignatureError::InvalidSignature(e.to_string()))
	}
}
