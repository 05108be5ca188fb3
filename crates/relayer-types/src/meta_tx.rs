//! Meta-transaction types.
//!
//! A meta-transaction arrives as a [`MetaTxRequest`] whose fields are all
//! optional, so that a missing field is reported by validation with its name
//! rather than as an opaque deserialization failure. Once every field is
//! present it becomes a [`MetaTx`], which is what the queue and batches hold.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::Eip712Domain;
use serde::{Deserialize, Serialize};

use crate::batch::BatchId;

sol! {
	/// Typed-data struct signed by the sender. Field order and types must
	/// match the settlement contract's `ERC20MetaTransaction` type hash.
	#[derive(Debug, PartialEq, Eq)]
	struct ERC20MetaTransaction {
		address from;
		address to;
		address tokenContract;
		uint256 amount;
		uint256 batchId;
		uint256 batchNonce;
		uint256 expiry;
		uint256 txGas;
	}
}

/// EIP-712 domain values supplied alongside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainFields {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

impl DomainFields {
	/// Builds the `{name, version, chainId, verifyingContract}` domain.
	pub fn eip712_domain(&self) -> Eip712Domain {
		Eip712Domain::new(
			Some(self.name.clone().into()),
			Some(self.version.clone().into()),
			Some(U256::from(self.chain_id)),
			Some(self.verifying_contract),
			None,
		)
	}
}

/// Inbound message exactly as the transport decoded it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTxRequest {
	pub from: Option<Address>,
	pub to: Option<Address>,
	pub token_contract: Option<Address>,
	pub amount: Option<U256>,
	pub expiry: Option<u64>,
	pub tx_gas: Option<u64>,
	pub batch_id: Option<BatchId>,
	pub batch_nonce: Option<u64>,
	pub signature: Option<Bytes>,
	pub data: Option<Bytes>,
	pub name: Option<String>,
	pub version: Option<String>,
	pub chain_id: Option<u64>,
	pub verifying_contract: Option<Address>,
}

/// Name of the first required field that was absent from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingField(pub &'static str);

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, MissingField> {
	value.ok_or(MissingField(field))
}

impl MetaTxRequest {
	/// Converts the request into a complete [`MetaTx`], failing on the first
	/// absent field. No semantic checks happen here.
	pub fn into_meta_tx(self) -> Result<MetaTx, MissingField> {
		Ok(MetaTx {
			from: required(self.from, "from")?,
			to: required(self.to, "to")?,
			token_contract: required(self.token_contract, "tokenContract")?,
			amount: required(self.amount, "amount")?,
			expiry: required(self.expiry, "expiry")?,
			tx_gas: required(self.tx_gas, "txGas")?,
			batch_id: required(self.batch_id, "batchId")?,
			batch_nonce: required(self.batch_nonce, "batchNonce")?,
			signature: required(self.signature, "signature")?,
			data: required(self.data, "data")?,
			domain: DomainFields {
				name: required(self.name, "name")?,
				version: required(self.version, "version")?,
				chain_id: required(self.chain_id, "chainId")?,
				verifying_contract: required(self.verifying_contract, "verifyingContract")?,
			},
		})
	}
}

impl From<MetaTx> for MetaTxRequest {
	fn from(tx: MetaTx) -> Self {
		Self {
			from: Some(tx.from),
			to: Some(tx.to),
			token_contract: Some(tx.token_contract),
			amount: Some(tx.amount),
			expiry: Some(tx.expiry),
			tx_gas: Some(tx.tx_gas),
			batch_id: Some(tx.batch_id),
			batch_nonce: Some(tx.batch_nonce),
			signature: Some(tx.signature),
			data: Some(tx.data),
			name: Some(tx.domain.name),
			version: Some(tx.domain.version),
			chain_id: Some(tx.domain.chain_id),
			verifying_contract: Some(tx.domain.verifying_contract),
		}
	}
}

/// A structurally complete meta-transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTx {
	pub from: Address,
	pub to: Address,
	pub token_contract: Address,
	pub amount: U256,
	pub expiry: u64,
	pub tx_gas: u64,
	pub batch_id: BatchId,
	pub batch_nonce: u64,
	pub signature: Bytes,
	/// Opaque call data forwarded to the settlement contract.
	pub data: Bytes,
	#[serde(flatten)]
	pub domain: DomainFields,
}

impl MetaTx {
	/// The typed-data struct the sender signed.
	pub fn typed_message(&self) -> ERC20MetaTransaction {
		ERC20MetaTransaction {
			from: self.from,
			to: self.to,
			tokenContract: self.token_contract,
			amount: self.amount,
			batchId: U256::from(self.batch_id),
			batchNonce: U256::from(self.batch_nonce),
			expiry: U256::from(self.expiry),
			txGas: U256::from(self.tx_gas),
		}
	}

	pub fn call_data(&self) -> CallData {
		CallData {
			from: self.from,
			to: self.to,
			data: self.data.clone(),
			signature: self.signature.clone(),
		}
	}

	pub fn call_params(&self) -> CallParams {
		CallParams {
			token_contract: self.token_contract,
			amount: self.amount,
			batch_id: self.batch_id,
			batch_nonce: self.batch_nonce,
			expiry: self.expiry,
			tx_gas: self.tx_gas,
		}
	}
}

/// First half of a settlement call entry: who, to whom, and the proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallData {
	pub from: Address,
	pub to: Address,
	pub data: Bytes,
	pub signature: Bytes,
}

/// Second half of a settlement call entry, index-aligned with [`CallData`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParams {
	pub token_contract: Address,
	pub amount: U256,
	pub batch_id: BatchId,
	pub batch_nonce: u64,
	pub expiry: u64,
	pub tx_gas: u64,
}
