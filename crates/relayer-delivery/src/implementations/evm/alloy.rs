//! Alloy-based settlement client.
//!
//! Submits batches to the Receiver contract over HTTP JSON-RPC, signing with
//! the relayer's local key, and decodes the contract's per-call `MetaTx`
//! events from the receipt.

use crate::{truncate_hash, ChainClient, DeliveryError};
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, TransactionReceipt};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::sol;
use async_trait::async_trait;
use relayer_types::{Batch, BatchId, BatchReceipt, CallData, CallParams, MessageOutcome};
use tracing::{debug, info};

sol! {
	/// Settlement contract interface.
	#[sol(rpc)]
	interface IReceiver {
		struct CallData {
			address from;
			address to;
			bytes data;
			bytes signature;
		}

		struct CallParams {
			address tokenContract;
			uint256 amount;
			uint256 batchId;
			uint256 batchNonce;
			uint256 expiry;
			uint256 txGas;
		}

		/// Emitted once per executed call.
		event MetaTx(address from, uint256 batchId, uint256 batchNonce, bool success, bytes returnData);

		function batch(CallData[] calldata callData, CallParams[] calldata callParams) external;

		function currentBatchId() external view returns (uint256);
	}
}

impl From<CallData> for IReceiver::CallData {
	fn from(call: CallData) -> Self {
		Self {
			from: call.from,
			to: call.to,
			data: call.data,
			signature: call.signature,
		}
	}
}

impl From<CallParams> for IReceiver::CallParams {
	fn from(params: CallParams) -> Self {
		Self {
			tokenContract: params.token_contract,
			amount: params.amount,
			batchId: U256::from(params.batch_id),
			batchNonce: U256::from(params.batch_nonce),
			expiry: U256::from(params.expiry),
			txGas: U256::from(params.tx_gas),
		}
	}
}

/// Alloy-based EVM settlement client.
pub struct AlloyDelivery {
	/// The Alloy provider for blockchain interaction.
	provider: DynProvider,
	/// Receiver contract address.
	receiver: Address,
}

impl AlloyDelivery {
	/// Creates a client that signs with `signer` on `chain_id` and targets
	/// the Receiver contract at `receiver`.
	pub fn new(
		rpc_url: &str,
		chain_id: u64,
		receiver: Address,
		mut signer: PrivateKeySigner,
	) -> Result<Self, DeliveryError> {
		let url = rpc_url
			.parse()
			.map_err(|e| DeliveryError::Config(format!("Invalid RPC URL: {}", e)))?;

		// Set the chain ID on the signer
		signer.set_chain_id(Some(chain_id));
		let wallet = EthereumWallet::from(signer);

		let provider = ProviderBuilder::new()
			.wallet(wallet)
			.connect_http(url)
			.erased();

		Ok(Self { provider, receiver })
	}

	fn contract(&self) -> IReceiver::IReceiverInstance<DynProvider> {
		IReceiver::new(self.receiver, self.provider.clone())
	}

	/// Decodes the contract's `MetaTx` events from a receipt.
	fn outcomes(&self, receipt: &TransactionReceipt) -> Vec<MessageOutcome> {
		receipt
			.inner
			.logs()
			.iter()
			.filter(|log| log.inner.address == self.receiver)
			.filter_map(|log| log.log_decode::<IReceiver::MetaTx>().ok())
			.map(|log| {
				let event = log.inner.data;
				MessageOutcome {
					sender: event.from,
					batch_id: event.batchId.saturating_to(),
					batch_nonce: event.batchNonce.saturating_to(),
					success: event.success,
					return_data: event.returnData,
				}
			})
			.collect()
	}
}

#[async_trait]
impl ChainClient for AlloyDelivery {
	fn settlement_address(&self) -> Address {
		self.receiver
	}

	async fn current_batch_id(&self) -> Result<BatchId, DeliveryError> {
		let id = self
			.contract()
			.currentBatchId()
			.call()
			.await
			.map_err(|e| DeliveryError::Contract(format!("Failed to read currentBatchId: {}", e)))?;

		Ok(id.saturating_to())
	}

	async fn latest_timestamp(&self) -> Result<u64, DeliveryError> {
		let block = self
			.provider
			.get_block_by_number(BlockNumberOrTag::Latest)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get latest block: {}", e)))?
			.ok_or_else(|| DeliveryError::Network("Latest block not found".to_string()))?;

		Ok(block.header.timestamp)
	}

	async fn submit_batch(
		&self,
		batch: &Batch,
		gas_limit: u64,
	) -> Result<BatchReceipt, DeliveryError> {
		let (call_data, call_params) = batch.call_arrays();
		let call_data: Vec<IReceiver::CallData> = call_data.into_iter().map(Into::into).collect();
		let call_params: Vec<IReceiver::CallParams> =
			call_params.into_iter().map(Into::into).collect();

		let pending = self
			.contract()
			.batch(call_data, call_params)
			.gas(gas_limit)
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send batch: {}", e)))?;

		let tx_hash = *pending.tx_hash();
		info!(
			tx_hash = %truncate_hash(tx_hash.as_slice()),
			batch_id = batch.id(),
			messages = batch.len(),
			"Submitted batch transaction"
		);

		let receipt = pending
			.get_receipt()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;

		let outcomes = self.outcomes(&receipt);
		debug!(
			tx_hash = %truncate_hash(tx_hash.as_slice()),
			events = outcomes.len(),
			"Decoded batch outcomes"
		);

		Ok(BatchReceipt {
			tx_hash: receipt.transaction_hash,
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
			outcomes,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{address, Bytes};
	use alloy::sol_types::SolCall;

	#[test]
	fn test_call_params_conversion() {
		let params = CallParams {
			token_contract: address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
			amount: U256::from(5u64),
			batch_id: 3,
			batch_nonce: 2,
			expiry: 1_000,
			tx_gas: 60_000,
		};

		let converted: IReceiver::CallParams = params.into();
		assert_eq!(converted.batchId, U256::from(3u64));
		assert_eq!(converted.batchNonce, U256::from(2u64));
		assert_eq!(converted.txGas, U256::from(60_000u64));
	}

	#[test]
	fn test_batch_call_encodes_aligned_arrays() {
		let call = CallData {
			from: address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
			to: address!("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"),
			data: Bytes::new(),
			signature: Bytes::from(vec![1u8; 65]),
		};
		let params = CallParams {
			token_contract: address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
			amount: U256::from(5u64),
			batch_id: 0,
			batch_nonce: 1,
			expiry: 1_000,
			tx_gas: 60_000,
		};

		let encoded = IReceiver::batchCall {
			callData: vec![call.clone().into(), call.into()],
			callParams: vec![params.clone().into(), params.into()],
		}
		.abi_encode();

		let decoded = IReceiver::batchCall::abi_decode(&encoded).unwrap();
		assert_eq!(decoded.callData.len(), decoded.callParams.len());
		assert_eq!(decoded.callParams[1].batchNonce, U256::from(1u64));
	}
}
