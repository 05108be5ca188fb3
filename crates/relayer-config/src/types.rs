//! Configuration types for the relayer.

use relayer_types::{
	Address, DEFAULT_BATCH_INTERVAL_SECS, DEFAULT_MAX_GAS_LIMIT, DEFAULT_STATUS_RETENTION,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete relayer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayerConfig {
	/// Process identity and HTTP settings
	#[serde(default)]
	pub relayer: RelayerSettings,
	/// Settlement chain and signing key
	pub chain: ChainSettings,
	/// Batch packing and scheduling
	#[serde(default)]
	pub batching: BatchingConfig,
	/// Nonce storage
	#[serde(default)]
	pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayerSettings {
	#[serde(default = "default_name")]
	pub name: String,
	#[serde(default = "default_http_port")]
	pub http_port: u16,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

impl Default for RelayerSettings {
	fn default() -> Self {
		Self {
			name: default_name(),
			http_port: default_http_port(),
			log_level: default_log_level(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainSettings {
	/// HTTP JSON-RPC endpoint
	pub rpc_url: String,
	pub chain_id: u64,
	/// Settlement (Receiver) contract
	pub receiver_address: Address,
	/// Hex-encoded key that signs batch transactions
	pub private_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchingConfig {
	#[serde(default = "default_max_gas_limit")]
	pub max_gas_limit: u64,
	#[serde(default = "default_batch_interval_secs")]
	pub batch_interval_secs: u64,
	/// Reject messages signed against an outdated preview
	#[serde(default = "default_enforce_preview")]
	pub enforce_preview: bool,
	/// Settled messages whose final state is kept for `/messageStatus`
	#[serde(default = "default_status_retention")]
	pub status_retention: usize,
}

impl Default for BatchingConfig {
	fn default() -> Self {
		Self {
			max_gas_limit: default_max_gas_limit(),
			batch_interval_secs: default_batch_interval_secs(),
			enforce_preview: default_enforce_preview(),
			status_retention: default_status_retention(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	#[serde(default = "default_storage_path")]
	pub path: PathBuf,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			path: default_storage_path(),
		}
	}
}

fn default_name() -> String {
	"erc20-meta-relayer".to_string()
}

fn default_http_port() -> u16 {
	4000
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_max_gas_limit() -> u64 {
	DEFAULT_MAX_GAS_LIMIT
}

fn default_batch_interval_secs() -> u64 {
	DEFAULT_BATCH_INTERVAL_SECS
}

fn default_enforce_preview() -> bool {
	true
}

fn default_status_retention() -> usize {
	DEFAULT_STATUS_RETENTION
}

fn default_storage_path() -> PathBuf {
	PathBuf::from("./offchain-storage.json")
}
