// relayer-config/src/lib.rs

use regex::Regex;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "RELAYER_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<RelayerConfig, ConfigError> {
		let Some(file_path) = &self.file_path else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		debug!(path = %file_path, "Loaded configuration file");
		self.load_from_str(&content)
	}

	/// Parses, overrides and validates configuration text.
	pub fn load_from_str(&self, content: &str) -> Result<RelayerConfig, ConfigError> {
		let substituted = self.substitute_env_vars(content)?;

		let mut config: RelayerConfig =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
		let mut result = content.to_string();

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut RelayerConfig) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.relayer.log_level = log_level;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.relayer.http_port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		if let Ok(interval) = env::var(format!("{}BATCH_INTERVAL_SECS", self.env_prefix)) {
			config.batching.batch_interval_secs = interval.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid batch interval: {}", e))
			})?;
		}

		Ok(())
	}
}

fn validate_config(config: &RelayerConfig) -> Result<(), ConfigError> {
	if config.batching.max_gas_limit == 0 {
		return Err(ConfigError::ValidationError(
			"batching.max_gas_limit must be greater than zero".to_string(),
		));
	}

	if config.batching.batch_interval_secs == 0 {
		return Err(ConfigError::ValidationError(
			"batching.batch_interval_secs must be greater than zero".to_string(),
		));
	}

	if config.batching.status_retention == 0 {
		return Err(ConfigError::ValidationError(
			"batching.status_retention must be greater than zero".to_string(),
		));
	}

	let rpc_url = &config.chain.rpc_url;
	if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
		return Err(ConfigError::ValidationError(format!(
			"chain.rpc_url must be an http(s) URL, got '{}'",
			rpc_url
		)));
	}

	let key = config.chain.private_key.trim_start_matches("0x");
	match hex::decode(key) {
		Ok(bytes) if bytes.len() == 32 => {}
		_ => {
			return Err(ConfigError::ValidationError(
				"chain.private_key must be 32 bytes of hex".to_string(),
			))
		}
	}

	if config.chain.receiver_address.is_zero() {
		return Err(ConfigError::ValidationError(
			"chain.receiver_address must be a non-zero address".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn config_text(extra: &str) -> String {
		format!(
			r#"
[chain]
rpc_url = "http://localhost:8545"
chain_id = 31337
receiver_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
private_key = "{}"
{}
"#,
			KEY, extra
		)
	}

	fn loader(prefix: &str) -> ConfigLoader {
		ConfigLoader::new().with_env_prefix(prefix)
	}

	#[test]
	fn test_defaults_applied() {
		let config = loader("RELAYER_TEST_DEFAULTS_")
			.load_from_str(&config_text(""))
			.unwrap();

		assert_eq!(config.relayer.http_port, 4000);
		assert_eq!(config.relayer.log_level, "info");
		assert_eq!(config.batching.max_gas_limit, 2_000_000);
		assert_eq!(config.batching.batch_interval_secs, 60);
		assert!(config.batching.enforce_preview);
		assert_eq!(config.batching.status_retention, 10_000);
		assert_eq!(
			config.storage.path,
			std::path::PathBuf::from("./offchain-storage.json")
		);
	}

	#[test]
	fn test_env_var_substitution() {
		env::set_var("RELAYER_TEST_SUBST_RPC", "https://rpc.example.org");
		let text = config_text("").replace("http://localhost:8545", "${RELAYER_TEST_SUBST_RPC}");

		let config = loader("RELAYER_TEST_SUBST_").load_from_str(&text).unwrap();
		assert_eq!(config.chain.rpc_url, "https://rpc.example.org");
	}

	#[test]
	fn test_missing_env_var() {
		let text = config_text("").replace(KEY, "${RELAYER_TEST_UNSET_KEY_VAR}");

		assert!(matches!(
			loader("RELAYER_TEST_UNSET_").load_from_str(&text),
			Err(ConfigError::EnvVarNotFound(name)) if name == "RELAYER_TEST_UNSET_KEY_VAR"
		));
	}

	#[test]
	fn test_env_overrides() {
		env::set_var("RELAYER_TEST_OVR_LOG_LEVEL", "debug");
		env::set_var("RELAYER_TEST_OVR_HTTP_PORT", "8081");
		env::set_var("RELAYER_TEST_OVR_BATCH_INTERVAL_SECS", "5");

		let config = loader("RELAYER_TEST_OVR_")
			.load_from_str(&config_text(""))
			.unwrap();
		assert_eq!(config.relayer.log_level, "debug");
		assert_eq!(config.relayer.http_port, 8081);
		assert_eq!(config.batching.batch_interval_secs, 5);
	}

	#[test]
	fn test_invalid_port_override() {
		env::set_var("RELAYER_TEST_BADPORT_HTTP_PORT", "not-a-port");

		assert!(matches!(
			loader("RELAYER_TEST_BADPORT_").load_from_str(&config_text("")),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[test]
	fn test_validation_rules() {
		let loader = loader("RELAYER_TEST_VALIDATE_");

		let zero_gas = config_text("[batching]\nmax_gas_limit = 0");
		assert!(matches!(
			loader.load_from_str(&zero_gas),
			Err(ConfigError::ValidationError(_))
		));

		let zero_interval = config_text("[batching]\nbatch_interval_secs = 0");
		assert!(matches!(
			loader.load_from_str(&zero_interval),
			Err(ConfigError::ValidationError(_))
		));

		let zero_retention = config_text("[batching]\nstatus_retention = 0");
		assert!(matches!(
			loader.load_from_str(&zero_retention),
			Err(ConfigError::ValidationError(_))
		));

		let bad_url = config_text("").replace("http://localhost:8545", "ws://localhost:8546");
		assert!(matches!(
			loader.load_from_str(&bad_url),
			Err(ConfigError::ValidationError(_))
		));

		let short_key = config_text("").replace(KEY, "0x1234");
		assert!(matches!(
			loader.load_from_str(&short_key),
			Err(ConfigError::ValidationError(_))
		));

		let zero_receiver = config_text("").replace(
			"0x5FbDB2315678afecb367f032d93F642f64180aa3",
			"0x0000000000000000000000000000000000000000",
		);
		assert!(matches!(
			loader.load_from_str(&zero_receiver),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[test]
	fn test_parse_error() {
		assert!(matches!(
			loader("RELAYER_TEST_PARSE_").load_from_str("[chain]\nrpc_url = "),
			Err(ConfigError::ParseError(_))
		));
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("relayer.toml");
		std::fs::write(&path, config_text("[relayer]\nname = \"test-relayer\"")).unwrap();

		let config = loader("RELAYER_TEST_FILE_")
			.with_file(&path)
			.load()
			.await
			.unwrap();
		assert_eq!(config.relayer.name, "test-relayer");
		assert_eq!(config.chain.chain_id, 31337);
	}

	#[tokio::test]
	async fn test_missing_file() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("absent.toml");

		assert!(matches!(
			loader("RELAYER_TEST_NOFILE_").with_file(&path).load().await,
			Err(ConfigError::FileNotFound(_))
		));
		assert!(matches!(
			ConfigLoader::new().load().await,
			Err(ConfigError::FileNotFound(_))
		));
	}
}
