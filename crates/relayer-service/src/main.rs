use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relayer_config::{ConfigLoader, RelayerConfig};
use relayer_core::{BatchScheduler, BatchingSettings, RelayerService};
use relayer_delivery::implementations::evm::alloy::AlloyDelivery;
use relayer_storage::implementations::file::FileStorage;
use relayer_storage::OffchainStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[derive(Parser)]
#[command(name = "erc20-meta-relayer")]
#[command(about = "ERC20 meta-transaction relayer", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	/// Overrides the configured log level
	#[arg(long, env = "RELAYER_LOG_LEVEL")]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the relayer
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli).await,
	}
}

async fn load_config(cli: &Cli) -> Result<RelayerConfig> {
	ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")
}

async fn start_service(cli: Cli) -> Result<()> {
	let config = load_config(&cli).await?;

	setup_tracing(cli.log_level.as_deref().unwrap_or(&config.relayer.log_level))?;

	info!("Starting {}", config.relayer.name);
	info!("Configuration loaded from: {:?}", cli.config);
	info!("Receiver contract: {}", config.chain.receiver_address);
	info!("Batch interval: {}s", config.batching.batch_interval_secs);

	let signer: PrivateKeySigner = config
		.chain
		.private_key
		.parse()
		.context("Failed to parse relayer private key")?;
	info!("Relayer account: {}", signer.address());

	let delivery = AlloyDelivery::new(
		&config.chain.rpc_url,
		config.chain.chain_id,
		config.chain.receiver_address,
		signer,
	)
	.context("Failed to create chain client")?;

	let store = OffchainStore::open(Box::new(FileStorage::new(&config.storage.path)))
		.await
		.with_context(|| format!("Failed to open storage at {:?}", config.storage.path))?;

	let settings = BatchingSettings {
		max_gas_limit: config.batching.max_gas_limit,
		enforce_preview: config.batching.enforce_preview,
		status_retention: config.batching.status_retention,
	};
	let service = Arc::new(
		RelayerService::new(Arc::new(delivery), store, settings)
			.await
			.context("Failed to initialize relayer service")?,
	);

	let scheduler = BatchScheduler::new(
		service.clone(),
		Duration::from_secs(config.batching.batch_interval_secs),
	);
	let scheduler_handle = scheduler
		.start()
		.await
		.context("Failed to start batch scheduler")?;

	let app_state = api::AppState {
		service,
		lifecycle: scheduler.lifecycle(),
	};
	let http_port = config.relayer.http_port;
	let http_handle = tokio::spawn(async move {
		if let Err(e) = api::start_http_server(app_state, http_port).await {
			error!("HTTP server stopped: {}", e);
		}
	});

	info!("Relayer started successfully");

	setup_shutdown_signal().await;

	info!("Shutdown signal received, stopping relayer...");

	scheduler
		.shutdown()
		.await
		.context("Failed to shut down batch scheduler")?;
	if let Err(e) = scheduler_handle.await {
		error!("Batch scheduler task failed: {}", e);
	}

	http_handle.abort();

	info!("Relayer stopped");
	Ok(())
}

async fn validate_config(cli: Cli) -> Result<()> {
	setup_tracing(cli.log_level.as_deref().unwrap_or("info"))?;

	info!("Validating configuration file: {:?}", cli.config);

	let config = load_config(&cli).await?;

	info!("Configuration is valid");
	info!("Relayer name: {}", config.relayer.name);
	info!("Chain id: {}", config.chain.chain_id);
	info!("Receiver contract: {}", config.chain.receiver_address);
	info!("Max gas per batch: {}", config.batching.max_gas_limit);
	info!("Storage path: {:?}", config.storage.path);

	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.try_init()
		.context("Failed to install tracing subscriber")?;

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
