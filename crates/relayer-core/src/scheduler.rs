//! Periodic flush of the relayer queue.

use crate::error::CoreError;
use crate::lifecycle::LifecycleManager;
use crate::service::{RelayerService, TickOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

fn every(period: Duration) -> Interval {
	let mut interval = interval_at(Instant::now() + period, period);
	// A step that outlasts the period delays the next one instead of
	// bunching up
	interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
	interval
}

async fn run_ticks(
	service: Arc<RelayerService>,
	period: Duration,
	mut shutdown_rx: broadcast::Receiver<()>,
) {
	let mut interval = every(period);

	loop {
		tokio::select! {
			_ = interval.tick() => {
				match service.tick().await {
					Ok(TickOutcome::Idle) => debug!("Nothing to batch"),
					Ok(TickOutcome::Skipped) => debug!("Tick skipped"),
					Ok(TickOutcome::Submitted { batch_id, tx_hash, confirmed, reverted, remaining }) => {
						info!(batch_id, %tx_hash, confirmed, reverted, remaining, "Tick submitted batch");
					}
					Err(e) => error!(error = %e, "Tick failed"),
				}
			}
			_ = shutdown_rx.recv() => {
				info!("Batch scheduler received shutdown signal");
				break;
			}
		}
	}
}

/// Keeps the chain clock sampled even while a tick is stuck on the chain.
async fn run_clock(
	service: Arc<RelayerService>,
	period: Duration,
	mut shutdown_rx: broadcast::Receiver<()>,
) {
	let mut interval = every(period);

	loop {
		tokio::select! {
			_ = interval.tick() => service.refresh_chain_time().await,
			_ = shutdown_rx.recv() => break,
		}
	}
}

/// Drives [`RelayerService::tick`] on a fixed interval until shutdown, and
/// refreshes the service's chain clock on the same cadence in a separate
/// loop.
pub struct BatchScheduler {
	service: Arc<RelayerService>,
	period: Duration,
	lifecycle: Arc<LifecycleManager>,
}

impl BatchScheduler {
	pub fn new(service: Arc<RelayerService>, period: Duration) -> Self {
		Self {
			service,
			period,
			lifecycle: Arc::new(LifecycleManager::new()),
		}
	}

	pub fn lifecycle(&self) -> Arc<LifecycleManager> {
		self.lifecycle.clone()
	}

	/// Spawns the tick loop. The first tick fires one period after start.
	pub async fn start(&self) -> Result<JoinHandle<()>, CoreError> {
		self.lifecycle.initialize().await?;

		let service = self.service.clone();
		let period = self.period;
		let tick_shutdown = self.lifecycle.subscribe_shutdown();
		let clock_shutdown = self.lifecycle.subscribe_shutdown();

		let handle = tokio::spawn(async move {
			tokio::join!(
				run_ticks(service.clone(), period, tick_shutdown),
				run_clock(service, period, clock_shutdown),
			);
		});

		self.lifecycle.start().await?;
		info!(interval_secs = period.as_secs(), "Batch scheduler started");
		Ok(handle)
	}

	/// Signals both loops to stop. A tick already in flight finishes first.
	pub async fn shutdown(&self) -> Result<(), CoreError> {
		self.lifecycle.shutdown().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lifecycle::LifecycleState;
	use crate::service::BatchingSettings;
	use async_trait::async_trait;
	use relayer_delivery::{ChainClient, DeliveryError};
	use relayer_storage::implementations::memory::MemoryStorage;
	use relayer_storage::OffchainStore;
	use relayer_types::{Address, Batch, BatchId, BatchReceipt};
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Default)]
	struct CountingChain {
		timestamp_reads: AtomicUsize,
	}

	#[async_trait]
	impl ChainClient for CountingChain {
		fn settlement_address(&self) -> Address {
			Address::ZERO
		}

		async fn current_batch_id(&self) -> Result<BatchId, DeliveryError> {
			Ok(0)
		}

		async fn latest_timestamp(&self) -> Result<u64, DeliveryError> {
			self.timestamp_reads.fetch_add(1, Ordering::SeqCst);
			Ok(1)
		}

		async fn submit_batch(&self, _: &Batch, _: u64) -> Result<BatchReceipt, DeliveryError> {
			Err(DeliveryError::Network("unexpected submission".to_string()))
		}
	}

	async fn scheduler(chain: Arc<CountingChain>, period: Duration) -> BatchScheduler {
		let store = OffchainStore::open(Box::new(MemoryStorage::new()))
			.await
			.unwrap();
		let service = RelayerService::new(chain, store, BatchingSettings::default())
			.await
			.unwrap();
		BatchScheduler::new(Arc::new(service), period)
	}

	#[tokio::test(start_paused = true)]
	async fn test_scheduler_ticks_until_shutdown() {
		let chain = Arc::new(CountingChain::default());
		let scheduler = scheduler(chain.clone(), Duration::from_secs(60)).await;
		// One read at construction, then one per period from the clock loop
		assert_eq!(chain.timestamp_reads.load(Ordering::SeqCst), 1);

		let handle = scheduler.start().await.unwrap();
		assert!(scheduler.lifecycle().is_running().await);

		tokio::time::sleep(Duration::from_secs(185)).await;
		assert_eq!(chain.timestamp_reads.load(Ordering::SeqCst), 4);

		scheduler.shutdown().await.unwrap();
		handle.await.unwrap();
		assert_eq!(
			scheduler.lifecycle().state().await,
			LifecycleState::Stopped
		);
	}

	#[tokio::test]
	async fn test_scheduler_cannot_start_twice() {
		let chain = Arc::new(CountingChain::default());
		let scheduler = scheduler(chain, Duration::from_secs(60)).await;

		let handle = scheduler.start().await.unwrap();
		assert!(matches!(
			scheduler.start().await,
			Err(CoreError::Lifecycle(_))
		));

		scheduler.shutdown().await.unwrap();
		handle.await.unwrap();
	}
}
