//! The relayer service.
//!
//! [`RelayerService`] owns the pending queue, the ledger of formed batches,
//! the nonce store and the per-message states, all behind one lock. Intake
//! ([`RelayerService::submit_message`]) and preview only touch that state;
//! [`RelayerService::tick`] is the only path that talks to the chain, and it
//! does so after releasing the lock. The chain clock used for expiry checks
//! is re-sampled by [`RelayerService::refresh_chain_time`], which the
//! scheduler drives separately from ticks.

use crate::assigner::BatchAssigner;
use crate::error::{CoreError, Rejection};
use relayer_delivery::ChainClient;
use relayer_storage::OffchainStore;
use relayer_types::{
	Address, Batch, BatchId, BatchPreview, MessageKey, MessageState, MetaTx, MetaTxRequest, B256,
	DEFAULT_MAX_GAS_LIMIT, DEFAULT_STATUS_RETENTION,
};
use relayer_validator::{MessageValidator, ValidationError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Batching parameters.
#[derive(Debug, Clone)]
pub struct BatchingSettings {
	/// Bound on the summed `txGas` of a batch, and gas limit of the batch
	/// transaction.
	pub max_gas_limit: u64,
	/// Reject messages whose signed ids differ from the current preview.
	pub enforce_preview: bool,
	/// Settled messages whose final state stays queryable.
	pub status_retention: usize,
}

impl Default for BatchingSettings {
	fn default() -> Self {
		Self {
			max_gas_limit: DEFAULT_MAX_GAS_LIMIT,
			enforce_preview: true,
			status_retention: DEFAULT_STATUS_RETENTION,
		}
	}
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
	/// A previous tick was still in progress.
	Skipped,
	/// Queue and ledger were both empty.
	Idle,
	/// The oldest batch was sent and its receipt processed.
	Submitted {
		batch_id: BatchId,
		tx_hash: B256,
		confirmed: usize,
		reverted: usize,
		/// Batches still waiting in the ledger.
		remaining: usize,
	},
}

/// Latest chain timestamp seen by the service, carried forward with local
/// monotonic time until the next sample.
#[derive(Debug)]
struct ChainClock {
	sample: RwLock<(u64, Instant)>,
}

impl ChainClock {
	fn new(timestamp: u64) -> Self {
		Self {
			sample: RwLock::new((timestamp, Instant::now())),
		}
	}

	fn now(&self) -> u64 {
		let (timestamp, sampled_at) = *self.sample.read().unwrap_or_else(PoisonError::into_inner);
		timestamp.saturating_add(sampled_at.elapsed().as_secs())
	}

	/// Chain time never moves backwards.
	fn advance(&self, timestamp: u64) {
		let mut sample = self.sample.write().unwrap_or_else(PoisonError::into_inner);
		let now = Instant::now();
		let carried = sample
			.0
			.saturating_add(now.duration_since(sample.1).as_secs());
		*sample = (timestamp.max(carried), now);
	}
}

struct RelayerState {
	queue: VecDeque<MetaTx>,
	ledger: VecDeque<Batch>,
	store: OffchainStore,
	next_batch_id: BatchId,
	statuses: HashMap<MessageKey, MessageState>,
	/// Settled messages in settlement order, with the state they settled in.
	settled: VecDeque<(MessageKey, MessageState)>,
	status_retention: usize,
}

impl RelayerState {
	/// Moves `key` to `next`. `from` is the state a message without an entry
	/// is taken to be in.
	fn set_status(&mut self, key: MessageKey, from: MessageState, next: MessageState) {
		let current = self.statuses.get(&key).copied().unwrap_or(from);
		if !current.can_transition_to(next) {
			warn!(
				sender = %key.sender,
				batch_id = key.batch_id,
				batch_nonce = key.batch_nonce,
				from = %current,
				to = %next,
				"Unexpected message state change"
			);
		}
		self.statuses.insert(key, next);
	}

	/// Marks `key` as settled in its current state, evicting the oldest
	/// settled entries beyond the retention bound.
	fn settle(&mut self, key: MessageKey) {
		let Some(state) = self.statuses.get(&key).copied() else {
			return;
		};
		self.settled.push_back((key, state));

		while self.settled.len() > self.status_retention {
			let Some((old, settled_as)) = self.settled.pop_front() else {
				break;
			};
			// Keys reused by a later message keep that message's state
			if self.statuses.get(&old) == Some(&settled_as) {
				self.statuses.remove(&old);
			}
		}
	}
}

pub struct RelayerService {
	validator: MessageValidator,
	assigner: BatchAssigner,
	chain: Arc<dyn ChainClient>,
	state: Mutex<RelayerState>,
	tick_guard: Mutex<()>,
	clock: ChainClock,
	enforce_preview: bool,
}

impl RelayerService {
	/// Builds the service, reading the batch id base and the chain time from
	/// the settlement chain.
	pub async fn new(
		chain: Arc<dyn ChainClient>,
		store: OffchainStore,
		settings: BatchingSettings,
	) -> Result<Self, CoreError> {
		let base = chain.current_batch_id().await.map_err(|e| {
			CoreError::ServiceInit(format!("Failed to read current batch id: {}", e))
		})?;
		let now = chain.latest_timestamp().await.map_err(|e| {
			CoreError::ServiceInit(format!("Failed to read chain time: {}", e))
		})?;

		info!(
			batch_id = base,
			chain_time = now,
			stored_nonces = store.len(),
			"Relayer service initialized"
		);

		Ok(Self {
			validator: MessageValidator::new(settings.max_gas_limit),
			assigner: BatchAssigner::new(settings.max_gas_limit),
			chain,
			state: Mutex::new(RelayerState {
				queue: VecDeque::new(),
				ledger: VecDeque::new(),
				store,
				next_batch_id: base,
				statuses: HashMap::new(),
				settled: VecDeque::new(),
				status_retention: settings.status_retention,
			}),
			tick_guard: Mutex::new(()),
			clock: ChainClock::new(now),
			enforce_preview: settings.enforce_preview,
		})
	}

	pub fn settlement_address(&self) -> Address {
		self.chain.settlement_address()
	}

	/// Cached chain timestamp used for expiry checks.
	pub fn chain_time(&self) -> u64 {
		self.clock.now()
	}

	/// Samples the latest block timestamp into the chain clock. A failed read
	/// leaves the clock running on local time.
	pub async fn refresh_chain_time(&self) {
		match self.chain.latest_timestamp().await {
			Ok(timestamp) => {
				self.clock.advance(timestamp);
				debug!(chain_time = self.clock.now(), "Refreshed chain time");
			}
			Err(e) => warn!(error = %e, "Failed to refresh chain time"),
		}
	}

	/// Ids a new message of `tx_gas` from `sender` would be assigned now.
	pub async fn preview(&self, sender: Address, tx_gas: u64) -> Result<BatchPreview, CoreError> {
		let max = self.assigner.max_gas_limit();
		if tx_gas == 0 || tx_gas >= max {
			return Err(ValidationError::GasOutOfRange { tx_gas, max }.into());
		}

		let state = self.state.lock().await;
		let assignment = self.assigner.preview_next(
			&state.queue,
			state.next_batch_id,
			&state.store,
			tx_gas,
			&sender,
		)?;

		Ok(BatchPreview {
			batch_id: assignment.batch_id,
			batch_nonce: assignment.batch_nonce,
			relayer_address: self.chain.settlement_address(),
		})
	}

	/// Validates a message and appends it to the queue.
	///
	/// Returns the key the message was queued under. Nothing here waits on
	/// the chain.
	pub async fn submit_message(&self, request: MetaTxRequest) -> Result<MessageKey, CoreError> {
		let mut stage = MessageState::Received;
		debug!(sender = ?request.from, state = %stage, "Received message");

		let tx = match self.validator.validate(request, self.clock.now()) {
			Ok(tx) => tx,
			Err(e) => {
				info!(state = %stage, error = %e, "Rejected message");
				return Err(e.into());
			}
		};
		stage = MessageState::Validated;
		debug!(sender = %tx.from, state = %stage, "Validated message");

		let mut state = self.state.lock().await;

		if self.enforce_preview {
			let expected = self.assigner.preview_next(
				&state.queue,
				state.next_batch_id,
				&state.store,
				tx.tx_gas,
				&tx.from,
			)?;

			if expected.batch_id != tx.batch_id || expected.batch_nonce != tx.batch_nonce {
				let rejection = Rejection::StalePreview {
					signed_batch_id: tx.batch_id,
					signed_nonce: tx.batch_nonce,
					expected_batch_id: expected.batch_id,
					expected_nonce: expected.batch_nonce,
				};
				info!(sender = %tx.from, state = %stage, error = %rejection, "Rejected message");
				return Err(rejection.into());
			}
		}

		let key = MessageKey::of(&tx);
		state.queue.push_back(tx);
		state.set_status(key, stage, MessageState::Queued);

		info!(
			sender = %key.sender,
			batch_id = key.batch_id,
			batch_nonce = key.batch_nonce,
			queued = state.queue.len(),
			"Queued message"
		);
		Ok(key)
	}

	/// Latest known state of a message.
	pub async fn message_state(&self, key: &MessageKey) -> Option<MessageState> {
		self.state.lock().await.statuses.get(key).copied()
	}

	pub async fn queue_len(&self) -> usize {
		self.state.lock().await.queue.len()
	}

	pub async fn ledger_len(&self) -> usize {
		self.state.lock().await.ledger.len()
	}

	/// One scheduler step: commit the queue into the ledger and submit the
	/// oldest batch.
	///
	/// A tick that starts while another is still running returns
	/// [`TickOutcome::Skipped`] without doing anything.
	pub async fn tick(&self) -> Result<TickOutcome, CoreError> {
		let Ok(_running) = self.tick_guard.try_lock() else {
			debug!("Previous tick still running, skipping");
			return Ok(TickOutcome::Skipped);
		};

		let (batch, remaining) = {
			let mut guard = self.state.lock().await;
			let state = &mut *guard;

			if state.queue.is_empty() && state.ledger.is_empty() {
				return Ok(TickOutcome::Idle);
			}

			if !state.queue.is_empty() {
				let signed: Vec<MessageKey> = state.queue.iter().map(MessageKey::of).collect();
				let batches = self
					.assigner
					.commit_all(&mut state.queue, &mut state.next_batch_id, &mut state.store)
					.await?;

				// Commit may have rewritten ids, so re-key every message
				for old in &signed {
					state.statuses.remove(old);
				}
				for tx in batches.iter().flat_map(|b| b.messages()) {
					state.set_status(MessageKey::of(tx), MessageState::Queued, MessageState::Batched);
				}

				info!(
					batches = batches.len(),
					messages = signed.len(),
					"Formed batches"
				);
				state.ledger.extend(batches);
			}

			let Some(batch) = state.ledger.pop_front() else {
				return Ok(TickOutcome::Idle);
			};
			for tx in batch.messages() {
				state.set_status(MessageKey::of(tx), MessageState::Batched, MessageState::Submitted);
			}
			(batch, state.ledger.len())
		};

		let receipt = match self
			.chain
			.submit_batch(&batch, self.assigner.max_gas_limit())
			.await
		{
			Ok(receipt) => receipt,
			Err(e) => {
				error!(batch_id = batch.id(), error = %e, "Batch submission failed");
				// Not retried, so these messages stay Submitted
				let mut state = self.state.lock().await;
				for tx in batch.messages() {
					state.settle(MessageKey::of(tx));
				}
				return Err(e.into());
			}
		};

		let mut confirmed = 0;
		let mut reverted = 0;
		{
			let mut state = self.state.lock().await;
			for tx in batch.messages() {
				let key = MessageKey::of(tx);
				let success = receipt
					.outcome_for(&key)
					.map(|outcome| outcome.success)
					.unwrap_or(receipt.success);

				let outcome = if success {
					confirmed += 1;
					MessageState::Confirmed
				} else {
					reverted += 1;
					warn!(
						sender = %key.sender,
						batch_id = key.batch_id,
						batch_nonce = key.batch_nonce,
						"Message reverted on chain"
					);
					MessageState::Reverted
				};
				state.set_status(key, MessageState::Submitted, outcome);
				state.settle(key);
			}
		}

		info!(
			batch_id = batch.id(),
			block = receipt.block_number,
			confirmed,
			reverted,
			remaining,
			"Batch settled"
		);

		Ok(TickOutcome::Submitted {
			batch_id: batch.id(),
			tx_hash: receipt.tx_hash,
			confirmed,
			reverted,
			remaining,
		})
	}
}
