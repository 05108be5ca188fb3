// relayer-core/src/lifecycle.rs

use crate::error::CoreError;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

/// Lifecycle of the batch scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Uninitialized,
	Initializing,
	Running,
	Stopping,
	Stopped,
}

impl LifecycleState {
	/// Whether moving from `self` to `next` is allowed.
	pub fn can_transition_to(self, next: LifecycleState) -> bool {
		use LifecycleState::*;

		matches!(
			(self, next),
			(Uninitialized, Initializing)
				| (Initializing, Running)
				| (Running, Stopping)
				| (Stopping, Stopped)
		)
	}
}

impl std::fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Uninitialized => write!(f, "Uninitialized"),
			Self::Initializing => write!(f, "Initializing"),
			Self::Running => write!(f, "Running"),
			Self::Stopping => write!(f, "Stopping"),
			Self::Stopped => write!(f, "Stopped"),
		}
	}
}

/// Tracks the scheduler state and fans out the shutdown signal.
pub struct LifecycleManager {
	state: RwLock<LifecycleState>,
	shutdown_tx: broadcast::Sender<()>,
}

impl LifecycleManager {
	pub fn new() -> Self {
		let (shutdown_tx, _) = broadcast::channel(4);

		Self {
			state: RwLock::new(LifecycleState::Uninitialized),
			shutdown_tx,
		}
	}

	pub async fn state(&self) -> LifecycleState {
		*self.state.read().await
	}

	async fn transition(&self, next: LifecycleState) -> Result<(), CoreError> {
		let mut state = self.state.write().await;
		let current = *state;

		if !current.can_transition_to(next) {
			return Err(CoreError::Lifecycle(format!(
				"Invalid state transition from {} to {}",
				current, next
			)));
		}

		*state = next;
		info!("Lifecycle state changed: {} -> {}", current, next);
		Ok(())
	}

	pub async fn initialize(&self) -> Result<(), CoreError> {
		self.transition(LifecycleState::Initializing).await
	}

	pub async fn start(&self) -> Result<(), CoreError> {
		self.transition(LifecycleState::Running).await
	}

	/// Moves to `Stopping`, notifies every subscriber, then to `Stopped`.
	pub async fn shutdown(&self) -> Result<(), CoreError> {
		self.transition(LifecycleState::Stopping).await?;
		// No receivers just means nothing is running
		let _ = self.shutdown_tx.send(());
		self.transition(LifecycleState::Stopped).await
	}

	pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
		self.shutdown_tx.subscribe()
	}

	pub async fn is_running(&self) -> bool {
		self.state().await == LifecycleState::Running
	}
}

impl Default for LifecycleManager {
	fn default() -> Self {
		Self::new()
	}
}
