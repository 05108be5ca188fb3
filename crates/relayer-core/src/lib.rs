//! Batching, validation and scheduling engine of the ERC20 meta-transaction
//! relayer.
//!
//! Messages enter through [`RelayerService::submit_message`], are packed into
//! gas-bounded batches by [`BatchAssigner`], and leave through a
//! [`relayer_delivery::ChainClient`] when [`BatchScheduler`] ticks.

pub mod assigner;
pub mod error;
pub mod lifecycle;
pub mod scheduler;
pub mod service;

pub use assigner::{Assignment, BatchAssigner};
pub use error::{CoreError, Rejection};
pub use lifecycle::{LifecycleManager, LifecycleState};
pub use scheduler::BatchScheduler;
pub use service::{BatchingSettings, RelayerService, TickOutcome};
