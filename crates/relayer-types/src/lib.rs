//! Shared types for the ERC20 meta-transaction relayer.
//!
//! Everything that crosses a crate boundary lives here: the inbound message
//! shape, the validated meta-transaction, formed batches, chain receipts and
//! the request/response bodies of the HTTP adapter.

pub mod api;
pub mod batch;
pub mod delivery;
pub mod meta_tx;

pub use alloy::primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use batch::*;
pub use delivery::*;
pub use meta_tx::*;

/// Upper bound on the summed `txGas` of one batch, and the exclusive upper
/// bound on a single message's `txGas`.
pub const DEFAULT_MAX_GAS_LIMIT: u64 = 2_000_000;

/// Default interval between scheduler ticks, in seconds.
pub const DEFAULT_BATCH_INTERVAL_SECS: u64 = 60;

/// Default number of settled messages whose final state stays queryable.
pub const DEFAULT_STATUS_RETENTION: usize = 10_000;
