//! Loyalty Point Ledger
//!
//! An append-only state-transition engine for loyalty-point accounts over
//! a versioned key-value world state.
//!
//! # Core Invariants
//!
//! - Balances never go negative; any operation that would overdraw is
//!   rejected before commit
//! - Every committed mutation leaves one new account version in the
//!   store's history, so the full balance trajectory is replayable
//! - Transfers commit both legs atomically or not at all
//! - A single writer serializes all mutations; there are no partial or
//!   interleaved commits
//!
//! # Architecture
//!
//! ```text
//! Ledger (API)
//!    |
//!    v
//! LedgerActor (single writer, tx id + timestamp assignment)
//!    |
//!    v
//! Engine (validation, authorization, balance arithmetic)
//!    |
//!    v
//! LedgerStore (versioned KV: MemoryStore | RocksStore)
//! ```
//!
//! Committed transitions are published on a broadcast [`TransitionLog`]
//! after the store commit succeeds, never before.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod actor;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod ledger;
pub mod metrics;
pub mod store;
pub mod types;

pub use actor::{spawn_ledger_actor, LedgerHandle, LedgerMessage};
pub use auth::{AccessPolicy, ClientIdentity, OperationKind};
pub use config::{Config, DEFAULT_ISSUER_MSP};
pub use engine::{Engine, TxContext};
pub use error::{Error, Result};
pub use events::TransitionLog;
pub use ledger::Ledger;
pub use store::{
    HistoryIter, KeyVersion, LedgerStore, MemoryStore, RocksStore, StoreTransaction, WorldState,
};
pub use types::{HistoryEntry, LoyaltyAccount, TransitionRecord, TransitionType};
