//! SplitSphere Ledger Core
//!
//! Shared data model, append-only settlement ledger and persistence
//! contract for the settlement engine.
//!
//! # Architecture
//!
//! - **Types**: participants, payments, shares, obligations, ledger entries
//! - **Ledger**: validates debt payments and manual settlements into postings
//! - **Storage**: atomic write batches plus the replication change queue
//! - **Metrics**: Prometheus counters in a private registry
//!
//! # Invariants
//!
//! - Append-only: ledger entries are never modified or deleted
//! - `0 <= settled_amount <= amount` for progress written by the ledger
//! - `is_fully_settled` iff `|amount - settled_amount| < 0.01`
//! - A posting is committed in one batch or not at all

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod ledger;
pub mod error;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    approx_eq, is_negligible, Currency, EntryKind, Expense, ExpenseId, LedgerEntry, Obligation,
    ObligationKey, ParticipantId, Payment, Share, SplitPolicy, EPSILON, HUNDRED,
};
pub use ledger::{ManualSettlementRequest, PaymentHistory, PaymentRequest, Posting, SettlementLedger};
pub use storage::{MemoryStore, SettlementStore, SyncAction, SyncChange, SyncTable, WriteBatch};
pub use metrics::Metrics;
