//! Settlement Engine
//!
//! Splits shared expenses, nets them into pairwise obligations and tracks
//! debt payments against those obligations.
//!
//! # Architecture
//!
//! Saving an expense runs one pipeline:
//!
//! 1. **Allocation**: total + policy + roster → shares
//! 2. **Validation**: shares and payments must add up before anything is written
//! 3. **Netting**: payments + shares → who owes whom
//! 4. **Merge**: progress carried over from the previous obligations by `(from, to)`
//! 5. **Commit**: the expense and its sync-queue change, atomically
//!
//! Debt payments and manual settlements go through the ledger in
//! `ledger-core` and are committed together with the obligations they
//! update.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use ledger_core::{MemoryStore, SplitPolicy};
//! use rust_decimal::Decimal;
//! use settlement::{Config, ExpenseDraft, SettlementEngine, ShareSource};
//!
//! let mut engine = SettlementEngine::open(MemoryStore::new(), Config::default())?;
//!
//! let expense = engine.save_expense(ExpenseDraft {
//!     id: None,
//!     name: "Groceries".to_string(),
//!     amount: Decimal::from(300),
//!     currency: None,
//!     paid_by: "A".into(),
//!     payments: vec![],
//!     split_policy: SplitPolicy::Equal,
//!     participants: vec!["A".into(), "B".into(), "C".into()],
//!     shares: ShareSource::default(),
//!     date: NaiveDate::from_ymd_opt(2024, 3, 19).unwrap(),
//!     group_id: None,
//!     description: None,
//! })?;
//!
//! // B and C each owe A 100
//! assert_eq!(expense.obligations.len(), 2);
//! # Ok::<(), settlement::Error>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod split;
pub mod validation;
pub mod netting;
pub mod merge;
pub mod redistribute;
pub mod balance;
pub mod directory;
pub mod error;
pub mod config;
pub mod engine;

// Re-exports
pub use error::{Error, Result, ValidationError};
pub use types::*;
pub use config::Config;
pub use split::SplitAllocator;
pub use netting::DebtNettingEngine;
pub use merge::{MergeOutcome, SettlementMerger};
pub use redistribute::{
    distribute_remaining_percentage, remaining_percentage, EditSession, InteractiveRedistributor,
    Redistribution, RedistributionMode, ShareEdit,
};
pub use balance::{BalanceSummary, CurrencyBalance};
pub use directory::{Participant, ParticipantDirectory};
pub use engine::SettlementEngine;
