//! Error types for the ledger

use crate::types::Currency;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Payment amount is zero or negative
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Payment would push the total paid past the obligation amount
    #[error(
        "Payment of {attempted} exceeds remaining balance: {already_paid} already paid of {obligation_amount}"
    )]
    ExceedsRemaining {
        /// Sum of earlier entries counted against the obligation
        already_paid: Decimal,
        /// Rejected payment amount
        attempted: Decimal,
        /// Obligation amount
        obligation_amount: Decimal,
    },

    /// Obligation is already fully settled
    #[error("Obligation already settled: {0}")]
    AlreadySettled(String),

    /// Request currency differs from the expense currency
    #[error("Currency mismatch on expense {expense}: expense is {expected}, request is {actual}")]
    CurrencyMismatch {
        /// Targeted expense
        expense: String,
        /// Expense currency
        expected: Currency,
        /// Request currency
        actual: Currency,
    },

    /// No obligation between the pair
    #[error("Obligation not found: {0}")]
    ObligationNotFound(String),

    /// Expense not found
    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    /// Ledger entry ID already appended
    #[error("Duplicate ledger entry: {0}")]
    DuplicateEntry(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error is a business rejection (nothing was mutated)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::ExceedsRemaining { .. }
                | Error::AlreadySettled(_)
                | Error::CurrencyMismatch { .. }
                | Error::ObligationNotFound(_)
        )
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
