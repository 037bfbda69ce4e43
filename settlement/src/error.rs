//! Error types for settlement engine

use ledger_core::ParticipantId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger or storage error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Shares or payments failed validation; nothing was written
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error is a caller-facing rejection rather than a fault
    pub fn is_rejection(&self) -> bool {
        match self {
            Error::Validation(_) => true,
            Error::Ledger(err) => err.is_rejection(),
            _ => false,
        }
    }
}

/// Share and payment validation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Share amounts do not add up to the expense total
    #[error("Split amounts must total the expense amount: expected {expected}, got {actual}")]
    SplitSumMismatch {
        /// Expense total
        expected: Decimal,
        /// Sum of share amounts
        actual: Decimal,
    },

    /// Percentages do not add up to 100
    #[error("Percentage splits must total 100%, got {actual}%")]
    PercentageSumMismatch {
        /// Sum of percentages
        actual: Decimal,
    },

    /// Payments do not add up to the expense total
    #[error("Total payments must equal expense amount: expected {expected}, got {actual}")]
    PaymentSumMismatch {
        /// Expense total
        expected: Decimal,
        /// Sum of payments
        actual: Decimal,
    },

    /// A value that must not be negative was
    #[error("Negative value for {participant}: {value}")]
    NegativeValue {
        /// Offending participant
        participant: ParticipantId,
        /// Offending value
        value: Decimal,
    },

    /// Expense has no participants
    #[error("Expense has no participants")]
    EmptyRoster,

    /// Share or custom value names someone outside the roster
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),
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
