//! Core types for settlement engine

use chrono::NaiveDate;
use ledger_core::{Currency, ExpenseId, ParticipantId, Payment, Share, SplitPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an expense's shares come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ShareSource {
    /// Derive shares from the policy and optional per-participant values
    /// (amounts for UNEQUAL, percentages for PERCENTAGE)
    Allocate {
        /// Per-participant custom values
        #[serde(default)]
        custom_values: BTreeMap<ParticipantId, Decimal>,
    },

    /// Shares already edited by the caller (e.g. through the interactive
    /// redistributor); used verbatim
    Explicit {
        /// Shares to persist
        shares: Vec<Share>,
    },
}

impl Default for ShareSource {
    fn default() -> Self {
        ShareSource::Allocate {
            custom_values: BTreeMap::new(),
        }
    }
}

/// An expense as submitted for creation or edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseDraft {
    /// Existing expense to replace; `None` creates a new one
    #[serde(default)]
    pub id: Option<ExpenseId>,

    /// Display name
    pub name: String,

    /// Total amount
    pub amount: Decimal,

    /// Currency code; the configured default when absent
    #[serde(default)]
    pub currency: Option<Currency>,

    /// Participant recording the expense
    pub paid_by: ParticipantId,

    /// Who paid; empty means `paid_by` paid everything
    #[serde(default)]
    pub payments: Vec<Payment>,

    /// Split policy
    pub split_policy: SplitPolicy,

    /// Ordered participant roster
    pub participants: Vec<ParticipantId>,

    /// Share derivation
    #[serde(default)]
    pub shares: ShareSource,

    /// Expense date
    pub date: NaiveDate,

    /// Owning group
    #[serde(default)]
    pub group_id: Option<String>,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

/// Net position of one participant for an expense
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantPosition {
    /// Participant
    pub participant: ParticipantId,

    /// Total paid
    pub total_paid: Decimal,

    /// Total owed (sum of shares)
    pub total_owed: Decimal,

    /// Net position (positive = creditor, negative = debtor)
    pub net_position: Decimal,
}

impl ParticipantPosition {
    /// Create new position
    pub fn new(participant: ParticipantId) -> Self {
        Self {
            participant,
            total_paid: Decimal::ZERO,
            total_owed: Decimal::ZERO,
            net_position: Decimal::ZERO,
        }
    }

    /// Add a payment
    pub fn add_payment(&mut self, amount: Decimal) {
        self.total_paid += amount;
        self.net_position = self.total_paid - self.total_owed;
    }

    /// Add a share
    pub fn add_share(&mut self, amount: Decimal) {
        self.total_owed += amount;
        self.net_position = self.total_paid - self.total_owed;
    }

    /// Get absolute net position
    pub fn abs_net_position(&self) -> Decimal {
        self.net_position.abs()
    }
}

/// Netting statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NettingStats {
    /// Participants with a non-negligible balance
    pub participant_count: usize,

    /// Obligations emitted
    pub obligation_count: usize,

    /// Sum of obligation amounts
    pub total_owed: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_participant_position() {
        let mut position = ParticipantPosition::new("A".into());

        position.add_share(dec!(100));
        assert_eq!(position.net_position, dec!(-100));

        position.add_payment(dec!(300));
        assert_eq!(position.net_position, dec!(200));
        assert_eq!(position.abs_net_position(), dec!(200));
    }

    #[test]
    fn test_draft_from_json() {
        let draft: ExpenseDraft = serde_json::from_str(
            r#"{
                "name": "Movie Night",
                "amount": "60",
                "paid_by": "1",
                "split_policy": "PERCENTAGE",
                "participants": ["1", "2", "3"],
                "shares": { "mode": "allocate", "custom_values": { "1": "50", "2": "25", "3": "25" } },
                "date": "2024-03-19"
            }"#,
        )
        .unwrap();

        assert_eq!(draft.split_policy, SplitPolicy::Percentage);
        assert!(draft.payments.is_empty());
        match draft.shares {
            ShareSource::Allocate { custom_values } => {
                assert_eq!(custom_values[&ParticipantId::new("1")], dec!(50));
            }
            other => panic!("unexpected share source: {:?}", other),
        }
    }
}
