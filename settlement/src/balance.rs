//! Per-participant balance summary across expenses

use ledger_core::{Currency, Expense, ParticipantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outstanding amounts in one currency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyBalance {
    /// Others owe the participant
    pub owed: Decimal,

    /// The participant owes others
    pub owing: Decimal,
}

impl CurrencyBalance {
    /// `owed − owing`
    pub fn net(&self) -> Decimal {
        self.owed - self.owing
    }

    fn is_empty(&self) -> bool {
        self.owed.is_zero() && self.owing.is_zero()
    }
}

/// Outstanding balances of one participant, by currency code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Participant
    pub participant: ParticipantId,

    /// Balances keyed by currency code
    pub by_currency: BTreeMap<String, CurrencyBalance>,
}

impl BalanceSummary {
    /// Sum what is still outstanding on every unsettled obligation
    /// involving `participant`
    pub fn for_participant<'a>(
        expenses: impl IntoIterator<Item = &'a Expense>,
        participant: &ParticipantId,
    ) -> Self {
        let mut by_currency: BTreeMap<String, CurrencyBalance> = BTreeMap::new();

        for expense in expenses {
            for obligation in expense.obligations.iter().filter(|o| !o.is_fully_settled) {
                let remaining = obligation.remaining();
                if &obligation.to == participant {
                    by_currency
                        .entry(expense.currency.code().to_string())
                        .or_default()
                        .owed += remaining;
                } else if &obligation.from == participant {
                    by_currency
                        .entry(expense.currency.code().to_string())
                        .or_default()
                        .owing += remaining;
                }
            }
        }

        by_currency.retain(|_, balance| !balance.is_empty());

        Self {
            participant: participant.clone(),
            by_currency,
        }
    }

    /// Balance in one currency, if anything is outstanding
    pub fn get(&self, currency: &Currency) -> Option<&CurrencyBalance> {
        self.by_currency.get(currency.code())
    }

    /// Whether nothing is outstanding
    pub fn is_settled(&self) -> bool {
        self.by_currency.is_empty()
    }
}
