//! Obligation merge
//!
//! Re-netting an edited expense yields fresh obligations with no progress.
//! The merger carries progress over from the previous obligation set by
//! `(from, to)` key:
//!
//! - matched: `settled_amount` and `is_fully_settled` copied verbatim,
//!   even when the new amount is smaller than what was already settled
//! - unmatched fresh: start at zero
//! - prior keys that no longer appear: dropped

use crate::netting::DebtNettingEngine;
use ledger_core::{Obligation, ObligationKey, Payment, Share};
use std::collections::HashMap;

/// Result of a merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Merged obligations, in netting order
    pub obligations: Vec<Obligation>,

    /// Fresh obligations that inherited progress
    pub carried: usize,

    /// Prior obligations with no fresh counterpart
    pub dropped: Vec<ObligationKey>,
}

impl MergeOutcome {
    /// Whether any carried obligation now has more settled than owed
    pub fn has_overpaid(&self) -> bool {
        self.obligations
            .iter()
            .any(|o| o.settled_amount > o.amount)
    }
}

/// Obligation merger
#[derive(Debug, Clone, Default)]
pub struct SettlementMerger {
    netting: DebtNettingEngine,
}

impl SettlementMerger {
    /// Create new merger
    pub fn new(netting: DebtNettingEngine) -> Self {
        Self { netting }
    }

    /// Net payments and shares, then merge with the prior obligations
    pub fn recompute(&self, payments: &[Payment], shares: &[Share], prior: &[Obligation]) -> MergeOutcome {
        let fresh = self.netting.compute(payments, shares);
        self.merge(fresh, prior)
    }

    /// Carry progress from `prior` onto `fresh`
    pub fn merge(&self, fresh: Vec<Obligation>, prior: &[Obligation]) -> MergeOutcome {
        let mut by_key: HashMap<ObligationKey, &Obligation> =
            prior.iter().map(|o| (o.key(), o)).collect();

        let mut carried = 0;
        let obligations: Vec<Obligation> = fresh
            .into_iter()
            .map(|mut obligation| {
                if let Some(previous) = by_key.remove(&obligation.key()) {
                    obligation.settled_amount = previous.settled_amount;
                    obligation.is_fully_settled = previous.is_fully_settled;
                    carried += 1;
                }
                obligation
            })
            .collect();

        // Whatever is left was not matched
        let mut dropped: Vec<ObligationKey> = by_key.into_keys().collect();
        dropped.sort();

        let outcome = MergeOutcome {
            obligations,
            carried,
            dropped,
        };

        tracing::debug!(
            "Merged {} obligations ({} carried, {} dropped)",
            outcome.obligations.len(),
            outcome.carried,
            outcome.dropped.len()
        );

        if outcome.has_overpaid() {
            tracing::warn!("Merged obligations carry more progress than their new amount");
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn progressed(from: &str, to: &str, amount: rust_decimal::Decimal, settled: rust_decimal::Decimal) -> Obligation {
        let mut obligation = Obligation::new(from, to, amount);
        obligation.apply_payment(settled);
        obligation
    }

    #[test]
    fn test_progress_carried_to_larger_amount() {
        let merger = SettlementMerger::default();
        let prior = vec![progressed("B", "A", dec!(100), dec!(40))];

        let outcome = merger.merge(vec![Obligation::new("B", "A", dec!(150))], &prior);

        assert_eq!(outcome.obligations.len(), 1);
        let merged = &outcome.obligations[0];
        assert_eq!(merged.amount, dec!(150));
        assert_eq!(merged.settled_amount, dec!(40));
        assert!(!merged.is_fully_settled);
        assert_eq!(outcome.carried, 1);
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn test_overpaid_progress_not_revalidated() {
        let merger = SettlementMerger::default();
        let prior = vec![progressed("B", "A", dec!(100), dec!(100))];

        let outcome = merger.merge(vec![Obligation::new("B", "A", dec!(60))], &prior);

        let merged = &outcome.obligations[0];
        assert_eq!(merged.settled_amount, dec!(100));
        assert!(merged.is_fully_settled);
        assert!(outcome.has_overpaid());
    }

    #[test]
    fn test_new_and_dropped_keys() {
        let merger = SettlementMerger::default();
        let prior = vec![
            progressed("B", "A", dec!(50), dec!(10)),
            progressed("C", "A", dec!(50), dec!(20)),
        ];

        let outcome = merger.merge(
            vec![Obligation::new("B", "A", dec!(50)), Obligation::new("D", "A", dec!(25))],
            &prior,
        );

        assert_eq!(outcome.obligations[0].settled_amount, dec!(10));
        assert_eq!(outcome.obligations[1].settled_amount, dec!(0));
        assert!(!outcome.obligations[1].is_fully_settled);
        assert_eq!(outcome.dropped, vec![ObligationKey::new("C", "A")]);
    }

    #[test]
    fn test_direction_matters() {
        let merger = SettlementMerger::default();
        let prior = vec![progressed("A", "B", dec!(50), dec!(50))];

        let outcome = merger.merge(vec![Obligation::new("B", "A", dec!(50))], &prior);

        assert_eq!(outcome.obligations[0].settled_amount, dec!(0));
        assert_eq!(outcome.carried, 0);
        assert_eq!(outcome.dropped, vec![ObligationKey::new("A", "B")]);
    }

    #[test]
    fn test_recompute() {
        let merger = SettlementMerger::default();
        let prior = vec![progressed("B", "A", dec!(100), dec!(40))];

        let outcome = merger.recompute(
            &[Payment::new("A", dec!(450))],
            &[
                Share::new("A", dec!(150)),
                Share::new("B", dec!(150)),
                Share::new("C", dec!(150)),
            ],
            &prior,
        );

        assert_eq!(outcome.obligations.len(), 2);
        assert_eq!(outcome.obligations[0].key(), ObligationKey::new("B", "A"));
        assert_eq!(outcome.obligations[0].amount, dec!(150));
        assert_eq!(outcome.obligations[0].settled_amount, dec!(40));
        assert_eq!(outcome.obligations[1].settled_amount, dec!(0));
    }
}
