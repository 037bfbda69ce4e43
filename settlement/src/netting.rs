//! Debt netting
//!
//! Reduces an expense's payments and shares to pairwise obligations.
//!
//! # Algorithm
//!
//! 1. Net position per participant: Σ paid − Σ owed
//! 2. Split into creditors (> 0.01) and debtors (< −0.01); the rest drop out
//! 3. Sort both by absolute position, largest first; ties keep the order in
//!    which participants were first seen (payments, then shares)
//! 4. Greedy matching: the largest creditor is paired with the largest
//!    remaining debtor until its credit is exhausted, then the next creditor
//!
//! # Example
//!
//! ```text
//! Payments: A paid 300
//! Shares:   A 100, B 100, C 100
//!
//! Net positions:
//!   A: +200 (creditor)
//!   B: -100 (debtor)
//!   C: -100 (debtor)
//!
//! Obligations:
//!   B owes A 100
//!   C owes A 100
//! ```
//!
//! The result settles every balance but is not guaranteed to use the
//! fewest possible transfers.

use crate::types::{NettingStats, ParticipantPosition};
use ledger_core::{Obligation, ParticipantId, Payment, Share, EPSILON};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Netting engine
#[derive(Debug, Clone, Default)]
pub struct DebtNettingEngine;

impl DebtNettingEngine {
    /// Create new netting engine
    pub fn new() -> Self {
        Self
    }

    /// Compute obligations for one expense.
    ///
    /// Every obligation starts with no progress. No payments means no
    /// obligations.
    pub fn compute(&self, payments: &[Payment], shares: &[Share]) -> Vec<Obligation> {
        if payments.is_empty() {
            return Vec::new();
        }

        let positions = self.calculate_net_positions(payments, shares);
        let obligations = self.generate_obligations(&positions);

        tracing::debug!(
            "Netted {} payments and {} shares into {} obligations",
            payments.len(),
            shares.len(),
            obligations.len()
        );

        obligations
    }

    /// Net positions in first-seen order (payments first, then shares)
    pub fn calculate_net_positions(
        &self,
        payments: &[Payment],
        shares: &[Share],
    ) -> Vec<ParticipantPosition> {
        let mut positions: Vec<ParticipantPosition> = Vec::new();
        let mut index: HashMap<ParticipantId, usize> = HashMap::new();

        let mut position_of = |participant: &ParticipantId| -> usize {
            *index.entry(participant.clone()).or_insert_with(|| {
                positions.push(ParticipantPosition::new(participant.clone()));
                positions.len() - 1
            })
        };

        // Resolve slots first so the closure's borrow ends before mutation
        let payment_slots: Vec<usize> = payments.iter().map(|p| position_of(&p.payer)).collect();
        let share_slots: Vec<usize> = shares.iter().map(|s| position_of(&s.participant)).collect();

        for (payment, slot) in payments.iter().zip(payment_slots) {
            positions[slot].add_payment(payment.amount);
        }
        for (share, slot) in shares.iter().zip(share_slots) {
            positions[slot].add_share(share.amount);
        }

        positions
    }

    /// Summary of a netting result
    pub fn stats(&self, positions: &[ParticipantPosition], obligations: &[Obligation]) -> NettingStats {
        NettingStats {
            participant_count: positions
                .iter()
                .filter(|p| p.abs_net_position() > EPSILON)
                .count(),
            obligation_count: obligations.len(),
            total_owed: obligations.iter().map(|o| o.amount).sum(),
        }
    }

    /// Greedy creditor/debtor matching
    fn generate_obligations(&self, positions: &[ParticipantPosition]) -> Vec<Obligation> {
        let mut creditors: Vec<(&ParticipantId, Decimal)> = positions
            .iter()
            .filter(|p| p.net_position > EPSILON)
            .map(|p| (&p.participant, p.abs_net_position()))
            .collect();

        let mut debtors: Vec<(&ParticipantId, Decimal)> = positions
            .iter()
            .filter(|p| p.net_position < -EPSILON)
            .map(|p| (&p.participant, p.abs_net_position()))
            .collect();

        // Stable sort: ties keep first-seen order
        creditors.sort_by(|a, b| b.1.cmp(&a.1));
        debtors.sort_by(|a, b| b.1.cmp(&a.1));

        let mut obligations = Vec::new();
        let mut next_debtor = 0;

        for (creditor, credit) in creditors {
            let mut remaining_credit = credit;

            while remaining_credit >= EPSILON && next_debtor < debtors.len() {
                let (debtor, remaining_debt) = &mut debtors[next_debtor];
                let amount = remaining_credit.min(*remaining_debt);

                obligations.push(Obligation::new((*debtor).clone(), creditor.clone(), amount));

                remaining_credit -= amount;
                *remaining_debt -= amount;

                if *remaining_debt < EPSILON {
                    next_debtor += 1;
                }
            }
        }

        obligations
    }
}
