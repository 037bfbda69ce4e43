//! Split allocation
//!
//! Turns a total amount, a split policy and an ordered roster into
//! per-participant shares.
//!
//! - **EQUAL**: every participant but the first gets `amount / n` rounded to
//!   the currency scale; the first absorbs the remainder so the sum is exact.
//! - **UNEQUAL**: caller-supplied amounts (missing = 0), not validated here.
//! - **PERCENTAGE**: `amount × percentage / 100`, percentages taken verbatim
//!   and not validated here.
//!
//! Sum checks for UNEQUAL and PERCENTAGE belong to [`crate::validation`],
//! which must run before anything is persisted.

use ledger_core::{ParticipantId, Share, SplitPolicy, HUNDRED};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

/// Share allocator
#[derive(Debug, Clone)]
pub struct SplitAllocator {
    /// Decimal places for equal shares
    currency_scale: u32,
}

impl Default for SplitAllocator {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SplitAllocator {
    /// Create new allocator
    pub fn new(currency_scale: u32) -> Self {
        Self { currency_scale }
    }

    /// Allocate shares for an ordered roster.
    ///
    /// Duplicate participants keep their first position. A single
    /// participant always gets the whole amount.
    pub fn allocate(
        &self,
        amount: Decimal,
        policy: SplitPolicy,
        participants: &[ParticipantId],
        custom_values: &BTreeMap<ParticipantId, Decimal>,
    ) -> Vec<Share> {
        let roster = dedup_roster(participants);

        match roster.as_slice() {
            [] => Vec::new(),
            [only] => vec![match policy {
                SplitPolicy::Percentage => Share::with_percentage(only.clone(), amount, HUNDRED),
                _ => Share::new(only.clone(), amount),
            }],
            _ => match policy {
                SplitPolicy::Equal => self.equal_shares(amount, &roster),
                SplitPolicy::Unequal => roster
                    .iter()
                    .map(|p| Share::new(p.clone(), custom_value(custom_values, p)))
                    .collect(),
                SplitPolicy::Percentage => roster
                    .iter()
                    .map(|p| {
                        let percentage = custom_value(custom_values, p);
                        Share::with_percentage(p.clone(), percentage_of(amount, percentage), percentage)
                    })
                    .collect(),
            },
        }
    }

    /// Recalculate shares after the expense total changed.
    ///
    /// EQUAL is re-allocated, PERCENTAGE keeps percentages, UNEQUAL scales
    /// every amount by `new / old`. Unchanged when the amounts are equal,
    /// there are no shares, or (UNEQUAL) the old amount is zero.
    pub fn rescale_on_amount_change(
        &self,
        old_amount: Decimal,
        new_amount: Decimal,
        shares: &[Share],
        policy: SplitPolicy,
    ) -> Vec<Share> {
        if old_amount == new_amount || shares.is_empty() {
            return shares.to_vec();
        }

        match policy {
            SplitPolicy::Equal => {
                let roster: Vec<ParticipantId> =
                    shares.iter().map(|s| s.participant.clone()).collect();
                self.allocate(new_amount, policy, &roster, &BTreeMap::new())
            }
            SplitPolicy::Percentage => shares
                .iter()
                .map(|s| Share {
                    amount: percentage_of(new_amount, s.percentage_or_zero()),
                    ..s.clone()
                })
                .collect(),
            SplitPolicy::Unequal => {
                if old_amount.is_zero() {
                    return shares.to_vec();
                }
                let ratio = new_amount / old_amount;
                shares
                    .iter()
                    .map(|s| Share {
                        amount: s.amount * ratio,
                        ..s.clone()
                    })
                    .collect()
            }
        }
    }

    fn equal_shares(&self, amount: Decimal, roster: &[ParticipantId]) -> Vec<Share> {
        let count = Decimal::from(roster.len() as u64);
        let per_head = (amount / count).round_dp(self.currency_scale);
        let remainder = amount - per_head * (count - Decimal::ONE);

        tracing::debug!(
            "Equal split of {} over {}: {} each, first gets {}",
            amount,
            roster.len(),
            per_head,
            remainder
        );

        roster
            .iter()
            .enumerate()
            .map(|(i, p)| Share::new(p.clone(), if i == 0 { remainder } else { per_head }))
            .collect()
    }
}

/// `amount × percentage / 100`
pub fn percentage_of(amount: Decimal, percentage: Decimal) -> Decimal {
    amount * percentage / HUNDRED
}

fn custom_value(values: &BTreeMap<ParticipantId, Decimal>, participant: &ParticipantId) -> Decimal {
    values.get(participant).copied().unwrap_or(Decimal::ZERO)
}

fn dedup_roster(participants: &[ParticipantId]) -> Vec<ParticipantId> {
    let mut seen = HashSet::new();
    let roster: Vec<ParticipantId> = participants
        .iter()
        .filter(|p| seen.insert(*p))
        .cloned()
        .collect();

    if roster.len() != participants.len() {
        tracing::warn!(
            "Dropped {} duplicate participants from roster",
            participants.len() - roster.len()
        );
    }

    roster
}
