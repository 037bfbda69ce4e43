//! Interactive share redistribution
//!
//! While a user edits one share at a time, the other shares absorb the
//! change so the aggregate stays at its target (100% or the expense
//! total). Shares the user already edited in the current session are left
//! alone whenever another share can absorb the change.
//!
//! The session (the set of hand-edited participants) is an explicit
//! [`EditSession`] value: it goes into [`InteractiveRedistributor::apply`]
//! and comes back, updated, in the [`Redistribution`].
//!
//! # Algorithm
//!
//! 1. Clamp the edited value to `[0, target]`
//! 2. Spread `target − Σ values` evenly over the untouched other
//!    participants (all other participants when every one is touched),
//!    flooring each at 0
//! 3. Push any residual onto the first adjusted participant; if that would
//!    go negative, carry the rest down the adjusted participants, then the
//!    remaining others
//!
//! When the shares summed to the target before the edit, the spread in
//! step 2 equals `old − new` for the edited participant.

use crate::split::percentage_of;
use ledger_core::{ParticipantId, Share, SplitPolicy, HUNDRED};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which share field is being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedistributionMode {
    /// Percentages, target 100; amounts follow the expense total
    Percentage,
    /// Amounts, target is the expense total
    Amount,
}

impl From<SplitPolicy> for RedistributionMode {
    fn from(policy: SplitPolicy) -> Self {
        match policy {
            SplitPolicy::Percentage => RedistributionMode::Percentage,
            SplitPolicy::Equal | SplitPolicy::Unequal => RedistributionMode::Amount,
        }
    }
}

/// Participants hand-edited in the current session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSession {
    policy: SplitPolicy,
    total: Decimal,
    roster: Vec<ParticipantId>,
    touched: BTreeSet<ParticipantId>,
}

impl EditSession {
    /// Fresh session for an expense form
    pub fn new(policy: SplitPolicy, total: Decimal, roster: Vec<ParticipantId>) -> Self {
        Self {
            policy,
            total,
            roster,
            touched: BTreeSet::new(),
        }
    }

    /// Carry the session into the current form state.
    ///
    /// A change of policy, total or roster starts over with nothing touched.
    pub fn sync(self, policy: SplitPolicy, total: Decimal, roster: &[ParticipantId]) -> Self {
        if self.policy == policy && self.total == total && self.roster == roster {
            return self;
        }

        tracing::debug!("Edit session reset ({} touched dropped)", self.touched.len());
        Self::new(policy, total, roster.to_vec())
    }

    /// Whether a participant was hand-edited
    pub fn is_touched(&self, participant: &ParticipantId) -> bool {
        self.touched.contains(participant)
    }

    /// Hand-edited participants
    pub fn touched(&self) -> &BTreeSet<ParticipantId> {
        &self.touched
    }

    /// Split policy of the form
    pub fn policy(&self) -> SplitPolicy {
        self.policy
    }

    /// Expense total of the form
    pub fn total(&self) -> Decimal {
        self.total
    }

    fn touch(mut self, participant: &ParticipantId) -> Self {
        self.touched.insert(participant.clone());
        self
    }
}

/// One user edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareEdit {
    /// Edited participant
    pub participant: ParticipantId,

    /// New percentage or amount
    pub value: Decimal,
}

impl ShareEdit {
    /// Create new edit
    pub fn new(participant: impl Into<ParticipantId>, value: Decimal) -> Self {
        Self {
            participant: participant.into(),
            value,
        }
    }
}

/// Shares after an edit, with the updated session
#[derive(Debug, Clone, PartialEq)]
pub struct Redistribution {
    /// Redistributed shares, in input order
    pub shares: Vec<Share>,

    /// Session including the edited participant
    pub session: EditSession,
}

/// Share redistributor for one expense form
#[derive(Debug, Clone)]
pub struct InteractiveRedistributor {
    mode: RedistributionMode,
    total: Decimal,
    currency_scale: u32,
}

impl InteractiveRedistributor {
    /// Edit percentages of an expense totalling `total`
    pub fn percentage(total: Decimal) -> Self {
        Self {
            mode: RedistributionMode::Percentage,
            total,
            currency_scale: 2,
        }
    }

    /// Edit amounts of an expense totalling `total`
    pub fn amount(total: Decimal) -> Self {
        Self {
            mode: RedistributionMode::Amount,
            total,
            currency_scale: 2,
        }
    }

    /// Redistributor matching an expense's split policy
    pub fn for_policy(policy: SplitPolicy, total: Decimal) -> Self {
        match RedistributionMode::from(policy) {
            RedistributionMode::Percentage => Self::percentage(total),
            RedistributionMode::Amount => Self::amount(total),
        }
    }

    /// Round spread values to `scale` decimal places
    pub fn with_scale(mut self, currency_scale: u32) -> Self {
        self.currency_scale = currency_scale;
        self
    }

    /// Editing mode
    pub fn mode(&self) -> RedistributionMode {
        self.mode
    }

    /// Aggregate every edit must preserve
    pub fn target(&self) -> Decimal {
        match self.mode {
            RedistributionMode::Percentage => HUNDRED,
            RedistributionMode::Amount => self.total,
        }
    }

    /// Apply one edit.
    ///
    /// Returns the input unchanged (session included) when the participant
    /// is unknown, when there is a single share, or when an amount edit
    /// has no positive total to preserve.
    pub fn apply(&self, shares: &[Share], edit: &ShareEdit, session: EditSession) -> Redistribution {
        let unchanged = |session: EditSession| Redistribution {
            shares: shares.to_vec(),
            session,
        };

        let Some(edited) = shares.iter().position(|s| s.participant == edit.participant) else {
            tracing::warn!("Edit for {} ignored: not in the split", edit.participant);
            return unchanged(session);
        };

        if shares.len() == 1 {
            return unchanged(session);
        }

        let target = self.target();
        if target <= Decimal::ZERO {
            return unchanged(session);
        }

        let mut values: Vec<Decimal> = shares.iter().map(|s| self.value_of(s)).collect();
        values[edited] = edit.value.clamp(Decimal::ZERO, target);

        let others: Vec<usize> = (0..shares.len()).filter(|i| *i != edited).collect();
        let untouched: Vec<usize> = others
            .iter()
            .copied()
            .filter(|i| !session.is_touched(&shares[*i].participant))
            .collect();
        let adjusted = if untouched.is_empty() { others.clone() } else { untouched };

        let spread = target - values.iter().copied().sum::<Decimal>();
        let per_share =
            (spread / Decimal::from(adjusted.len() as u64)).round_dp(self.currency_scale);
        for i in &adjusted {
            values[*i] = (values[*i] + per_share).max(Decimal::ZERO);
        }

        let residual = target - values.iter().copied().sum::<Decimal>();
        if !residual.is_zero() {
            // Adjusted participants first, then the rest of the others
            let order = adjusted
                .iter()
                .chain(others.iter().filter(|i| !adjusted.contains(*i)));
            let mut carry = residual;
            for i in order {
                let candidate = values[*i] + carry;
                if candidate >= Decimal::ZERO {
                    values[*i] = candidate;
                    carry = Decimal::ZERO;
                    break;
                }
                carry = candidate;
                values[*i] = Decimal::ZERO;
            }
            if !carry.is_zero() {
                tracing::warn!("Redistribution left {} unassigned", carry);
            }
        }

        tracing::debug!(
            "Redistributed edit of {} to {} over {} shares",
            edit.participant,
            values[edited],
            adjusted.len()
        );

        Redistribution {
            shares: shares
                .iter()
                .zip(values)
                .map(|(share, value)| self.with_value(share, value))
                .collect(),
            session: session.touch(&edit.participant),
        }
    }

    fn value_of(&self, share: &Share) -> Decimal {
        match self.mode {
            RedistributionMode::Percentage => share.percentage_or_zero(),
            RedistributionMode::Amount => share.amount,
        }
    }

    fn with_value(&self, share: &Share, value: Decimal) -> Share {
        match self.mode {
            RedistributionMode::Percentage => Share::with_percentage(
                share.participant.clone(),
                percentage_of(self.total, value),
                value,
            ),
            RedistributionMode::Amount => Share {
                amount: value,
                ..share.clone()
            },
        }
    }
}

/// Percentage left for `exclude` once every other share is counted,
/// never below zero
pub fn remaining_percentage(shares: &[Share], exclude: Option<&ParticipantId>) -> Decimal {
    let others: Decimal = shares
        .iter()
        .filter(|s| Some(&s.participant) != exclude)
        .map(Share::percentage_or_zero)
        .sum();

    (HUNDRED - others).max(Decimal::ZERO)
}

/// Give the remaining percentage, split evenly, to every share other than
/// `exclude` that has no percentage yet.
///
/// Only percentages are filled in; amounts are left to the caller.
pub fn distribute_remaining_percentage(shares: &[Share], exclude: Option<&ParticipantId>) -> Vec<Share> {
    let remaining = remaining_percentage(shares, exclude);
    if remaining <= Decimal::ZERO {
        return shares.to_vec();
    }

    let eligible = |share: &Share| Some(&share.participant) != exclude && share.percentage_or_zero().is_zero();
    let count = shares.iter().filter(|s| eligible(s)).count();
    if count == 0 {
        return shares.to_vec();
    }

    let each = remaining / Decimal::from(count as u64);
    shares
        .iter()
        .map(|share| {
            if eligible(share) {
                Share {
                    percentage: Some(each),
                    ..share.clone()
                }
            } else {
                share.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn roster() -> Vec<ParticipantId> {
        vec!["A".into(), "B".into(), "C".into()]
    }

    fn pct_shares(values: &[(&str, Decimal)]) -> Vec<Share> {
        values
            .iter()
            .map(|(p, v)| Share::with_percentage(*p, *v, *v))
            .collect()
    }

    fn percentages(shares: &[Share]) -> Vec<Decimal> {
        shares.iter().map(Share::percentage_or_zero).collect()
    }

    fn session() -> EditSession {
        EditSession::new(SplitPolicy::Percentage, dec!(100), roster())
    }

    #[test]
    fn test_first_edit_spreads_over_untouched() {
        let redistributor = InteractiveRedistributor::percentage(dec!(100));
        let shares = pct_shares(&[("A", dec!(0)), ("B", dec!(0)), ("C", dec!(0))]);

        let result = redistributor.apply(&shares, &ShareEdit::new("A", dec!(40)), session());

        assert_eq!(percentages(&result.shares), vec![dec!(40), dec!(30), dec!(30)]);
        assert!(result.session.is_touched(&"A".into()));
        assert!(!result.session.is_touched(&"B".into()));
    }

    #[test]
    fn test_touched_shares_kept() {
        let redistributor = InteractiveRedistributor::percentage(dec!(200));
        let shares = pct_shares(&[("A", dec!(0)), ("B", dec!(0)), ("C", dec!(0))]);

        let first = redistributor.apply(&shares, &ShareEdit::new("A", dec!(40)), session());
        let second = redistributor.apply(&first.shares, &ShareEdit::new("B", dec!(50)), first.session);

        assert_eq!(percentages(&second.shares), vec![dec!(40), dec!(50), dec!(10)]);
        // Amounts follow the expense total
        assert_eq!(second.shares[1].amount, dec!(100));
        assert_eq!(second.session.touched().len(), 2);
    }

    #[test]
    fn test_all_touched_falls_back_to_everyone() {
        let redistributor = InteractiveRedistributor::amount(dec!(90));
        let shares = vec![
            Share::new("A", dec!(30)),
            Share::new("B", dec!(30)),
            Share::new("C", dec!(30)),
        ];

        let mut state = EditSession::new(SplitPolicy::Unequal, dec!(90), roster());
        let mut current = shares;
        for (participant, value) in [("A", dec!(30)), ("B", dec!(30))] {
            let result = redistributor.apply(&current, &ShareEdit::new(participant, value), state);
            current = result.shares;
            state = result.session;
        }

        let result = redistributor.apply(&current, &ShareEdit::new("C", dec!(10)), state);
        let amounts: Vec<Decimal> = result.shares.iter().map(|s| s.amount).collect();
        assert_eq!(amounts, vec![dec!(40), dec!(40), dec!(10)]);
    }

    #[test]
    fn test_clamped_and_floored() {
        let redistributor = InteractiveRedistributor::percentage(dec!(100));
        let shares = pct_shares(&[("A", dec!(20)), ("B", dec!(40)), ("C", dec!(40))]);

        let result = redistributor.apply(&shares, &ShareEdit::new("A", dec!(150)), session());
        assert_eq!(percentages(&result.shares), vec![dec!(100), dec!(0), dec!(0)]);

        let result = redistributor.apply(&shares, &ShareEdit::new("A", dec!(-5)), session());
        assert_eq!(percentages(&result.shares), vec![dec!(0), dec!(50), dec!(50)]);
    }

    #[test]
    fn test_residual_goes_to_first_adjusted() {
        let redistributor = InteractiveRedistributor::percentage(dec!(100));
        let shares = pct_shares(&[("A", dec!(0)), ("B", dec!(0)), ("C", dec!(0)), ("D", dec!(0))]);

        let result = redistributor.apply(&shares, &ShareEdit::new("A", dec!(0)), session());
        // 100 / 3 = 33.33 each, first adjusted takes the extra 0.01
        assert_eq!(
            percentages(&result.shares),
            vec![dec!(0), dec!(33.34), dec!(33.33), dec!(33.33)]
        );
    }

    #[test]
    fn test_negative_residual_carried() {
        let redistributor = InteractiveRedistributor::percentage(dec!(100));
        let shares = pct_shares(&[("A", dec!(10)), ("B", dec!(0)), ("C", dec!(90))]);

        // Spread of -5 each: B floors at 0, so C absorbs the rest
        let result = redistributor.apply(&shares, &ShareEdit::new("A", dec!(20)), session());
        let values = percentages(&result.shares);
        assert_eq!(values, vec![dec!(20), dec!(0), dec!(80)]);
        assert_eq!(values.iter().copied().sum::<Decimal>(), dec!(100));
    }

    #[test]
    fn test_degenerate_inputs_unchanged() {
        let single = pct_shares(&[("A", dec!(100))]);
        let redistributor = InteractiveRedistributor::percentage(dec!(10));
        let result = redistributor.apply(&single, &ShareEdit::new("A", dec!(30)), session());
        assert_eq!(result.shares, single);
        assert!(result.session.touched().is_empty());

        let shares = vec![Share::new("A", dec!(0)), Share::new("B", dec!(0))];
        let zero_total = InteractiveRedistributor::amount(dec!(0));
        let result = zero_total.apply(&shares, &ShareEdit::new("A", dec!(5)), session());
        assert_eq!(result.shares, shares);

        let result = zero_total.apply(&shares, &ShareEdit::new("Z", dec!(5)), session());
        assert_eq!(result.shares, shares);
    }

    #[test]
    fn test_session_reset_on_form_change() {
        let redistributor = InteractiveRedistributor::percentage(dec!(100));
        let shares = pct_shares(&[("A", dec!(0)), ("B", dec!(0)), ("C", dec!(0))]);
        let result = redistributor.apply(&shares, &ShareEdit::new("A", dec!(40)), session());

        let kept = result.session.clone().sync(SplitPolicy::Percentage, dec!(100), &roster());
        assert_eq!(kept.touched().len(), 1);

        let reset = result.session.clone().sync(SplitPolicy::Percentage, dec!(120), &roster());
        assert!(reset.touched().is_empty());

        let reset = result.session.sync(SplitPolicy::Equal, dec!(100), &roster());
        assert!(reset.touched().is_empty());
        assert_eq!(reset.policy(), SplitPolicy::Equal);
    }

    #[test]
    fn test_remaining_percentage() {
        let shares = vec![
            Share::with_percentage("A", dec!(0), dec!(30)),
            Share::with_percentage("B", dec!(0), dec!(50)),
            Share::new("C", dec!(0)),
        ];

        assert_eq!(remaining_percentage(&shares, None), dec!(20));
        assert_eq!(remaining_percentage(&shares, Some(&"B".into())), dec!(70));

        let over = vec![
            Share::with_percentage("A", dec!(0), dec!(80)),
            Share::with_percentage("B", dec!(0), dec!(40)),
        ];
        assert_eq!(remaining_percentage(&over, None), dec!(0));
    }

    #[test]
    fn test_distribute_remaining_percentage() {
        let shares = vec![
            Share::with_percentage("A", dec!(0), dec!(40)),
            Share::new("B", dec!(0)),
            Share::new("C", dec!(0)),
        ];

        let filled = distribute_remaining_percentage(&shares, None);
        assert_eq!(percentages(&filled), vec![dec!(40), dec!(30), dec!(30)]);

        let filled = distribute_remaining_percentage(&shares, Some(&"C".into()));
        assert_eq!(percentages(&filled), vec![dec!(40), dec!(60), dec!(0)]);

        let full = pct_shares(&[("A", dec!(60)), ("B", dec!(40))]);
        assert_eq!(distribute_remaining_percentage(&full, None), full);
    }
}
