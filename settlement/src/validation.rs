//! Share and payment validation
//!
//! Runs after allocation and before persistence. A failure here means
//! nothing is written.

use crate::error::ValidationError;
use ledger_core::{approx_eq, ParticipantId, Payment, Share, SplitPolicy, HUNDRED};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Check shares against the expense total and policy.
///
/// Amounts must sum to the total for every policy; percentages must also
/// sum to 100 for PERCENTAGE. Shares must name roster members.
pub fn validate_shares(
    total: Decimal,
    policy: SplitPolicy,
    roster: &[ParticipantId],
    shares: &[Share],
) -> Result<(), ValidationError> {
    if shares.is_empty() {
        return Err(ValidationError::EmptyRoster);
    }

    for share in shares {
        if !roster.is_empty() && !roster.contains(&share.participant) {
            return Err(ValidationError::UnknownParticipant(share.participant.clone()));
        }
        if share.amount < Decimal::ZERO {
            return Err(ValidationError::NegativeValue {
                participant: share.participant.clone(),
                value: share.amount,
            });
        }
        if let Some(percentage) = share.percentage.filter(|p| *p < Decimal::ZERO) {
            return Err(ValidationError::NegativeValue {
                participant: share.participant.clone(),
                value: percentage,
            });
        }
    }

    if policy == SplitPolicy::Percentage {
        let actual = total_percentage(shares);
        if !approx_eq(actual, HUNDRED) {
            return Err(ValidationError::PercentageSumMismatch { actual });
        }
    }

    let actual = total_amount(shares);
    if !approx_eq(actual, total) {
        return Err(ValidationError::SplitSumMismatch {
            expected: total,
            actual,
        });
    }

    Ok(())
}

/// Check payments against the expense total.
///
/// An empty list is accepted; the caller substitutes a default payment.
pub fn validate_payments(total: Decimal, payments: &[Payment]) -> Result<(), ValidationError> {
    if payments.is_empty() {
        return Ok(());
    }

    if let Some(payment) = payments.iter().find(|p| p.amount < Decimal::ZERO) {
        return Err(ValidationError::NegativeValue {
            participant: payment.payer.clone(),
            value: payment.amount,
        });
    }

    let actual: Decimal = payments.iter().map(|p| p.amount).sum();
    if !approx_eq(actual, total) {
        return Err(ValidationError::PaymentSumMismatch {
            expected: total,
            actual,
        });
    }

    Ok(())
}

/// Check that custom split values only name roster members and are not negative
pub fn validate_custom_values(
    roster: &[ParticipantId],
    custom_values: &BTreeMap<ParticipantId, Decimal>,
) -> Result<(), ValidationError> {
    if roster.is_empty() {
        return Err(ValidationError::EmptyRoster);
    }

    for (participant, value) in custom_values {
        if !roster.contains(participant) {
            return Err(ValidationError::UnknownParticipant(participant.clone()));
        }
        if *value < Decimal::ZERO {
            return Err(ValidationError::NegativeValue {
                participant: participant.clone(),
                value: *value,
            });
        }
    }

    Ok(())
}

/// Sum of share amounts
pub fn total_amount(shares: &[Share]) -> Decimal {
    shares.iter().map(|s| s.amount).sum()
}

/// Sum of share percentages (missing = 0)
pub fn total_percentage(shares: &[Share]) -> Decimal {
    shares.iter().map(Share::percentage_or_zero).sum()
}
