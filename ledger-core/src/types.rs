//! Core types shared by the ledger and the settlement engine
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for money and percentages)
//! - Serde round-tripping for the persisted store and the sync queue
//! - Cheap cloning of identifiers

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tolerance used for every currency-equality comparison (0.01 units).
pub const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// One hundred percent.
pub const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// `|a - b| < EPSILON`
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < EPSILON
}

/// `|value| < EPSILON`
pub fn is_negligible(value: Decimal) -> bool {
    value.abs() < EPSILON
}

/// Participant identifier (opaque)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create new participant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Expense identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(Uuid);

impl ExpenseId {
    /// Generate a fresh, time-ordered ID
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency code, carried through untouched.
///
/// No conversion or formatting happens in the engine; the code is only
/// used to group balances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create from a code such as `"USD"`
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Code as given
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an expense total is divided among participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitPolicy {
    /// Same share for everyone
    Equal,
    /// Caller-supplied amounts
    Unequal,
    /// Caller-supplied percentages
    Percentage,
}

impl fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SplitPolicy::Equal => "EQUAL",
            SplitPolicy::Unequal => "UNEQUAL",
            SplitPolicy::Percentage => "PERCENTAGE",
        };
        f.write_str(name)
    }
}

/// Money actually transferred by a participant for an expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Who paid
    pub payer: ParticipantId,

    /// How much
    pub amount: Decimal,
}

impl Payment {
    /// Create new payment
    pub fn new(payer: impl Into<ParticipantId>, amount: Decimal) -> Self {
        Self {
            payer: payer.into(),
            amount,
        }
    }
}

/// A participant's owed portion of an expense (a.k.a. split)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Who owes it
    pub participant: ParticipantId,

    /// Owed amount
    pub amount: Decimal,

    /// Percentage of the total, for percentage splits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<Decimal>,
}

impl Share {
    /// Share with an amount only
    pub fn new(participant: impl Into<ParticipantId>, amount: Decimal) -> Self {
        Self {
            participant: participant.into(),
            amount,
            percentage: None,
        }
    }

    /// Share carrying a percentage
    pub fn with_percentage(
        participant: impl Into<ParticipantId>,
        amount: Decimal,
        percentage: Decimal,
    ) -> Self {
        Self {
            participant: participant.into(),
            amount,
            percentage: Some(percentage),
        }
    }

    /// Percentage, treating a missing value as zero
    pub fn percentage_or_zero(&self) -> Decimal {
        self.percentage.unwrap_or(Decimal::ZERO)
    }
}

/// Identity key of an obligation inside one expense
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObligationKey {
    /// Debtor
    pub from: ParticipantId,

    /// Creditor
    pub to: ParticipantId,
}

impl ObligationKey {
    /// Create new key
    pub fn new(from: impl Into<ParticipantId>, to: impl Into<ParticipantId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for ObligationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.from, self.to)
    }
}

/// A directed debt between two participants with partial-payment progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    /// Debtor (pays)
    pub from: ParticipantId,

    /// Creditor (receives)
    pub to: ParticipantId,

    /// Amount owed
    pub amount: Decimal,

    /// Amount paid so far
    #[serde(default)]
    pub settled_amount: Decimal,

    /// Whether the obligation has been paid off
    #[serde(default)]
    pub is_fully_settled: bool,
}

impl Obligation {
    /// Fresh obligation with no progress
    pub fn new(
        from: impl Into<ParticipantId>,
        to: impl Into<ParticipantId>,
        amount: Decimal,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            settled_amount: Decimal::ZERO,
            is_fully_settled: false,
        }
    }

    /// Identity key
    pub fn key(&self) -> ObligationKey {
        ObligationKey {
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }

    /// Whether this obligation is between `from` and `to`, in that direction
    pub fn is_between(&self, from: &ParticipantId, to: &ParticipantId) -> bool {
        &self.from == from && &self.to == to
    }

    /// Amount still owed (may be negative if progress outgrew the amount)
    pub fn remaining(&self) -> Decimal {
        self.amount - self.settled_amount
    }

    /// Add a payment to the progress and recompute the settled flag
    pub fn apply_payment(&mut self, amount: Decimal) {
        self.settled_amount += amount;
        self.is_fully_settled = approx_eq(self.settled_amount, self.amount);
    }

    /// Force the obligation to settled
    pub fn mark_settled(&mut self) {
        self.settled_amount = self.amount;
        self.is_fully_settled = true;
    }
}

/// A shared expense as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Expense ID
    pub id: ExpenseId,

    /// Display name
    pub name: String,

    /// Total amount
    pub amount: Decimal,

    /// Currency code
    pub currency: Currency,

    /// Participant who recorded the expense
    pub paid_by: ParticipantId,

    /// Who actually paid
    pub payments: Vec<Payment>,

    /// Who owes what
    pub shares: Vec<Share>,

    /// How the shares were derived
    pub split_policy: SplitPolicy,

    /// Who owes whom, with progress
    pub obligations: Vec<Obligation>,

    /// Expense date
    pub date: NaiveDate,

    /// Owning group, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Last modification
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    /// Obligation for the ordered pair, if any
    pub fn obligation(&self, from: &ParticipantId, to: &ParticipantId) -> Option<&Obligation> {
        self.obligations.iter().find(|o| o.is_between(from, to))
    }

    /// Mutable obligation for the ordered pair, if any
    pub fn obligation_mut(
        &mut self,
        from: &ParticipantId,
        to: &ParticipantId,
    ) -> Option<&mut Obligation> {
        self.obligations.iter_mut().find(|o| o.is_between(from, to))
    }
}

/// How a ledger entry came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Debt payment recorded against the remaining balance
    Payment,
    /// Out-of-band confirmation; progress was forced to settled
    ManualSettlement,
}

/// Immutable record of one debt-payment event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// Debtor (pays)
    pub from: ParticipantId,

    /// Creditor (receives)
    pub to: ParticipantId,

    /// Amount paid
    pub amount: Decimal,

    /// Currency code
    pub currency: Currency,

    /// Payment date
    pub date: NaiveDate,

    /// Optional note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Expenses whose `from → to` obligations this entry pays.
    /// Empty means the entry applies to every obligation between the pair.
    #[serde(default)]
    pub related_expense_ids: Vec<ExpenseId>,

    /// Entry kind
    pub kind: EntryKind,

    /// When the entry was appended
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether this entry counts toward an obligation scoped to `expense_ids`
    pub fn overlaps(&self, expense_ids: &[ExpenseId]) -> bool {
        expense_ids.is_empty()
            || self.related_expense_ids.is_empty()
            || self
                .related_expense_ids
                .iter()
                .any(|id| expense_ids.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_epsilon_value() {
        assert_eq!(EPSILON, dec!(0.01));
        assert!(approx_eq(dec!(10.004), dec!(10)));
        assert!(!approx_eq(dec!(10.01), dec!(10)));
        assert!(is_negligible(dec!(-0.009)));
    }

    #[test]
    fn test_obligation_progress() {
        let mut obligation = Obligation::new("B", "A", dec!(100));
        obligation.apply_payment(dec!(40));
        assert_eq!(obligation.settled_amount, dec!(40));
        assert_eq!(obligation.remaining(), dec!(60));
        assert!(!obligation.is_fully_settled);

        obligation.apply_payment(dec!(59.995));
        assert!(obligation.is_fully_settled);
    }

    #[test]
    fn test_mark_settled() {
        let mut obligation = Obligation::new("B", "A", dec!(75.50));
        obligation.apply_payment(dec!(10));
        obligation.mark_settled();
        assert_eq!(obligation.settled_amount, dec!(75.50));
        assert!(obligation.is_fully_settled);
    }

    #[test]
    fn test_entry_overlap_rules() {
        let e1 = ExpenseId::generate();
        let e2 = ExpenseId::generate();
        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            from: "B".into(),
            to: "A".into(),
            amount: dec!(10),
            currency: Currency::new("USD"),
            date: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
            note: None,
            related_expense_ids: vec![e1],
            kind: EntryKind::Payment,
            recorded_at: Utc::now(),
        };

        assert!(entry.overlaps(&[e1, e2]));
        assert!(!entry.overlaps(&[e2]));
        assert!(entry.overlaps(&[]));

        let unscoped = LedgerEntry {
            related_expense_ids: vec![],
            ..entry
        };
        assert!(unscoped.overlaps(&[e2]));
    }

    #[test]
    fn test_split_policy_serde() {
        let json = serde_json::to_string(&SplitPolicy::Percentage).unwrap();
        assert_eq!(json, "\"PERCENTAGE\"");
        let policy: SplitPolicy = serde_json::from_str("\"UNEQUAL\"").unwrap();
        assert_eq!(policy, SplitPolicy::Unequal);
    }
}
