//! Settlement ledger
//!
//! Append-only record of debt-payment events. The ledger never mutates
//! obligations itself: it validates a request against the target
//! obligations and the entries already recorded for the pair, and hands
//! back a [`Posting`] (the new entry plus updated obligation progress).
//! The caller commits the posting atomically, then calls
//! [`SettlementLedger::append`].
//!
//! # Example
//!
//! ```
//! use ledger_core::{Currency, Obligation, PaymentRequest, SettlementLedger};
//! use rust_decimal::Decimal;
//!
//! let ledger = SettlementLedger::new();
//! let obligation = Obligation::new("bob", "alice", Decimal::new(100, 0));
//! let request = PaymentRequest::new("bob", "alice", Decimal::new(40, 0), Currency::new("USD"));
//!
//! let posting = ledger.prepare_payment(&request, &[obligation]).unwrap();
//! assert_eq!(posting.updated[0].settled_amount, Decimal::new(40, 0));
//! ```

use crate::{
    types::{
        Currency, EntryKind, ExpenseId, LedgerEntry, Obligation, ObligationKey, ParticipantId,
    },
    Error, Result,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

/// A debt payment to validate against the remaining balance
#[derive(Debug, Clone)]
pub struct PaymentRequest {
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
    pub note: Option<String>,

    /// Expenses whose obligations this pays; empty means all of them
    pub related_expense_ids: Vec<ExpenseId>,
}

impl PaymentRequest {
    /// Request dated today, with no note and no expense scope
    pub fn new(
        from: impl Into<ParticipantId>,
        to: impl Into<ParticipantId>,
        amount: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
            currency,
            date: Utc::now().date_naive(),
            note: None,
            related_expense_ids: Vec::new(),
        }
    }

    /// Scope the payment to specific expenses
    pub fn for_expenses(mut self, expense_ids: Vec<ExpenseId>) -> Self {
        self.related_expense_ids = expense_ids;
        self
    }

    /// Attach a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Override the payment date
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    fn key(&self) -> ObligationKey {
        ObligationKey::new(self.from.clone(), self.to.clone())
    }
}

/// An out-of-band confirmation that a debt was paid
#[derive(Debug, Clone)]
pub struct ManualSettlementRequest {
    /// Debtor
    pub from: ParticipantId,

    /// Creditor
    pub to: ParticipantId,

    /// Currency code
    pub currency: Currency,

    /// Confirmation date
    pub date: NaiveDate,

    /// Note stored on the entry
    pub note: String,

    /// Expense the obligation belongs to
    pub expense_id: Option<ExpenseId>,
}

/// Validated ledger operation, ready to be committed
#[derive(Debug, Clone)]
pub struct Posting {
    /// Entry to append
    pub entry: LedgerEntry,

    /// Target obligations with their new progress, in input order
    pub updated: Vec<Obligation>,
}

/// Entries between one ordered pair and their total
#[derive(Debug, Clone)]
pub struct PaymentHistory {
    /// Entries, oldest first
    pub entries: Vec<LedgerEntry>,

    /// Sum of entry amounts
    pub total_paid: Decimal,
}

/// Append-only debt-payment ledger
#[derive(Debug, Clone, Default)]
pub struct SettlementLedger {
    entries: Vec<LedgerEntry>,
    entry_ids: HashSet<Uuid>,
}

impl SettlementLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries (in append order)
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let entry_ids = entries.iter().map(|e| e.entry_id).collect();
        Self { entries, entry_ids }
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of entries from `from` to `to` that count toward obligations
    /// scoped to `expense_ids`.
    ///
    /// Entries without expense IDs count toward every obligation between
    /// the pair.
    pub fn already_paid(
        &self,
        from: &ParticipantId,
        to: &ParticipantId,
        expense_ids: &[ExpenseId],
    ) -> Decimal {
        self.entries
            .iter()
            .filter(|e| &e.from == from && &e.to == to)
            .filter(|e| e.overlaps(expense_ids))
            .map(|e| e.amount)
            .sum()
    }

    /// Payment history for an ordered pair
    pub fn history(&self, from: &ParticipantId, to: &ParticipantId) -> PaymentHistory {
        let entries: Vec<LedgerEntry> = self
            .entries
            .iter()
            .filter(|e| &e.from == from && &e.to == to)
            .cloned()
            .collect();
        let total_paid = entries.iter().map(|e| e.amount).sum();

        PaymentHistory {
            entries,
            total_paid,
        }
    }

    /// Validate a debt payment against its target obligations.
    ///
    /// Rejects a non-positive amount, an already-settled target, and any
    /// payment that would push the total paid past a target's amount.
    /// Nothing is mutated; on success every target gets
    /// `settled_amount += amount`.
    pub fn prepare_payment(
        &self,
        request: &PaymentRequest,
        targets: &[Obligation],
    ) -> Result<Posting> {
        if request.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(request.amount));
        }

        if targets.is_empty() {
            return Err(Error::ObligationNotFound(request.key().to_string()));
        }

        let already_paid = self.already_paid(
            &request.from,
            &request.to,
            &request.related_expense_ids,
        );

        let mut updated = Vec::with_capacity(targets.len());
        for target in targets {
            if !target.is_between(&request.from, &request.to) {
                return Err(Error::ObligationNotFound(request.key().to_string()));
            }

            if target.is_fully_settled {
                return Err(Error::AlreadySettled(target.key().to_string()));
            }

            if already_paid + request.amount > target.amount {
                return Err(Error::ExceedsRemaining {
                    already_paid,
                    attempted: request.amount,
                    obligation_amount: target.amount,
                });
            }

            let mut obligation = target.clone();
            obligation.apply_payment(request.amount);
            updated.push(obligation);
        }

        tracing::debug!(
            "Payment {} of {} validated ({} already paid, {} targets)",
            request.key(),
            request.amount,
            already_paid,
            updated.len()
        );

        Ok(Posting {
            entry: LedgerEntry {
                entry_id: Uuid::now_v7(),
                from: request.from.clone(),
                to: request.to.clone(),
                amount: request.amount,
                currency: request.currency.clone(),
                date: request.date,
                note: request.note.clone(),
                related_expense_ids: request.related_expense_ids.clone(),
                kind: EntryKind::Payment,
                recorded_at: Utc::now(),
            },
            updated,
        })
    }

    /// Force an obligation to settled, bypassing the remaining-balance check.
    ///
    /// The entry records whatever was still outstanding. There is no undo.
    pub fn prepare_manual_settlement(
        &self,
        request: &ManualSettlementRequest,
        target: &Obligation,
    ) -> Result<Posting> {
        if !target.is_between(&request.from, &request.to) {
            return Err(Error::ObligationNotFound(
                ObligationKey::new(request.from.clone(), request.to.clone()).to_string(),
            ));
        }

        if target.is_fully_settled {
            return Err(Error::AlreadySettled(target.key().to_string()));
        }

        let outstanding = target.remaining().max(Decimal::ZERO);
        let mut obligation = target.clone();
        obligation.mark_settled();

        tracing::debug!(
            "Manual settlement of {} ({} outstanding)",
            target.key(),
            outstanding
        );

        Ok(Posting {
            entry: LedgerEntry {
                entry_id: Uuid::now_v7(),
                from: request.from.clone(),
                to: request.to.clone(),
                amount: outstanding,
                currency: request.currency.clone(),
                date: request.date,
                note: Some(request.note.clone()),
                related_expense_ids: request.expense_id.into_iter().collect(),
                kind: EntryKind::ManualSettlement,
                recorded_at: Utc::now(),
            },
            updated: vec![obligation],
        })
    }

    /// Append a committed entry
    pub fn append(&mut self, entry: LedgerEntry) -> Result<()> {
        if !self.entry_ids.insert(entry.entry_id) {
            return Err(Error::DuplicateEntry(entry.entry_id.to_string()));
        }
        self.entries.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::new("USD")
    }

    fn commit(ledger: &mut SettlementLedger, posting: &Posting) {
        ledger.append(posting.entry.clone()).unwrap();
    }

    #[test]
    fn test_partial_then_full_payment() {
        let mut ledger = SettlementLedger::new();
        let obligation = Obligation::new("B", "A", dec!(100));

        let request = PaymentRequest::new("B", "A", dec!(40), usd());
        let posting = ledger.prepare_payment(&request, &[obligation]).unwrap();
        commit(&mut ledger, &posting);
        let obligation = posting.updated[0].clone();
        assert_eq!(obligation.settled_amount, dec!(40));
        assert!(!obligation.is_fully_settled);

        let request = PaymentRequest::new("B", "A", dec!(60), usd());
        let posting = ledger.prepare_payment(&request, &[obligation]).unwrap();
        commit(&mut ledger, &posting);
        assert!(posting.updated[0].is_fully_settled);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_overpayment_rejected_without_mutation() {
        let mut ledger = SettlementLedger::new();
        let obligation = Obligation::new("B", "A", dec!(100));

        let first = PaymentRequest::new("B", "A", dec!(70), usd());
        let posting = ledger.prepare_payment(&first, &[obligation]).unwrap();
        commit(&mut ledger, &posting);
        let obligation = posting.updated[0].clone();

        let second = PaymentRequest::new("B", "A", dec!(40), usd());
        let err = ledger.prepare_payment(&second, &[obligation.clone()]).unwrap_err();
        assert!(matches!(
            err,
            Error::ExceedsRemaining { already_paid, attempted, obligation_amount }
                if already_paid == dec!(70) && attempted == dec!(40) && obligation_amount == dec!(100)
        ));
        assert!(err.is_rejection());
        assert_eq!(ledger.len(), 1);
        assert_eq!(obligation.settled_amount, dec!(70));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let ledger = SettlementLedger::new();
        let obligation = Obligation::new("B", "A", dec!(100));

        for amount in [dec!(0), dec!(-5)] {
            let request = PaymentRequest::new("B", "A", amount, usd());
            let err = ledger.prepare_payment(&request, &[obligation.clone()]).unwrap_err();
            assert!(matches!(err, Error::InvalidAmount(_)));
        }
    }

    #[test]
    fn test_settled_obligation_rejected() {
        let ledger = SettlementLedger::new();
        let mut obligation = Obligation::new("B", "A", dec!(100));
        obligation.mark_settled();

        let request = PaymentRequest::new("B", "A", dec!(1), usd());
        let err = ledger.prepare_payment(&request, &[obligation]).unwrap_err();
        assert!(matches!(err, Error::AlreadySettled(_)));
    }

    #[test]
    fn test_wrong_pair_rejected() {
        let ledger = SettlementLedger::new();
        let obligation = Obligation::new("C", "A", dec!(100));

        let request = PaymentRequest::new("B", "A", dec!(10), usd());
        let err = ledger.prepare_payment(&request, &[obligation]).unwrap_err();
        assert!(matches!(err, Error::ObligationNotFound(_)));

        let err = ledger.prepare_payment(&request, &[]).unwrap_err();
        assert!(matches!(err, Error::ObligationNotFound(_)));
    }

    #[test]
    fn test_already_paid_scoping() {
        let mut ledger = SettlementLedger::new();
        let dinner = ExpenseId::generate();
        let movie = ExpenseId::generate();
        let obligation = Obligation::new("B", "A", dec!(500));

        let scoped = PaymentRequest::new("B", "A", dec!(30), usd()).for_expenses(vec![dinner]);
        let posting = ledger.prepare_payment(&scoped, &[obligation.clone()]).unwrap();
        commit(&mut ledger, &posting);

        let unscoped = PaymentRequest::new("B", "A", dec!(5), usd());
        let posting = ledger.prepare_payment(&unscoped, &[obligation]).unwrap();
        commit(&mut ledger, &posting);

        let a: ParticipantId = "A".into();
        let b: ParticipantId = "B".into();
        assert_eq!(ledger.already_paid(&b, &a, &[dinner]), dec!(35));
        assert_eq!(ledger.already_paid(&b, &a, &[movie]), dec!(5));
        assert_eq!(ledger.already_paid(&b, &a, &[]), dec!(35));
        assert_eq!(ledger.already_paid(&a, &b, &[]), dec!(0));
    }

    #[test]
    fn test_every_target_gets_full_amount() {
        let ledger = SettlementLedger::new();
        let targets = vec![
            Obligation::new("B", "A", dec!(50)),
            Obligation::new("B", "A", dec!(20)),
        ];

        let request = PaymentRequest::new("B", "A", dec!(20), usd());
        let posting = ledger.prepare_payment(&request, &targets).unwrap();
        assert_eq!(posting.updated[0].settled_amount, dec!(20));
        assert!(!posting.updated[0].is_fully_settled);
        assert_eq!(posting.updated[1].settled_amount, dec!(20));
        assert!(posting.updated[1].is_fully_settled);
    }

    #[test]
    fn test_manual_settlement_bypasses_balance_check() {
        let mut ledger = SettlementLedger::new();
        let mut obligation = Obligation::new("B", "A", dec!(80));
        obligation.apply_payment(dec!(30));

        let request = ManualSettlementRequest {
            from: "B".into(),
            to: "A".into(),
            currency: usd(),
            date: NaiveDate::from_ymd_opt(2024, 3, 21).unwrap(),
            note: "A marked the payment as settled up manually".to_string(),
            expense_id: None,
        };
        let posting = ledger.prepare_manual_settlement(&request, &obligation).unwrap();
        commit(&mut ledger, &posting);

        assert_eq!(posting.entry.amount, dec!(50));
        assert_eq!(posting.entry.kind, EntryKind::ManualSettlement);
        assert_eq!(posting.updated[0].settled_amount, dec!(80));
        assert!(posting.updated[0].is_fully_settled);

        let err = ledger
            .prepare_manual_settlement(&request, &posting.updated[0])
            .unwrap_err();
        assert!(matches!(err, Error::AlreadySettled(_)));
    }

    #[test]
    fn test_history_and_duplicates() {
        let mut ledger = SettlementLedger::new();
        let obligation = Obligation::new("B", "A", dec!(100));

        let request = PaymentRequest::new("B", "A", dec!(25), usd()).with_note("cash");
        let posting = ledger.prepare_payment(&request, &[obligation]).unwrap();
        commit(&mut ledger, &posting);

        let history = ledger.history(&"B".into(), &"A".into());
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.total_paid, dec!(25));
        assert_eq!(history.entries[0].note.as_deref(), Some("cash"));

        let err = ledger.append(posting.entry.clone()).unwrap_err();
        assert!(matches!(err, Error::DuplicateEntry(_)));

        let rebuilt = SettlementLedger::from_entries(ledger.entries().to_vec());
        assert_eq!(rebuilt.len(), 1);
    }
}
