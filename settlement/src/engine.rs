//! Main settlement engine
//!
//! Orchestrates allocation, validation, netting, merge and the ledger
//! flows on top of a [`SettlementStore`].
//!
//! Every mutation is computed first, written as one [`WriteBatch`], and
//! only applied to the in-memory view once the commit succeeds. A failed
//! commit leaves the last durable state visible and is not retried.
//! Concurrent edits of one expense resolve last-write-wins.

use crate::{
    balance::BalanceSummary,
    config::Config,
    directory::ParticipantDirectory,
    merge::SettlementMerger,
    netting::DebtNettingEngine,
    redistribute::{EditSession, InteractiveRedistributor, ShareEdit},
    split::SplitAllocator,
    types::{ExpenseDraft, ShareSource},
    validation::{validate_custom_values, validate_payments, validate_shares},
    Result,
};
use chrono::Utc;
use ledger_core::{
    Currency, Expense, ExpenseId, LedgerEntry, ManualSettlementRequest, Metrics, Obligation,
    ObligationKey, ParticipantId, Payment, PaymentHistory, PaymentRequest, Posting,
    SettlementLedger, SettlementStore, Share, SplitPolicy, SyncAction, WriteBatch,
};
use std::collections::HashMap;

/// Settlement engine
#[derive(Debug)]
pub struct SettlementEngine<S: SettlementStore> {
    /// Persistent store
    store: S,

    /// Configuration
    config: Config,

    /// Share allocator
    allocator: SplitAllocator,

    /// Obligation merger
    merger: SettlementMerger,

    /// Display names for notes
    directory: ParticipantDirectory,

    /// Committed expenses
    expenses: HashMap<ExpenseId, Expense>,

    /// Committed ledger entries
    ledger: SettlementLedger,

    /// Metrics
    metrics: Metrics,
}

impl<S: SettlementStore> SettlementEngine<S> {
    /// Open engine over a store, loading its expenses and ledger
    pub fn open(store: S, config: Config) -> Result<Self> {
        config.validate()?;

        let expenses: HashMap<ExpenseId, Expense> = store
            .expenses()?
            .into_iter()
            .map(|expense| (expense.id, expense))
            .collect();
        let ledger = SettlementLedger::from_entries(store.entries()?);
        let metrics = Metrics::new().map_err(ledger_core::Error::from)?;

        tracing::info!(
            "Opened {} v{}: {} expenses, {} ledger entries",
            config.service_name,
            config.service_version,
            expenses.len(),
            ledger.len()
        );

        Ok(Self {
            store,
            allocator: SplitAllocator::new(config.split.currency_scale),
            merger: SettlementMerger::new(DebtNettingEngine::new()),
            directory: ParticipantDirectory::new(),
            expenses,
            ledger,
            metrics,
            config,
        })
    }

    /// Use a participant directory for manual settlement notes
    pub fn with_directory(mut self, directory: ParticipantDirectory) -> Self {
        self.directory = directory;
        self
    }

    /// Allocate, validate, net and merge a draft without persisting it
    pub fn preview(&self, draft: &ExpenseDraft) -> Result<Expense> {
        let prior = match draft.id {
            Some(id) => Some(self.cached(id)?),
            None => None,
        };

        let shares = self.shares_for(draft)?;
        validate_shares(draft.amount, draft.split_policy, &draft.participants, &shares)?;
        validate_payments(draft.amount, &draft.payments)?;

        let payments = if draft.payments.is_empty() {
            vec![Payment::new(draft.paid_by.clone(), draft.amount)]
        } else {
            draft.payments.clone()
        };

        let prior_obligations = prior.map(|e| e.obligations.as_slice()).unwrap_or_default();
        let outcome = self.merger.recompute(&payments, &shares, prior_obligations);

        Ok(Expense {
            id: draft.id.unwrap_or_else(ExpenseId::generate),
            name: draft.name.clone(),
            amount: draft.amount,
            currency: draft
                .currency
                .clone()
                .unwrap_or_else(|| Currency::new(self.config.default_currency.clone())),
            paid_by: draft.paid_by.clone(),
            payments,
            shares,
            split_policy: draft.split_policy,
            obligations: outcome.obligations,
            date: draft.date,
            group_id: draft.group_id.clone(),
            description: draft.description.clone(),
            updated_at: Utc::now(),
        })
    }

    /// Replay interactive share edits over a draft's allocated shares.
    ///
    /// The starting shares are allocated without checking their sums, so
    /// an unbalanced form can be edited into shape. The returned draft
    /// carries the edited shares verbatim; `save_expense` validates them.
    pub fn replay_edits(&self, mut draft: ExpenseDraft, edits: &[ShareEdit]) -> Result<ExpenseDraft> {
        if edits.is_empty() {
            return Ok(draft);
        }

        let redistributor = InteractiveRedistributor::for_policy(draft.split_policy, draft.amount)
            .with_scale(self.config.split.currency_scale);
        let mut shares = self.shares_for(&draft)?;
        let mut session = EditSession::new(draft.split_policy, draft.amount, draft.participants.clone());
        for edit in edits {
            let result = redistributor.apply(&shares, edit, session);
            shares = result.shares;
            session = result.session;
        }

        tracing::info!(
            "Replayed {} share edits ({} participants touched)",
            edits.len(),
            session.touched().len()
        );
        draft.shares = ShareSource::Explicit { shares };
        Ok(draft)
    }

    /// Create or replace an expense.
    ///
    /// An edit keeps progress on obligations whose `(from, to)` pair
    /// survives re-netting. The last write wins.
    pub fn save_expense(&mut self, draft: ExpenseDraft) -> Result<Expense> {
        let expense = self.preview(&draft)?;
        let action = if draft.id.is_some() {
            SyncAction::Update
        } else {
            SyncAction::Add
        };

        let mut batch = WriteBatch::new();
        batch.put_expense(expense.clone(), action)?;
        self.commit(batch)?;

        self.metrics.record_obligations(expense.obligations.len());
        tracing::info!(
            "Saved expense {} ({:?}): {} shares, {} obligations",
            expense.id,
            action,
            expense.shares.len(),
            expense.obligations.len()
        );

        self.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    /// Re-net a stored expense from its payments and shares, keeping progress
    pub fn refresh_expense(&mut self, id: ExpenseId) -> Result<Expense> {
        let current = self.cached(id)?;
        let outcome = self
            .merger
            .recompute(&current.payments, &current.shares, &current.obligations);

        let expense = Expense {
            obligations: outcome.obligations,
            updated_at: Utc::now(),
            ..current.clone()
        };

        let mut batch = WriteBatch::new();
        batch.put_expense(expense.clone(), SyncAction::Update)?;
        self.commit(batch)?;

        self.metrics.record_obligations(expense.obligations.len());
        tracing::info!(
            "Refreshed expense {}: {} obligations ({} carried, {} dropped)",
            id,
            expense.obligations.len(),
            outcome.carried,
            outcome.dropped.len()
        );

        self.expenses.insert(id, expense.clone());
        Ok(expense)
    }

    /// Delete an expense. Ledger entries that reference it stay.
    pub fn delete_expense(&mut self, id: ExpenseId) -> Result<()> {
        self.cached(id)?;

        let mut batch = WriteBatch::new();
        batch.delete_expense(id);
        self.commit(batch)?;

        self.expenses.remove(&id);
        tracing::info!("Deleted expense {}", id);
        Ok(())
    }

    /// Record a debt payment.
    ///
    /// With expense IDs the payment targets the `from → to` obligation of
    /// each named expense, which must share the request currency. Without
    /// them it targets every unsettled `from → to` obligation in the
    /// request currency.
    pub fn record_payment(&mut self, request: PaymentRequest) -> Result<LedgerEntry> {
        let targets = self.payment_targets(&request)?;
        let obligations: Vec<Obligation> = targets.iter().map(|(_, o)| o.clone()).collect();

        let posting = self
            .ledger
            .prepare_payment(&request, &obligations)
            .map_err(|err| self.rejected(err))?;

        let expense_ids: Vec<ExpenseId> = targets.iter().map(|(id, _)| *id).collect();
        let entry = self.post(posting, &expense_ids)?;

        tracing::info!(
            "Recorded payment {} {} {} → {} across {} obligations",
            entry.amount,
            entry.currency,
            entry.from,
            entry.to,
            expense_ids.len()
        );

        Ok(entry)
    }

    /// Force an obligation to settled.
    ///
    /// Without an expense ID the oldest unsettled `from → to` obligation
    /// in the request currency is used. An empty note is replaced by the
    /// configured template.
    pub fn settle_manually(&mut self, mut request: ManualSettlementRequest) -> Result<LedgerEntry> {
        let expense_id = match request.expense_id {
            Some(id) => id,
            None => self
                .sorted_expenses()
                .into_iter()
                .find(|e| {
                    e.currency == request.currency
                        && e.obligation(&request.from, &request.to)
                        .is_some_and(|o| !o.is_fully_settled)
                })
                .map(|e| e.id)
                .ok_or_else(|| not_found(&request.from, &request.to))?,
        };
        request.expense_id = Some(expense_id);

        if request.note.trim().is_empty() {
            let name = self.directory.display_name(&request.to);
            request.note = self.config.ledger.manual_note_for(&name);
        }

        let expense = self.cached(expense_id)?;
        self.check_currency(expense, &request.currency)?;
        let target = expense
            .obligation(&request.from, &request.to)
            .cloned()
            .ok_or_else(|| not_found(&request.from, &request.to))?;

        let posting = self
            .ledger
            .prepare_manual_settlement(&request, &target)
            .map_err(|err| self.rejected(err))?;

        let entry = self.post(posting, &[expense_id])?;

        tracing::info!(
            "Manually settled {} → {} on expense {} ({} outstanding)",
            entry.from,
            entry.to,
            expense_id,
            entry.amount
        );

        Ok(entry)
    }

    /// Committed expense
    pub fn expense(&self, id: ExpenseId) -> Option<&Expense> {
        self.expenses.get(&id)
    }

    /// Committed expenses, oldest first
    pub fn expenses(&self) -> Vec<&Expense> {
        self.sorted_expenses()
    }

    /// Committed ledger
    pub fn ledger(&self) -> &SettlementLedger {
        &self.ledger
    }

    /// Payments between an ordered pair
    pub fn history(&self, from: &ParticipantId, to: &ParticipantId) -> PaymentHistory {
        self.ledger.history(from, to)
    }

    /// Outstanding balances of a participant
    pub fn balance_summary(&self, participant: &ParticipantId) -> BalanceSummary {
        BalanceSummary::for_participant(self.expenses.values(), participant)
    }

    /// Participant directory
    pub fn directory(&self) -> &ParticipantDirectory {
        &self.directory
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    fn shares_for(&self, draft: &ExpenseDraft) -> Result<Vec<Share>> {
        match &draft.shares {
            ShareSource::Explicit { shares } => Ok(shares.clone()),
            ShareSource::Allocate { custom_values } => {
                if draft.split_policy != SplitPolicy::Equal {
                    validate_custom_values(&draft.participants, custom_values)?;
                }
                Ok(self.allocator.allocate(
                    draft.amount,
                    draft.split_policy,
                    &draft.participants,
                    custom_values,
                ))
            }
        }
    }

    fn payment_targets(&self, request: &PaymentRequest) -> Result<Vec<(ExpenseId, Obligation)>> {
        if request.related_expense_ids.is_empty() {
            return Ok(self
                .sorted_expenses()
                .into_iter()
                .filter(|e| e.currency == request.currency)
                .filter_map(|e| {
                    e.obligation(&request.from, &request.to)
                        .filter(|o| !o.is_fully_settled)
                        .map(|o| (e.id, o.clone()))
                })
                .collect());
        }

        request
            .related_expense_ids
            .iter()
            .map(|id| {
                let expense = self.cached(*id)?;
                self.check_currency(expense, &request.currency)?;
                expense
                    .obligation(&request.from, &request.to)
                    .map(|o| (*id, o.clone()))
                    .ok_or_else(|| not_found(&request.from, &request.to))
            })
            .collect()
    }

    fn check_currency(&self, expense: &Expense, currency: &Currency) -> Result<()> {
        if &expense.currency == currency {
            return Ok(());
        }

        Err(self.rejected(ledger_core::Error::CurrencyMismatch {
            expense: expense.id.to_string(),
            expected: expense.currency.clone(),
            actual: currency.clone(),
        }))
    }

    /// Commit a ledger posting with its updated expenses, then apply it
    fn post(&mut self, posting: Posting, expense_ids: &[ExpenseId]) -> Result<LedgerEntry> {
        let Posting { entry, updated } = posting;
        let now = Utc::now();

        let mut expenses = Vec::with_capacity(expense_ids.len());
        for (id, obligation) in expense_ids.iter().zip(updated) {
            let mut expense = self.cached(*id)?.clone();
            if let Some(target) = expense.obligation_mut(&obligation.from, &obligation.to) {
                *target = obligation;
            }
            expense.updated_at = now;
            expenses.push(expense);
        }

        let mut batch = WriteBatch::new();
        for expense in &expenses {
            batch.put_expense(expense.clone(), SyncAction::Update)?;
        }
        batch.append_entry(entry.clone())?;
        self.commit(batch)?;

        self.ledger.append(entry.clone())?;
        self.metrics.record_entry_append();
        for expense in expenses {
            self.expenses.insert(expense.id, expense);
        }

        Ok(entry)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        match self.store.commit(batch) {
            Ok(()) => {
                self.metrics.record_commit(true);
                Ok(())
            }
            Err(err) => {
                self.metrics.record_commit(false);
                tracing::error!("Commit failed, keeping last durable state: {}", err);
                Err(err.into())
            }
        }
    }

    fn rejected(&self, err: ledger_core::Error) -> crate::Error {
        if err.is_rejection() {
            self.metrics.record_rejection();
            tracing::warn!("Ledger rejected operation: {}", err);
        }
        err.into()
    }

    fn cached(&self, id: ExpenseId) -> Result<&Expense> {
        self.expenses
            .get(&id)
            .ok_or_else(|| ledger_core::Error::ExpenseNotFound(id.to_string()).into())
    }

    fn sorted_expenses(&self) -> Vec<&Expense> {
        let mut expenses: Vec<&Expense> = self.expenses.values().collect();
        expenses.sort_by_key(|e| (e.date, e.id));
        expenses
    }
}

fn not_found(from: &ParticipantId, to: &ParticipantId) -> crate::Error {
    ledger_core::Error::ObligationNotFound(ObligationKey::new(from.clone(), to.clone()).to_string())
        .into()
}
