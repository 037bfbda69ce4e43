//! Storage layer
//!
//! The engine never talks to a database directly. It reads through
//! [`SettlementStore`] and writes by committing a [`WriteBatch`], which
//! carries every change of one logical operation:
//!
//! - expense upserts (shares + obligations travel with the expense)
//! - expense deletions
//! - ledger entry appends
//! - sync-queue changes for replication
//!
//! `commit` is all-or-nothing. Concurrent commits to the same expense
//! resolve last-write-wins; there is no version check.

use crate::{
    error::{Error, Result},
    types::{Expense, ExpenseId, LedgerEntry},
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Replicated table a change belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTable {
    /// Expense records
    Expenses,
    /// Ledger entries
    LedgerEntries,
}

/// Kind of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// New record
    Add,
    /// Replaced record
    Update,
    /// Removed record
    Delete,
}

/// Change waiting to be replicated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncChange {
    /// Change ID
    pub change_id: Uuid,

    /// Target table
    pub table: SyncTable,

    /// Action
    pub action: SyncAction,

    /// Record payload (full record, or `{"id": ..}` for deletions)
    pub payload: serde_json::Value,

    /// When the change was queued
    pub queued_at: DateTime<Utc>,
}

impl SyncChange {
    /// Build a change from any serializable record
    pub fn new<T: Serialize>(table: SyncTable, action: SyncAction, record: &T) -> Result<Self> {
        Ok(Self {
            change_id: Uuid::now_v7(),
            table,
            action,
            payload: serde_json::to_value(record)?,
            queued_at: Utc::now(),
        })
    }

    /// Deletion marker for an expense
    pub fn expense_deleted(id: ExpenseId) -> Self {
        Self {
            change_id: Uuid::now_v7(),
            table: SyncTable::Expenses,
            action: SyncAction::Delete,
            payload: serde_json::json!({ "id": id }),
            queued_at: Utc::now(),
        }
    }
}

/// Changes committed together or not at all
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Expenses to insert or replace
    pub put_expenses: Vec<Expense>,

    /// Expenses to remove
    pub delete_expenses: Vec<ExpenseId>,

    /// Ledger entries to append
    pub append_entries: Vec<LedgerEntry>,

    /// Changes to enqueue for replication
    pub changes: Vec<SyncChange>,
}

impl WriteBatch {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert an expense and enqueue the matching change
    pub fn put_expense(&mut self, expense: Expense, action: SyncAction) -> Result<()> {
        self.changes
            .push(SyncChange::new(SyncTable::Expenses, action, &expense)?);
        self.put_expenses.push(expense);
        Ok(())
    }

    /// Remove an expense and enqueue the deletion
    pub fn delete_expense(&mut self, id: ExpenseId) {
        self.changes.push(SyncChange::expense_deleted(id));
        self.delete_expenses.push(id);
    }

    /// Append a ledger entry and enqueue it
    pub fn append_entry(&mut self, entry: LedgerEntry) -> Result<()> {
        self.changes
            .push(SyncChange::new(SyncTable::LedgerEntries, SyncAction::Add, &entry)?);
        self.append_entries.push(entry);
        Ok(())
    }

    /// Whether the batch carries nothing
    pub fn is_empty(&self) -> bool {
        self.put_expenses.is_empty()
            && self.delete_expenses.is_empty()
            && self.append_entries.is_empty()
            && self.changes.is_empty()
    }
}

/// Persisted state consumed by the settlement engine
pub trait SettlementStore {
    /// Load one expense
    fn expense(&self, id: ExpenseId) -> Result<Option<Expense>>;

    /// Load every expense
    fn expenses(&self) -> Result<Vec<Expense>>;

    /// Load every ledger entry, in append order
    fn entries(&self) -> Result<Vec<LedgerEntry>>;

    /// Apply a batch atomically
    fn commit(&self, batch: WriteBatch) -> Result<()>;
}

impl<S: SettlementStore + ?Sized> SettlementStore for Arc<S> {
    fn expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        (**self).expense(id)
    }

    fn expenses(&self) -> Result<Vec<Expense>> {
        (**self).expenses()
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>> {
        (**self).entries()
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        (**self).commit(batch)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    expenses: BTreeMap<ExpenseId, Expense>,
    entries: Vec<LedgerEntry>,
    entry_ids: HashSet<Uuid>,
    sync_queue: Vec<SyncChange>,
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of changes waiting for replication
    pub fn pending_changes(&self) -> usize {
        self.state.read().sync_queue.len()
    }

    /// Take every queued change, oldest first
    pub fn drain_changes(&self) -> Vec<SyncChange> {
        std::mem::take(&mut self.state.write().sync_queue)
    }
}

impl SettlementStore for MemoryStore {
    fn expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        Ok(self.state.read().expenses.get(&id).cloned())
    }

    fn expenses(&self) -> Result<Vec<Expense>> {
        Ok(self.state.read().expenses.values().cloned().collect())
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>> {
        Ok(self.state.read().entries.clone())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.write();

        // Validate everything before touching state
        let mut incoming = HashSet::new();
        for entry in &batch.append_entries {
            if state.entry_ids.contains(&entry.entry_id) || !incoming.insert(entry.entry_id) {
                return Err(Error::DuplicateEntry(entry.entry_id.to_string()));
            }
        }
        for id in &batch.delete_expenses {
            if !state.expenses.contains_key(id)
                && !batch.put_expenses.iter().any(|e| &e.id == id)
            {
                return Err(Error::ExpenseNotFound(id.to_string()));
            }
        }

        let expense_count = batch.put_expenses.len();
        let entry_count = batch.append_entries.len();

        for expense in batch.put_expenses {
            state.expenses.insert(expense.id, expense);
        }
        for id in &batch.delete_expenses {
            state.expenses.remove(id);
        }
        for entry in batch.append_entries {
            state.entry_ids.insert(entry.entry_id);
            state.entries.push(entry);
        }
        state.sync_queue.extend(batch.changes);

        tracing::debug!(
            expenses = expense_count,
            entries = entry_count,
            "Batch committed"
        );

        Ok(())
    }
}
