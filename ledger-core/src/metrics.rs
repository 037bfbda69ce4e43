//! Metrics collection for observability
//!
//! Prometheus counters for the settlement engine, kept in a private
//! registry so several engines can live in one process (tests included).
//!
//! # Metrics
//!
//! - `ledger_entries_total` - Ledger entries appended
//! - `ledger_rejections_total` - Debt payments rejected by the ledger
//! - `settlement_obligations_computed_total` - Obligations produced by netting
//! - `settlement_commits_total` - Successful atomic commits
//! - `settlement_commit_failures_total` - Commits that failed and were rolled back

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Ledger entries appended
    pub entries_total: IntCounter,

    /// Rejected debt payments
    pub rejections_total: IntCounter,

    /// Obligations produced by netting
    pub obligations_computed: IntCounter,

    /// Successful commits
    pub commits_total: IntCounter,

    /// Failed commits
    pub commit_failures_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_total = IntCounter::new("ledger_entries_total", "Ledger entries appended")?;
        registry.register(Box::new(entries_total.clone()))?;

        let rejections_total = IntCounter::new(
            "ledger_rejections_total",
            "Debt payments rejected by the ledger",
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let obligations_computed = IntCounter::new(
            "settlement_obligations_computed_total",
            "Obligations produced by netting",
        )?;
        registry.register(Box::new(obligations_computed.clone()))?;

        let commits_total =
            IntCounter::new("settlement_commits_total", "Successful atomic commits")?;
        registry.register(Box::new(commits_total.clone()))?;

        let commit_failures_total = IntCounter::new(
            "settlement_commit_failures_total",
            "Commits that failed and were rolled back",
        )?;
        registry.register(Box::new(commit_failures_total.clone()))?;

        Ok(Self {
            entries_total,
            rejections_total,
            obligations_computed,
            commits_total,
            commit_failures_total,
            registry,
        })
    }

    /// Record ledger entry append
    pub fn record_entry_append(&self) {
        self.entries_total.inc();
    }

    /// Record ledger rejection
    pub fn record_rejection(&self) {
        self.rejections_total.inc();
    }

    /// Record a netting run
    pub fn record_obligations(&self, count: usize) {
        self.obligations_computed.inc_by(count as u64);
    }

    /// Record commit outcome
    pub fn record_commit(&self, success: bool) {
        if success {
            self.commits_total.inc();
        } else {
            self.commit_failures_total.inc();
        }
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format
    pub fn gather_text(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::Error::Other(e.to_string()))
    }
}
