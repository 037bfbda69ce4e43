//! Settlement CLI binary
//!
//! Usage: `settle <scenario.json>`
//!
//! The scenario holds an expense draft and, optionally, a list of
//! interactive share edits to replay before saving:
//!
//! ```json
//! {
//!   "expense": { "name": "Dinner", "amount": "90", "paid_by": "A", ... },
//!   "edits": [{ "participant": "B", "value": "50" }]
//! }
//! ```

use anyhow::{bail, Context};
use ledger_core::MemoryStore;
use serde::Deserialize;
use settlement::{Config, ExpenseDraft, SettlementEngine, ShareEdit};

#[derive(Debug, Deserialize)]
struct Scenario {
    expense: ExpenseDraft,
    #[serde(default)]
    edits: Vec<ShareEdit>,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr);
    if std::env::var_os("SETTLEMENT_LOG_JSON").is_some() {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: settle <scenario.json>");
    };

    // Load configuration
    let config = match std::env::var("SETTLEMENT_CONFIG") {
        Ok(config_path) => Config::from_file(&config_path)
            .with_context(|| format!("loading config from {}", config_path))?,
        Err(_) => Config::from_env()?,
    };

    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let Scenario { expense, edits } =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;

    let mut engine = SettlementEngine::open(MemoryStore::new(), config)?;
    let expense = engine.replay_edits(expense, &edits)?;
    let saved = engine.save_expense(expense)?;

    let output = serde_json::json!({
        "expense_id": saved.id,
        "currency": saved.currency,
        "shares": saved.shares,
        "obligations": saved.obligations,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
