//! Configuration for settlement engine

use serde::{Deserialize, Serialize};

/// Settlement engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Currency used when a draft does not name one
    pub default_currency: String,

    /// Split allocation configuration
    pub split: SplitConfig,

    /// Ledger configuration
    pub ledger: LedgerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "settlement-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            default_currency: "USD".to_string(),
            split: SplitConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

/// Split allocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Decimal places equal shares are rounded to; the first participant
    /// absorbs the remainder
    pub currency_scale: u32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { currency_scale: 2 }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Note stored on manual settlements when the caller gives none.
    /// `{to}` is replaced with the creditor's display name.
    pub manual_settlement_note: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            manual_settlement_note: "{to} marked the payment as settled up manually".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Render the manual settlement note for a creditor
    pub fn manual_note_for(&self, creditor_name: &str) -> String {
        self.manual_settlement_note.replace("{to}", creditor_name)
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(scale) = std::env::var("SETTLEMENT_CURRENCY_SCALE") {
            config.split.currency_scale = scale.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid SETTLEMENT_CURRENCY_SCALE: {}", e))
            })?;
        }

        if let Ok(currency) = std::env::var("SETTLEMENT_DEFAULT_CURRENCY") {
            config.default_currency = currency;
        }

        if let Ok(note) = std::env::var("SETTLEMENT_MANUAL_NOTE") {
            config.ledger.manual_settlement_note = note;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> crate::Result<()> {
        // Decimal supports at most 28 fractional digits
        if self.split.currency_scale > 28 {
            return Err(crate::Error::Config(format!(
                "currency_scale {} out of range (0-28)",
                self.split.currency_scale
            )));
        }

        if self.default_currency.trim().is_empty() {
            return Err(crate::Error::Config(
                "default_currency must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
