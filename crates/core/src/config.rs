use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::storage::encryption::KdfParams;

/// Runtime configuration for a `TradeWallet`.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use tradewallet_core::config::TradeWalletConfig;
///
/// let cfg = TradeWalletConfig::from_json_str(r#"{ "seed_demo_data": false }"#).unwrap();
/// assert!(!cfg.seed_demo_data);
/// assert_eq!(cfg.min_password_len, 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeWalletConfig {
    /// Seed the demo admin/user accounts and their wallets into an empty store.
    pub seed_demo_data: bool,

    /// Minimum password length for registration, account creation and resets.
    pub min_password_len: usize,

    /// Name given to a portfolio created with a blank name.
    pub default_portfolio_name: String,

    /// Base currency assigned to new portfolios.
    pub base_currency: String,

    /// Argon2id cost used to hash account passwords.
    pub password_kdf: KdfParams,

    /// Argon2id cost used to derive backup encryption keys.
    pub backup_kdf: KdfParams,
}

impl Default for TradeWalletConfig {
    fn default() -> Self {
        Self {
            seed_demo_data: true,
            min_password_len: 6,
            default_portfolio_name: "New portfolio".to_string(),
            base_currency: "EUR".to_string(),
            password_kdf: KdfParams::password_default(),
            backup_kdf: KdfParams::default(),
        }
    }
}

impl TradeWalletConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let mut cfg: Self = serde_json::from_str(json)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a JSON configuration file (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Trim and upper-case the base currency code.
    pub fn normalize(&mut self) {
        self.base_currency = self.base_currency.trim().to_uppercase();
    }

    /// Reject settings that would make the wallet unusable.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.min_password_len == 0 {
            return Err(CoreError::ValidationError(
                "min_password_len must be at least 1".into(),
            ));
        }
        let currency = self.base_currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::ValidationError(format!(
                "Invalid base currency '{}': must be exactly 3 ASCII letters (e.g., EUR, USD)",
                self.base_currency
            )));
        }
        self.password_kdf.validate()?;
        self.backup_kdf.validate()?;
        Ok(())
    }
}
