use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::TradeWalletConfig;
use crate::errors::CoreError;
use crate::models::asset::normalize_symbol;
use crate::models::portfolio::Portfolio;
use crate::models::price::{LivretCredit, LivretState, PriceBook, PriceOverrides};
use crate::models::state::WalletState;
use crate::models::transaction::Transaction;
use crate::models::user::User;
use crate::services::auth_service::AuthService;
use crate::services::portfolio_service::PortfolioService;

use super::encryption::{self, KdfParams};
use super::format::{BackupHeader, CURRENT_VERSION};
use super::kv::KeyValueStore;

/// Store keys, one per persisted collection.
pub mod keys {
    pub const USERS: &str = "tw_users";
    pub const CURRENT_USER: &str = "tw_current_user";
    pub const TRANSACTIONS: &str = "tw_transactions";
    pub const PORTFOLIOS: &str = "tw_portfolios";
    pub const PRICES: &str = "tw_prices";
    pub const LIVRETS: &str = "tw_livrets_state";
    pub const CREDITS: &str = "tw_livrets_credits";

    pub const ALL: [&str; 7] = [
        USERS,
        CURRENT_USER,
        TRANSACTIONS,
        PORTFOLIOS,
        PRICES,
        LIVRETS,
        CREDITS,
    ];
}

/// Outcome of reading one key.
enum Loaded<T> {
    Missing,
    Corrupt,
    Value(T),
}

/// Loads the wallet from a `KeyValueStore`, writes collections back, and
/// produces/consumes encrypted backups.
pub struct StorageManager;

impl StorageManager {
    /// Read every collection from the store.
    ///
    /// - no users key: seed demo accounts (if configured) and persist them;
    ///   unreadable users JSON is replaced the same way
    /// - no portfolios key: seed one wallet per demo account
    /// - other unreadable keys load as empty
    /// - a session pointing at an unknown user is dropped
    ///
    /// Errors from the store itself are propagated.
    pub fn load_state<S: KeyValueStore>(
        store: &mut S,
        config: &TradeWalletConfig,
    ) -> Result<WalletState, CoreError> {
        let mut state = WalletState::default();

        state.users = match Self::read::<_, Vec<User>>(store, keys::USERS)? {
            Loaded::Value(users) => users,
            Loaded::Missing | Loaded::Corrupt => {
                let users = if config.seed_demo_data {
                    AuthService::new().demo_users(config)?
                } else {
                    Vec::new()
                };
                Self::persist(store, keys::USERS, &users);
                users
            }
        };

        state.portfolios = match Self::read::<_, Vec<Portfolio>>(store, keys::PORTFOLIOS)? {
            Loaded::Value(portfolios) => portfolios,
            Loaded::Corrupt => Vec::new(),
            Loaded::Missing => {
                let portfolios = if config.seed_demo_data {
                    PortfolioService::new().demo_portfolios(&state.users, config)
                } else {
                    Vec::new()
                };
                Self::persist(store, keys::PORTFOLIOS, &portfolios);
                portfolios
            }
        };

        state.transactions = Self::read_or_default::<_, Vec<Transaction>>(store, keys::TRANSACTIONS)?;
        for tx in &mut state.transactions {
            tx.symbol = normalize_symbol(&tx.symbol);
        }

        state.session = match Self::read::<_, User>(store, keys::CURRENT_USER)? {
            Loaded::Value(user) if state.users.iter().any(|u| u.id == user.id) => Some(user.id),
            Loaded::Value(user) => {
                tracing::warn!(user_id = %user.id, "stored session refers to an unknown user; dropping it");
                None
            }
            Loaded::Missing | Loaded::Corrupt => None,
        };

        let mut prices = PriceBook {
            overrides: Self::read_or_default::<_, PriceOverrides>(store, keys::PRICES)?,
            livrets: Self::read_or_default::<_, BTreeMap<String, LivretState>>(store, keys::LIVRETS)?,
            credits: Self::read_or_default::<_, BTreeMap<String, Vec<LivretCredit>>>(
                store,
                keys::CREDITS,
            )?,
        };
        prices.sanitize();
        state.prices = prices;

        tracing::debug!(
            users = state.users.len(),
            portfolios = state.portfolios.len(),
            transactions = state.transactions.len(),
            logged_in = state.session.is_some(),
            "wallet state loaded"
        );
        Ok(state)
    }

    pub fn save_users<S: KeyValueStore>(store: &mut S, state: &WalletState) {
        Self::persist(store, keys::USERS, &state.users);
    }

    /// Write the session key: the full current user record, or remove the
    /// key when logged out.
    pub fn save_session<S: KeyValueStore>(store: &mut S, state: &WalletState) {
        match state.current_user() {
            Some(user) => Self::persist(store, keys::CURRENT_USER, user),
            None => {
                if let Err(e) = store.remove(keys::CURRENT_USER) {
                    tracing::warn!(key = keys::CURRENT_USER, error = %e, "failed to clear session");
                }
            }
        }
    }

    pub fn save_transactions<S: KeyValueStore>(store: &mut S, state: &WalletState) {
        Self::persist(store, keys::TRANSACTIONS, &state.transactions);
    }

    pub fn save_portfolios<S: KeyValueStore>(store: &mut S, state: &WalletState) {
        Self::persist(store, keys::PORTFOLIOS, &state.portfolios);
    }

    pub fn save_prices<S: KeyValueStore>(store: &mut S, state: &WalletState) {
        Self::persist(store, keys::PRICES, &state.prices.overrides);
        Self::persist(store, keys::LIVRETS, &state.prices.livrets);
        Self::persist(store, keys::CREDITS, &state.prices.credits);
    }

    /// Write every collection.
    pub fn save_all<S: KeyValueStore>(store: &mut S, state: &WalletState) {
        Self::save_users(store, state);
        Self::save_session(store, state);
        Self::save_transactions(store, state);
        Self::save_portfolios(store, state);
        Self::save_prices(store, state);
    }

    // ── Encrypted backup ────────────────────────────────────────────

    /// Encrypt a full snapshot of the wallet.
    ///
    /// Flow: WalletState → bincode → AES-256-GCM(Argon2id(password)) → TWLT frame
    pub fn export_backup(
        state: &WalletState,
        password: &str,
        kdf_params: &KdfParams,
    ) -> Result<Vec<u8>, CoreError> {
        let plaintext = bincode::serialize(state)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize wallet: {e}")))?;

        let salt = encryption::random_bytes::<16>()?;
        let nonce = encryption::random_bytes::<12>()?;
        let key = encryption::derive_key(password, &salt, kdf_params)?;
        let ciphertext = encryption::encrypt(&plaintext, &key, &nonce)?;

        let header = BackupHeader {
            version: CURRENT_VERSION,
            kdf_params: *kdf_params,
            salt,
            nonce,
            ciphertext_len: ciphertext.len() as u64,
        };
        Ok(header.frame(&ciphertext))
    }

    /// Decrypt a snapshot produced by `export_backup`.
    pub fn import_backup(data: &[u8], password: &str) -> Result<WalletState, CoreError> {
        let (header, ciphertext) = BackupHeader::parse(data)?;
        let key = encryption::derive_key(password, &header.salt, &header.kdf_params)?;
        let plaintext = encryption::decrypt(ciphertext, &key, &header.nonce)?;

        let mut state: WalletState = bincode::deserialize(&plaintext)
            .map_err(|e| CoreError::Deserialization(format!("Failed to deserialize wallet: {e}")))?;
        for tx in &mut state.transactions {
            tx.symbol = normalize_symbol(&tx.symbol);
        }
        state.prices.sanitize();
        Ok(state)
    }

    // ── Internal ────────────────────────────────────────────────────

    fn read<S: KeyValueStore, T: DeserializeOwned>(
        store: &S,
        key: &str,
    ) -> Result<Loaded<T>, CoreError> {
        let Some(raw) = store.get(key)? else {
            return Ok(Loaded::Missing);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Loaded::Value(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "stored value is not valid JSON for its type; ignoring it");
                Ok(Loaded::Corrupt)
            }
        }
    }

    fn read_or_default<S: KeyValueStore, T: DeserializeOwned + Default>(
        store: &S,
        key: &str,
    ) -> Result<T, CoreError> {
        Ok(match Self::read(store, key)? {
            Loaded::Value(value) => value,
            Loaded::Missing | Loaded::Corrupt => T::default(),
        })
    }

    /// Serialize and write one key. Failures are logged, not returned:
    /// the in-memory state stays authoritative for the session.
    fn persist<S: KeyValueStore, T: Serialize + ?Sized>(store: &mut S, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(|e| CoreError::Serialization(e.to_string()))
            .and_then(|json| store.set(key, &json));
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "failed to persist value");
        }
    }
}
