// ═══════════════════════════════════════════════════════════════════
// Storage Tests — encryption, backup format, key-value stores,
// StorageManager
// ═══════════════════════════════════════════════════════════════════

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use tradewallet_core::config::TradeWalletConfig;
use tradewallet_core::errors::CoreError;
use tradewallet_core::models::asset::AssetType;
use tradewallet_core::models::price::LivretCredit;
use tradewallet_core::models::state::WalletState;
use tradewallet_core::models::transaction::{NewTransaction, Transaction};
use tradewallet_core::storage::encryption::{
    decrypt, derive_key, encrypt, hash_password, random_bytes, random_token, verify_password, KdfParams,
};
use tradewallet_core::storage::format::{BackupHeader, CURRENT_VERSION, HEADER_SIZE, MAGIC};
use tradewallet_core::storage::kv::{FileStore, KeyValueStore, MemoryStore};
use tradewallet_core::storage::manager::{keys, StorageManager};

/// Cheapest Argon2 parameters accepted by `KdfParams::validate`.
fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_cost: 8,
        time_cost: 1,
        parallelism: 1,
    }
}

fn fast_config() -> TradeWalletConfig {
    TradeWalletConfig {
        password_kdf: fast_kdf(),
        backup_kdf: fast_kdf(),
        ..TradeWalletConfig::default()
    }
}

/// Store whose reads always fail.
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Err(CoreError::Storage {
            key: key.to_string(),
            message: "unavailable".into(),
        })
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), CoreError> {
        Ok(())
    }

    fn remove(&mut self, _key: &str) -> Result<(), CoreError> {
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CoreError> {
        Ok(Vec::new())
    }
}

// ═══════════════════════════════════════════════════════════════════
// KdfParams
// ═══════════════════════════════════════════════════════════════════

mod kdf_params {
    use super::*;

    #[test]
    fn default_values() {
        let p = KdfParams::default();
        assert_eq!(p.memory_cost, 65_536);
        assert_eq!(p.time_cost, 3);
        assert_eq!(p.parallelism, 4);
    }

    #[test]
    fn password_default_is_lighter() {
        let p = KdfParams::password_default();
        assert!(p.memory_cost < KdfParams::default().memory_cost);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let too_little_memory = KdfParams { memory_cost: 4, ..fast_kdf() };
        let zero_time = KdfParams { time_cost: 0, ..fast_kdf() };
        let many_lanes = KdfParams { parallelism: 64, ..fast_kdf() };
        for p in [too_little_memory, zero_time, many_lanes] {
            assert!(matches!(p.validate(), Err(CoreError::InvalidFileFormat(_))));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Password hashing
// ═══════════════════════════════════════════════════════════════════

mod passwords {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let phc = hash_password("admin123", &fast_kdf()).unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(verify_password("admin123", &phc));
        assert!(!verify_password("admin124", &phc));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same", &fast_kdf()).unwrap();
        let b = hash_password("same", &fast_kdf()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("admin123", "admin123"));
        assert!(!verify_password("", ""));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Encryption
// ═══════════════════════════════════════════════════════════════════

mod encryption {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let salt = random_bytes::<16>().unwrap();
        let nonce = random_bytes::<12>().unwrap();
        let key = derive_key("pw", &salt, &fast_kdf()).unwrap();

        let ciphertext = encrypt(b"wallet", &key, &nonce).unwrap();
        assert_ne!(&ciphertext[..], b"wallet");
        assert_eq!(decrypt(&ciphertext, &key, &nonce).unwrap(), b"wallet");
    }

    #[test]
    fn wrong_key_fails() {
        let salt = random_bytes::<16>().unwrap();
        let nonce = random_bytes::<12>().unwrap();
        let key = derive_key("right", &salt, &fast_kdf()).unwrap();
        let other = derive_key("wrong", &salt, &fast_kdf()).unwrap();

        let ciphertext = encrypt(b"wallet", &key, &nonce).unwrap();
        assert!(matches!(decrypt(&ciphertext, &other, &nonce), Err(CoreError::Decryption)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [7u8; 32];
        let nonce = [1u8; 12];
        let mut ciphertext = encrypt(b"wallet", &key, &nonce).unwrap();
        ciphertext[0] ^= 0xff;
        assert!(matches!(decrypt(&ciphertext, &key, &nonce), Err(CoreError::Decryption)));
    }

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [3u8; 16];
        assert_eq!(
            derive_key("pw", &salt, &fast_kdf()).unwrap(),
            derive_key("pw", &salt, &fast_kdf()).unwrap()
        );
    }

    #[test]
    fn random_token_uses_alphabet() {
        let token = random_token(32).unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Backup format
// ═══════════════════════════════════════════════════════════════════

mod format {
    use super::*;

    fn header(len: u64) -> BackupHeader {
        BackupHeader {
            version: CURRENT_VERSION,
            kdf_params: fast_kdf(),
            salt: [1u8; 16],
            nonce: [2u8; 12],
            ciphertext_len: len,
        }
    }

    #[test]
    fn frame_then_parse() {
        let framed = header(3).frame(b"abc");
        assert_eq!(framed.len(), HEADER_SIZE + 3);
        assert_eq!(&framed[..4], MAGIC);

        let (parsed, body) = BackupHeader::parse(&framed).unwrap();
        assert_eq!(parsed, header(3));
        assert_eq!(body, b"abc");
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut framed = header(3).frame(b"abc");
        framed.extend_from_slice(b"junk");
        let (_, body) = BackupHeader::parse(&framed).unwrap();
        assert_eq!(body, b"abc");
    }

    #[test]
    fn too_small() {
        assert!(matches!(BackupHeader::parse(b"TWLT"), Err(CoreError::InvalidFileFormat(_))));
    }

    #[test]
    fn bad_magic() {
        let mut framed = header(0).frame(b"");
        framed[0] = b'X';
        assert!(matches!(BackupHeader::parse(&framed), Err(CoreError::InvalidFileFormat(_))));
    }

    #[test]
    fn unknown_versions() {
        for version in [0u16, CURRENT_VERSION + 1] {
            let framed = BackupHeader { version, ..header(0) }.frame(b"");
            assert!(matches!(
                BackupHeader::parse(&framed),
                Err(CoreError::UnsupportedVersion(v)) if v == version
            ));
        }
    }

    #[test]
    fn unsafe_kdf_rejected() {
        let framed = BackupHeader {
            kdf_params: KdfParams {
                memory_cost: u32::MAX,
                ..fast_kdf()
            },
            ..header(0)
        }
        .frame(b"");
        assert!(matches!(BackupHeader::parse(&framed), Err(CoreError::InvalidFileFormat(_))));
    }

    #[test]
    fn truncated_ciphertext() {
        let mut framed = header(10).frame(&[0u8; 10]);
        framed.truncate(HEADER_SIZE + 4);
        assert!(matches!(BackupHeader::parse(&framed), Err(CoreError::InvalidFileFormat(_))));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Key-value stores
// ═══════════════════════════════════════════════════════════════════

mod memory_store {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);

        store.remove("a").unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}

mod file_store {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.set("tw_users", "[]").unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("tw_users").unwrap().as_deref(), Some("[]"));
        assert!(dir.path().join("tw_users.json").exists());
    }

    #[test]
    fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("nothing").unwrap(), None);
    }

    #[test]
    fn keys_lists_json_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set("tw_prices", "{}").unwrap();
        store.set("tw_current_user", "null").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert_eq!(store.keys().unwrap(), vec!["tw_current_user", "tw_prices"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set("k", "1").unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn path_like_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(store.set("../escape", "1"), Err(CoreError::Storage { .. })));
        assert!(matches!(store.get(""), Err(CoreError::Storage { .. })));
    }
}

// ═══════════════════════════════════════════════════════════════════
// StorageManager
// ═══════════════════════════════════════════════════════════════════

mod manager {
    use super::*;

    #[test]
    fn empty_store_is_seeded_and_persisted() {
        let mut store = MemoryStore::new();
        let state = StorageManager::load_state(&mut store, &fast_config()).unwrap();

        assert_eq!(state.users.len(), 2);
        assert_eq!(state.portfolios.len(), 2);
        assert!(state.session.is_none());
        assert!(store.get(keys::USERS).unwrap().is_some());
        assert!(store.get(keys::PORTFOLIOS).unwrap().is_some());

        let admin = state.find_user_by_email("ADMIN@gmail.com").unwrap();
        assert!(admin.is_admin());
        assert!(verify_password("admin123", &admin.password_hash));
        let wallet = state.portfolios.iter().find(|p| p.user_id == admin.id).unwrap();
        assert_eq!(wallet.name, "Admin Wallet");
    }

    #[test]
    fn second_load_keeps_seeded_ids() {
        let mut store = MemoryStore::new();
        let first = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        let second = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        assert_eq!(first.users, second.users);
        assert_eq!(first.portfolios, second.portfolios);
    }

    #[test]
    fn seeding_can_be_disabled() {
        let mut store = MemoryStore::new();
        let config = TradeWalletConfig {
            seed_demo_data: false,
            ..fast_config()
        };
        let state = StorageManager::load_state(&mut store, &config).unwrap();
        assert!(state.users.is_empty());
        assert!(state.portfolios.is_empty());
        assert_eq!(store.get(keys::USERS).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn corrupt_users_are_reseeded() {
        let mut store = MemoryStore::new();
        store.set(keys::USERS, "{not json").unwrap();
        let state = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        assert_eq!(state.users.len(), 2);
    }

    #[test]
    fn corrupt_transactions_load_empty() {
        let mut store = MemoryStore::new();
        StorageManager::load_state(&mut store, &fast_config()).unwrap();
        store.set(keys::TRANSACTIONS, "[{\"id\": 1}]").unwrap();

        let state = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        assert!(state.transactions.is_empty());
        assert_eq!(state.users.len(), 2);
    }

    #[test]
    fn loaded_symbols_are_normalized() {
        let mut store = MemoryStore::new();
        let state = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        let mut tx = Transaction::from_request(
            state.users[1].id,
            NewTransaction::buy(state.portfolios[1].id, AssetType::Stock, "AAPL", 1.0, 100.0),
            Utc::now(),
        );
        tx.symbol = " aapl ".into();
        store
            .set(keys::TRANSACTIONS, &serde_json::to_string(&vec![tx]).unwrap())
            .unwrap();

        let reloaded = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        assert_eq!(reloaded.transactions[0].symbol, "AAPL");
    }

    #[test]
    fn session_restored_for_known_user_only() {
        let mut store = MemoryStore::new();
        let mut state = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        let user_id = state.users[1].id;
        state.session = Some(user_id);
        StorageManager::save_session(&mut store, &state);

        let restored = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        assert_eq!(restored.session, Some(user_id));

        let mut stranger = state.users[1].clone();
        stranger.id = Uuid::new_v4();
        store
            .set(keys::CURRENT_USER, &serde_json::to_string(&stranger).unwrap())
            .unwrap();
        let dropped = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        assert_eq!(dropped.session, None);
    }

    #[test]
    fn logging_out_removes_session_key() {
        let mut store = MemoryStore::new();
        let mut state = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        state.session = Some(state.users[0].id);
        StorageManager::save_session(&mut store, &state);
        assert!(store.get(keys::CURRENT_USER).unwrap().is_some());

        state.session = None;
        StorageManager::save_session(&mut store, &state);
        assert_eq!(store.get(keys::CURRENT_USER).unwrap(), None);
    }

    #[test]
    fn prices_are_sanitized_on_load() {
        let mut store = MemoryStore::new();
        store.set(keys::PRICES, r#"{"aapl": 190.5, "bad": 0}"#).unwrap();
        store
            .set(
                keys::CREDITS,
                r#"{"livret a": [
                    {"date": "2025-06-01", "amount": 4.0},
                    {"date": "2025-01-01", "amount": 1.5},
                    {"date": "2025-03-01", "amount": -2.0}
                ]}"#,
            )
            .unwrap();

        let state = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        assert_eq!(state.prices.get_override("AAPL"), Some(190.5));
        assert_eq!(state.prices.get_override("BAD"), None);
        let credits: Vec<NaiveDate> = state.prices.credits_for("LIVRET A").iter().map(|c| c.date).collect();
        assert_eq!(
            credits,
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
            ]
        );
    }

    #[test]
    fn save_all_writes_every_collection() {
        let mut store = MemoryStore::new();
        let mut state = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        state.session = Some(state.users[0].id);
        state.prices.overrides.insert("BTC".into(), 50_000.0);

        let mut fresh = MemoryStore::new();
        StorageManager::save_all(&mut fresh, &state);
        for key in keys::ALL {
            assert!(fresh.get(key).unwrap().is_some(), "missing {key}");
        }
    }

    #[test]
    fn read_errors_propagate() {
        let mut store = BrokenStore;
        assert!(matches!(
            StorageManager::load_state(&mut store, &fast_config()),
            Err(CoreError::Storage { .. })
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Encrypted backup
// ═══════════════════════════════════════════════════════════════════

mod backup {
    use super::*;

    fn populated_state() -> WalletState {
        let mut store = MemoryStore::new();
        let mut state = StorageManager::load_state(&mut store, &fast_config()).unwrap();
        let owner = state.users[0].id;
        let portfolio = state.portfolios[0].id;
        state.transactions.push(Transaction::from_request(
            owner,
            NewTransaction::buy(portfolio, AssetType::Etf, "cw8", 2.0, 450.0),
            Utc::now(),
        ));
        state.prices.insert_credit(
            "LIVRET A",
            LivretCredit {
                date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
                amount: 30.0,
                note: Some("interest".into()),
            },
        );
        state
    }

    #[test]
    fn roundtrip() {
        let state = populated_state();
        let bytes = StorageManager::export_backup(&state, "backup-pw", &fast_kdf()).unwrap();
        assert_eq!(&bytes[..4], MAGIC);

        let restored = StorageManager::import_backup(&bytes, "backup-pw").unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn restored_symbols_are_normalized() {
        let mut state = populated_state();
        state.transactions[0].symbol = "cw8".into();
        let bytes = StorageManager::export_backup(&state, "backup-pw", &fast_kdf()).unwrap();

        let restored = StorageManager::import_backup(&bytes, "backup-pw").unwrap();
        assert_eq!(restored.transactions[0].symbol, "CW8");
    }

    #[test]
    fn wrong_password() {
        let bytes = StorageManager::export_backup(&populated_state(), "right", &fast_kdf()).unwrap();
        assert!(matches!(
            StorageManager::import_backup(&bytes, "wrong"),
            Err(CoreError::Decryption)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            StorageManager::import_backup(&[0u8; 100], "pw"),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[test]
    fn each_export_uses_fresh_salt_and_nonce() {
        let state = populated_state();
        let a = StorageManager::export_backup(&state, "pw", &fast_kdf()).unwrap();
        let b = StorageManager::export_backup(&state, "pw", &fast_kdf()).unwrap();
        assert_ne!(a, b);
    }
}
