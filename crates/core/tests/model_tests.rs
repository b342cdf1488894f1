// ═══════════════════════════════════════════════════════════════════
// Model Tests — assets, transactions, users, prices, dashboard types,
// configuration
// ═══════════════════════════════════════════════════════════════════

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use tradewallet_core::config::TradeWalletConfig;
use tradewallet_core::models::asset::{normalize_symbol, AssetType};
use tradewallet_core::models::dashboard::{Bucket, DashboardFilters, PortfolioScope, Range};
use tradewallet_core::models::price::{LivretCredit, PriceBook};
use tradewallet_core::models::transaction::{
    signed_total, NewTransaction, SortDirection, Transaction, TransactionFilter, TransactionPatch,
    TransactionType,
};
use tradewallet_core::models::user::{Role, User};
use tradewallet_core::storage::encryption::KdfParams;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn credit(d: NaiveDate, amount: f64) -> LivretCredit {
    LivretCredit {
        date: d,
        amount,
        note: None,
    }
}

// ═══════════════════════════════════════════════════════════════════
// AssetType
// ═══════════════════════════════════════════════════════════════════

mod asset_type {
    use super::*;

    #[test]
    fn display_is_lowercase() {
        assert_eq!(AssetType::Stock.to_string(), "stock");
        assert_eq!(AssetType::Etf.to_string(), "etf");
        assert_eq!(AssetType::Crypto.to_string(), "crypto");
        assert_eq!(AssetType::Livret.to_string(), "livret");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(" ETF ".parse::<AssetType>().unwrap(), AssetType::Etf);
        assert_eq!("Livret".parse::<AssetType>().unwrap(), AssetType::Livret);
        assert!("bond".parse::<AssetType>().is_err());
    }

    #[test]
    fn livret_is_not_a_market_asset() {
        assert!(AssetType::Stock.is_market());
        assert!(AssetType::Crypto.is_market());
        assert!(!AssetType::Livret.is_market());
        assert!(!AssetType::MARKET.contains(&AssetType::Livret));
        assert_eq!(AssetType::ALL.len(), 4);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&AssetType::Crypto).unwrap();
        assert_eq!(json, "\"crypto\"");
        let back: AssetType = serde_json::from_str("\"livret\"").unwrap();
        assert_eq!(back, AssetType::Livret);
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_symbol("  aapl "), "AAPL");
        assert_eq!(normalize_symbol("Livret A"), "LIVRET A");
        assert_eq!(normalize_symbol("   "), "");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Transaction
// ═══════════════════════════════════════════════════════════════════

mod transaction {
    use super::*;

    fn sample() -> Transaction {
        let req = NewTransaction::buy(Uuid::new_v4(), AssetType::Stock, " aapl", 10.0, 100.0).with_fees(2.5);
        Transaction::from_request(Uuid::new_v4(), req, Utc::now())
    }

    #[test]
    fn signed_total_for_buy_adds_fees() {
        assert_eq!(signed_total(TransactionType::Buy, 10.0, 100.0, 2.5), 1002.5);
    }

    #[test]
    fn signed_total_for_sell_is_negative_plus_fees() {
        assert_eq!(signed_total(TransactionType::Sell, 10.0, 100.0, 2.5), -997.5);
    }

    #[test]
    fn from_request_normalizes_and_computes_total() {
        let tx = sample();
        assert_eq!(tx.symbol, "AAPL");
        assert_eq!(tx.fees, 2.5);
        assert_eq!(tx.total, 1002.5);
    }

    #[test]
    fn missing_fees_default_to_zero() {
        let req = NewTransaction::sell(Uuid::new_v4(), AssetType::Crypto, "btc", 0.5, 40_000.0);
        let tx = Transaction::from_request(Uuid::new_v4(), req, Utc::now());
        assert_eq!(tx.fees, 0.0);
        assert_eq!(tx.total, -20_000.0);
    }

    #[test]
    fn deposit_carries_amount_in_price() {
        let req = NewTransaction::deposit(Uuid::new_v4(), "livret a", 500.0);
        assert_eq!(req.asset_type, AssetType::Livret);
        assert_eq!(req.tx_type, TransactionType::Buy);
        assert_eq!(req.quantity, 1.0);
        assert_eq!(req.price_per_unit, 500.0);

        let withdrawal = NewTransaction::withdrawal(Uuid::new_v4(), "livret a", 200.0);
        assert_eq!(withdrawal.tx_type, TransactionType::Sell);
    }

    #[test]
    fn patch_recomputes_total() {
        let mut tx = sample();
        tx.apply_patch(TransactionPatch {
            tx_type: Some(TransactionType::Sell),
            quantity: Some(4.0),
            symbol: Some("msft ".into()),
            ..Default::default()
        });
        assert_eq!(tx.symbol, "MSFT");
        assert_eq!(tx.total, -400.0 + 2.5);
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let mut tx = sample();
        let before = tx.clone();
        tx.apply_patch(TransactionPatch::default());
        assert_eq!(tx, before);
    }

    #[test]
    fn filter_matches_on_each_field() {
        let tx = sample();
        assert!(TransactionFilter::default().matches(&tx));
        assert!(TransactionFilter {
            asset_type: Some(AssetType::Stock),
            portfolio_id: Some(tx.portfolio_id),
        }
        .matches(&tx));
        assert!(!TransactionFilter {
            asset_type: Some(AssetType::Etf),
            ..Default::default()
        }
        .matches(&tx));
        assert!(!TransactionFilter {
            portfolio_id: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .matches(&tx));
    }

    #[test]
    fn json_uses_type_names_and_rfc3339_dates() {
        let tx = sample();
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"tx_type\":\"buy\""));
        assert!(json.contains("\"asset_type\":\"stock\""));
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.created_at, tx.created_at);
    }

    #[test]
    fn sort_direction_applies_and_flips() {
        use std::cmp::Ordering;
        assert_eq!(SortDirection::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(SortDirection::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(SortDirection::default(), SortDirection::Desc);
        assert_eq!(SortDirection::Asc.flipped(), SortDirection::Desc);
    }
}

// ═══════════════════════════════════════════════════════════════════
// User
// ═══════════════════════════════════════════════════════════════════

mod user {
    use super::*;

    fn sample(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "ada".into(),
            first_name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: String::new(),
            password_hash: "$argon2id$v=19$secret".into(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn role_toggles() {
        assert_eq!(Role::User.toggled(), Role::Admin);
        assert_eq!(Role::Admin.toggled(), Role::User);
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn is_admin_follows_role() {
        assert!(sample(Role::Admin).is_admin());
        assert!(!sample(Role::User).is_admin());
    }

    #[test]
    fn debug_omits_password_hash() {
        let debug = format!("{:?}", sample(Role::User));
        assert!(debug.contains("ada@example.com"));
        assert!(!debug.contains("argon2id"));
    }

    #[test]
    fn missing_optional_fields_deserialize() {
        let json = format!(
            r#"{{"id":"{}","name":"x","email":"x@y.z","password_hash":"h","created_at":"2025-01-15T10:00:00Z"}}"#,
            Uuid::new_v4()
        );
        let user: User = serde_json::from_str(&json).unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.first_name.is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// PriceBook
// ═══════════════════════════════════════════════════════════════════

mod price_book {
    use super::*;

    #[test]
    fn credits_stay_sorted_by_date() {
        let mut book = PriceBook::new();
        book.insert_credit("livret a", credit(date(2025, 3, 1), 3.0));
        book.insert_credit("LIVRET A", credit(date(2025, 1, 1), 1.0));
        book.insert_credit("Livret A", credit(date(2025, 2, 1), 2.0));

        let amounts: Vec<f64> = book.credits_for("livret a").iter().map(|c| c.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn same_date_credits_keep_insertion_order() {
        let mut book = PriceBook::new();
        book.insert_credit("LA", credit(date(2025, 1, 1), 1.0));
        book.insert_credit("LA", credit(date(2025, 1, 1), 2.0));
        let amounts: Vec<f64> = book.credits_for("LA").iter().map(|c| c.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0]);
    }

    #[test]
    fn unknown_livret_has_no_credits() {
        assert!(PriceBook::new().credits_for("nope").is_empty());
    }

    #[test]
    fn sanitize_repairs_loaded_data() {
        let mut book = PriceBook::new();
        book.overrides.insert("aapl".into(), 150.0);
        book.overrides.insert("bad".into(), -1.0);
        book.overrides.insert("nan".into(), f64::NAN);
        book.credits.insert(
            "la".into(),
            vec![
                credit(date(2025, 5, 1), 5.0),
                credit(date(2025, 1, 1), 0.0),
                credit(date(2025, 2, 1), 2.0),
            ],
        );

        book.sanitize();

        assert_eq!(book.get_override("AAPL"), Some(150.0));
        assert_eq!(book.overrides.len(), 1);
        let dates: Vec<NaiveDate> = book.credits_for("LA").iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![date(2025, 2, 1), date(2025, 5, 1)]);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Dashboard types
// ═══════════════════════════════════════════════════════════════════

mod dashboard {
    use super::*;

    #[test]
    fn range_buckets() {
        assert_eq!(Range::Days7.bucket(), Bucket::Day);
        assert_eq!(Range::Days30.bucket(), Bucket::Day);
        assert_eq!(Range::Months12.bucket(), Bucket::Month);
        assert_eq!(Range::All.bucket(), Bucket::Month);
    }

    #[test]
    fn range_serde_names() {
        assert_eq!(serde_json::to_string(&Range::Days7).unwrap(), "\"7d\"");
        assert_eq!(serde_json::from_str::<Range>("\"all\"").unwrap(), Range::All);
    }

    #[test]
    fn default_filters() {
        let f = DashboardFilters::default();
        assert_eq!(f.range, Range::Months12);
        assert_eq!(f.portfolio, PortfolioScope::All);
        assert!(f.asset_type.is_none());
        assert!(f.symbol.is_empty());
    }

    #[test]
    fn portfolio_scope_includes() {
        let id = Uuid::new_v4();
        assert!(PortfolioScope::All.includes(id));
        assert!(PortfolioScope::One(id).includes(id));
        assert!(!PortfolioScope::One(id).includes(Uuid::new_v4()));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════

mod config {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = TradeWalletConfig::default();
        assert!(cfg.seed_demo_data);
        assert_eq!(cfg.min_password_len, 6);
        assert_eq!(cfg.base_currency, "EUR");
        assert_eq!(cfg.backup_kdf, KdfParams::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = TradeWalletConfig::from_json_str(r#"{"base_currency":"USD","min_password_len":8}"#).unwrap();
        assert_eq!(cfg.base_currency, "USD");
        assert_eq!(cfg.min_password_len, 8);
        assert_eq!(cfg.default_portfolio_name, "New portfolio");
    }

    #[test]
    fn currency_is_upper_cased() {
        let cfg = TradeWalletConfig::from_json_str(r#"{"base_currency":" usd "}"#).unwrap();
        assert_eq!(cfg.base_currency, "USD");
    }

    #[test]
    fn rejects_bad_currency() {
        assert!(TradeWalletConfig::from_json_str(r#"{"base_currency":"EURO"}"#).is_err());
    }

    #[test]
    fn rejects_zero_password_length() {
        assert!(TradeWalletConfig::from_json_str(r#"{"min_password_len":0}"#).is_err());
    }

    #[test]
    fn rejects_unsafe_kdf() {
        let json = r#"{"backup_kdf":{"memory_cost":1,"time_cost":1,"parallelism":1}}"#;
        assert!(TradeWalletConfig::from_json_str(json).is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tradewallet.json");
        std::fs::write(&path, r#"{"seed_demo_data":false}"#).unwrap();
        let cfg = TradeWalletConfig::from_file(&path).unwrap();
        assert!(!cfg.seed_demo_data);
    }
}
