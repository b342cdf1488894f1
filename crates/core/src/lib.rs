pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod storage;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use config::TradeWalletConfig;
use errors::CoreError;
use models::{
    analytics::{AssetBreakdown, LivretSummary, OverallStats, PositionSummary},
    asset::AssetType,
    dashboard::{DashboardFilters, PortfolioScope, SeriesPoint, SymbolsByType},
    portfolio::{Portfolio, PortfolioRef},
    price::{LivretCredit, LivretState},
    state::WalletState,
    transaction::{
        AdminTransactionQuery, NewTransaction, Transaction, TransactionFilter, TransactionListing,
        TransactionPatch,
    },
    user::{
        AdminOverview, GeneratedAdmin, LoginRequest, NewUser, RegisterRequest, Role, User, UserPatch,
        UserQuery,
    },
};
use services::{
    analytics_service::AnalyticsService, auth_service::AuthService,
    dashboard_service::DashboardService, portfolio_service::PortfolioService,
    price_service::PriceService, transaction_service::TransactionService,
};
use storage::kv::{KeyValueStore, MemoryStore};
use storage::manager::StorageManager;

/// Main entry point of the TradeWallet core library.
///
/// Owns the key-value store, the configuration and the loaded wallet state.
/// Every mutation is applied in memory and then written through to the
/// store keys it touched.
#[must_use]
pub struct TradeWallet<S: KeyValueStore> {
    store: S,
    config: TradeWalletConfig,
    state: WalletState,
    auth_service: AuthService,
    portfolio_service: PortfolioService,
    transaction_service: TransactionService,
    price_service: PriceService,
    dashboard_service: DashboardService,
    analytics_service: AnalyticsService,
}

impl<S: KeyValueStore> std::fmt::Debug for TradeWallet<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeWallet")
            .field("users", &self.state.users.len())
            .field("portfolios", &self.state.portfolios.len())
            .field("transactions", &self.state.transactions.len())
            .field("logged_in", &self.state.session.is_some())
            .finish()
    }
}

impl TradeWallet<MemoryStore> {
    /// A wallet over a fresh in-memory store.
    pub fn in_memory(config: TradeWalletConfig) -> Result<Self, CoreError> {
        Self::open(MemoryStore::new(), config)
    }
}

impl<S: KeyValueStore> TradeWallet<S> {
    /// Load the wallet from `store`, seeding demo data into an empty store
    /// when the configuration asks for it.
    pub fn open(mut store: S, mut config: TradeWalletConfig) -> Result<Self, CoreError> {
        config.normalize();
        config.validate()?;
        let state = StorageManager::load_state(&mut store, &config)?;
        Ok(Self {
            store,
            config,
            state,
            auth_service: AuthService::new(),
            portfolio_service: PortfolioService::new(),
            transaction_service: TransactionService::new(),
            price_service: PriceService::new(),
            dashboard_service: DashboardService::new(),
            analytics_service: AnalyticsService::new(),
        })
    }

    /// Discard in-memory state and read everything back from the store.
    pub fn reload(&mut self) -> Result<(), CoreError> {
        self.state = StorageManager::load_state(&mut self.store, &self.config)?;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> &WalletState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &TradeWalletConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give back the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }

    // ── Session ─────────────────────────────────────────────────────

    pub fn login(&mut self, email: &str, password: &str) -> Result<User, CoreError> {
        let user = self
            .auth_service
            .login(&mut self.state, &LoginRequest::new(email, password))?;
        StorageManager::save_session(&mut self.store, &self.state);
        Ok(user)
    }

    /// Create a `User` account and log it in.
    pub fn register(&mut self, req: &RegisterRequest) -> Result<User, CoreError> {
        let user = self.auth_service.register(&mut self.state, req, &self.config)?;
        StorageManager::save_users(&mut self.store, &self.state);
        StorageManager::save_session(&mut self.store, &self.state);
        Ok(user)
    }

    pub fn logout(&mut self) {
        self.auth_service.logout(&mut self.state);
        StorageManager::save_session(&mut self.store, &self.state);
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&User> {
        self.state.current_user()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.current_user().is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.state.current_user().is_some_and(User::is_admin)
    }

    /// The logged-in user, or `NotAuthenticated`.
    pub fn me(&self) -> Result<&User, CoreError> {
        self.auth_service.require_user(&self.state)
    }

    // ── Admin: users ────────────────────────────────────────────────

    pub fn list_users(&self) -> Result<Vec<User>, CoreError> {
        self.auth_service.list_users(&self.state)
    }

    pub fn search_users(&self, query: &UserQuery) -> Result<Vec<User>, CoreError> {
        self.auth_service.search_users(&self.state, query)
    }

    pub fn create_user(&mut self, new_user: &NewUser) -> Result<User, CoreError> {
        let user = self.auth_service.create_user(&mut self.state, new_user, &self.config)?;
        StorageManager::save_users(&mut self.store, &self.state);
        Ok(user)
    }

    pub fn update_user(&mut self, user_id: Uuid, patch: &UserPatch) -> Result<User, CoreError> {
        let user = self
            .auth_service
            .update_user(&mut self.state, user_id, patch, &self.config)?;
        self.save_users_and_session();
        Ok(user)
    }

    /// Delete an account; its portfolios and transactions stay behind.
    pub fn delete_user(&mut self, user_id: Uuid) -> Result<bool, CoreError> {
        let removed = self.auth_service.delete_user(&mut self.state, user_id)?;
        if removed {
            self.save_users_and_session();
        }
        Ok(removed)
    }

    pub fn set_role(&mut self, user_id: Uuid, role: Role) -> Result<User, CoreError> {
        let user = self.auth_service.set_role(&mut self.state, user_id, role)?;
        self.save_users_and_session();
        Ok(user)
    }

    pub fn toggle_role(&mut self, user_id: Uuid) -> Result<User, CoreError> {
        let user = self.auth_service.toggle_role(&mut self.state, user_id)?;
        self.save_users_and_session();
        Ok(user)
    }

    pub fn reset_password(&mut self, user_id: Uuid, new_password: &str) -> Result<(), CoreError> {
        self.auth_service
            .reset_password(&mut self.state, user_id, new_password, &self.config)?;
        self.save_users_and_session();
        Ok(())
    }

    /// Create an admin with generated credentials. The clear password is
    /// only returned here.
    pub fn create_raw_admin(&mut self) -> Result<GeneratedAdmin, CoreError> {
        let generated = self.auth_service.create_raw_admin(&mut self.state, &self.config)?;
        StorageManager::save_users(&mut self.store, &self.state);
        Ok(generated)
    }

    pub fn overview(&self) -> Result<AdminOverview, CoreError> {
        self.auth_service.overview(&self.state)
    }

    /// Every user's transactions (admin view).
    pub fn all_transactions(&self, query: &AdminTransactionQuery) -> Result<TransactionListing, CoreError> {
        self.transaction_service.list_all(&self.state, query)
    }

    // ── Portfolios ──────────────────────────────────────────────────

    /// Portfolios of the logged-in user, oldest first.
    pub fn portfolios(&self) -> Result<Vec<Portfolio>, CoreError> {
        let user_id = self.auth_service.require_user(&self.state)?.id;
        Ok(self.portfolio_service.list_by_user(&self.state, user_id))
    }

    pub fn create_portfolio(&mut self, name: &str) -> Result<Portfolio, CoreError> {
        let portfolio = self.portfolio_service.create(&mut self.state, name, &self.config)?;
        StorageManager::save_portfolios(&mut self.store, &self.state);
        Ok(portfolio)
    }

    pub fn rename_portfolio(&mut self, portfolio_id: Uuid, name: &str) -> Result<Portfolio, CoreError> {
        let portfolio = self.portfolio_service.rename(&mut self.state, portfolio_id, name)?;
        StorageManager::save_portfolios(&mut self.store, &self.state);
        Ok(portfolio)
    }

    pub fn remove_portfolio(&mut self, portfolio_id: Uuid) -> Result<bool, CoreError> {
        let removed = self.portfolio_service.remove(&mut self.state, portfolio_id)?;
        if removed {
            StorageManager::save_portfolios(&mut self.store, &self.state);
        }
        Ok(removed)
    }

    // ── Transactions ────────────────────────────────────────────────

    pub fn add_transaction(&mut self, req: NewTransaction) -> Result<Transaction, CoreError> {
        let tx = self.transaction_service.create(&mut self.state, req)?;
        StorageManager::save_transactions(&mut self.store, &self.state);
        Ok(tx)
    }

    /// Record a transaction dated `created_at` instead of now.
    pub fn add_transaction_at(
        &mut self,
        req: NewTransaction,
        created_at: DateTime<Utc>,
    ) -> Result<Transaction, CoreError> {
        let tx = self.transaction_service.create_at(&mut self.state, req, created_at)?;
        StorageManager::save_transactions(&mut self.store, &self.state);
        Ok(tx)
    }

    pub fn update_transaction(&mut self, tx_id: Uuid, patch: TransactionPatch) -> Result<Transaction, CoreError> {
        let tx = self.transaction_service.update(&mut self.state, tx_id, patch)?;
        StorageManager::save_transactions(&mut self.store, &self.state);
        Ok(tx)
    }

    pub fn remove_transaction(&mut self, tx_id: Uuid) -> Result<bool, CoreError> {
        let removed = self.transaction_service.remove(&mut self.state, tx_id)?;
        if removed {
            StorageManager::save_transactions(&mut self.store, &self.state);
        }
        Ok(removed)
    }

    pub fn get_transaction(&self, tx_id: Uuid) -> Result<Transaction, CoreError> {
        self.transaction_service.get(&self.state, tx_id)
    }

    /// The logged-in user's transactions, newest first.
    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, CoreError> {
        self.transaction_service.list_mine(&self.state, filter)
    }

    pub fn total_by_asset_type(&self, asset_type: AssetType) -> Result<f64, CoreError> {
        self.transaction_service.total_by_asset_type(&self.state, asset_type)
    }

    pub fn total_all(&self) -> Result<f64, CoreError> {
        self.transaction_service.total_all(&self.state)
    }

    // ── Export / Import ─────────────────────────────────────────────

    pub fn export_transactions_json(&self) -> Result<String, CoreError> {
        self.transaction_service.export_json(&self.state)
    }

    pub fn export_transactions_csv(&self) -> Result<String, CoreError> {
        self.transaction_service.export_csv(&self.state)
    }

    /// Import a JSON export into the logged-in account (all-or-nothing).
    pub fn import_transactions_json(&mut self, json: &str) -> Result<usize, CoreError> {
        let count = self.transaction_service.import_json(&mut self.state, json)?;
        StorageManager::save_transactions(&mut self.store, &self.state);
        Ok(count)
    }

    // ── Prices & livrets ────────────────────────────────────────────

    /// Set a manual quote; `None` or a non-positive price clears it.
    pub fn set_price_override(&mut self, symbol: &str, price: Option<f64>) -> Result<(), CoreError> {
        self.auth_service.require_user(&self.state)?;
        self.price_service.set_override(&mut self.state.prices, symbol, price)?;
        StorageManager::save_prices(&mut self.store, &self.state);
        Ok(())
    }

    /// Override, else the logged-in user's latest traded price, else 0.
    pub fn current_price(&self, symbol: &str) -> Result<f64, CoreError> {
        let user_id = self.auth_service.require_user(&self.state)?.id;
        Ok(self
            .price_service
            .current_price(&self.state.prices, symbol, self.state.transactions_of(user_id)))
    }

    #[must_use]
    pub fn livret_state(&self, symbol: &str) -> LivretState {
        self.price_service.livret_state(&self.state.prices, symbol)
    }

    pub fn set_livret_current(&mut self, symbol: &str, amount: Option<f64>) -> Result<LivretState, CoreError> {
        self.auth_service.require_user(&self.state)?;
        let livret = self
            .price_service
            .set_livret_current(&mut self.state.prices, symbol, amount)?;
        StorageManager::save_prices(&mut self.store, &self.state);
        Ok(livret)
    }

    pub fn set_livret_target(&mut self, symbol: &str, target: Option<f64>) -> Result<LivretState, CoreError> {
        self.auth_service.require_user(&self.state)?;
        let livret = self
            .price_service
            .set_livret_target(&mut self.state.prices, symbol, target)?;
        StorageManager::save_prices(&mut self.store, &self.state);
        Ok(livret)
    }

    pub fn set_livret_rate(&mut self, symbol: &str, rate_pct: Option<f64>) -> Result<LivretState, CoreError> {
        self.auth_service.require_user(&self.state)?;
        let livret = self
            .price_service
            .set_livret_rate(&mut self.state.prices, symbol, rate_pct)?;
        StorageManager::save_prices(&mut self.store, &self.state);
        Ok(livret)
    }

    pub fn add_livret_credit(
        &mut self,
        symbol: &str,
        amount: f64,
        date: Option<NaiveDate>,
        note: Option<&str>,
    ) -> Result<LivretCredit, CoreError> {
        self.auth_service.require_user(&self.state)?;
        let credit = self
            .price_service
            .add_livret_credit(&mut self.state.prices, symbol, amount, date, note)?;
        StorageManager::save_prices(&mut self.store, &self.state);
        Ok(credit)
    }

    /// Remove the credits matching `date` and `amount`; returns how many went.
    pub fn remove_livret_credit(&mut self, symbol: &str, date: NaiveDate, amount: f64) -> Result<usize, CoreError> {
        self.auth_service.require_user(&self.state)?;
        let removed = self
            .price_service
            .remove_livret_credit(&mut self.state.prices, symbol, date, amount);
        if removed > 0 {
            StorageManager::save_prices(&mut self.store, &self.state);
        }
        Ok(removed)
    }

    #[must_use]
    pub fn livret_credits(&self, symbol: &str) -> Vec<LivretCredit> {
        self.price_service.list_livret_credits(&self.state.prices, symbol)
    }

    #[must_use]
    pub fn total_livret_credits(&self, symbol: &str) -> f64 {
        self.price_service.total_livret_credits(&self.state.prices, symbol)
    }

    #[must_use]
    pub fn last_credit_date(&self, symbol: &str) -> Option<NaiveDate> {
        self.price_service.last_credit_date(&self.state.prices, symbol)
    }

    // ── Dashboard ───────────────────────────────────────────────────

    /// Time series for `filters`, bucketed relative to `today`.
    pub fn series(&self, filters: &DashboardFilters, today: NaiveDate) -> Result<Vec<SeriesPoint>, CoreError> {
        self.dashboard_service.series(&self.state, filters, today)
    }

    pub fn series_now(&self, filters: &DashboardFilters) -> Result<Vec<SeriesPoint>, CoreError> {
        self.dashboard_service.series_now(&self.state, filters)
    }

    pub fn series_total(&self, filters: &DashboardFilters, today: NaiveDate) -> Result<f64, CoreError> {
        let points = self.series(filters, today)?;
        Ok(self.dashboard_service.series_total(&points))
    }

    pub fn symbols(&self) -> Result<Vec<String>, CoreError> {
        self.dashboard_service.symbols(&self.state)
    }

    pub fn symbols_by_type(&self, scope: PortfolioScope) -> Result<SymbolsByType, CoreError> {
        self.dashboard_service.symbols_by_type(&self.state, scope)
    }

    pub fn livrets(&self, scope: PortfolioScope) -> Result<Vec<String>, CoreError> {
        self.dashboard_service.livrets(&self.state, scope)
    }

    /// `(id, name)` pairs for the portfolio selector.
    pub fn portfolio_options(&self) -> Result<Vec<PortfolioRef>, CoreError> {
        self.dashboard_service.portfolios(&self.state)
    }

    // ── Analytics ───────────────────────────────────────────────────

    pub fn positions(&self, scope: PortfolioScope) -> Result<Vec<PositionSummary>, CoreError> {
        self.analytics_service.positions(&self.state, scope)
    }

    pub fn overall_stats(&self, scope: PortfolioScope) -> Result<OverallStats, CoreError> {
        self.analytics_service.overall(&self.state, scope)
    }

    pub fn asset_breakdown(
        &self,
        scope: PortfolioScope,
        asset_type: AssetType,
        symbol: &str,
    ) -> Result<AssetBreakdown, CoreError> {
        self.analytics_service.breakdown(&self.state, scope, asset_type, symbol)
    }

    pub fn asset_breakdowns(&self, scope: PortfolioScope) -> Result<Vec<AssetBreakdown>, CoreError> {
        self.analytics_service.breakdowns(&self.state, scope)
    }

    pub fn livret_summary(&self, scope: PortfolioScope, symbol: &str) -> Result<LivretSummary, CoreError> {
        self.analytics_service.livret_summary(&self.state, scope, symbol)
    }

    pub fn livret_summaries(&self, scope: PortfolioScope) -> Result<Vec<LivretSummary>, CoreError> {
        self.analytics_service.livret_summaries(&self.state, scope)
    }

    // ── Encrypted backup ────────────────────────────────────────────

    /// Encrypted snapshot of the whole wallet (every account). Admin only.
    pub fn export_backup(&self, password: &str) -> Result<Vec<u8>, CoreError> {
        self.auth_service.require_admin(&self.state)?;
        StorageManager::export_backup(&self.state, password, &self.config.backup_kdf)
    }

    /// Replace the whole wallet with a decrypted backup and persist it.
    /// The current session survives only if its account exists in the
    /// backup. Admin only.
    pub fn import_backup(&mut self, data: &[u8], password: &str) -> Result<(), CoreError> {
        let session = self.auth_service.require_admin(&self.state)?.id;
        let mut imported = StorageManager::import_backup(data, password)?;
        imported.session = imported
            .users
            .iter()
            .any(|u| u.id == session)
            .then_some(session);

        self.state = imported;
        StorageManager::save_all(&mut self.store, &self.state);
        tracing::debug!(
            users = self.state.users.len(),
            transactions = self.state.transactions.len(),
            "backup restored"
        );
        Ok(())
    }

    // ── Internal ────────────────────────────────────────────────────

    /// The session key stores the full user record, so it is refreshed
    /// along with the user list.
    fn save_users_and_session(&mut self) {
        StorageManager::save_users(&mut self.store, &self.state);
        StorageManager::save_session(&mut self.store, &self.state);
    }
}
