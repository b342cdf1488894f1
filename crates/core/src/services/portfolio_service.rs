use chrono::Utc;
use uuid::Uuid;

use crate::config::TradeWalletConfig;
use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;
use crate::models::state::WalletState;
use crate::models::user::User;

/// Demo wallets created alongside the demo accounts: (owner email, name).
pub const DEMO_PORTFOLIOS: [(&str, &str); 2] = [
    ("admin@gmail.com", "Admin Wallet"),
    ("user@gmail.com", "My Wallet"),
];

/// Creates, renames and removes portfolios.
///
/// Pure business logic over `WalletState`: no I/O. Mutations require a
/// session; the owner or an admin may act on a portfolio.
pub struct PortfolioService;

impl PortfolioService {
    pub fn new() -> Self {
        Self
    }

    /// One wallet per demo account present in `users`.
    pub fn demo_portfolios(&self, users: &[User], config: &TradeWalletConfig) -> Vec<Portfolio> {
        DEMO_PORTFOLIOS
            .iter()
            .filter_map(|(email, name)| {
                users
                    .iter()
                    .find(|u| u.email.eq_ignore_ascii_case(email))
                    .map(|u| Portfolio::new(u.id, *name, config.base_currency.clone()))
            })
            .collect()
    }

    /// Portfolios owned by `user_id`, oldest first.
    pub fn list_by_user(&self, state: &WalletState, user_id: Uuid) -> Vec<Portfolio> {
        let mut portfolios: Vec<Portfolio> = state
            .portfolios
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        portfolios.sort_by_key(|p| p.created_at);
        portfolios
    }

    pub fn get(&self, state: &WalletState, portfolio_id: Uuid) -> Option<Portfolio> {
        state.portfolios.iter().find(|p| p.id == portfolio_id).cloned()
    }

    /// Create a portfolio for the logged-in user. A blank name falls back to
    /// the configured default.
    pub fn create(
        &self,
        state: &mut WalletState,
        name: &str,
        config: &TradeWalletConfig,
    ) -> Result<Portfolio, CoreError> {
        let owner = state.current_user().ok_or(CoreError::NotAuthenticated)?.id;

        let trimmed = name.trim();
        let name = if trimmed.is_empty() {
            config.default_portfolio_name.as_str()
        } else {
            trimmed
        };

        let portfolio = Portfolio::new(owner, name, config.base_currency.clone());
        state.portfolios.push(portfolio.clone());
        tracing::debug!(portfolio_id = %portfolio.id, "portfolio created");
        Ok(portfolio)
    }

    /// Rename a portfolio. A blank name keeps the current one; `updated_at`
    /// is bumped either way.
    pub fn rename(
        &self,
        state: &mut WalletState,
        portfolio_id: Uuid,
        name: &str,
    ) -> Result<Portfolio, CoreError> {
        let idx = self.authorized_index(state, portfolio_id)?;
        let portfolio = &mut state.portfolios[idx];

        let trimmed = name.trim();
        if !trimmed.is_empty() {
            portfolio.name = trimmed.to_string();
        }
        portfolio.updated_at = Utc::now();
        Ok(portfolio.clone())
    }

    /// Remove a portfolio. Its transactions are kept and keep pointing at
    /// the removed id. Returns `false` when no such portfolio exists.
    pub fn remove(&self, state: &mut WalletState, portfolio_id: Uuid) -> Result<bool, CoreError> {
        match self.authorized_index(state, portfolio_id) {
            Ok(idx) => {
                state.portfolios.remove(idx);
                tracing::debug!(portfolio_id = %portfolio_id, "portfolio removed");
                Ok(true)
            }
            Err(CoreError::PortfolioNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check that the logged-in user may modify `portfolio_id`.
    pub fn ensure_access(&self, state: &WalletState, portfolio_id: Uuid) -> Result<(), CoreError> {
        self.authorized_index(state, portfolio_id).map(|_| ())
    }

    fn authorized_index(&self, state: &WalletState, portfolio_id: Uuid) -> Result<usize, CoreError> {
        let user = state.current_user().ok_or(CoreError::NotAuthenticated)?;
        let idx = state
            .portfolios
            .iter()
            .position(|p| p.id == portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;

        if state.portfolios[idx].user_id != user.id && !user.is_admin() {
            return Err(CoreError::Forbidden(format!(
                "portfolio {portfolio_id} belongs to another user"
            )));
        }
        Ok(idx)
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}
