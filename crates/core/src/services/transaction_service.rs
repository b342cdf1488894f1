use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::asset::AssetType;
use crate::models::state::WalletState;
use crate::models::transaction::{
    AdminTransactionQuery, NewTransaction, Transaction, TransactionFilter, TransactionListing,
    TransactionPatch, TransactionSortKey,
};
use crate::models::user::User;
use crate::services::auth_service::AuthService;
use crate::services::portfolio_service::PortfolioService;

/// Records, edits and lists transactions.
///
/// Pure business logic over `WalletState`: no I/O. Every operation acts on
/// behalf of the logged-in user; admins may touch anyone's transactions.
pub struct TransactionService {
    auth_service: AuthService,
    portfolio_service: PortfolioService,
}

impl TransactionService {
    pub fn new() -> Self {
        Self {
            auth_service: AuthService::new(),
            portfolio_service: PortfolioService::new(),
        }
    }

    /// Record a transaction for the logged-in user, stamped now.
    pub fn create(&self, state: &mut WalletState, req: NewTransaction) -> Result<Transaction, CoreError> {
        self.create_at(state, req, Utc::now())
    }

    /// Record a transaction with an explicit creation time (backfilling).
    pub fn create_at(
        &self,
        state: &mut WalletState,
        req: NewTransaction,
        created_at: DateTime<Utc>,
    ) -> Result<Transaction, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        self.portfolio_service.ensure_access(state, req.portfolio_id)?;

        let tx = Transaction::from_request(user_id, req, created_at);
        Self::validate(&tx)?;

        state.transactions.push(tx.clone());
        tracing::debug!(
            tx_id = %tx.id,
            tx_type = %tx.tx_type,
            asset_type = %tx.asset_type,
            symbol = %tx.symbol,
            total = tx.total,
            "transaction recorded"
        );
        Ok(tx)
    }

    /// Merge a patch into an existing transaction, revalidate and recompute
    /// its total. Nothing changes if validation fails.
    pub fn update(
        &self,
        state: &mut WalletState,
        tx_id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Transaction, CoreError> {
        let idx = self.authorized_index(state, tx_id)?;
        if let Some(portfolio_id) = patch.portfolio_id {
            if portfolio_id != state.transactions[idx].portfolio_id {
                self.portfolio_service.ensure_access(state, portfolio_id)?;
            }
        }

        let mut updated = state.transactions[idx].clone();
        updated.apply_patch(patch);
        Self::validate(&updated)?;

        state.transactions[idx] = updated.clone();
        tracing::debug!(tx_id = %tx_id, total = updated.total, "transaction updated");
        Ok(updated)
    }

    /// Delete a transaction. Returns `false` when it does not exist.
    pub fn remove(&self, state: &mut WalletState, tx_id: Uuid) -> Result<bool, CoreError> {
        match self.authorized_index(state, tx_id) {
            Ok(idx) => {
                state.transactions.remove(idx);
                tracing::debug!(tx_id = %tx_id, "transaction removed");
                Ok(true)
            }
            Err(CoreError::TransactionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, state: &WalletState, tx_id: Uuid) -> Result<Transaction, CoreError> {
        let idx = self.authorized_index(state, tx_id)?;
        Ok(state.transactions[idx].clone())
    }

    /// The logged-in user's transactions matching `filter`, newest first.
    pub fn list_mine(
        &self,
        state: &WalletState,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        let mut txs: Vec<Transaction> = state
            .transactions_of(user_id)
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(txs)
    }

    /// Sum of `total` over the logged-in user's transactions of one asset type.
    pub fn total_by_asset_type(&self, state: &WalletState, asset_type: AssetType) -> Result<f64, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        Ok(state
            .transactions_of(user_id)
            .filter(|t| t.asset_type == asset_type)
            .map(|t| t.total)
            .sum())
    }

    /// Sum of `total` over all the logged-in user's transactions.
    pub fn total_all(&self, state: &WalletState) -> Result<f64, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        Ok(state.transactions_of(user_id).map(|t| t.total).sum())
    }

    // ── Admin ───────────────────────────────────────────────────────

    /// Every user's transactions, filtered and sorted, with the sum and the
    /// latest date of the filtered set.
    pub fn list_all(
        &self,
        state: &WalletState,
        query: &AdminTransactionQuery,
    ) -> Result<TransactionListing, CoreError> {
        self.auth_service.require_admin(state)?;
        let term = query.query.trim().to_lowercase();

        let mut transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| query.asset_type.map_or(true, |a| t.asset_type == a))
            .filter(|t| query.tx_type.map_or(true, |ty| t.tx_type == ty))
            .filter(|t| {
                term.is_empty()
                    || t.user_id.to_string().contains(&term)
                    || t.portfolio_id.to_string().contains(&term)
                    || t.asset_type.as_str().contains(&term)
                    || t.symbol.to_lowercase().contains(&term)
                    || t.tx_type.as_str().contains(&term)
            })
            .cloned()
            .collect();

        transactions.sort_by(|a, b| {
            let ordering = match query.sort_key {
                TransactionSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                TransactionSortKey::UserId => a.user_id.cmp(&b.user_id),
                TransactionSortKey::PortfolioId => a.portfolio_id.cmp(&b.portfolio_id),
                TransactionSortKey::AssetType => a.asset_type.as_str().cmp(b.asset_type.as_str()),
                TransactionSortKey::Symbol => a.symbol.cmp(&b.symbol),
                TransactionSortKey::Type => a.tx_type.as_str().cmp(b.tx_type.as_str()),
                TransactionSortKey::Total => a.total.total_cmp(&b.total),
            };
            query.direction.apply(ordering)
        });

        let sum_total = transactions.iter().map(|t| t.total).sum();
        let latest = transactions.iter().map(|t| t.created_at).max();
        Ok(TransactionListing {
            transactions,
            sum_total,
            latest,
        })
    }

    // ── Export / Import ─────────────────────────────────────────────

    /// The logged-in user's transactions as pretty JSON, oldest first.
    pub fn export_json(&self, state: &WalletState) -> Result<String, CoreError> {
        let txs = self.own_chronological(state)?;
        serde_json::to_string_pretty(&txs)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize transactions to JSON: {e}")))
    }

    /// The logged-in user's transactions as CSV, oldest first.
    /// Columns: id, portfolio_id, type, asset_type, symbol, quantity,
    /// price_per_unit, fees, total, created_at
    pub fn export_csv(&self, state: &WalletState) -> Result<String, CoreError> {
        let mut csv = String::from(
            "id,portfolio_id,type,asset_type,symbol,quantity,price_per_unit,fees,total,created_at\n",
        );
        for tx in self.own_chronological(state)? {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{}\n",
                tx.id,
                tx.portfolio_id,
                tx.tx_type,
                tx.asset_type,
                csv_field(&tx.symbol),
                tx.quantity,
                tx.price_per_unit,
                tx.fees,
                tx.total,
                tx.created_at.to_rfc3339(),
            ));
        }
        Ok(csv)
    }

    /// Import transactions exported as JSON into the logged-in user's
    /// account. Every entry is validated first; if any fails, nothing is
    /// added. Owner and total are reassigned, and ids that collide with an
    /// existing transaction get a fresh one. Returns the number imported.
    pub fn import_json(&self, state: &mut WalletState, json: &str) -> Result<usize, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        let incoming: Vec<Transaction> = serde_json::from_str(json)?;

        let mut taken: HashSet<Uuid> = state.transactions.iter().map(|t| t.id).collect();
        let mut prepared = Vec::with_capacity(incoming.len());
        for mut tx in incoming {
            tx.user_id = user_id;
            tx.symbol = crate::models::asset::normalize_symbol(&tx.symbol);
            tx.recompute_total();
            Self::validate(&tx)?;
            if !taken.insert(tx.id) {
                tx.id = Uuid::new_v4();
                taken.insert(tx.id);
            }
            prepared.push(tx);
        }

        let count = prepared.len();
        state.transactions.extend(prepared);
        tracing::debug!(count, "transactions imported");
        Ok(count)
    }

    // ── Internal ────────────────────────────────────────────────────

    /// Rules:
    /// - quantity and price strictly positive and finite
    /// - fees non-negative and finite
    /// - symbol not blank
    fn validate(tx: &Transaction) -> Result<(), CoreError> {
        if tx.symbol.is_empty() {
            return Err(CoreError::ValidationError("Symbol must not be empty".into()));
        }
        if !tx.quantity.is_finite() || tx.quantity <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Quantity must be positive, got {}",
                tx.quantity
            )));
        }
        if !tx.price_per_unit.is_finite() || tx.price_per_unit <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Price per unit must be positive, got {}",
                tx.price_per_unit
            )));
        }
        if !tx.fees.is_finite() || tx.fees < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Fees must not be negative, got {}",
                tx.fees
            )));
        }
        Ok(())
    }

    /// Position of `tx_id`, provided the logged-in user owns it or is an admin.
    fn authorized_index(&self, state: &WalletState, tx_id: Uuid) -> Result<usize, CoreError> {
        let user: &User = self.auth_service.require_user(state)?;
        let idx = state
            .transactions
            .iter()
            .position(|t| t.id == tx_id)
            .ok_or_else(|| CoreError::TransactionNotFound(tx_id.to_string()))?;

        if state.transactions[idx].user_id != user.id && !user.is_admin() {
            return Err(CoreError::Forbidden(format!(
                "transaction {tx_id} belongs to another user"
            )));
        }
        Ok(idx)
    }

    fn own_chronological<'a>(&self, state: &'a WalletState) -> Result<Vec<&'a Transaction>, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        let mut txs: Vec<&Transaction> = state.transactions_of(user_id).collect();
        txs.sort_by_key(|t| t.created_at);
        Ok(txs)
    }
}

impl Default for TransactionService {
    fn default() -> Self {
        Self::new()
    }
}

/// Quote a CSV field containing a comma, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
