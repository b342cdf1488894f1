use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::{normalize_symbol, AssetType};

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Buying units / depositing into a livret
    Buy,
    /// Selling units / withdrawing from a livret
    Sell,
}

impl TransactionType {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> f64 {
        match self {
            TransactionType::Buy => 1.0,
            TransactionType::Sell => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed cash total of a transaction: `sign * quantity * price + fees`.
///
/// Fees are added for both directions, so a sell's total is
/// `-(quantity * price) + fees`.
pub fn signed_total(
    tx_type: TransactionType,
    quantity: f64,
    price_per_unit: f64,
    fees: f64,
) -> f64 {
    tx_type.sign() * (quantity * price_per_unit) + fees
}

/// A single recorded transaction.
///
/// `total` is derived and always recomputed on write; it is stored so that
/// aggregations can sum it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub portfolio_id: Uuid,
    pub tx_type: TransactionType,
    pub asset_type: AssetType,
    /// Uppercased ticker or livret name
    pub symbol: String,
    pub quantity: f64,
    pub price_per_unit: f64,
    #[serde(default)]
    pub fees: f64,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a transaction owned by `user_id` from a creation request.
    /// Does not validate; see `TransactionService`.
    pub fn from_request(user_id: Uuid, req: NewTransaction, created_at: DateTime<Utc>) -> Self {
        let fees = req.fees.unwrap_or(0.0);
        Self {
            id: Uuid::new_v4(),
            user_id,
            portfolio_id: req.portfolio_id,
            tx_type: req.tx_type,
            asset_type: req.asset_type,
            symbol: normalize_symbol(&req.symbol),
            quantity: req.quantity,
            price_per_unit: req.price_per_unit,
            fees,
            total: signed_total(req.tx_type, req.quantity, req.price_per_unit, fees),
            created_at,
        }
    }

    /// Recompute `total` from the current fields.
    pub fn recompute_total(&mut self) {
        self.total = signed_total(self.tx_type, self.quantity, self.price_per_unit, self.fees);
    }

    /// Apply a partial update. Symbol is normalized; `total` is recomputed.
    pub fn apply_patch(&mut self, patch: TransactionPatch) {
        if let Some(portfolio_id) = patch.portfolio_id {
            self.portfolio_id = portfolio_id;
        }
        if let Some(tx_type) = patch.tx_type {
            self.tx_type = tx_type;
        }
        if let Some(asset_type) = patch.asset_type {
            self.asset_type = asset_type;
        }
        if let Some(symbol) = patch.symbol {
            self.symbol = normalize_symbol(&symbol);
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(price) = patch.price_per_unit {
            self.price_per_unit = price;
        }
        if let Some(fees) = patch.fees {
            self.fees = fees;
        }
        self.recompute_total();
    }
}

/// Fields supplied when recording a transaction. The owner comes from the
/// session; `id`, `total` and `created_at` are assigned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub portfolio_id: Uuid,
    pub tx_type: TransactionType,
    pub asset_type: AssetType,
    pub symbol: String,
    pub quantity: f64,
    pub price_per_unit: f64,
    #[serde(default)]
    pub fees: Option<f64>,
}

impl NewTransaction {
    pub fn buy(
        portfolio_id: Uuid,
        asset_type: AssetType,
        symbol: impl Into<String>,
        quantity: f64,
        price_per_unit: f64,
    ) -> Self {
        Self {
            portfolio_id,
            tx_type: TransactionType::Buy,
            asset_type,
            symbol: symbol.into(),
            quantity,
            price_per_unit,
            fees: None,
        }
    }

    pub fn sell(
        portfolio_id: Uuid,
        asset_type: AssetType,
        symbol: impl Into<String>,
        quantity: f64,
        price_per_unit: f64,
    ) -> Self {
        Self {
            tx_type: TransactionType::Sell,
            ..Self::buy(portfolio_id, asset_type, symbol, quantity, price_per_unit)
        }
    }

    /// A livret deposit of `amount`.
    pub fn deposit(portfolio_id: Uuid, livret: impl Into<String>, amount: f64) -> Self {
        Self::buy(portfolio_id, AssetType::Livret, livret, 1.0, amount)
    }

    /// A livret withdrawal of `amount`.
    pub fn withdrawal(portfolio_id: Uuid, livret: impl Into<String>, amount: f64) -> Self {
        Self::sell(portfolio_id, AssetType::Livret, livret, 1.0, amount)
    }

    pub fn with_fees(mut self, fees: f64) -> Self {
        self.fees = Some(fees);
        self
    }
}

/// Partial update of a transaction; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub portfolio_id: Option<Uuid>,
    pub tx_type: Option<TransactionType>,
    pub asset_type: Option<AssetType>,
    pub symbol: Option<String>,
    pub quantity: Option<f64>,
    pub price_per_unit: Option<f64>,
    pub fees: Option<f64>,
}

/// Filter for a user's own transaction list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub asset_type: Option<AssetType>,
    pub portfolio_id: Option<Uuid>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.asset_type.map_or(true, |a| tx.asset_type == a)
            && self.portfolio_id.map_or(true, |p| tx.portfolio_id == p)
    }
}

/// Sort direction shared by the admin listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Column the admin transaction table is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionSortKey {
    #[default]
    CreatedAt,
    UserId,
    PortfolioId,
    AssetType,
    Symbol,
    Type,
    Total,
}

/// Query over every user's transactions (admin view).
///
/// `query` matches user id, portfolio id, asset type, symbol and type
/// (case-insensitive substring).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminTransactionQuery {
    pub query: String,
    pub asset_type: Option<AssetType>,
    pub tx_type: Option<TransactionType>,
    pub sort_key: TransactionSortKey,
    pub direction: SortDirection,
}

/// Result of an admin transaction query.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionListing {
    pub transactions: Vec<Transaction>,
    /// Sum of `total` over the filtered set
    pub sum_total: f64,
    /// Most recent `created_at` in the filtered set
    pub latest: Option<DateTime<Utc>>,
}
