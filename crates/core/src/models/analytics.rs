use serde::{Deserialize, Serialize};

use super::asset::AssetType;

/// Weighted-average cost position for one (asset type, symbol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub asset_type: AssetType,
    pub symbol: String,

    /// Units still held
    pub quantity: f64,

    /// Average acquisition cost per held unit (fees included)
    pub avg_cost: f64,

    /// Cost of the units still held: quantity × avg_cost
    pub cost_basis: f64,

    /// Override or last traded price
    pub current_price: f64,

    /// current_price × quantity
    pub current_value: f64,

    /// current_value − cost_basis
    pub unrealized_pnl: f64,

    /// Gains locked in by sells: Σ (proceeds − fees − units × avg_cost at sale)
    pub realized_pnl: f64,

    /// unrealized_pnl / cost_basis × 100, `None` when nothing is invested
    pub return_pct: Option<f64>,
}

/// Portfolio-wide headline figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    /// Cost basis of open market positions
    pub invested: f64,
    /// Market value of open positions
    pub current_value: f64,
    pub pnl_unrealized: f64,
    pub pnl_realized: f64,
    /// Net deposits across livrets
    pub livret_invested: f64,
    /// Interest credited across livrets
    pub livret_gains: f64,
    /// Per-position detail, sorted by asset type then symbol
    pub positions: Vec<PositionSummary>,
}

impl OverallStats {
    /// Realized plus unrealized P&L.
    pub fn pnl_total(&self) -> f64 {
        self.pnl_realized + self.pnl_unrealized
    }
}

/// Net cash-flow view of one symbol, as shown in the dashboard tables.
///
/// Unlike `PositionSummary`, sells reduce `invested` by their full proceeds
/// (minus fees) instead of by their cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBreakdown {
    pub asset_type: AssetType,
    pub symbol: String,
    /// Units bought − units sold
    pub quantity: f64,
    /// Σ buy (q·p + fees) − Σ sell (q·p − fees)
    pub invested: f64,
    pub current_price: f64,
    pub value: f64,
    /// value − invested
    pub gain: f64,
    /// gain / invested × 100, `None` when invested ≤ 0
    pub gain_pct: Option<f64>,
}

/// Summary of one livret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivretSummary {
    pub symbol: String,
    /// Deposits − withdrawals
    pub invested: f64,
    /// Total of interest credits
    pub gains: f64,
    /// invested + gains
    pub balance: f64,
    /// gains / invested × 100, `None` when invested ≤ 0
    pub roi_pct: Option<f64>,
    /// Date of the latest credit
    pub last_credit: Option<chrono::NaiveDate>,
}
