use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::AssetType;

/// Time window of the dashboard series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Range {
    /// Last 7 days, daily buckets
    #[serde(rename = "7d")]
    Days7,
    /// Last 30 days, daily buckets
    #[serde(rename = "30d")]
    Days30,
    /// Last 12 months, monthly buckets
    #[default]
    #[serde(rename = "12m")]
    Months12,
    /// Every month from the first to the last transaction
    #[serde(rename = "all")]
    All,
}

impl Range {
    pub fn bucket(&self) -> Bucket {
        match self {
            Range::Days7 | Range::Days30 => Bucket::Day,
            Range::Months12 | Range::All => Bucket::Month,
        }
    }
}

/// Granularity of a series point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    Day,
    Month,
}

/// Which portfolios a dashboard view covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortfolioScope {
    #[default]
    All,
    One(Uuid),
}

impl PortfolioScope {
    pub fn includes(&self, portfolio_id: Uuid) -> bool {
        match self {
            PortfolioScope::All => true,
            PortfolioScope::One(id) => *id == portfolio_id,
        }
    }
}

/// Filters driving the dashboard series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilters {
    pub range: Range,
    pub portfolio: PortfolioScope,
    /// `None` means every asset type
    pub asset_type: Option<AssetType>,
    /// Exact symbol (case-insensitive); empty means every symbol
    pub symbol: String,
}

/// One bucket of the aggregated series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// First day of the bucket
    pub start: NaiveDate,
    /// `DD/MM` for days, `MM/YYYY` for months
    pub label: String,
    /// Sum of transaction totals falling in the bucket
    pub total: f64,
}

/// Distinct symbols of the market asset classes, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolsByType {
    pub stock: Vec<String>,
    pub etf: Vec<String>,
    pub crypto: Vec<String>,
}

impl SymbolsByType {
    pub fn get(&self, asset_type: AssetType) -> &[String] {
        match asset_type {
            AssetType::Stock => &self.stock,
            AssetType::Etf => &self.etf,
            AssetType::Crypto => &self.crypto,
            AssetType::Livret => &[],
        }
    }
}
