use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CoreError;
use crate::models::asset::{normalize_symbol, AssetType};
use crate::models::dashboard::{Bucket, DashboardFilters, PortfolioScope, Range, SeriesPoint, SymbolsByType};
use crate::models::portfolio::PortfolioRef;
use crate::models::state::WalletState;
use crate::models::transaction::Transaction;
use crate::services::auth_service::AuthService;
use crate::services::portfolio_service::PortfolioService;

/// Builds the dashboard's time series and its selector options.
///
/// Everything is derived from the logged-in user's transactions on every
/// call. Dates are bucketed by the UTC calendar day of `created_at`.
pub struct DashboardService {
    auth_service: AuthService,
    portfolio_service: PortfolioService,
}

impl DashboardService {
    pub fn new() -> Self {
        Self {
            auth_service: AuthService::new(),
            portfolio_service: PortfolioService::new(),
        }
    }

    /// Aggregate transaction totals into buckets for `filters.range`.
    ///
    /// Buckets, oldest first:
    /// - `7d` / `30d`: one per day, ending `today`
    /// - `12m`: one per month, ending the month of `today`
    /// - `all`: every month from the user's first to last transaction
    ///   (only the current month if there are none)
    ///
    /// A transaction contributes its signed `total` when it passes the
    /// filters and its bucket is in range; empty buckets are `0.0`.
    pub fn series(
        &self,
        state: &WalletState,
        filters: &DashboardFilters,
        today: NaiveDate,
    ) -> Result<Vec<SeriesPoint>, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        let mine: Vec<&Transaction> = state.transactions_of(user_id).collect();

        let bucket = filters.range.bucket();
        let starts = match filters.range {
            Range::Days7 => Self::last_days(today, 7),
            Range::Days30 => Self::last_days(today, 30),
            Range::Months12 => Self::last_months(today, 12),
            Range::All => {
                let first = mine.iter().map(|t| t.created_at).min();
                let last = mine.iter().map(|t| t.created_at).max();
                match (first, last) {
                    (Some(first), Some(last)) => {
                        Self::month_span(first.date_naive(), last.date_naive())
                    }
                    _ => Self::last_months(today, 1),
                }
            }
        };

        let mut totals: BTreeMap<NaiveDate, f64> = starts.iter().map(|d| (*d, 0.0)).collect();
        let symbol = normalize_symbol(&filters.symbol);

        for tx in mine {
            if !filters.portfolio.includes(tx.portfolio_id) {
                continue;
            }
            if filters.asset_type.map_or(false, |a| tx.asset_type != a) {
                continue;
            }
            if !symbol.is_empty() && tx.symbol != symbol {
                continue;
            }
            let Some(start) = Self::bucket_start(tx.created_at.date_naive(), bucket) else {
                continue;
            };
            if let Some(total) = totals.get_mut(&start) {
                *total += tx.total;
            }
        }

        Ok(starts
            .into_iter()
            .map(|start| SeriesPoint {
                start,
                label: Self::label(start, bucket),
                total: totals.get(&start).copied().unwrap_or(0.0),
            })
            .collect())
    }

    /// `series` with today's UTC date.
    pub fn series_now(&self, state: &WalletState, filters: &DashboardFilters) -> Result<Vec<SeriesPoint>, CoreError> {
        self.series(state, filters, Utc::now().date_naive())
    }

    /// Sum of a series.
    pub fn series_total(&self, points: &[SeriesPoint]) -> f64 {
        points.iter().map(|p| p.total).sum()
    }

    // ── Selector options ────────────────────────────────────────────

    /// Distinct symbols the logged-in user has traded, sorted.
    pub fn symbols(&self, state: &WalletState) -> Result<Vec<String>, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        let set: BTreeSet<String> = state.transactions_of(user_id).map(|t| t.symbol.clone()).collect();
        Ok(set.into_iter().collect())
    }

    /// Distinct stock, ETF and crypto symbols within `scope`.
    pub fn symbols_by_type(&self, state: &WalletState, scope: PortfolioScope) -> Result<SymbolsByType, CoreError> {
        Ok(SymbolsByType {
            stock: self.symbols_of_type(state, scope, AssetType::Stock)?,
            etf: self.symbols_of_type(state, scope, AssetType::Etf)?,
            crypto: self.symbols_of_type(state, scope, AssetType::Crypto)?,
        })
    }

    /// Distinct livret names within `scope`.
    pub fn livrets(&self, state: &WalletState, scope: PortfolioScope) -> Result<Vec<String>, CoreError> {
        self.symbols_of_type(state, scope, AssetType::Livret)
    }

    /// The logged-in user's portfolios as `(id, name)` pairs.
    pub fn portfolios(&self, state: &WalletState) -> Result<Vec<PortfolioRef>, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        Ok(self
            .portfolio_service
            .list_by_user(state, user_id)
            .iter()
            .map(PortfolioRef::from)
            .collect())
    }

    // ── Internal ────────────────────────────────────────────────────

    fn symbols_of_type(
        &self,
        state: &WalletState,
        scope: PortfolioScope,
        asset_type: AssetType,
    ) -> Result<Vec<String>, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        let set: BTreeSet<String> = state
            .transactions_of(user_id)
            .filter(|t| t.asset_type == asset_type && scope.includes(t.portfolio_id))
            .map(|t| t.symbol.clone())
            .collect();
        Ok(set.into_iter().collect())
    }

    fn last_days(today: NaiveDate, n: u64) -> Vec<NaiveDate> {
        (0..n)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .collect()
    }

    fn last_months(today: NaiveDate, n: u32) -> Vec<NaiveDate> {
        let Some(current) = Self::bucket_start(today, Bucket::Month) else {
            return Vec::new();
        };
        (0..n)
            .rev()
            .filter_map(|back| current.checked_sub_months(Months::new(back)))
            .collect()
    }

    fn month_span(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
        let (Some(mut cursor), Some(end)) = (
            Self::bucket_start(first, Bucket::Month),
            Self::bucket_start(last, Bucket::Month),
        ) else {
            return Vec::new();
        };
        let mut months = Vec::new();
        while cursor <= end {
            months.push(cursor);
            match cursor.checked_add_months(Months::new(1)) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        months
    }

    fn bucket_start(date: NaiveDate, bucket: Bucket) -> Option<NaiveDate> {
        match bucket {
            Bucket::Day => Some(date),
            Bucket::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        }
    }

    fn label(start: NaiveDate, bucket: Bucket) -> String {
        match bucket {
            Bucket::Day => start.format("%d/%m").to_string(),
            Bucket::Month => start.format("%m/%Y").to_string(),
        }
    }
}

impl Default for DashboardService {
    fn default() -> Self {
        Self::new()
    }
}
