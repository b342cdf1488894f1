use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CoreError;
use crate::models::analytics::{AssetBreakdown, LivretSummary, OverallStats, PositionSummary};
use crate::models::asset::{normalize_symbol, AssetType};
use crate::models::dashboard::PortfolioScope;
use crate::models::state::WalletState;
use crate::models::transaction::{Transaction, TransactionType};
use crate::services::auth_service::AuthService;
use crate::services::price_service::PriceService;

/// Running weighted-average cost state of one position.
#[derive(Debug, Default)]
struct CostBasis {
    quantity: f64,
    cost: f64,
    realized: f64,
}

impl CostBasis {
    fn buy(&mut self, quantity: f64, price: f64, fees: f64) {
        self.cost += quantity * price + fees;
        self.quantity += quantity;
    }

    /// Returns `false` when there is nothing to sell.
    fn sell(&mut self, quantity: f64, price: f64, fees: f64) -> bool {
        if self.quantity <= f64::EPSILON {
            return false;
        }
        let sold = quantity.min(self.quantity);
        let avg = self.cost / self.quantity;
        self.realized += sold * price - fees - sold * avg;
        self.cost -= sold * avg;
        self.quantity -= sold;
        if self.quantity <= f64::EPSILON {
            self.quantity = 0.0;
            self.cost = 0.0;
        }
        true
    }
}

/// Computes cost basis, P&L and per-symbol breakdowns.
///
/// Everything is recomputed from the logged-in user's transactions on each
/// call; current prices come from `PriceService`.
pub struct AnalyticsService {
    auth_service: AuthService,
    price_service: PriceService,
}

impl AnalyticsService {
    pub fn new() -> Self {
        Self {
            auth_service: AuthService::new(),
            price_service: PriceService::new(),
        }
    }

    /// Weighted-average cost positions for stock, ETF and crypto symbols,
    /// sorted by asset type then symbol.
    ///
    /// Transactions are replayed in `created_at` order (stable for ties):
    /// - buy: cost += q·p + fees, quantity += q
    /// - sell with no position: skipped
    /// - sell: at most the held quantity is sold at the current average cost;
    ///   realized += sold·p − fees − sold·avg
    pub fn positions(&self, state: &WalletState, scope: PortfolioScope) -> Result<Vec<PositionSummary>, CoreError> {
        let mine = self.own_transactions(state)?;

        let mut scoped: Vec<&Transaction> = mine
            .iter()
            .copied()
            .filter(|t| t.asset_type.is_market() && scope.includes(t.portfolio_id))
            .collect();
        scoped.sort_by_key(|t| t.created_at);

        let mut books: BTreeMap<(AssetType, String), CostBasis> = BTreeMap::new();
        for tx in scoped {
            let book = books.entry((tx.asset_type, tx.symbol.clone())).or_default();
            match tx.tx_type {
                TransactionType::Buy => book.buy(tx.quantity, tx.price_per_unit, tx.fees),
                TransactionType::Sell => {
                    if !book.sell(tx.quantity, tx.price_per_unit, tx.fees) {
                        tracing::warn!(
                            tx_id = %tx.id,
                            symbol = %tx.symbol,
                            "sell without an open position; ignored for cost basis"
                        );
                    }
                }
            }
        }

        Ok(books
            .into_iter()
            .map(|((asset_type, symbol), book)| {
                let current_price = self
                    .price_service
                    .current_price(&state.prices, &symbol, mine.iter().copied());
                let avg_cost = if book.quantity > 0.0 { book.cost / book.quantity } else { 0.0 };
                let current_value = current_price * book.quantity;
                let unrealized_pnl = current_value - book.cost;
                PositionSummary {
                    asset_type,
                    symbol,
                    quantity: book.quantity,
                    avg_cost,
                    cost_basis: book.cost,
                    current_price,
                    current_value,
                    unrealized_pnl,
                    realized_pnl: book.realized,
                    return_pct: percent(unrealized_pnl, book.cost),
                }
            })
            .collect())
    }

    /// Headline figures: open positions plus livret totals.
    pub fn overall(&self, state: &WalletState, scope: PortfolioScope) -> Result<OverallStats, CoreError> {
        let positions = self.positions(state, scope)?;
        let livrets = self.livret_summaries(state, scope)?;

        Ok(OverallStats {
            invested: positions.iter().map(|p| p.cost_basis).sum(),
            current_value: positions.iter().map(|p| p.current_value).sum(),
            pnl_unrealized: positions.iter().map(|p| p.unrealized_pnl).sum(),
            pnl_realized: positions.iter().map(|p| p.realized_pnl).sum(),
            livret_invested: livrets.iter().map(|l| l.invested).sum(),
            livret_gains: livrets.iter().map(|l| l.gains).sum(),
            positions,
        })
    }

    /// Net cash-flow view of one market symbol:
    /// - quantity = Σ buy q − Σ sell q
    /// - invested = Σ buy (q·p + fees) − Σ sell (q·p − fees)
    /// - value = current price × quantity, gain = value − invested
    pub fn breakdown(
        &self,
        state: &WalletState,
        scope: PortfolioScope,
        asset_type: AssetType,
        symbol: &str,
    ) -> Result<AssetBreakdown, CoreError> {
        let mine = self.own_transactions(state)?;
        let symbol = normalize_symbol(symbol);

        let mut quantity = 0.0;
        let mut invested = 0.0;
        for tx in mine
            .iter()
            .filter(|t| t.asset_type == asset_type && t.symbol == symbol && scope.includes(t.portfolio_id))
        {
            let gross = tx.quantity * tx.price_per_unit;
            match tx.tx_type {
                TransactionType::Buy => {
                    quantity += tx.quantity;
                    invested += gross + tx.fees;
                }
                TransactionType::Sell => {
                    quantity -= tx.quantity;
                    invested -= gross - tx.fees;
                }
            }
        }

        let current_price = self
            .price_service
            .current_price(&state.prices, &symbol, mine.iter().copied());
        let value = current_price * quantity;
        let gain = value - invested;
        Ok(AssetBreakdown {
            asset_type,
            symbol,
            quantity,
            invested,
            current_price,
            value,
            gain,
            gain_pct: percent(gain, invested),
        })
    }

    /// `breakdown` for every stock, ETF and crypto symbol in `scope`.
    pub fn breakdowns(&self, state: &WalletState, scope: PortfolioScope) -> Result<Vec<AssetBreakdown>, CoreError> {
        let keys: BTreeSet<(AssetType, String)> = self
            .own_transactions(state)?
            .into_iter()
            .filter(|t| t.asset_type.is_market() && scope.includes(t.portfolio_id))
            .map(|t| (t.asset_type, t.symbol.clone()))
            .collect();
        keys.into_iter()
            .map(|(asset_type, symbol)| self.breakdown(state, scope, asset_type, &symbol))
            .collect()
    }

    /// Deposits, withdrawals and interest of one livret. Credits are
    /// recorded per livret name, not per portfolio, so `gains` ignores
    /// `scope`.
    pub fn livret_summary(
        &self,
        state: &WalletState,
        scope: PortfolioScope,
        symbol: &str,
    ) -> Result<LivretSummary, CoreError> {
        let mine = self.own_transactions(state)?;
        let symbol = normalize_symbol(symbol);

        let invested: f64 = mine
            .iter()
            .filter(|t| {
                t.asset_type == AssetType::Livret && t.symbol == symbol && scope.includes(t.portfolio_id)
            })
            .map(|t| t.tx_type.sign() * t.price_per_unit)
            .sum();
        let gains = self.price_service.total_livret_credits(&state.prices, &symbol);

        Ok(LivretSummary {
            invested,
            gains,
            balance: invested + gains,
            roi_pct: percent(gains, invested),
            last_credit: self.price_service.last_credit_date(&state.prices, &symbol),
            symbol,
        })
    }

    /// `livret_summary` for every livret in `scope`, sorted by name.
    pub fn livret_summaries(&self, state: &WalletState, scope: PortfolioScope) -> Result<Vec<LivretSummary>, CoreError> {
        let names: BTreeSet<String> = self
            .own_transactions(state)?
            .into_iter()
            .filter(|t| t.asset_type == AssetType::Livret && scope.includes(t.portfolio_id))
            .map(|t| t.symbol.clone())
            .collect();
        names
            .into_iter()
            .map(|name| self.livret_summary(state, scope, &name))
            .collect()
    }

    fn own_transactions<'a>(&self, state: &'a WalletState) -> Result<Vec<&'a Transaction>, CoreError> {
        let user_id = self.auth_service.require_user(state)?.id;
        Ok(state.transactions_of(user_id).collect())
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}

/// `part / whole × 100`, `None` unless `whole` is positive.
fn percent(part: f64, whole: f64) -> Option<f64> {
    (whole > 0.0).then(|| part / whole * 100.0)
}
