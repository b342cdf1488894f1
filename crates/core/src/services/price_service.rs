use chrono::{NaiveDate, Utc};

use crate::errors::CoreError;
use crate::models::asset::normalize_symbol;
use crate::models::price::{LivretCredit, LivretState, PriceBook};
use crate::models::transaction::Transaction;

/// Resolves current prices and manages livret figures.
///
/// Price resolution order for a symbol:
/// - **Override**: a manually entered quote wins.
/// - **Last trade**: otherwise the `price_per_unit` of the most recent
///   transaction on that symbol (the later entry wins a timestamp tie).
/// - **Unknown**: `0.0`.
///
/// There is no market data feed; all prices are user-entered.
pub struct PriceService;

impl PriceService {
    pub fn new() -> Self {
        Self
    }

    // ── Overrides ───────────────────────────────────────────────────

    /// Set the quote for `symbol`. `None`, zero, negative or non-finite
    /// prices remove the override instead.
    pub fn set_override(&self, book: &mut PriceBook, symbol: &str, price: Option<f64>) -> Result<(), CoreError> {
        let key = Self::symbol_key(symbol)?;
        match price {
            Some(p) if p.is_finite() && p > 0.0 => {
                book.overrides.insert(key, p);
            }
            _ => {
                book.overrides.remove(&key);
            }
        }
        Ok(())
    }

    pub fn current_price<'a>(
        &self,
        book: &PriceBook,
        symbol: &str,
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> f64 {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return 0.0;
        }
        if let Some(price) = book.overrides.get(&key) {
            return *price;
        }

        let mut latest: Option<&Transaction> = None;
        for tx in transactions {
            if tx.symbol != key {
                continue;
            }
            if latest.map_or(true, |l| tx.created_at >= l.created_at) {
                latest = Some(tx);
            }
        }
        latest.map_or(0.0, |t| t.price_per_unit)
    }

    // ── Livret state ────────────────────────────────────────────────

    /// Figures entered for a livret; empty when none were entered.
    pub fn livret_state(&self, book: &PriceBook, symbol: &str) -> LivretState {
        book.livrets
            .get(&normalize_symbol(symbol))
            .cloned()
            .unwrap_or_default()
    }

    /// Set (or clear with `None`) the reported balance.
    pub fn set_livret_current(&self, book: &mut PriceBook, symbol: &str, amount: Option<f64>) -> Result<LivretState, CoreError> {
        Self::check_optional(amount, "Livret balance")?;
        self.update_livret(book, symbol, |s| s.current_amount = amount)
    }

    /// Set (or clear with `None`) the yearly savings goal.
    pub fn set_livret_target(&self, book: &mut PriceBook, symbol: &str, target: Option<f64>) -> Result<LivretState, CoreError> {
        Self::check_optional(target, "Livret target")?;
        self.update_livret(book, symbol, |s| s.year_target = target)
    }

    /// Set (or clear with `None`) the annual interest rate in percent.
    pub fn set_livret_rate(&self, book: &mut PriceBook, symbol: &str, rate_pct: Option<f64>) -> Result<LivretState, CoreError> {
        Self::check_optional(rate_pct, "Livret rate")?;
        self.update_livret(book, symbol, |s| s.rate_pct = rate_pct)
    }

    // ── Credits ─────────────────────────────────────────────────────

    /// Record an interest credit. `date` defaults to today (UTC); a blank
    /// note is dropped.
    pub fn add_livret_credit(
        &self,
        book: &mut PriceBook,
        symbol: &str,
        amount: f64,
        date: Option<NaiveDate>,
        note: Option<&str>,
    ) -> Result<LivretCredit, CoreError> {
        let key = Self::symbol_key(symbol)?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Credit amount must be positive, got {amount}"
            )));
        }

        let credit = LivretCredit {
            date: date.unwrap_or_else(|| Utc::now().date_naive()),
            amount,
            note: note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
        };
        book.insert_credit(&key, credit.clone());
        tracing::debug!(symbol = %key, amount, date = %credit.date, "livret credit added");
        Ok(credit)
    }

    /// Remove every credit on `date` with exactly `amount`. Returns how many
    /// were removed.
    pub fn remove_livret_credit(&self, book: &mut PriceBook, symbol: &str, date: NaiveDate, amount: f64) -> usize {
        let key = normalize_symbol(symbol);
        let Some(list) = book.credits.get_mut(&key) else {
            return 0;
        };
        let before = list.len();
        list.retain(|c| !(c.date == date && c.amount == amount));
        before - list.len()
    }

    /// Credits of a livret, oldest first.
    pub fn list_livret_credits(&self, book: &PriceBook, symbol: &str) -> Vec<LivretCredit> {
        book.credits_for(symbol).to_vec()
    }

    pub fn total_livret_credits(&self, book: &PriceBook, symbol: &str) -> f64 {
        book.credits_for(symbol).iter().map(|c| c.amount).sum()
    }

    pub fn last_credit_date(&self, book: &PriceBook, symbol: &str) -> Option<NaiveDate> {
        book.credits_for(symbol).last().map(|c| c.date)
    }

    // ── Internal ────────────────────────────────────────────────────

    fn update_livret(
        &self,
        book: &mut PriceBook,
        symbol: &str,
        apply: impl FnOnce(&mut LivretState),
    ) -> Result<LivretState, CoreError> {
        let key = Self::symbol_key(symbol)?;
        let state = book.livrets.entry(key).or_default();
        apply(state);
        state.last_updated = Some(Utc::now());
        Ok(state.clone())
    }

    fn symbol_key(symbol: &str) -> Result<String, CoreError> {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return Err(CoreError::ValidationError("Symbol must not be empty".into()));
        }
        Ok(key)
    }

    fn check_optional(value: Option<f64>, what: &str) -> Result<(), CoreError> {
        match value {
            Some(v) if !v.is_finite() => Err(CoreError::ValidationError(format!("{what} must be a finite number"))),
            _ => Ok(()),
        }
    }
}

impl Default for PriceService {
    fn default() -> Self {
        Self::new()
    }
}
