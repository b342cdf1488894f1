use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::asset::normalize_symbol;

/// Manually entered quote for a symbol, taking precedence over the last
/// transaction price.
pub type PriceOverrides = BTreeMap<String, f64>;

/// User-entered figures for a livret (savings account).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LivretState {
    /// Balance as last reported by the bank
    #[serde(default)]
    pub current_amount: Option<f64>,

    /// Savings goal for the year
    #[serde(default)]
    pub year_target: Option<f64>,

    /// Annual interest rate in percent
    #[serde(default)]
    pub rate_pct: Option<f64>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// An interest (or other gain) credit on a livret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivretCredit {
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Quote overrides plus per-livret state and credits.
///
/// Keys are normalized symbols. Credit lists are kept sorted by date;
/// credits sharing a date stay in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBook {
    #[serde(default)]
    pub overrides: PriceOverrides,
    #[serde(default)]
    pub livrets: BTreeMap<String, LivretState>,
    #[serde(default)]
    pub credits: BTreeMap<String, Vec<LivretCredit>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_override(&self, symbol: &str) -> Option<f64> {
        self.overrides.get(&normalize_symbol(symbol)).copied()
    }

    /// Insert a credit at its date-sorted position (after any credits on the same date).
    pub fn insert_credit(&mut self, symbol: &str, credit: LivretCredit) {
        let list = self.credits.entry(normalize_symbol(symbol)).or_default();
        let pos = list.partition_point(|c| c.date <= credit.date);
        list.insert(pos, credit);
    }

    /// Credits of a livret, oldest first.
    pub fn credits_for(&self, symbol: &str) -> &[LivretCredit] {
        self.credits
            .get(&normalize_symbol(symbol))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Bring data loaded from storage back to the invariants: uppercase keys,
    /// strictly positive finite overrides and credit amounts, date-sorted credits.
    pub fn sanitize(&mut self) {
        self.overrides = std::mem::take(&mut self.overrides)
            .into_iter()
            .filter(|(_, price)| price.is_finite() && *price > 0.0)
            .map(|(symbol, price)| (normalize_symbol(&symbol), price))
            .collect();

        self.livrets = std::mem::take(&mut self.livrets)
            .into_iter()
            .map(|(symbol, state)| (normalize_symbol(&symbol), state))
            .collect();

        let credits = std::mem::take(&mut self.credits);
        for (symbol, list) in credits {
            let key = normalize_symbol(&symbol);
            let kept = list
                .into_iter()
                .filter(|c| c.amount.is_finite() && c.amount > 0.0);
            self.credits.entry(key).or_default().extend(kept);
        }
        // stable: same-date credits keep their stored order
        for list in self.credits.values_mut() {
            list.sort_by_key(|c| c.date);
        }
    }
}
