use serde::{Deserialize, Serialize};

/// The class of asset a transaction is recorded against.
///
/// `Livret` is a savings-account pseudo-asset: buys are deposits, sells are
/// withdrawals, and the deposited amount lives in `price_per_unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Stock,
    Etf,
    Crypto,
    Livret,
}

impl AssetType {
    /// Every variant, in display order.
    pub const ALL: [AssetType; 4] = [
        AssetType::Stock,
        AssetType::Etf,
        AssetType::Crypto,
        AssetType::Livret,
    ];

    /// Asset classes that are traded in units and carry a market price.
    pub const MARKET: [AssetType; 3] = [AssetType::Stock, AssetType::Etf, AssetType::Crypto];

    /// `true` for stock, ETF and crypto.
    pub fn is_market(&self) -> bool {
        !matches!(self, AssetType::Livret)
    }

    /// Lowercase identifier used in storage and CSV export.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "stock",
            AssetType::Etf => "etf",
            AssetType::Crypto => "crypto",
            AssetType::Livret => "livret",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stock" => Ok(AssetType::Stock),
            "etf" => Ok(AssetType::Etf),
            "crypto" => Ok(AssetType::Crypto),
            "livret" => Ok(AssetType::Livret),
            other => Err(format!("unknown asset type '{other}'")),
        }
    }
}

/// Canonical form of a ticker / livret name: trimmed and uppercased.
/// All symbol comparisons in the crate go through this.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
