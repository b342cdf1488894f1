use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named container of transactions owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Display currency of the portfolio (e.g. "EUR")
    pub base_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Portfolio {
    pub fn new(user_id: Uuid, name: impl Into<String>, base_currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            base_currency: base_currency.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lightweight `(id, name)` pair used to populate selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioRef {
    pub id: Uuid,
    pub name: String,
}

impl From<&Portfolio> for PortfolioRef {
    fn from(p: &Portfolio) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
        }
    }
}
