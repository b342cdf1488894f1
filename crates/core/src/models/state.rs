use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::portfolio::Portfolio;
use super::price::PriceBook;
use super::transaction::Transaction;
use super::user::User;

/// Everything the application persists, loaded into memory.
///
/// Services operate on this snapshot; the facade writes each touched
/// collection back to its store key after a mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletState {
    pub users: Vec<User>,

    /// Id of the logged-in user, if any
    #[serde(default)]
    pub session: Option<Uuid>,

    /// Insertion-ordered; aggregations sort by `created_at` where order matters
    #[serde(default)]
    pub transactions: Vec<Transaction>,

    #[serde(default)]
    pub portfolios: Vec<Portfolio>,

    #[serde(default)]
    pub prices: PriceBook,
}

impl WalletState {
    /// The logged-in user.
    pub fn current_user(&self) -> Option<&User> {
        let id = self.session?;
        self.users.iter().find(|u| u.id == id)
    }

    pub fn find_user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email.trim()))
    }

    /// Transactions of one user, in stored order.
    pub fn transactions_of(&self, user_id: Uuid) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(move |t| t.user_id == user_id)
    }
}
