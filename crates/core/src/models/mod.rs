pub mod analytics;
pub mod asset;
pub mod dashboard;
pub mod portfolio;
pub mod price;
pub mod state;
pub mod transaction;
pub mod user;
