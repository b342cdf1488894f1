pub mod analytics_service;
pub mod auth_service;
pub mod dashboard_service;
pub mod portfolio_service;
pub mod price_service;
pub mod transaction_service;
