//! Core business logic abstractions

pub mod analytics;
pub mod cache;
pub mod cashflow;
pub mod config;
pub mod error;
pub mod log;
pub mod lots;
pub mod price;
pub mod transaction;
pub mod xirr;

// Re-export main types for cleaner imports
pub use analytics::{InvestmentReport, calculate_investment_report};
pub use error::AnalyticsError;
pub use price::{PriceProvider, PriceResult};
pub use transaction::{Transaction, TransactionKind, TransactionsByKind};
pub use xirr::{FinprimSolver, RateSolver};
