//! Errors raised at the boundary of the analytics engine.

use thiserror::Error;

/// Invalid input handed to the analytics engine.
///
/// Degenerate cashflows and solver failures are not errors; they resolve to
/// a zero rate inside [`crate::core::xirr::safe_xirr`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Invalid transaction for scheme {scheme_code}: {reason}")]
    InvalidTransaction { scheme_code: u32, reason: String },

    #[error("No current price available for scheme {0}")]
    MissingPrice(u32),

    #[error("Invalid current price {price} for scheme {scheme_code}")]
    InvalidPrice { scheme_code: u32, price: f64 },

    #[error("Day epoch {0} is outside the supported date range")]
    InvalidDate(i32),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
