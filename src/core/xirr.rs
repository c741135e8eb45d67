//! Annualized money-weighted return over dated cashflows.
use crate::core::cashflow::Cashflow;
use crate::core::transaction::date_to_epoch;
use anyhow::{Result, anyhow};
use rust_decimal::{Decimal, prelude::*};
use rust_finprim::rate::xirr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// NPV tolerance as a fraction of the largest cashflow. An absolute bound
/// would accept the initial guess for series of tiny amounts.
const RELATIVE_TOLERANCE: f64 = 1e-8;

/// Finds the annual rate (as a fraction) at which the net present value of
/// `flows` is zero.
pub trait RateSolver: Send + Sync {
    fn solve(&self, flows: &[Cashflow]) -> Result<f64>;
}

/// Solver backed by `rust_finprim`.
///
/// The underlying Newton iteration runs on `Decimal` and panics when a step
/// overflows (short horizons with large gains or losses). Such panics are
/// caught and reported as an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FinprimSolver;

impl RateSolver for FinprimSolver {
    fn solve(&self, flows: &[Cashflow]) -> Result<f64> {
        let mut table = Vec::with_capacity(flows.len());
        for flow in flows {
            let amount = Decimal::from_f64(flow.amount)
                .ok_or_else(|| anyhow!("Cashflow amount {} is not representable", flow.amount))?;
            table.push((amount, date_to_epoch(flow.when)));
        }
        // Discounting is relative to the first row, so it must be the earliest
        // date. Pooled series interleave schemes and arrive unordered.
        table.sort_by_key(|(_, day)| *day);

        let largest = flows.iter().map(|cf| cf.amount.abs()).fold(0.0, f64::max);
        let tolerance = Decimal::from_f64(largest * RELATIVE_TOLERANCE)
            .filter(|t| !t.is_zero())
            .ok_or_else(|| anyhow!("Cashflows too small to solve: largest is {largest}"))?;

        let rate = catch_unwind(AssertUnwindSafe(|| xirr(&table, None, Some(tolerance))))
            .map_err(|_| anyhow!("XIRR computation overflowed"))?
            .map_err(|e| anyhow!("XIRR computation error: {:?}", e))?;
        rate.to_f64()
            .ok_or_else(|| anyhow!("XIRR rate conversion failed"))
    }
}

/// Rate of return as a percentage, or `0.0` when it is undefined.
///
/// A series without both a strictly positive and a strictly negative amount
/// has no rate and never reaches the solver. Solver failures are logged and
/// also resolve to zero.
pub fn safe_xirr(solver: &dyn RateSolver, flows: &[Cashflow]) -> f64 {
    let has_positive = flows.iter().any(|cf| cf.amount > 0.0);
    let has_negative = flows.iter().any(|cf| cf.amount < 0.0);
    if !has_positive || !has_negative {
        debug!(
            "Skipping XIRR for {} cashflows with a single sign",
            flows.len()
        );
        return 0.0;
    }

    match solver.solve(flows) {
        Ok(rate) if rate.is_finite() => rate * 100.0,
        Ok(rate) => {
            warn!("XIRR solver returned a non-finite rate: {rate}");
            0.0
        }
        Err(e) => {
            warn!("XIRR calculation failed: {e}");
            0.0
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed result and counts invocations.
    pub(crate) struct StubSolver {
        pub result: std::result::Result<f64, String>,
        pub calls: AtomicUsize,
    }

    impl StubSolver {
        pub(crate) fn returning(rate: f64) -> Self {
            Self {
                result: Ok(rate),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                result: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RateSolver for StubSolver {
        fn solve(&self, _flows: &[Cashflow]) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(|e| anyhow!(e))
        }
    }

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    #[test]
    fn test_single_sign_series_skips_solver() {
        let solver = StubSolver::returning(0.5);
        let outflows = [Cashflow::outflow(100.0, day(0)), Cashflow::outflow(50.0, day(10))];
        let inflows = [Cashflow::inflow(100.0, day(0))];

        assert_eq!(safe_xirr(&solver, &outflows), 0.0);
        assert_eq!(safe_xirr(&solver, &inflows), 0.0);
        assert_eq!(safe_xirr(&solver, &[]), 0.0);
        assert_eq!(solver.calls(), 0);
    }

    #[test]
    fn test_rate_is_returned_as_percentage() {
        let solver = StubSolver::returning(0.125);
        let flows = [Cashflow::outflow(100.0, day(0)), Cashflow::inflow(112.5, day(365))];
        assert_eq!(safe_xirr(&solver, &flows), 12.5);
        assert_eq!(solver.calls(), 1);
    }

    #[test]
    fn test_solver_failure_resolves_to_zero() {
        let solver = StubSolver::failing("did not converge");
        let flows = [Cashflow::outflow(100.0, day(0)), Cashflow::inflow(1.0, day(1))];
        assert_eq!(safe_xirr(&solver, &flows), 0.0);
        assert_eq!(solver.calls(), 1);
    }

    #[test]
    fn test_non_finite_rate_resolves_to_zero() {
        let solver = StubSolver::returning(f64::NAN);
        let flows = [Cashflow::outflow(100.0, day(0)), Cashflow::inflow(110.0, day(30))];
        assert_eq!(safe_xirr(&solver, &flows), 0.0);
    }

    #[test]
    fn test_finprim_solver_one_year_gain() {
        let flows = [Cashflow::outflow(1000.0, day(0)), Cashflow::inflow(1100.0, day(365))];
        let rate = safe_xirr(&FinprimSolver, &flows);
        assert!((rate - 10.0).abs() < 0.1, "rate was {rate}");
    }

    #[test]
    fn test_finprim_solver_loss() {
        let flows = [Cashflow::outflow(1000.0, day(0)), Cashflow::inflow(900.0, day(365))];
        let rate = safe_xirr(&FinprimSolver, &flows);
        assert!((rate + 10.0).abs() < 0.1, "rate was {rate}");
    }

    #[test]
    fn test_finprim_solver_short_horizon_loss_does_not_panic() {
        let flows = [Cashflow::outflow(1000.0, day(0)), Cashflow::inflow(950.0, day(7))];
        let rate = safe_xirr(&FinprimSolver, &flows);
        assert!(rate.is_finite());
        assert!(rate <= 0.0, "rate was {rate}");
    }

    #[test]
    fn test_finprim_solver_extreme_overnight_gain_does_not_panic() {
        let flows = [Cashflow::outflow(1.0, day(0)), Cashflow::inflow(1e6, day(1))];
        let rate = safe_xirr(&FinprimSolver, &flows);
        assert!(rate.is_finite());
    }

    #[test]
    fn test_finprim_solver_tiny_amounts_are_not_accepted_at_the_guess() {
        // NPV at the 10% starting guess is about 9e-6.
        let flows = [Cashflow::outflow(1e-4, day(0)), Cashflow::inflow(1.2e-4, day(365))];
        let rate = safe_xirr(&FinprimSolver, &flows);
        assert!((rate - 20.0).abs() < 0.1, "rate was {rate}");
    }

    #[test]
    fn test_finprim_solver_orders_pooled_flows() {
        let flows = [
            Cashflow::inflow(1100.0, day(365)),
            Cashflow::outflow(1000.0, day(0)),
        ];
        let rate = safe_xirr(&FinprimSolver, &flows);
        assert!((rate - 10.0).abs() < 0.1, "rate was {rate}");
    }
}
