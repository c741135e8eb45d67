//! Cost basis, value and XIRR for each scheme and for the whole portfolio.
//!
//! Every figure is reported under three horizons:
//! - `current`: only the units still held, costed at their purchase price.
//! - `lifetime`: every purchase and redemption ever made.
//! - `on_no_redeem`: every purchase, valued as if nothing had been sold.
//!
//! The portfolio rate is solved over the pooled cashflows of all schemes. It
//! is not an average of the scheme rates.
use crate::core::cashflow::{Cashflow, CashflowSeries, holding_cashflows, with_terminal_value};
use crate::core::error::{AnalyticsError, Result};
use crate::core::lots::{Lot, LotQueue};
use crate::core::transaction::{
    SchemeTransaction, TransactionKind, TransactionsByKind, group_by_scheme,
};
use crate::core::xirr::{RateSolver, safe_xirr};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// A figure under the three horizons. `lifetime` is only meaningful for rates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodValue {
    pub current: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<f64>,
    pub on_no_redeem: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentDetails {
    pub invest_amount: PeriodValue,
    pub value: PeriodValue,
    pub xirr: PeriodValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeInvestmentDetails {
    pub scheme_code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme_name: Option<String>,
    #[serde(flatten)]
    pub details: InvestmentDetails,
    /// Redeemed units with no purchase lot left to match against.
    #[serde(skip_serializing_if = "is_zero")]
    pub unmatched_redeemed_units: f64,
}

/// Raw series of one scheme, before any terminal valuation is appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemeIntermediates {
    pub lifetime_cashflows: Vec<Cashflow>,
    pub purchase_cashflows: Vec<Cashflow>,
    pub holding_lots: Vec<Lot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemeMetrics {
    pub details: SchemeInvestmentDetails,
    pub intermediates: SchemeIntermediates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentReport {
    pub total_investment_details: InvestmentDetails,
    pub scheme_investment_details: Vec<SchemeInvestmentDetails>,
}

/// State of one scheme after walking its transactions once.
#[derive(Debug, Default)]
struct SchemeLedger {
    lots: LotQueue,
    cashflows: CashflowSeries,
    purchased_units: f64,
    invested_ever: f64,
    unmatched_redeemed_units: f64,
}

impl SchemeLedger {
    fn replay(scheme_code: u32, transactions: &[SchemeTransaction]) -> Self {
        let mut ledger = Self::default();
        for t in transactions {
            ledger.cashflows.record(t);
            match t.kind {
                TransactionKind::Purchase => {
                    ledger.lots.purchase(t.quantity, t.price, t.date);
                    ledger.purchased_units += t.quantity;
                    ledger.invested_ever += t.amount();
                }
                TransactionKind::Redeem => {
                    let unmatched = ledger.lots.redeem(t.quantity);
                    if unmatched > 0.0 {
                        warn!(
                            "Redemption of {} units on {} for scheme {scheme_code} exceeds holdings by {unmatched} units",
                            t.quantity, t.date
                        );
                        ledger.unmatched_redeemed_units += unmatched;
                    }
                }
            }
        }
        ledger
    }
}

/// Computes the metrics of one scheme from its date-ordered transactions.
pub fn calculate_scheme_metrics(
    scheme_code: u32,
    transactions: &[SchemeTransaction],
    current_price: f64,
    as_of: NaiveDate,
    solver: &dyn RateSolver,
) -> SchemeMetrics {
    let ledger = SchemeLedger::replay(scheme_code, transactions);

    let invested_now = ledger.lots.cost_basis();
    let value_now = ledger.lots.units() * current_price;
    let value_on_no_redeem = ledger.purchased_units * current_price;

    let lifetime = with_terminal_value(&ledger.cashflows.lifetime, value_now, as_of);
    let current = with_terminal_value(&holding_cashflows(ledger.lots.iter()), value_now, as_of);
    let on_no_redeem =
        with_terminal_value(&ledger.cashflows.purchases, value_on_no_redeem, as_of);

    let details = InvestmentDetails {
        invest_amount: PeriodValue {
            current: invested_now,
            lifetime: None,
            on_no_redeem: ledger.invested_ever,
        },
        value: PeriodValue {
            current: value_now,
            lifetime: None,
            on_no_redeem: value_on_no_redeem,
        },
        xirr: PeriodValue {
            current: safe_xirr(solver, &current),
            lifetime: Some(safe_xirr(solver, &lifetime)),
            on_no_redeem: safe_xirr(solver, &on_no_redeem),
        },
    };
    debug!("Scheme {scheme_code}: {details:?}");

    SchemeMetrics {
        details: SchemeInvestmentDetails {
            scheme_code,
            scheme_name: None,
            details,
            unmatched_redeemed_units: ledger.unmatched_redeemed_units,
        },
        intermediates: SchemeIntermediates {
            lifetime_cashflows: ledger.cashflows.lifetime,
            purchase_cashflows: ledger.cashflows.purchases,
            holding_lots: ledger.lots.into_lots(),
        },
    }
}

/// Folds scheme metrics into portfolio totals and pooled cashflows.
#[derive(Debug, Default)]
pub struct PortfolioAggregator {
    schemes: Vec<SchemeInvestmentDetails>,
    invest_amount: PeriodValue,
    value: PeriodValue,
    lifetime_cashflows: Vec<Cashflow>,
    purchase_cashflows: Vec<Cashflow>,
    holding_lots: Vec<Lot>,
}

impl PortfolioAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, metrics: SchemeMetrics) {
        let SchemeMetrics {
            details,
            intermediates,
        } = metrics;

        self.invest_amount.current += details.details.invest_amount.current;
        self.invest_amount.on_no_redeem += details.details.invest_amount.on_no_redeem;
        self.value.current += details.details.value.current;
        self.value.on_no_redeem += details.details.value.on_no_redeem;

        self.lifetime_cashflows
            .extend(intermediates.lifetime_cashflows);
        self.purchase_cashflows
            .extend(intermediates.purchase_cashflows);
        self.holding_lots.extend(intermediates.holding_lots);

        self.schemes.push(details);
    }

    /// Solves each horizon once over the pooled series, with a single
    /// terminal valuation sized at the summed portfolio value.
    pub fn finish(self, as_of: NaiveDate, solver: &dyn RateSolver) -> InvestmentReport {
        let lifetime = with_terminal_value(&self.lifetime_cashflows, self.value.current, as_of);
        let current = with_terminal_value(
            &holding_cashflows(&self.holding_lots),
            self.value.current,
            as_of,
        );
        let on_no_redeem =
            with_terminal_value(&self.purchase_cashflows, self.value.on_no_redeem, as_of);

        let total = InvestmentDetails {
            invest_amount: self.invest_amount,
            value: self.value,
            xirr: PeriodValue {
                current: safe_xirr(solver, &current),
                lifetime: Some(safe_xirr(solver, &lifetime)),
                on_no_redeem: safe_xirr(solver, &on_no_redeem),
            },
        };
        debug!("Portfolio across {} schemes: {total:?}", self.schemes.len());

        InvestmentReport {
            total_investment_details: total,
            scheme_investment_details: self.schemes,
        }
    }
}

/// Computes scheme and portfolio metrics as of `as_of`.
///
/// Every scheme in `transactions` must have a finite, non-negative entry in
/// `prices`.
pub fn calculate_investment_report(
    transactions: &TransactionsByKind,
    prices: &HashMap<u32, f64>,
    as_of: NaiveDate,
    solver: &dyn RateSolver,
) -> Result<InvestmentReport> {
    let schemes = group_by_scheme(transactions)?;

    let mut aggregator = PortfolioAggregator::new();
    for (scheme_code, scheme_transactions) in &schemes {
        let price = current_price(prices, *scheme_code)?;
        aggregator.add(calculate_scheme_metrics(
            *scheme_code,
            scheme_transactions,
            price,
            as_of,
            solver,
        ));
    }

    Ok(aggregator.finish(as_of, solver))
}

/// Lots still held per scheme after FIFO matching, with unmatched units.
pub fn remaining_lots(
    transactions: &TransactionsByKind,
) -> Result<BTreeMap<u32, (Vec<Lot>, f64)>> {
    let schemes = group_by_scheme(transactions)?;
    Ok(schemes
        .iter()
        .map(|(code, scheme_transactions)| {
            let ledger = SchemeLedger::replay(*code, scheme_transactions);
            (
                *code,
                (ledger.lots.into_lots(), ledger.unmatched_redeemed_units),
            )
        })
        .collect())
}

fn current_price(prices: &HashMap<u32, f64>, scheme_code: u32) -> Result<f64> {
    let price = *prices
        .get(&scheme_code)
        .ok_or(AnalyticsError::MissingPrice(scheme_code))?;
    if !price.is_finite() || price < 0.0 {
        return Err(AnalyticsError::InvalidPrice { scheme_code, price });
    }
    Ok(price)
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}
