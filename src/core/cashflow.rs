//! Signed cashflow series for the three return horizons.
use crate::core::lots::Lot;
use crate::core::transaction::{SchemeTransaction, TransactionKind};
use chrono::NaiveDate;
use serde::Serialize;

/// A dated amount. Outflows (purchases) are negative, inflows positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cashflow {
    pub amount: f64,
    pub when: NaiveDate,
}

impl Cashflow {
    pub fn outflow(amount: f64, when: NaiveDate) -> Self {
        Self {
            amount: -amount,
            when,
        }
    }

    pub fn inflow(amount: f64, when: NaiveDate) -> Self {
        Self { amount, when }
    }
}

/// Cashflows that can be recorded while walking the transaction stream.
///
/// `lifetime` holds every purchase and redemption. `purchases` holds only
/// purchases and backs the "never redeemed" horizon. Neither carries a
/// terminal valuation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashflowSeries {
    pub lifetime: Vec<Cashflow>,
    pub purchases: Vec<Cashflow>,
}

impl CashflowSeries {
    pub fn record(&mut self, transaction: &SchemeTransaction) {
        let amount = transaction.amount();
        match transaction.kind {
            TransactionKind::Purchase => {
                let flow = Cashflow::outflow(amount, transaction.date);
                self.lifetime.push(flow);
                self.purchases.push(flow);
            }
            TransactionKind::Redeem => {
                self.lifetime.push(Cashflow::inflow(amount, transaction.date));
            }
        }
    }
}

/// One outflow per still-held lot, at its purchase date and original cost.
pub fn holding_cashflows<'a>(lots: impl IntoIterator<Item = &'a Lot>) -> Vec<Cashflow> {
    lots.into_iter()
        .map(|lot| Cashflow::outflow(lot.cost(), lot.date))
        .collect()
}

/// Copies `flows` and appends a terminal valuation at `as_of` when `value`
/// is strictly positive.
pub fn with_terminal_value(flows: &[Cashflow], value: f64, as_of: NaiveDate) -> Vec<Cashflow> {
    let mut result = Vec::with_capacity(flows.len() + 1);
    result.extend_from_slice(flows);
    if value > 0.0 {
        result.push(Cashflow::inflow(value, as_of));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn tx(kind: TransactionKind, d: u32, price: f64, quantity: f64) -> SchemeTransaction {
        SchemeTransaction {
            kind,
            date: day(d),
            price,
            quantity,
        }
    }

    #[test]
    fn test_record_signs_by_kind() {
        let mut series = CashflowSeries::default();
        series.record(&tx(TransactionKind::Purchase, 1, 10.0, 50.0));
        series.record(&tx(TransactionKind::Redeem, 10, 12.0, 20.0));

        assert_eq!(
            series.lifetime,
            vec![
                Cashflow {
                    amount: -500.0,
                    when: day(1)
                },
                Cashflow {
                    amount: 240.0,
                    when: day(10)
                },
            ]
        );
        assert_eq!(
            series.purchases,
            vec![Cashflow {
                amount: -500.0,
                when: day(1)
            }]
        );
    }

    #[test]
    fn test_holding_cashflows_use_lot_cost_and_date() {
        let lots = [
            Lot {
                quantity: 3.0,
                price: 10.0,
                date: day(2),
            },
            Lot {
                quantity: 1.5,
                price: 20.0,
                date: day(5),
            },
        ];
        let flows = holding_cashflows(&lots);
        assert_eq!(flows[0], Cashflow::outflow(30.0, day(2)));
        assert_eq!(flows[1], Cashflow::outflow(30.0, day(5)));
    }

    #[test]
    fn test_terminal_value_only_when_positive() {
        let flows = vec![Cashflow::outflow(100.0, day(1))];

        let with_value = with_terminal_value(&flows, 120.0, day(20));
        assert_eq!(with_value.len(), 2);
        assert_eq!(with_value[1], Cashflow::inflow(120.0, day(20)));

        assert_eq!(with_terminal_value(&flows, 0.0, day(20)), flows);
    }
}
