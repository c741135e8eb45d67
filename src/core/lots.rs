//! FIFO lot matching for a single scheme.
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

/// Quantities within this many units are treated as equal. Fractional unit
/// arithmetic leaves float residue that must not survive as a held lot.
pub const UNIT_EPSILON: f64 = 1e-9;

/// Units bought in one purchase that are still held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Lot {
    pub quantity: f64,
    pub price: f64,
    pub date: NaiveDate,
}

impl Lot {
    pub fn cost(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Purchase lots of one scheme, oldest first.
///
/// Redemptions consume from the front. A lot leaves the queue once its
/// quantity reaches zero (within [`UNIT_EPSILON`]), so quantities never go
/// negative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotQueue {
    lots: VecDeque<Lot>,
}

impl LotQueue {
    pub fn purchase(&mut self, quantity: f64, price: f64, date: NaiveDate) {
        self.lots.push_back(Lot {
            quantity,
            price,
            date,
        });
    }

    /// Consumes `quantity` units from the oldest lots.
    ///
    /// Returns the units that could not be matched because the queue ran
    /// empty. Those units are dropped; no negative holding is created.
    pub fn redeem(&mut self, quantity: f64) -> f64 {
        let mut remaining = quantity;
        while remaining > UNIT_EPSILON {
            let Some(front) = self.lots.front_mut() else {
                break;
            };
            if front.quantity <= remaining + UNIT_EPSILON {
                remaining = (remaining - front.quantity).max(0.0);
                debug!(
                    "Lot from {} fully redeemed ({} units)",
                    front.date, front.quantity
                );
                self.lots.pop_front();
            } else {
                front.quantity -= remaining;
                remaining = 0.0;
            }
        }
        if remaining > UNIT_EPSILON { remaining } else { 0.0 }
    }

    pub fn units(&self) -> f64 {
        self.lots.iter().map(|lot| lot.quantity).sum()
    }

    pub fn cost_basis(&self) -> f64 {
        self.lots.iter().map(Lot::cost).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn into_lots(self) -> Vec<Lot> {
        self.lots.into()
    }
}
