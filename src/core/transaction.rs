//! Transaction input shapes and per-scheme grouping.
use crate::core::error::{AnalyticsError, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "PURCHASE")]
    Purchase,
    #[serde(rename = "REDEEM")]
    Redeem,
}

/// A single purchase or redemption as stored by the user.
///
/// `date` is a day epoch (days since 1970-01-01). When read from config it
/// may also be written as an ISO `YYYY-MM-DD` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub scheme_code: u32,
    #[serde(deserialize_with = "deserialize_day_epoch")]
    pub date: i32,
    pub price: f64,
    pub quantity: f64,
}

impl Transaction {
    /// Rejects quantities and prices that are not finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| AnalyticsError::InvalidTransaction {
            scheme_code: self.scheme_code,
            reason,
        };
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(invalid(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(invalid(format!("price must be positive, got {}", self.price)));
        }
        Ok(())
    }
}

/// Transactions keyed by kind, the shape in which they are persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionsByKind {
    #[serde(rename = "PURCHASE", default)]
    pub purchases: Vec<Transaction>,
    #[serde(rename = "REDEEM", default)]
    pub redemptions: Vec<Transaction>,
}

impl TransactionsByKind {
    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty() && self.redemptions.is_empty()
    }

    /// Transactions dated on or before `as_of`.
    pub fn up_to(&self, as_of: NaiveDate) -> Self {
        let last_day = date_to_epoch(as_of);
        let keep = |list: &[Transaction]| -> Vec<Transaction> {
            list.iter().filter(|t| t.date <= last_day).cloned().collect()
        };
        Self {
            purchases: keep(&self.purchases),
            redemptions: keep(&self.redemptions),
        }
    }

    /// Distinct scheme codes in ascending order.
    pub fn scheme_codes(&self) -> Vec<u32> {
        let mut codes: Vec<u32> = self
            .purchases
            .iter()
            .chain(&self.redemptions)
            .map(|t| t.scheme_code)
            .collect();
        codes.sort_unstable();
        codes.dedup();
        codes
    }
}

/// A validated transaction of one scheme, tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemeTransaction {
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: f64,
}

impl SchemeTransaction {
    pub fn amount(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Groups transactions by scheme code, validating each one.
///
/// Each scheme's list is sorted by date. The sort is stable and purchases are
/// collected first, so a purchase precedes a redemption on the same day.
pub fn group_by_scheme(
    data: &TransactionsByKind,
) -> Result<BTreeMap<u32, Vec<SchemeTransaction>>> {
    let mut schemes: BTreeMap<u32, Vec<SchemeTransaction>> = BTreeMap::new();

    let tagged = data
        .purchases
        .iter()
        .map(|t| (TransactionKind::Purchase, t))
        .chain(data.redemptions.iter().map(|t| (TransactionKind::Redeem, t)));

    for (kind, transaction) in tagged {
        transaction.validate()?;
        schemes
            .entry(transaction.scheme_code)
            .or_default()
            .push(SchemeTransaction {
                kind,
                date: epoch_to_date(transaction.date)?,
                price: transaction.price,
                quantity: transaction.quantity,
            });
    }

    for transactions in schemes.values_mut() {
        transactions.sort_by_key(|t| t.date);
    }

    Ok(schemes)
}

fn unix_epoch() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

pub fn epoch_to_date(day: i32) -> Result<NaiveDate> {
    unix_epoch()
        .checked_add_signed(Duration::days(i64::from(day)))
        .ok_or(AnalyticsError::InvalidDate(day))
}

pub fn date_to_epoch(date: NaiveDate) -> i32 {
    (date - unix_epoch()).num_days() as i32
}

fn deserialize_day_epoch<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DayInput {
        Epoch(i32),
        Iso(String),
    }

    match DayInput::deserialize(deserializer)? {
        DayInput::Epoch(day) => Ok(day),
        DayInput::Iso(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(date_to_epoch)
            .map_err(|e| serde::de::Error::custom(format!("invalid date '{s}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(scheme_code: u32, date: i32, price: f64, quantity: f64) -> Transaction {
        Transaction {
            id: None,
            scheme_code,
            date,
            price,
            quantity,
        }
    }

    #[test]
    fn test_epoch_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let day = date_to_epoch(date);
        assert_eq!(day, 19797);
        assert_eq!(epoch_to_date(day).unwrap(), date);
        assert_eq!(
            epoch_to_date(0).unwrap(),
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_epoch_out_of_range() {
        assert_eq!(
            epoch_to_date(i32::MAX),
            Err(AnalyticsError::InvalidDate(i32::MAX))
        );
    }

    #[test]
    fn test_group_by_scheme_orders_by_date() {
        let data = TransactionsByKind {
            purchases: vec![tx(2, 20, 10.0, 1.0), tx(1, 5, 10.0, 1.0), tx(1, 30, 11.0, 2.0)],
            redemptions: vec![tx(1, 10, 12.0, 1.0), tx(1, 30, 12.0, 1.0)],
        };

        let grouped = group_by_scheme(&data).unwrap();
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        let scheme_one = &grouped[&1];
        let kinds: Vec<_> = scheme_one.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TransactionKind::Purchase,
                TransactionKind::Redeem,
                TransactionKind::Purchase,
                TransactionKind::Redeem,
            ]
        );
        let days: Vec<_> = scheme_one.iter().map(|t| date_to_epoch(t.date)).collect();
        assert_eq!(days, vec![5, 10, 30, 30]);
        assert_eq!(grouped[&2].len(), 1);
    }

    #[test]
    fn test_group_by_scheme_rejects_invalid_quantity() {
        let data = TransactionsByKind {
            purchases: vec![tx(7, 0, 10.0, -1.0)],
            redemptions: vec![],
        };
        let err = group_by_scheme(&data).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InvalidTransaction { scheme_code: 7, .. }
        ));
    }

    #[test]
    fn test_validate_rejects_zero_and_nan_price() {
        assert!(tx(1, 0, 0.0, 1.0).validate().is_err());
        assert!(tx(1, 0, f64::NAN, 1.0).validate().is_err());
        assert!(tx(1, 0, 1.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_up_to_keeps_transactions_on_or_before_date() {
        let data = TransactionsByKind {
            purchases: vec![tx(1, 19797, 10.0, 1.0), tx(1, 19800, 10.0, 1.0)],
            redemptions: vec![tx(1, 19798, 11.0, 1.0), tx(1, 19801, 11.0, 1.0)],
        };

        let filtered = data.up_to(NaiveDate::from_ymd_opt(2024, 3, 18).unwrap());

        assert_eq!(filtered.purchases, vec![tx(1, 19797, 10.0, 1.0), tx(1, 19800, 10.0, 1.0)]);
        assert_eq!(filtered.redemptions, vec![tx(1, 19798, 11.0, 1.0)]);
    }

    #[test]
    fn test_deserialize_accepts_epoch_and_iso_dates() {
        let yaml = r#"
PURCHASE:
  - schemeCode: 119551
    date: 19797
    price: 10.0
    quantity: 5.0
REDEEM:
  - schemeCode: 119551
    date: "2024-03-20"
    price: 11.0
    quantity: 2.0
"#;
        let data: TransactionsByKind = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(data.purchases[0].date, 19797);
        assert_eq!(data.redemptions[0].date, 19802);
        assert_eq!(data.scheme_codes(), vec![119551]);
    }

    #[test]
    fn test_deserialize_rejects_bad_date() {
        let yaml = r#"
PURCHASE:
  - schemeCode: 1
    date: "15/03/2024"
    price: 10.0
    quantity: 5.0
"#;
        assert!(serde_yaml::from_str::<TransactionsByKind>(yaml).is_err());
    }
}
