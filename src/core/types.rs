// Common types used across the application

use crate::error::{TradingError, TradingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Validation bounds shared by the configuration layer and the projections
pub mod limits {
    pub const MIN_INSTRUMENT_LEN: usize = 3;
    pub const MAX_INSTRUMENT_LEN: usize = 20;
    pub const MIN_PRICE: f64 = 0.0001;
    pub const MAX_PRICE: f64 = 100_000.0;
    pub const MIN_GRIDS: u32 = 2;
    pub const MAX_GRIDS: u32 = 1000;
    pub const MIN_UNITS: u64 = 1;
    pub const MAX_UNITS: u64 = 100_000_000;
    pub const MIN_SPREAD: f64 = 0.0;
    pub const MAX_SPREAD: f64 = 1000.0;
    pub const MIN_TRADING_DAYS: i32 = 1;
    pub const MAX_TRADING_DAYS: i32 = 31;
    pub const MIN_PIPS: f64 = 0.00001;
    pub const MAX_PIPS: f64 = 10_000.0;

    /// Price movement of 1.0 expressed in pips
    pub const PIPS_PER_UNIT: f64 = 10_000.0;
    /// USD value of one pip for one unit
    pub const PIP_VALUE_PER_UNIT: f64 = 0.0001;

    pub fn price_in_range(price: f64) -> bool {
        (MIN_PRICE..=MAX_PRICE).contains(&price)
    }

    pub fn units_in_range(units: u64) -> bool {
        (MIN_UNITS..=MAX_UNITS).contains(&units)
    }

    pub fn spread_in_range(spread_pips: f64) -> bool {
        (MIN_SPREAD..=MAX_SPREAD).contains(&spread_pips)
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Account figures as reported by the broker on one poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub margin_available: f64,
    pub margin_used: f64,
    pub unrealized_pl: f64,
    pub open_position_count: u32,
}

impl AccountSnapshot {
    /// Parse the broker's account document.
    ///
    /// Brokers commonly send numbers as strings (`"balance": "1000.0000"`), so
    /// both representations are accepted. `NAV` is read when `equity` is absent.
    pub fn from_broker_json(account: &Value) -> TradingResult<Self> {
        let equity = match account.get("equity") {
            Some(_) => numeric_field(account, "equity")?,
            None => numeric_field(account, "NAV")?,
        };

        let count = numeric_field(account, "openPositionCount")?;
        if count < 0.0 || count.fract() != 0.0 || count > f64::from(u32::MAX) {
            return Err(TradingError::computation(format!(
                "Account field 'openPositionCount' is not a valid count: {}",
                count
            )));
        }

        Ok(Self {
            balance: numeric_field(account, "balance")?,
            equity,
            margin_available: numeric_field(account, "marginAvailable")?,
            margin_used: numeric_field(account, "marginUsed")?,
            unrealized_pl: numeric_field(account, "unrealizedPL")?,
            open_position_count: count as u32,
        })
    }

    /// Reject figures that cannot come from a real account (NaN, infinities)
    pub fn ensure_finite(&self) -> TradingResult<()> {
        for (name, value) in [
            ("balance", self.balance),
            ("equity", self.equity),
            ("margin_available", self.margin_available),
            ("margin_used", self.margin_used),
            ("unrealized_pl", self.unrealized_pl),
        ] {
            if !value.is_finite() {
                return Err(TradingError::computation(format!(
                    "Account field '{}' is not a finite number: {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

fn numeric_field(account: &Value, key: &str) -> TradingResult<f64> {
    let value = account
        .get(key)
        .ok_or_else(|| TradingError::computation(format!("Account field '{}' is missing", key)))?;

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        TradingError::computation(format!("Account field '{}' is not numeric: {}", key, value))
    })
}

/// Net position on one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub long_units: i64,
    pub short_units: i64,
    pub unrealized_pl: f64,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.long_units != 0 || self.short_units != 0
    }
}

/// Current quote for an instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    pub spread_pips: f64,
}

impl PriceQuote {
    pub fn from_bid_ask(bid: f64, ask: f64) -> Self {
        Self {
            bid,
            ask,
            mid: (bid + ask) / 2.0,
            spread_pips: (ask - bid) * limits::PIPS_PER_UNIT,
        }
    }
}

/// Limit order submitted to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument: String,
    pub units: u64,
    pub price: f64,
    pub side: Side,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

/// Pending order resting at the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub instrument: String,
    pub units: u64,
    pub price: f64,
    pub side: Side,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: Option<String>,
    pub accepted: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.999_999_999_998_9, 2), 1.0);
        assert_eq!(round_to(1.072_222_222, 5), 1.07222);
        assert_eq!(round_to(-0.054, 2), -0.05);
    }

    #[test]
    fn test_account_from_broker_strings() {
        let doc = json!({
            "balance": "1000.5",
            "NAV": "990.25",
            "marginAvailable": "900",
            "marginUsed": "100",
            "unrealizedPL": "-10.25",
            "openPositionCount": 2
        });
        let account = AccountSnapshot::from_broker_json(&doc).unwrap();
        assert_eq!(account.balance, 1000.5);
        assert_eq!(account.equity, 990.25);
        assert_eq!(account.unrealized_pl, -10.25);
        assert_eq!(account.open_position_count, 2);
    }

    #[test]
    fn test_account_missing_field_is_computation_error() {
        let doc = json!({ "balance": 1000.0, "equity": 1000.0 });
        let err = AccountSnapshot::from_broker_json(&doc).unwrap_err();
        assert!(matches!(err, TradingError::Computation(_)));
        assert!(err.to_string().contains("openPositionCount"));
    }

    #[test]
    fn test_account_non_numeric_field() {
        let doc = json!({
            "balance": "lots",
            "equity": 1.0,
            "marginAvailable": 1.0,
            "marginUsed": 0.0,
            "unrealizedPL": 0.0,
            "openPositionCount": 0
        });
        assert!(AccountSnapshot::from_broker_json(&doc).is_err());
    }

    #[test]
    fn test_quote_spread_in_pips() {
        let quote = PriceQuote::from_bid_ask(1.0800, 1.0801);
        assert!((quote.spread_pips - 1.0).abs() < 1e-6);
        assert!((quote.mid - 1.08005).abs() < 1e-12);
    }

    #[test]
    fn test_position_open() {
        let flat = Position { instrument: "EUR_USD".into(), long_units: 0, short_units: 0, unrealized_pl: 0.0 };
        let short = Position { short_units: -1000, ..flat.clone() };
        assert!(!flat.is_open());
        assert!(short.is_open());
    }
}
