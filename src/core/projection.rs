// Profit, capital and ROI projections
//
// All functions are pure. Monetary results are rounded to cents. Arguments
// outside their documented range are rejected with `InvalidParameter`; the
// three clamps (negative cycles, trading days, leverage) are policy and only
// logged.

use crate::core::types::{limits, round_to};
use crate::error::{TradingError, TradingResult};
use tracing::{info, warn};

pub const DEFAULT_TRADING_DAYS: i32 = 20;
pub const DEFAULT_LEVERAGE: f64 = 1.0;
/// Minimum capital reported by `total_capital_needed`
pub const MIN_CAPITAL_USD: f64 = 1.0;
/// Units in one standard lot
pub const UNITS_PER_LOT: f64 = 100_000.0;
/// Overflow guard for unit counts and position values
pub const MAX_POSITION_MAGNITUDE: f64 = 1e12;

const MONEY_PRECISION: i32 = 2;

fn validate_price(price: f64, param: &str) -> TradingResult<()> {
    if !limits::price_in_range(price) {
        return Err(TradingError::invalid_param(param, format!("out of range: {}", price)));
    }
    Ok(())
}

fn validate_units(units: u64, param: &str) -> TradingResult<()> {
    if !limits::units_in_range(units) {
        return Err(TradingError::invalid_param(param, format!("out of range: {}", units)));
    }
    Ok(())
}

fn validate_spread(spread_pips: f64, param: &str) -> TradingResult<()> {
    if !limits::spread_in_range(spread_pips) {
        return Err(TradingError::invalid_param(param, format!("out of range: {}", spread_pips)));
    }
    Ok(())
}

/// Gross profit in USD for one buy-then-sell cycle, before spread
pub fn profit_per_cycle(entry_price: f64, exit_price: f64, units: u64) -> TradingResult<f64> {
    validate_price(entry_price, "entry_price")?;
    validate_price(exit_price, "exit_price")?;
    validate_units(units, "units")?;

    let pips_difference = (exit_price - entry_price) * limits::PIPS_PER_UNIT;
    if pips_difference.abs() > limits::MAX_PIPS * 1000.0 {
        warn!("⚠️  Large pip difference detected: {:.2} pips", pips_difference);
    }

    let profit = pips_difference * units as f64 * limits::PIP_VALUE_PER_UNIT;
    if profit.abs() > 1e9 {
        warn!("⚠️  Extreme profit value: ${:.2}", profit);
    }

    Ok(round_to(profit, MONEY_PRECISION))
}

/// Cost in USD of paying `spread_pips` on `units`
pub fn spread_cost(spread_pips: f64, units: u64) -> f64 {
    spread_pips * units as f64 * limits::PIP_VALUE_PER_UNIT
}

/// Net profit in USD for one cycle after the spread is paid
pub fn net_profit_per_cycle(
    entry_price: f64,
    exit_price: f64,
    units: u64,
    spread_pips: f64,
) -> TradingResult<f64> {
    validate_spread(spread_pips, "spread_pips")?;

    let gross_profit = profit_per_cycle(entry_price, exit_price, units)?;
    let cost = spread_cost(spread_pips, units);

    if gross_profit > 0.0 && cost > gross_profit {
        warn!(
            "⚠️  Spread cost (${:.2}) exceeds gross profit (${:.2})",
            cost, gross_profit
        );
    }

    Ok(round_to(gross_profit - cost, MONEY_PRECISION))
}

/// Projected daily profit. Negative cycle counts are treated as zero.
pub fn daily_projection(net_profit_per_cycle: f64, cycles_per_day: i64) -> f64 {
    let cycles = if cycles_per_day < 0 {
        warn!("⚠️  Negative cycles per day: {}, using 0", cycles_per_day);
        0
    } else {
        cycles_per_day
    };

    if cycles > 1000 {
        warn!("⚠️  Very high cycles per day: {}", cycles);
    }
    if net_profit_per_cycle < 0.0 {
        warn!("⚠️  Negative daily profit projection: ${:.2}", net_profit_per_cycle);
    }

    round_to(net_profit_per_cycle * cycles as f64, MONEY_PRECISION)
}

/// Projected monthly profit. `trading_days` is clamped into [1, 31].
pub fn monthly_projection(daily_profit: f64, trading_days: i32) -> f64 {
    let days = if (limits::MIN_TRADING_DAYS..=limits::MAX_TRADING_DAYS).contains(&trading_days) {
        trading_days
    } else {
        warn!("⚠️  Trading days out of typical range: {}", trading_days);
        trading_days.clamp(limits::MIN_TRADING_DAYS, limits::MAX_TRADING_DAYS)
    };

    if daily_profit < 0.0 {
        warn!("⚠️  Negative daily profit for monthly projection: ${:.2}", daily_profit);
    }

    round_to(daily_profit * f64::from(days), MONEY_PRECISION)
}

/// Monthly ROI as a percentage of capital.
///
/// With no capital the result is 0 for zero profit and signed infinity
/// otherwise.
pub fn return_on_investment(capital: f64, monthly_profit: f64) -> f64 {
    if capital <= 0.0 {
        if monthly_profit == 0.0 {
            return 0.0;
        } else if monthly_profit > 0.0 {
            warn!("⚠️  Infinite ROI with zero capital and positive profit");
            return f64::INFINITY;
        } else {
            warn!("⚠️  Negative ROI with zero capital");
            return f64::NEG_INFINITY;
        }
    }

    if capital < 1.0 {
        warn!("⚠️  Very small capital: ${}", capital);
    }

    let roi = monthly_profit / capital * 100.0;
    if roi.abs() > 1e6 {
        warn!("⚠️  Extreme ROI value: {:.2}%", roi);
    }

    round_to(roi, MONEY_PRECISION)
}

/// Capital in USD needed to hold the buy half of the grid.
///
/// Leverage that is not a positive number falls back to 1.0. The result is
/// never below $1.00.
pub fn total_capital_needed(units_per_trade: u64, num_grids: u32, price: f64, leverage: f64) -> TradingResult<f64> {
    validate_units(units_per_trade, "units_per_trade")?;
    validate_price(price, "price")?;

    let leverage = if leverage.is_finite() && leverage > 0.0 {
        leverage
    } else {
        warn!("⚠️  Invalid leverage: {}, using {}", leverage, DEFAULT_LEVERAGE);
        DEFAULT_LEVERAGE
    };
    if leverage > 100.0 {
        warn!("⚠️  High leverage ({}x) may require additional margin", leverage);
    }

    // Only the buy side is funded up front
    let active_grids = (num_grids / 2).max(1);
    let total_units = u128::from(units_per_trade) * u128::from(active_grids);
    if total_units as f64 > MAX_POSITION_MAGNITUDE {
        return Err(TradingError::computation(format!("Total units too large: {}", total_units)));
    }

    let position_value = total_units as f64 / UNITS_PER_LOT * price;
    if position_value > MAX_POSITION_MAGNITUDE {
        return Err(TradingError::computation(format!(
            "Position value too large: ${:.2}",
            position_value
        )));
    }

    let capital_needed = position_value / leverage;
    if capital_needed > 0.0 && capital_needed < MIN_CAPITAL_USD {
        info!("Very small capital needed: ${:.4}", capital_needed);
    }

    Ok(round_to(capital_needed.max(MIN_CAPITAL_USD), MONEY_PRECISION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profit_per_cycle() {
        assert_eq!(profit_per_cycle(1.0800, 1.0810, 1000).unwrap(), 1.0);
        assert_eq!(profit_per_cycle(1.0810, 1.0800, 1000).unwrap(), -1.0);
        assert_eq!(profit_per_cycle(1.0800, 1.0800, 1000).unwrap(), 0.0);
    }

    #[test]
    fn test_profit_rejects_out_of_range() {
        assert!(matches!(
            profit_per_cycle(0.0, 1.08, 1000),
            Err(TradingError::InvalidParameter(p, _)) if p == "entry_price"
        ));
        assert!(profit_per_cycle(1.08, 100_000.5, 1000).is_err());
        assert!(profit_per_cycle(1.08, f64::NAN, 1000).is_err());
        assert!(profit_per_cycle(1.08, 1.09, 0).is_err());
        assert!(profit_per_cycle(1.08, 1.09, 100_000_001).is_err());
    }

    #[test]
    fn test_net_profit() {
        assert_eq!(net_profit_per_cycle(1.0800, 1.0810, 1000, 1.0).unwrap(), 0.9);
        assert_eq!(net_profit_per_cycle(1.0800, 1.0810, 1000, 0.0).unwrap(), 1.0);
        assert!(net_profit_per_cycle(1.0800, 1.0810, 1000, -0.1).is_err());
        assert!(net_profit_per_cycle(1.0800, 1.0810, 1000, 1000.1).is_err());
    }

    #[test]
    fn test_spread_exceeding_profit_is_not_an_error() {
        let net = net_profit_per_cycle(1.0800, 1.0801, 1000, 5.0).unwrap();
        assert_eq!(net, -0.4);
    }

    #[test]
    fn test_projection_clamps() {
        assert_eq!(daily_projection(9.0, 4), 36.0);
        assert_eq!(daily_projection(9.0, -3), 0.0);
        assert_eq!(monthly_projection(36.0, 20), 720.0);
        assert_eq!(monthly_projection(10.0, 0), 10.0);
        assert_eq!(monthly_projection(10.0, 45), 310.0);
    }

    #[test]
    fn test_roi() {
        assert_eq!(return_on_investment(200.0, 72.0), 36.0);
        assert_eq!(return_on_investment(0.0, 0.0), 0.0);
        assert_eq!(return_on_investment(0.0, 5.0), f64::INFINITY);
        assert_eq!(return_on_investment(-10.0, -5.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_capital_floor() {
        assert_eq!(total_capital_needed(1000, 10, 1.0800, 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_capital_with_leverage() {
        // 5 active grids * 100_000 units = 5 lots at 1.08
        assert_eq!(total_capital_needed(100_000, 10, 1.08, 1.0).unwrap(), 5.4);
        assert_eq!(total_capital_needed(100_000, 10, 1.08, 0.0).unwrap(), 5.4);
        assert_eq!(total_capital_needed(100_000, 10, 1.08, -2.0).unwrap(), 5.4);
        assert_eq!(total_capital_needed(1_000_000, 10, 1.08, 2.0).unwrap(), 27.0);
    }

    #[test]
    fn test_capital_overflow_guard() {
        let err = total_capital_needed(100_000_000, u32::MAX, 1.08, 1.0).unwrap_err();
        assert!(matches!(err, TradingError::Computation(_)));
    }
}
