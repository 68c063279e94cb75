// Grid level calculation
//
// Turns a validated range configuration into the ordered set of prices at
// which resting orders are quoted. Stateless: every call builds a new set.

use crate::config::GridConfig;
use crate::core::types::{limits, round_to};
use crate::error::{TradingError, TradingResult};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Decimal places every level is rounded to
pub const LEVEL_PRECISION: i32 = 5;

/// Ordered, unique grid levels split into a buy half and a sell half
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLevelSet {
    buy_levels: Vec<f64>,
    sell_levels: Vec<f64>,
    all_levels: Vec<f64>,
    grid_spacing_pips: f64,
}

impl GridLevelSet {
    /// Levels below the split point, ascending
    pub fn buy_levels(&self) -> &[f64] {
        &self.buy_levels
    }

    /// Levels at and above the split point, ascending
    pub fn sell_levels(&self) -> &[f64] {
        &self.sell_levels
    }

    pub fn all_levels(&self) -> &[f64] {
        &self.all_levels
    }

    /// Actual spacing between adjacent levels, in pips
    pub fn grid_spacing_pips(&self) -> f64 {
        self.grid_spacing_pips
    }

    pub fn total_levels(&self) -> usize {
        self.all_levels.len()
    }
}

/// Calculate all grid levels for a configuration.
///
/// `current_price` is only used for logging.
pub fn calculate_grid_levels(config: &GridConfig, current_price: Option<f64>) -> TradingResult<GridLevelSet> {
    let num_grids = config.num_grids();
    if num_grids < limits::MIN_GRIDS {
        return Err(TradingError::computation(format!(
            "Cannot calculate grid levels with {} grids (minimum {})",
            num_grids,
            limits::MIN_GRIDS
        )));
    }

    let range_pips = config.range_pips();
    if range_pips <= 0.0 {
        return Err(TradingError::computation(format!(
            "Invalid price range: [{:.5}, {:.5}]",
            config.lower_level(),
            config.upper_level()
        )));
    }

    let spacing = config.actual_grid_spacing();
    if spacing <= 0.0 {
        return Err(TradingError::computation(format!("Grid spacing too small: {} pips", spacing)));
    }
    if spacing < limits::MIN_PIPS {
        warn!("⚠️  Grid spacing {} pips is very small", spacing);
    }

    // Rounding can push a level past a bound that is finer than the precision
    let (lower, upper) = (config.lower_level(), config.upper_level());
    let mut levels: Vec<f64> = (0..num_grids)
        .map(|i| {
            let level = lower + f64::from(i) * spacing / limits::PIPS_PER_UNIT;
            round_to(level, LEVEL_PRECISION).clamp(lower, upper)
        })
        .collect();

    // Spacing finer than the rounding precision collapses neighbouring levels
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup();

    if levels.len() < 2 {
        return Err(TradingError::computation(format!(
            "Price granularity prevents meaningful grid levels ({} unique levels from {} requested)",
            levels.len(),
            num_grids
        )));
    }

    let split_point = levels.len() / 2;
    let mut buy_levels = levels[..split_point].to_vec();
    let mut sell_levels = levels[split_point..].to_vec();

    if buy_levels.is_empty() {
        buy_levels.push(config.lower_level());
    }
    if sell_levels.is_empty() {
        sell_levels.push(config.upper_level());
    }

    if let Some(price) = current_price {
        debug!("Grid computed around price {:.5}", price);
    }
    info!(
        "📐 Calculated {} grid levels ({} buy, {} sell) for {}",
        levels.len(),
        buy_levels.len(),
        sell_levels.len(),
        config.instrument()
    );

    Ok(GridLevelSet {
        buy_levels,
        sell_levels,
        all_levels: levels,
        grid_spacing_pips: spacing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(lower: f64, upper: f64, grids: u32) -> GridConfig {
        GridConfig::new("EUR_USD", lower, upper, grids, 10.0, 100.0, 10_000).unwrap()
    }

    #[test]
    fn test_levels_span_the_range() {
        let levels = calculate_grid_levels(&config(1.0700, 1.0900, 10), Some(1.08)).unwrap();

        assert_eq!(levels.total_levels(), 10);
        assert_eq!(levels.all_levels()[0], 1.07);
        assert_eq!(*levels.all_levels().last().unwrap(), 1.09);
        assert_eq!(levels.buy_levels().len(), 5);
        assert_eq!(levels.sell_levels().len(), 5);
    }

    #[test]
    fn test_levels_rounded_to_five_decimals() {
        let levels = calculate_grid_levels(&config(1.0700, 1.0900, 7), None).unwrap();
        for level in levels.all_levels() {
            assert_eq!(*level, round_to(*level, LEVEL_PRECISION));
        }
    }

    #[test]
    fn test_odd_count_puts_extra_level_on_sell_side() {
        let levels = calculate_grid_levels(&config(1.0700, 1.0900, 5), None).unwrap();
        assert_eq!(levels.buy_levels(), &[1.07, 1.075]);
        assert_eq!(levels.sell_levels(), &[1.08, 1.085, 1.09]);
    }

    #[test]
    fn test_two_grids() {
        let levels = calculate_grid_levels(&config(1.0700, 1.0900, 2), None).unwrap();
        assert_eq!(levels.buy_levels(), &[1.07]);
        assert_eq!(levels.sell_levels(), &[1.09]);
    }

    #[test]
    fn test_duplicates_removed_when_spacing_below_precision() {
        // 50 grids over 2 pips: adjacent levels are closer than the rounding step
        let levels = calculate_grid_levels(&config(1.0000, 1.0002, 50), None).unwrap();
        assert_eq!(levels.total_levels(), 21);
        assert!(levels.all_levels().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_levels_stay_inside_bounds_finer_than_precision() {
        let cfg = config(1.000004, 1.000016, 2);
        let levels = calculate_grid_levels(&cfg, None).unwrap();

        assert_eq!(levels.all_levels(), &[1.000004, 1.000016]);
        assert!(levels
            .all_levels()
            .iter()
            .all(|l| (cfg.lower_level()..=cfg.upper_level()).contains(l)));
    }

    #[test]
    fn test_granularity_error() {
        // Range narrower than the rounding step collapses to one level
        let cfg = config(1.00000, 1.000004, 3);
        let err = calculate_grid_levels(&cfg, None).unwrap_err();
        assert!(matches!(err, TradingError::Computation(_)));
        assert!(err.to_string().contains("granularity"));
    }
}
