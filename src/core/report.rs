// Grid configuration report
//
// Combines levels, per-cycle profit and projections into one summary for a
// given market price. Serializes to JSON for `grid-bot report --json`; the
// Display impl is the text rendering.

use crate::config::GridConfig;
use crate::core::grid_levels::calculate_grid_levels;
use crate::core::projection::{
    daily_projection, monthly_projection, net_profit_per_cycle, profit_per_cycle, return_on_investment,
    spread_cost, total_capital_needed, DEFAULT_LEVERAGE, DEFAULT_TRADING_DAYS,
};
use crate::core::types::limits;
use crate::error::{TradingError, TradingResult};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Typical EUR/USD spread used when none is given
pub const DEFAULT_REPORT_SPREAD_PIPS: f64 = 0.9;

const PREVIEW_LEVELS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct GridSummary {
    pub lower_level: f64,
    pub upper_level: f64,
    pub range_pips: f64,
    pub number_of_grids: u32,
    pub grid_spacing_pips: f64,
    pub unique_levels: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SizingSummary {
    pub units_per_trade: u64,
    pub capital_per_grid: f64,
    pub total_capital_needed: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profitability {
    pub gross_profit_per_cycle: f64,
    pub spread_cost_per_cycle: f64,
    pub net_profit_per_cycle: f64,
    pub daily_projection: f64,
    pub monthly_projection: f64,
    pub monthly_roi_percent: f64,
    pub is_profitable: bool,
}

/// First buy levels and last sell levels, with flags when the lists were cut
#[derive(Debug, Clone, Serialize)]
pub struct LevelPreview {
    pub buy_levels: Vec<f64>,
    pub buy_truncated: bool,
    pub sell_levels: Vec<f64>,
    pub sell_truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridReport {
    pub instrument: String,
    pub current_price: f64,
    pub spread_pips: f64,
    pub grid: GridSummary,
    pub sizing: SizingSummary,
    pub profitability: Profitability,
    pub levels: LevelPreview,
    pub warnings: Vec<String>,
}

impl GridReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn to_json(&self) -> TradingResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the report for `config` at `current_price`
pub fn generate_grid_report(config: &GridConfig, current_price: f64, spread_pips: f64) -> TradingResult<GridReport> {
    if !limits::price_in_range(current_price) {
        return Err(TradingError::invalid_param(
            "current_price",
            format!("out of range: {}", current_price),
        ));
    }
    if !limits::spread_in_range(spread_pips) {
        return Err(TradingError::invalid_param("spread_pips", format!("out of range: {}", spread_pips)));
    }

    let levels = calculate_grid_levels(config, Some(current_price))?;
    let units = config.units_per_trade();
    let spacing_pips = config.grid_spacing_pips();

    // One cycle: buy at the current price, sell one configured spacing higher
    let exit_price = current_price + spacing_pips / limits::PIPS_PER_UNIT;
    let gross = profit_per_cycle(current_price, exit_price, units)?;
    let net = net_profit_per_cycle(current_price, exit_price, units, spread_pips)?;

    let mut daily_cycles = config.range_pips() / spacing_pips;
    if daily_cycles <= 0.0 {
        warn!("⚠️  Invalid daily cycles: {}, using 1", daily_cycles);
        daily_cycles = 1.0;
    }

    // Half the crossings complete a round trip
    let daily = daily_projection(net, (daily_cycles / 2.0) as i64);
    let monthly = monthly_projection(daily, DEFAULT_TRADING_DAYS);
    let capital = total_capital_needed(units, config.num_grids(), current_price, DEFAULT_LEVERAGE)?;
    let roi = return_on_investment(capital, monthly);

    let mut warnings = Vec::new();
    if config.range_pips() < 10.0 {
        warnings.push("Very small price range".to_string());
    }
    if config.actual_grid_spacing() < 1.0 {
        warnings.push("Very small grid spacing".to_string());
    }
    if config.num_grids() > 100 {
        warnings.push("Large number of grids".to_string());
    }
    if roi > 100.0 {
        warnings.push("Very high ROI projection".to_string());
    }

    let buy = levels.buy_levels();
    let sell = levels.sell_levels();
    let preview = LevelPreview {
        buy_levels: buy.iter().take(PREVIEW_LEVELS).copied().collect(),
        buy_truncated: buy.len() > PREVIEW_LEVELS,
        sell_levels: sell[sell.len().saturating_sub(PREVIEW_LEVELS)..].to_vec(),
        sell_truncated: sell.len() > PREVIEW_LEVELS,
    };

    info!(
        "📊 Report for {} @ {:.5}: net ${:.2}/cycle, ${:.2}/month, ROI {:.2}%",
        config.instrument(),
        current_price,
        net,
        monthly,
        roi
    );

    Ok(GridReport {
        instrument: config.instrument().to_string(),
        current_price,
        spread_pips,
        grid: GridSummary {
            lower_level: config.lower_level(),
            upper_level: config.upper_level(),
            range_pips: config.range_pips(),
            number_of_grids: config.num_grids(),
            grid_spacing_pips: spacing_pips,
            unique_levels: levels.total_levels(),
        },
        sizing: SizingSummary {
            units_per_trade: units,
            capital_per_grid: config.position_size_per_grid(),
            total_capital_needed: capital,
        },
        profitability: Profitability {
            gross_profit_per_cycle: gross,
            spread_cost_per_cycle: spread_cost(spread_pips, units),
            net_profit_per_cycle: net,
            daily_projection: daily,
            monthly_projection: monthly,
            monthly_roi_percent: roi,
            is_profitable: net > 0.0,
        },
        levels: preview,
        warnings,
    })
}

fn format_levels(levels: &[f64], truncated: bool) -> String {
    let mut parts: Vec<String> = levels.iter().map(|level| format!("{:.5}", level)).collect();
    if truncated {
        parts.push("...".to_string());
    }
    parts.join(", ")
}

impl fmt::Display for GridReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, "GRID BOT CONFIGURATION REPORT - {}", self.instrument)?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;
        writeln!(f, "Current Price: {:.5}", self.current_price)?;
        writeln!(f)?;

        writeln!(f, "📊 GRID CONFIGURATION:")?;
        writeln!(f, "  Range: {:.5} - {:.5}", self.grid.lower_level, self.grid.upper_level)?;
        writeln!(f, "  Range Width: {:.2} pips", self.grid.range_pips)?;
        writeln!(f, "  Total Grids: {}", self.grid.number_of_grids)?;
        writeln!(f, "  Grid Spacing: {:.2} pips", self.grid.grid_spacing_pips)?;
        writeln!(f, "  Unique Levels: {}", self.grid.unique_levels)?;
        writeln!(f, "  Buy Levels: {}", format_levels(&self.levels.buy_levels, self.levels.buy_truncated))?;
        writeln!(f, "  Sell Levels: {}", format_levels(&self.levels.sell_levels, self.levels.sell_truncated))?;
        writeln!(f)?;

        writeln!(f, "💰 POSITION SIZING:")?;
        writeln!(f, "  Units per Trade: {}", self.sizing.units_per_trade)?;
        writeln!(f, "  Capital per Grid: ${:.2}", self.sizing.capital_per_grid)?;
        writeln!(f, "  Total Capital Needed: ${:.2}", self.sizing.total_capital_needed)?;
        writeln!(f)?;

        let p = &self.profitability;
        writeln!(f, "📈 PROFITABILITY (per cycle, {:.1} pip spread):", self.spread_pips)?;
        writeln!(f, "  Gross Profit: ${:.2}", p.gross_profit_per_cycle)?;
        writeln!(f, "  Spread Cost: ${:.2}", p.spread_cost_per_cycle)?;
        writeln!(f, "  Net Profit: ${:.2}", p.net_profit_per_cycle)?;
        writeln!(f)?;

        writeln!(f, "📊 PROJECTIONS:")?;
        writeln!(f, "  Daily Projection: ${:.2}", p.daily_projection)?;
        writeln!(f, "  Monthly Projection: ${:.2}", p.monthly_projection)?;
        writeln!(f, "  Monthly ROI: {:.2}%", p.monthly_roi_percent)?;

        if self.has_warnings() {
            writeln!(f)?;
            writeln!(f, "⚠️  WARNINGS:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {}", warning)?;
            }
        }

        write!(f, "{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GridConfig {
        GridConfig::new("EUR_USD", 1.0700, 1.0900, 10, 20.0, 100.0, 1000).unwrap()
    }

    #[test]
    fn test_report_profitability() {
        let report = generate_grid_report(&config(), 1.0800, DEFAULT_REPORT_SPREAD_PIPS).unwrap();
        let p = &report.profitability;

        // 20 pips on 1000 units = $2.00, spread 0.9 pips = $0.09
        assert_eq!(p.gross_profit_per_cycle, 2.0);
        assert_eq!(p.net_profit_per_cycle, 1.91);
        assert!(p.is_profitable);
        // 200 pips / 20 = 10 crossings, 5 round trips a day
        assert_eq!(p.daily_projection, 9.55);
        assert_eq!(p.monthly_projection, 191.0);
        assert_eq!(report.sizing.total_capital_needed, 1.0);
    }

    #[test]
    fn test_report_flags_high_roi() {
        let report = generate_grid_report(&config(), 1.0800, 0.9).unwrap();
        assert!(report.warnings.iter().any(|w| w == "Very high ROI projection"));
    }

    #[test]
    fn test_level_preview_truncates() {
        let cfg = GridConfig::new("EUR_USD", 1.0700, 1.0900, 20, 10.0, 100.0, 1000).unwrap();
        let report = generate_grid_report(&cfg, 1.0800, 0.9).unwrap();

        assert_eq!(report.levels.buy_levels.len(), 5);
        assert!(report.levels.buy_truncated);
        assert_eq!(report.levels.sell_levels.len(), 5);
        assert_eq!(*report.levels.sell_levels.last().unwrap(), 1.09);
    }

    #[test]
    fn test_report_rejects_bad_inputs() {
        assert!(matches!(
            generate_grid_report(&config(), 0.0, 0.9),
            Err(TradingError::InvalidParameter(p, _)) if p == "current_price"
        ));
        assert!(generate_grid_report(&config(), 1.08, -1.0).is_err());
    }

    #[test]
    fn test_display_and_json() {
        let report = generate_grid_report(&config(), 1.0800, 0.9).unwrap();
        let text = report.to_string();
        assert!(text.contains("GRID BOT CONFIGURATION REPORT - EUR_USD"));
        assert!(text.contains("Net Profit: $1.91"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["instrument"], "EUR_USD");
        assert_eq!(json["grid"]["unique_levels"], 10);
    }
}
