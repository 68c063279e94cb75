// Configuration management for the grid bot
//
// The file layer (`BotConfig` and its sections) mirrors config.toml one to one.
// `GridConfig` and `SafetyLimits` are the validated values the engine works
// with; they can only be built through their constructors, so an instance
// always satisfies the documented ranges.

use crate::core::types::limits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRange {
    pub lower_level: f64,
    pub upper_level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    pub number_of_grids: u32,
    pub grid_spacing_pips: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizing {
    pub position_size_per_grid: f64,
    pub units_per_trade: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSection {
    pub instrument: String,
    pub grid_range: GridRange,
    pub grid_settings: GridSettings,
    pub position_sizing: PositionSizing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySection {
    pub max_loss_usd: f64,
    pub max_open_positions: u32,
    pub stop_loss_distance_pips: f64,
    pub take_profit_distance_pips: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_check_interval() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            log_level: default_log_level(),
        }
    }
}

/// Complete configuration file structure matching config.toml.example
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub trading: TradingSection,
    pub safety: SafetySection,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            trading: TradingSection {
                instrument: "EUR_USD".to_string(),
                grid_range: GridRange {
                    lower_level: 1.0700,
                    upper_level: 1.0900,
                },
                grid_settings: GridSettings {
                    number_of_grids: 10,
                    grid_spacing_pips: 20.0,
                },
                position_sizing: PositionSizing {
                    position_size_per_grid: 100.0,
                    units_per_trade: 1000,
                },
            },
            safety: SafetySection {
                max_loss_usd: 50.0,
                max_open_positions: 20,
                stop_loss_distance_pips: 50.0,
                take_profit_distance_pips: 10.0,
            },
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file (or JSON when the extension is `.json`)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;
        if content.trim().is_empty() {
            return Err(ConfigError::FileRead(format!("Config file is empty: {}", path.display())));
        }

        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = serde_json::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Build the validated grid configuration
    pub fn grid_config(&self) -> Result<GridConfig, ConfigError> {
        let trading = &self.trading;
        GridConfig::new(
            &trading.instrument,
            trading.grid_range.lower_level,
            trading.grid_range.upper_level,
            trading.grid_settings.number_of_grids,
            trading.grid_settings.grid_spacing_pips,
            trading.position_sizing.position_size_per_grid,
            trading.position_sizing.units_per_trade,
        )
    }

    /// Build the validated safety limits
    pub fn safety_limits(&self) -> Result<SafetyLimits, ConfigError> {
        SafetyLimits::new(
            self.safety.max_loss_usd,
            self.safety.max_open_positions,
            self.safety.stop_loss_distance_pips,
            self.safety.take_profit_distance_pips,
        )
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.grid_config()?;
        self.safety_limits()?;

        if self.monitoring.check_interval_seconds == 0 {
            return Err(ConfigError::Validation(
                "monitoring.check_interval_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Validated, immutable grid configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    instrument: String,
    lower_level: f64,
    upper_level: f64,
    num_grids: u32,
    grid_spacing_pips: f64,
    position_size_per_grid: f64,
    units_per_trade: u64,
    range_pips: f64,
    actual_grid_spacing: f64,
}

impl GridConfig {
    pub fn new(
        instrument: &str,
        lower_level: f64,
        upper_level: f64,
        num_grids: u32,
        grid_spacing_pips: f64,
        position_size_per_grid: f64,
        units_per_trade: u64,
    ) -> Result<Self, ConfigError> {
        let len = instrument.chars().count();
        if !(limits::MIN_INSTRUMENT_LEN..=limits::MAX_INSTRUMENT_LEN).contains(&len) {
            return Err(ConfigError::Validation(format!(
                "trading.instrument must be {}-{} characters, got {:?}",
                limits::MIN_INSTRUMENT_LEN,
                limits::MAX_INSTRUMENT_LEN,
                instrument
            )));
        }

        if !limits::price_in_range(lower_level) {
            return Err(ConfigError::Validation(format!("Lower level out of range: {}", lower_level)));
        }
        if !limits::price_in_range(upper_level) {
            return Err(ConfigError::Validation(format!("Upper level out of range: {}", upper_level)));
        }
        if lower_level >= upper_level {
            return Err(ConfigError::Validation(format!(
                "Lower level ({}) must be less than upper level ({})",
                lower_level, upper_level
            )));
        }

        if !(limits::MIN_GRIDS..=limits::MAX_GRIDS).contains(&num_grids) {
            return Err(ConfigError::Validation(format!("Number of grids out of range: {}", num_grids)));
        }

        if !(limits::MIN_PIPS..=limits::MAX_PIPS).contains(&grid_spacing_pips) {
            return Err(ConfigError::Validation(format!("Grid spacing out of range: {}", grid_spacing_pips)));
        }

        if !position_size_per_grid.is_finite() || position_size_per_grid < 0.0 {
            return Err(ConfigError::Validation(format!(
                "Position size per grid must be a non-negative number: {}",
                position_size_per_grid
            )));
        }

        if !limits::units_in_range(units_per_trade) {
            return Err(ConfigError::Validation(format!("Units per trade out of range: {}", units_per_trade)));
        }

        let range_pips = (upper_level - lower_level) * limits::PIPS_PER_UNIT;
        let actual_grid_spacing = range_pips / f64::from(num_grids - 1);

        Ok(Self {
            instrument: instrument.to_string(),
            lower_level,
            upper_level,
            num_grids,
            grid_spacing_pips,
            position_size_per_grid,
            units_per_trade,
            range_pips,
            actual_grid_spacing,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn lower_level(&self) -> f64 {
        self.lower_level
    }

    pub fn upper_level(&self) -> f64 {
        self.upper_level
    }

    pub fn num_grids(&self) -> u32 {
        self.num_grids
    }

    /// Configured spacing; used for the example cycle in the report
    pub fn grid_spacing_pips(&self) -> f64 {
        self.grid_spacing_pips
    }

    pub fn position_size_per_grid(&self) -> f64 {
        self.position_size_per_grid
    }

    pub fn units_per_trade(&self) -> u64 {
        self.units_per_trade
    }

    /// Width of the grid range in pips
    pub fn range_pips(&self) -> f64 {
        self.range_pips
    }

    /// Spacing in pips that actually separates adjacent levels
    pub fn actual_grid_spacing(&self) -> f64 {
        self.actual_grid_spacing
    }

    /// Midpoint of the configured range
    pub fn center(&self) -> f64 {
        (self.upper_level + self.lower_level) / 2.0
    }
}

/// Validated, immutable safety limits
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyLimits {
    max_loss_usd: f64,
    max_open_positions: u32,
    stop_loss_distance_pips: f64,
    take_profit_distance_pips: f64,
}

impl SafetyLimits {
    pub fn new(
        max_loss_usd: f64,
        max_open_positions: u32,
        stop_loss_distance_pips: f64,
        take_profit_distance_pips: f64,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("safety.max_loss_usd", max_loss_usd),
            ("safety.stop_loss_distance_pips", stop_loss_distance_pips),
            ("safety.take_profit_distance_pips", take_profit_distance_pips),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(Self {
            max_loss_usd,
            max_open_positions,
            stop_loss_distance_pips,
            take_profit_distance_pips,
        })
    }

    pub fn max_loss_usd(&self) -> f64 {
        self.max_loss_usd
    }

    pub fn max_open_positions(&self) -> u32 {
        self.max_open_positions
    }

    pub fn stop_loss_distance_pips(&self) -> f64 {
        self.stop_loss_distance_pips
    }

    pub fn take_profit_distance_pips(&self) -> f64 {
        self.take_profit_distance_pips
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_fields_computed_once() {
        let config = GridConfig::new("EUR_USD", 1.0700, 1.0900, 11, 20.0, 100.0, 1000).unwrap();
        assert!((config.range_pips() - 200.0).abs() < 1e-9);
        assert!((config.actual_grid_spacing() - 20.0).abs() < 1e-9);
        assert!((config.center() - 1.08).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = GridConfig::new("EUR_USD", 1.0900, 1.0700, 10, 10.0, 100.0, 1000).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("must be less than"));
    }

    #[test]
    fn test_equal_bounds_rejected() {
        assert!(GridConfig::new("EUR_USD", 1.08, 1.08, 10, 10.0, 100.0, 1000).is_err());
    }

    #[test]
    fn test_field_ranges() {
        assert!(GridConfig::new("EU", 1.07, 1.09, 10, 10.0, 100.0, 1000).is_err());
        assert!(GridConfig::new("EUR_USD_EUR_USD_EUR_USD", 1.07, 1.09, 10, 10.0, 100.0, 1000).is_err());
        assert!(GridConfig::new("EUR_USD", 0.00001, 1.09, 10, 10.0, 100.0, 1000).is_err());
        assert!(GridConfig::new("EUR_USD", 1.07, 100_001.0, 10, 10.0, 100.0, 1000).is_err());
        assert!(GridConfig::new("EUR_USD", 1.07, 1.09, 1, 10.0, 100.0, 1000).is_err());
        assert!(GridConfig::new("EUR_USD", 1.07, 1.09, 1001, 10.0, 100.0, 1000).is_err());
        assert!(GridConfig::new("EUR_USD", 1.07, 1.09, 10, 0.0, 100.0, 1000).is_err());
        assert!(GridConfig::new("EUR_USD", 1.07, 1.09, 10, 10.0, f64::NAN, 1000).is_err());
        assert!(GridConfig::new("EUR_USD", 1.07, 1.09, 10, 10.0, 100.0, 0).is_err());
        assert!(GridConfig::new("EUR_USD", 1.07, 1.09, 10, 10.0, 100.0, 100_000_001).is_err());
        assert!(GridConfig::new("EUR_USD", f64::NAN, 1.09, 10, 10.0, 100.0, 1000).is_err());
    }

    #[test]
    fn test_safety_limits_validation() {
        assert!(SafetyLimits::new(50.0, 20, 50.0, 10.0).is_ok());
        assert!(SafetyLimits::new(-1.0, 20, 50.0, 10.0).is_err());
        assert!(SafetyLimits::new(50.0, 20, f64::INFINITY, 10.0).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
    }
}
