// Common test utilities and helpers
#![allow(dead_code)]

use range_grid_bot::{AccountSnapshot, BotConfig, GridBot, GridConfig, PaperGateway, Position, SafetyGate, SafetyLimits};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Create a test configuration with sensible defaults
pub fn create_test_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.safety.max_open_positions = 3;
    config.monitoring.check_interval_seconds = 1;
    config
}

/// EUR/USD grid over 1.07 - 1.09
pub fn create_grid_config(num_grids: u32) -> GridConfig {
    GridConfig::new("EUR_USD", 1.0700, 1.0900, num_grids, 20.0, 100.0, 1000).expect("valid grid config")
}

pub fn create_safety_gate() -> SafetyGate {
    SafetyGate::new(SafetyLimits::new(50.0, 3, 50.0, 10.0).expect("valid safety limits"))
}

/// Account well inside every safety limit
pub fn healthy_account() -> AccountSnapshot {
    AccountSnapshot {
        balance: 10_000.0,
        equity: 10_000.0,
        margin_available: 9_000.0,
        margin_used: 1_000.0,
        unrealized_pl: 0.0,
        open_position_count: 0,
    }
}

pub fn open_positions(count: usize) -> Vec<Position> {
    (0..count)
        .map(|i| Position {
            instrument: format!("PAIR_{}", i),
            long_units: 1000,
            short_units: 0,
            unrealized_pl: 0.0,
        })
        .collect()
}

/// Paper gateway quoting EUR_USD at `price` with a 1 pip spread
pub fn create_paper_gateway(price: f64) -> PaperGateway {
    PaperGateway::new("EUR_USD", 10_000.0, price, 1.0)
}

/// Bot on a paper gateway that polls every few milliseconds
pub fn create_test_bot() -> GridBot<PaperGateway> {
    GridBot::new(&create_test_config(), create_paper_gateway(1.08))
        .expect("valid bot")
        .with_check_interval(Duration::from_millis(5))
}

/// Create a temporary directory with a config file path inside it
pub fn create_temp_config_path(file_name: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join(file_name);
    (temp_dir, path)
}
