// Range Grid Bot Library
//
// A forex range grid bot: grid level calculation, profit projections, a
// sticky safety gate and the polling loop that places grid orders through a
// broker gateway.

pub mod core;
pub mod config;
pub mod error;       // Unified error handling
pub mod gateway;     // Broker boundary and paper gateway
pub mod validation;  // Pre-flight validation

// Re-export core types
pub use crate::core::{
    calculate_grid_levels, generate_grid_report, AccountSnapshot, BotStatistics, CycleOutcome, GateState,
    GridBot, GridLevelSet, GridPlacement, GridReport, KillSwitch, OrderRequest, Position, PriceQuote,
    SafetyGate, Side,
};

// Re-export projection functions
pub use crate::core::projection::{
    daily_projection, monthly_projection, net_profit_per_cycle, profit_per_cycle, return_on_investment,
    total_capital_needed,
};

// Re-export error types
pub use error::{TradingError, TradingResult};

// Re-export validation types
pub use validation::{PreFlightValidator, ValidationCheck, ValidationLevel, ValidationResult};

// Re-export gateway types
pub use gateway::{OrderGateway, PaperGateway};

// Re-export configuration
pub use config::{BotConfig, ConfigError, GridConfig, SafetyLimits};
