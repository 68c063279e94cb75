// Core grid engine, safety gate and bot orchestration

pub mod types;
pub mod grid_levels;
pub mod projection;
pub mod report;
pub mod safety_gate;
pub mod grid_bot;

// Re-export commonly used types
pub use types::{AccountSnapshot, Order, OrderRequest, OrderResult, Position, PriceQuote, Side};
pub use grid_levels::{calculate_grid_levels, GridLevelSet};
pub use report::{generate_grid_report, GridReport, DEFAULT_REPORT_SPREAD_PIPS};
pub use safety_gate::{GateState, KillSwitch, SafetyGate, SafetyIssue, SafetyReport};
pub use grid_bot::{BotStatistics, CycleOutcome, GridBot, GridPlacement, GridSnapshot};
