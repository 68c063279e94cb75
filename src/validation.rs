//! Pre-flight validation for the grid bot
//!
//! Runs the startup sequence (connection, account health, price, market
//! conditions, grid report) against a gateway before any order is placed,
//! and sanity-checks a grid configuration on its own.

use crate::config::{GridConfig, SafetyLimits};
use crate::core::report::generate_grid_report;
use crate::core::safety_gate::{SafetyGate, DEFAULT_MAX_SPREAD_PIPS};
use crate::core::types::PriceQuote;
use crate::gateway::OrderGateway;
use tracing::{error, info, warn};

/// Validation result with detailed findings
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks: Vec<ValidationCheck>,
}

#[derive(Debug, Clone)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub level: ValidationLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Critical,  // Must pass for the bot to start
    Warning,   // Should pass, but trading can continue
    Info,      // Informational only
}

impl ValidationCheck {
    fn new(name: &str, passed: bool, message: impl Into<String>, level: ValidationLevel) -> Self {
        ValidationCheck {
            name: name.to_string(),
            passed,
            message: message.into(),
            level,
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        ValidationResult {
            passed: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, check: ValidationCheck) {
        if !check.passed && check.level == ValidationLevel::Critical {
            self.passed = false;
        }
        self.checks.push(check);
    }

    pub fn critical_failures(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.level == ValidationLevel::Critical)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.level == ValidationLevel::Warning)
            .collect()
    }

    pub fn display(&self) {
        info!("🔍 Pre-flight Validation");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        for check in &self.checks {
            let icon = if check.passed {
                "✅"
            } else {
                match check.level {
                    ValidationLevel::Critical => "❌",
                    ValidationLevel::Warning => "⚠️",
                    ValidationLevel::Info => "ℹ️",
                }
            };

            info!("{} {} - {}", icon, check.name, check.message);
        }

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if !self.passed {
            let failures = self.critical_failures();
            error!("❌ Validation failed: {} critical issue(s)", failures.len());
            for failure in failures {
                error!("   • {}: {}", failure.name, failure.message);
            }
        } else {
            let warnings = self.warnings();
            if !warnings.is_empty() {
                warn!("⚠️  {} warning(s) detected", warnings.len());
                for warning in warnings {
                    warn!("   • {}: {}", warning.name, warning.message);
                }
            }
            info!("✅ All critical checks passed");
        }
    }
}

/// Startup validator bound to one gateway, grid and safety gate
pub struct PreFlightValidator<'a, G: OrderGateway> {
    gateway: &'a G,
    grid: &'a GridConfig,
    gate: &'a SafetyGate,
}

impl<'a, G: OrderGateway> PreFlightValidator<'a, G> {
    pub fn new(gateway: &'a G, grid: &'a GridConfig, gate: &'a SafetyGate) -> Self {
        PreFlightValidator { gateway, grid, gate }
    }

    /// Run the startup sequence.
    ///
    /// Stops at the first critical failure; later steps depend on the
    /// earlier ones succeeding.
    pub fn validate_startup(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        info!("[1/5] Testing gateway connection...");
        result.add_check(self.check_connection());
        if !result.passed {
            return result;
        }

        info!("[2/5] Checking account health...");
        result.add_check(self.check_account());
        if !result.passed {
            return result;
        }

        info!("[3/5] Fetching {} price...", self.grid.instrument());
        let quote = match self.gateway.current_price(self.grid.instrument()) {
            Ok(quote) => {
                result.add_check(ValidationCheck::new(
                    "Price",
                    true,
                    format!("{:.5} (spread {:.2} pips)", quote.mid, quote.spread_pips),
                    ValidationLevel::Critical,
                ));
                quote
            }
            Err(e) => {
                result.add_check(ValidationCheck::new(
                    "Price",
                    false,
                    format!("Failed to fetch price: {}", e),
                    ValidationLevel::Critical,
                ));
                return result;
            }
        };

        info!("[4/5] Checking market conditions...");
        result.add_check(self.check_market(&quote));

        info!("[5/5] Verifying grid configuration...");
        result.add_check(self.check_report(&quote));

        result
    }

    /// Static checks on the grid and safety limits, no gateway calls
    pub fn validate_grid(grid: &GridConfig, limits: &SafetyLimits) -> ValidationResult {
        let mut result = ValidationResult::new();

        if grid.num_grids() > 100 {
            result.add_check(ValidationCheck::new(
                "Grid Levels",
                false,
                format!("{} grids exceeds recommended maximum (100)", grid.num_grids()),
                ValidationLevel::Warning,
            ));
        } else {
            result.add_check(ValidationCheck::new(
                "Grid Levels",
                true,
                format!("{} levels configured", grid.num_grids()),
                ValidationLevel::Info,
            ));
        }

        if grid.range_pips() < 10.0 {
            result.add_check(ValidationCheck::new(
                "Price Range",
                false,
                format!("Range of {:.1} pips is very small", grid.range_pips()),
                ValidationLevel::Warning,
            ));
        } else {
            result.add_check(ValidationCheck::new(
                "Price Range",
                true,
                format!(
                    "{:.5} - {:.5} ({:.1} pips)",
                    grid.lower_level(),
                    grid.upper_level(),
                    grid.range_pips()
                ),
                ValidationLevel::Info,
            ));
        }

        if grid.actual_grid_spacing() < 1.0 {
            result.add_check(ValidationCheck::new(
                "Grid Spacing",
                false,
                format!("{:.3} pips between levels is very small", grid.actual_grid_spacing()),
                ValidationLevel::Warning,
            ));
        } else {
            result.add_check(ValidationCheck::new(
                "Grid Spacing",
                true,
                format!("{:.2} pips", grid.actual_grid_spacing()),
                ValidationLevel::Info,
            ));
        }

        if limits.take_profit_distance_pips() > grid.range_pips() {
            result.add_check(ValidationCheck::new(
                "Take Profit",
                false,
                format!(
                    "{:.1} pips is wider than the grid range",
                    limits.take_profit_distance_pips()
                ),
                ValidationLevel::Warning,
            ));
        }

        result
    }

    fn check_connection(&self) -> ValidationCheck {
        let connected = self.gateway.test_connection();
        ValidationCheck::new(
            "Gateway",
            connected,
            if connected { "Connected" } else { "Failed to connect" },
            ValidationLevel::Critical,
        )
    }

    fn check_account(&self) -> ValidationCheck {
        let health = self
            .gateway
            .account_snapshot()
            .and_then(|account| self.gate.check_account_health(&account));

        match health {
            Ok(health) => ValidationCheck::new("Account Health", health.healthy, health.reason, ValidationLevel::Critical),
            Err(e) => ValidationCheck::new(
                "Account Health",
                false,
                format!("Account health check failed: {}", e),
                ValidationLevel::Critical,
            ),
        }
    }

    fn check_market(&self, quote: &PriceQuote) -> ValidationCheck {
        let market = self.gate.check_market_conditions(quote.spread_pips, DEFAULT_MAX_SPREAD_PIPS);
        ValidationCheck::new("Market Conditions", market.suitable, market.reason, ValidationLevel::Warning)
    }

    fn check_report(&self, quote: &PriceQuote) -> ValidationCheck {
        match generate_grid_report(self.grid, quote.mid, quote.spread_pips) {
            Ok(report) => {
                for line in report.to_string().lines() {
                    info!("{}", line);
                }
                ValidationCheck::new(
                    "Grid Report",
                    true,
                    format!(
                        "{} levels, net ${:.2}/cycle",
                        report.grid.unique_levels, report.profitability.net_profit_per_cycle
                    ),
                    ValidationLevel::Info,
                )
            }
            // A grid that cannot be reported cannot be placed either
            Err(e) => ValidationCheck::new(
                "Grid Report",
                false,
                format!("Grid report failed: {}", e),
                ValidationLevel::Critical,
            ),
        }
    }
}
