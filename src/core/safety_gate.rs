// Account safety checks and the sticky kill switch
//
// Every check is a pure computation over the account data handed in by the
// caller; the gate never caches broker data between calls. The only state is
// the kill switch, which is shared behind a lock so that a signal handler or
// operator task can halt trading while the polling loop keeps reading it.

use crate::config::SafetyLimits;
use crate::core::types::{limits, AccountSnapshot, Position};
use crate::error::{TradingError, TradingResult};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// Margin requirement assumed when sizing orders (50:1 leverage)
pub const ASSUMED_LEVERAGE: f64 = 50.0;
pub const DEFAULT_MAX_MARGIN_PERCENT: f64 = 50.0;
pub const DEFAULT_MAX_SPREAD_PIPS: f64 = 2.0;
/// Margin level (equity / used margin) below which the account is unhealthy
pub const MIN_MARGIN_LEVEL_PERCENT: f64 = 100.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KillSwitchState {
    pub halted: bool,
    pub reason: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
}

/// Shared handle to the kill switch of one gate
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    state: Arc<RwLock<KillSwitchState>>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, KillSwitchState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, KillSwitchState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Halt trading. A later activation replaces the reason but keeps the
    /// first activation time.
    pub fn activate(&self, reason: &str) {
        let mut state = self.write();
        state.halted = true;
        state.reason = Some(reason.to_string());
        if state.activated_at.is_none() {
            state.activated_at = Some(Utc::now());
        }
        error!("🛑 KILL SWITCH ACTIVATED: {}", reason);
    }

    pub fn is_halted(&self) -> bool {
        self.read().halted
    }

    pub fn reason(&self) -> Option<String> {
        self.read().reason.clone()
    }

    pub fn state(&self) -> KillSwitchState {
        self.read().clone()
    }

    fn reset(&self) -> bool {
        let mut state = self.write();
        let was_halted = state.halted;
        *state = KillSwitchState::default();
        was_halted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    Normal,
    Halted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub healthy: bool,
    pub reason: String,
    pub margin_level: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossCheck {
    pub within_limit: bool,
    pub loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionCheck {
    pub within_limit: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    AccountHealth,
    UnrealizedLoss,
    PositionLimit,
}

impl IssueKind {
    /// Health and loss problems stop the bot; too many positions only blocks new orders
    pub fn is_critical(&self) -> bool {
        matches!(self, IssueKind::AccountHealth | IssueKind::UnrealizedLoss)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl fmt::Display for SafetyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of running every safety check once
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyReport {
    pub all_safe: bool,
    pub issues: Vec<SafetyIssue>,
}

impl SafetyReport {
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|issue| issue.message.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmergencyStop {
    pub stop: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderValidation {
    pub valid: bool,
    pub message: String,
    pub estimated_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketCheck {
    pub suitable: bool,
    pub reason: String,
}

pub struct SafetyGate {
    limits: SafetyLimits,
    kill_switch: KillSwitch,
}

impl SafetyGate {
    pub fn new(limits: SafetyLimits) -> Self {
        Self {
            limits,
            kill_switch: KillSwitch::new(),
        }
    }

    pub fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    /// Handle for halting this gate from another task
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    pub fn state(&self) -> GateState {
        let state = self.kill_switch.state();
        if state.halted {
            GateState::Halted(state.reason.unwrap_or_default())
        } else {
            GateState::Normal
        }
    }

    pub fn is_halted(&self) -> bool {
        self.kill_switch.is_halted()
    }

    pub fn check_account_health(&self, account: &AccountSnapshot) -> TradingResult<HealthCheck> {
        account.ensure_finite()?;

        if account.balance <= 0.0 {
            return Ok(HealthCheck {
                healthy: false,
                reason: "Account balance is $0 or negative".to_string(),
                margin_level: None,
            });
        }

        if account.margin_available <= 0.0 {
            return Ok(HealthCheck {
                healthy: false,
                reason: "No margin available".to_string(),
                margin_level: None,
            });
        }

        let margin_level = if account.margin_used > 0.0 {
            account.equity / account.margin_used * 100.0
        } else {
            100.0
        };

        if margin_level < MIN_MARGIN_LEVEL_PERCENT {
            return Ok(HealthCheck {
                healthy: false,
                reason: format!("Margin level too low: {:.1}%", margin_level),
                margin_level: Some(margin_level),
            });
        }

        debug!(
            "Account health: balance=${:.2}, equity=${:.2}, margin level={:.1}%",
            account.balance, account.equity, margin_level
        );
        Ok(HealthCheck {
            healthy: true,
            reason: "Account healthy".to_string(),
            margin_level: Some(margin_level),
        })
    }

    pub fn check_unrealized_loss(&self, account: &AccountSnapshot) -> TradingResult<LossCheck> {
        account.ensure_finite()?;

        let loss = if account.unrealized_pl < 0.0 {
            account.unrealized_pl.abs()
        } else {
            0.0
        };
        let max_loss = self.limits.max_loss_usd();

        if loss > max_loss {
            warn!("⚠️  Unrealized loss (${:.2}) exceeds max (${:.2})", loss, max_loss);
            return Ok(LossCheck { within_limit: false, loss });
        }

        debug!("Unrealized loss: ${:.2} (max: ${:.2})", loss, max_loss);
        Ok(LossCheck { within_limit: true, loss })
    }

    /// Compare open positions against the limit. The broker's reported count
    /// is authoritative; the position list can only raise it.
    pub fn check_open_positions_count(&self, account: &AccountSnapshot, positions: &[Position]) -> PositionCheck {
        let listed = positions.iter().filter(|p| p.is_open()).count();
        let count = (account.open_position_count as usize).max(listed);
        let max_positions = self.limits.max_open_positions() as usize;

        if count > max_positions {
            warn!("⚠️  Open positions ({}) exceed max ({})", count, max_positions);
            return PositionCheck { within_limit: false, count };
        }

        debug!("Open positions: {}/{}", count, max_positions);
        PositionCheck { within_limit: true, count }
    }

    /// Run all checks and collect the failures in a fixed order: health, loss, positions
    pub fn check_all_safety_conditions(
        &self,
        account: &AccountSnapshot,
        positions: &[Position],
    ) -> TradingResult<SafetyReport> {
        let mut issues = Vec::new();

        let health = self.check_account_health(account)?;
        if !health.healthy {
            issues.push(SafetyIssue {
                kind: IssueKind::AccountHealth,
                message: format!("Account health: {}", health.reason),
            });
        }

        let loss = self.check_unrealized_loss(account)?;
        if !loss.within_limit {
            issues.push(SafetyIssue {
                kind: IssueKind::UnrealizedLoss,
                message: format!(
                    "Loss control: Unrealized loss ${:.2} exceeds ${:.2}",
                    loss.loss,
                    self.limits.max_loss_usd()
                ),
            });
        }

        let positions = self.check_open_positions_count(account, positions);
        if !positions.within_limit {
            issues.push(SafetyIssue {
                kind: IssueKind::PositionLimit,
                message: format!(
                    "Position limit: {} positions exceed {}",
                    positions.count,
                    self.limits.max_open_positions()
                ),
            });
        }

        let all_safe = issues.is_empty();
        if all_safe {
            debug!("✅ All safety checks passed");
        } else {
            warn!("❌ Safety check issues found: {}", issues.len());
            for issue in &issues {
                warn!("   • {}", issue);
            }
        }

        Ok(SafetyReport { all_safe, issues })
    }

    /// Decide whether the trading loop must stop now.
    ///
    /// An active kill switch short-circuits every check. Otherwise only
    /// account-health and loss failures stop trading.
    pub fn should_emergency_stop(
        &self,
        account: &AccountSnapshot,
        positions: &[Position],
    ) -> TradingResult<EmergencyStop> {
        let state = self.kill_switch.state();
        if state.halted {
            return Ok(EmergencyStop {
                stop: true,
                reason: state.reason.unwrap_or_default(),
            });
        }

        let report = self.check_all_safety_conditions(account, positions)?;
        match report.issues.iter().find(|issue| issue.kind.is_critical()) {
            Some(issue) => Ok(EmergencyStop {
                stop: true,
                reason: issue.message.clone(),
            }),
            None => Ok(EmergencyStop {
                stop: false,
                reason: String::new(),
            }),
        }
    }

    /// Halt all future trading for the lifetime of this gate
    pub fn manual_kill_switch(&self, reason: &str) {
        self.kill_switch.activate(reason);
    }

    /// Administrative reset of the kill switch. Never called by the bot itself.
    pub fn reset_kill_switch(&self, operator: &str) {
        if self.kill_switch.reset() {
            warn!("⚠️  Kill switch reset by {}", operator);
        }
    }

    /// Check whether an order of `units` at `price` may be placed
    pub fn validate_order_placement(
        &self,
        account: &AccountSnapshot,
        positions: &[Position],
        units: u64,
        price: f64,
        max_margin_percent: f64,
    ) -> TradingResult<OrderValidation> {
        if !limits::units_in_range(units) {
            return Err(TradingError::invalid_param("units", format!("out of range: {}", units)));
        }
        if !limits::price_in_range(price) {
            return Err(TradingError::invalid_param("price", format!("out of range: {}", price)));
        }
        if max_margin_percent.is_nan() || max_margin_percent <= 0.0 || max_margin_percent > 100.0 {
            return Err(TradingError::invalid_param(
                "max_margin_percent",
                format!("must be in (0, 100]: {}", max_margin_percent),
            ));
        }

        let kill = self.kill_switch.state();
        if kill.halted {
            return Ok(OrderValidation {
                valid: false,
                message: format!("Trading halted: {}", kill.reason.unwrap_or_default()),
                estimated_margin: None,
            });
        }

        let report = self.check_all_safety_conditions(account, positions)?;
        if let Some(issue) = report.issues.first() {
            return Ok(OrderValidation {
                valid: false,
                message: format!("Safety checks failed: {}", issue),
                estimated_margin: None,
            });
        }

        let estimated_margin = units as f64 * price / ASSUMED_LEVERAGE;
        let allowed = account.balance * max_margin_percent / 100.0;
        if estimated_margin > allowed {
            return Ok(OrderValidation {
                valid: false,
                message: format!(
                    "Order would use too much margin (${:.2} > {}% of balance)",
                    estimated_margin, max_margin_percent
                ),
                estimated_margin: Some(estimated_margin),
            });
        }

        Ok(OrderValidation {
            valid: true,
            message: "Order validation passed".to_string(),
            estimated_margin: Some(estimated_margin),
        })
    }

    pub fn check_market_conditions(&self, spread_pips: f64, max_spread: f64) -> MarketCheck {
        if spread_pips > max_spread {
            warn!("⚠️  Spread is {:.1} pips - wider than normal", spread_pips);
            return MarketCheck {
                suitable: false,
                reason: format!("Spread too wide: {:.1} pips", spread_pips),
            };
        }

        MarketCheck {
            suitable: true,
            reason: "Market conditions suitable".to_string(),
        }
    }

    /// Log a status block covering the account, every check and the kill switch
    pub fn log_safety_status(
        &self,
        account: &AccountSnapshot,
        positions: &[Position],
    ) -> TradingResult<SafetyReport> {
        info!("🛡️  Safety Status");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("Balance: ${:.2}", account.balance);
        info!("Equity: ${:.2}", account.equity);
        info!("Unrealized P&L: ${:.2}", account.unrealized_pl);
        info!("Margin Available: ${:.2}", account.margin_available);
        info!("Open Positions: {}", account.open_position_count);

        let report = self.check_all_safety_conditions(account, positions)?;
        if report.all_safe {
            info!("✅ All systems operational");
        } else {
            warn!("⚠️  Issues detected:");
            for issue in &report.issues {
                warn!("   {}", issue);
            }
        }

        if let GateState::Halted(reason) = self.state() {
            error!("🛑 TRADING HALTED: {}", reason);
        }
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SafetyGate {
        SafetyGate::new(SafetyLimits::new(50.0, 2, 50.0, 10.0).unwrap())
    }

    fn healthy_account() -> AccountSnapshot {
        AccountSnapshot {
            balance: 10_000.0,
            equity: 10_000.0,
            margin_available: 9_000.0,
            margin_used: 1_000.0,
            unrealized_pl: 0.0,
            open_position_count: 0,
        }
    }

    #[test]
    fn test_health_reasons() {
        let gate = gate();

        let mut account = healthy_account();
        account.balance = 0.0;
        assert_eq!(gate.check_account_health(&account).unwrap().reason, "Account balance is $0 or negative");

        let mut account = healthy_account();
        account.margin_available = 0.0;
        assert_eq!(gate.check_account_health(&account).unwrap().reason, "No margin available");

        let mut account = healthy_account();
        account.equity = 500.0;
        let check = gate.check_account_health(&account).unwrap();
        assert!(!check.healthy);
        assert!(check.reason.starts_with("Margin level too low"));
    }

    #[test]
    fn test_no_used_margin_counts_as_full_level() {
        let mut account = healthy_account();
        account.margin_used = 0.0;
        let check = gate().check_account_health(&account).unwrap();
        assert!(check.healthy);
        assert_eq!(check.margin_level, Some(100.0));
    }

    #[test]
    fn test_non_finite_account_is_computation_error() {
        let mut account = healthy_account();
        account.equity = f64::NAN;
        assert!(matches!(
            gate().check_account_health(&account),
            Err(TradingError::Computation(_))
        ));
    }

    #[test]
    fn test_loss_limit_is_inclusive() {
        let gate = gate();
        let mut account = healthy_account();
        account.unrealized_pl = -50.0;
        assert!(gate.check_unrealized_loss(&account).unwrap().within_limit);
        account.unrealized_pl = -50.01;
        assert!(!gate.check_unrealized_loss(&account).unwrap().within_limit);
        account.unrealized_pl = 500.0;
        assert_eq!(gate.check_unrealized_loss(&account).unwrap().loss, 0.0);
    }

    #[test]
    fn test_reported_position_count_alone_breaches_limit() {
        let gate = gate();
        let mut account = healthy_account();
        account.open_position_count = 10;

        let check = gate.check_open_positions_count(&account, &[]);
        assert!(!check.within_limit);
        assert_eq!(check.count, 10);

        let report = gate.check_all_safety_conditions(&account, &[]).unwrap();
        assert!(!report.all_safe);
        assert_eq!(report.issues[0].kind, IssueKind::PositionLimit);
        assert_eq!(report.issues[0].message, "Position limit: 10 positions exceed 2");
    }

    #[test]
    fn test_market_conditions() {
        let gate = gate();
        assert!(gate.check_market_conditions(2.0, DEFAULT_MAX_SPREAD_PIPS).suitable);
        let check = gate.check_market_conditions(2.5, DEFAULT_MAX_SPREAD_PIPS);
        assert!(!check.suitable);
        assert_eq!(check.reason, "Spread too wide: 2.5 pips");
    }

    #[test]
    fn test_kill_switch_takes_latest_reason() {
        let gate = gate();
        gate.manual_kill_switch("first");
        let activated_at = gate.kill_switch().state().activated_at;
        gate.manual_kill_switch("second");

        assert_eq!(gate.state(), GateState::Halted("second".to_string()));
        assert_eq!(gate.kill_switch().state().activated_at, activated_at);
        let stop = gate.should_emergency_stop(&healthy_account(), &[]).unwrap();
        assert_eq!(stop.reason, "second");
    }

    #[test]
    fn test_reset_returns_to_normal() {
        let gate = gate();
        gate.manual_kill_switch("maintenance");
        gate.reset_kill_switch("ops");
        assert_eq!(gate.state(), GateState::Normal);
    }
}
