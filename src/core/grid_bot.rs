// Grid bot orchestration
//
// Wires the grid engine, the safety gate and a broker gateway together:
// startup checks, initial order placement and the polling loop. Within one
// iteration the emergency-stop check always runs before anything else.

use crate::config::{BotConfig, GridConfig};
use crate::core::grid_levels::calculate_grid_levels;
use crate::core::safety_gate::{GateState, KillSwitch, SafetyGate, DEFAULT_MAX_MARGIN_PERCENT};
use crate::core::types::{limits, round_to, OrderRequest, Side};
use crate::error::{TradingError, TradingResult};
use crate::gateway::OrderGateway;
use crate::validation::{PreFlightValidator, ValidationResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fraction of the range either side of centre before a rebalance is suggested
pub const REBALANCE_THRESHOLD: f64 = 0.35;
/// Iterations between full status logs
pub const STATUS_LOG_INTERVAL: u64 = 60;

const ORDER_PRICE_PRECISION: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    Halted(String),
}

/// Counts from one grid initialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GridPlacement {
    pub cancelled: usize,
    pub buy_orders: usize,
    pub sell_orders: usize,
    pub rejected: usize,
}

impl GridPlacement {
    pub fn total_placed(&self) -> usize {
        self.buy_orders + self.sell_orders
    }
}

/// Market and book state seen by one monitoring pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSnapshot {
    pub price: f64,
    pub spread_pips: f64,
    pub grid_levels: usize,
    pub pending_orders: usize,
    pub open_positions: usize,
    pub needs_rebalance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotStatistics {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
    pub equity: f64,
    pub unrealized_pl: f64,
    pub open_positions: usize,
    pub pending_orders: usize,
    pub iterations: u64,
    pub orders_placed: u64,
}

pub struct GridBot<G: OrderGateway> {
    grid: GridConfig,
    gate: SafetyGate,
    gateway: G,
    check_interval: Duration,
    iterations: u64,
    orders_placed: u64,
}

impl<G: OrderGateway> GridBot<G> {
    pub fn new(config: &BotConfig, gateway: G) -> TradingResult<Self> {
        let grid = config.grid_config()?;
        let gate = SafetyGate::new(config.safety_limits()?);

        info!("🤖 Grid bot initialized for {}", grid.instrument());
        info!(
            "   Range: {:.5} - {:.5}, {} grids, {} units per trade",
            grid.lower_level(),
            grid.upper_level(),
            grid.num_grids(),
            grid.units_per_trade()
        );

        Ok(Self {
            grid,
            gate,
            gateway,
            check_interval: Duration::from_secs(config.monitoring.check_interval_seconds),
            iterations: 0,
            orders_placed: 0,
        })
    }

    /// Override the polling interval taken from the config
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    pub fn gate(&self) -> &SafetyGate {
        &self.gate
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Handle for halting the bot from another task
    pub fn kill_switch(&self) -> KillSwitch {
        self.gate.kill_switch()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn startup_checks(&self) -> ValidationResult {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("🚦 RUNNING STARTUP CHECKS");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let result = PreFlightValidator::new(&self.gateway, &self.grid, &self.gate).validate_startup();
        result.display();
        result
    }

    /// Cancel pending orders and quote a fresh grid around the current price
    pub fn initialize_grid(&mut self) -> TradingResult<GridPlacement> {
        if let GateState::Halted(reason) = self.gate.state() {
            return Err(TradingError::OrderRejected(format!("Trading halted: {}", reason)));
        }

        let quote = self.gateway.current_price(self.grid.instrument())?;
        let levels = calculate_grid_levels(&self.grid, Some(quote.mid))?;

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("🏗️  INITIALIZING GRID ORDERS @ {:.5}", quote.mid);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let mut placement = GridPlacement {
            cancelled: self.gateway.cancel_all_orders()?,
            ..GridPlacement::default()
        };

        let account = self.gateway.account_snapshot()?;
        let positions = self.gateway.open_positions()?;

        info!("Placing {} BUY orders...", levels.buy_levels().len());
        info!("Placing {} SELL orders...", levels.sell_levels().len());
        let orders = levels
            .buy_levels()
            .iter()
            .map(|&price| (Side::Buy, price))
            .chain(levels.sell_levels().iter().map(|&price| (Side::Sell, price)));

        for (side, price) in orders {
            let validation = self.gate.validate_order_placement(
                &account,
                &positions,
                self.grid.units_per_trade(),
                price,
                DEFAULT_MAX_MARGIN_PERCENT,
            )?;
            if !validation.valid {
                warn!("⚠️  {} @ {:.5} blocked: {}", side, price, validation.message);
                placement.rejected += 1;
                continue;
            }

            let request = self.order_request(side, price);
            let result = self.gateway.place_limit_order(&request)?;
            if !result.accepted {
                warn!("⚠️  {} @ {:.5} rejected: {}", side, price, result.message);
                placement.rejected += 1;
                continue;
            }

            match side {
                Side::Buy => placement.buy_orders += 1,
                Side::Sell => placement.sell_orders += 1,
            }
            self.orders_placed += 1;
        }

        info!(
            "✅ Grid initialization complete: {} orders placed ({} buy, {} sell), {} rejected",
            placement.total_placed(),
            placement.buy_orders,
            placement.sell_orders,
            placement.rejected
        );
        Ok(placement)
    }

    /// Limit order for one level with protective levels from the safety limits
    fn order_request(&self, side: Side, price: f64) -> OrderRequest {
        let safety = self.gate.limits();
        let sl = safety.stop_loss_distance_pips() / limits::PIPS_PER_UNIT;
        let tp = safety.take_profit_distance_pips() / limits::PIPS_PER_UNIT;

        let (stop_loss, take_profit) = match side {
            Side::Buy => (price - sl, price + tp),
            Side::Sell => (price + sl, price - tp),
        };
        let protective = |level: f64, distance: f64| {
            (distance > 0.0).then(|| round_to(level, ORDER_PRICE_PRECISION))
        };

        OrderRequest {
            instrument: self.grid.instrument().to_string(),
            units: self.grid.units_per_trade(),
            price,
            side,
            stop_loss: protective(stop_loss, sl),
            take_profit: protective(take_profit, tp),
        }
    }

    /// Inspect price and book; flags a rebalance when price nears the range edge
    pub fn monitor_grid(&self) -> TradingResult<GridSnapshot> {
        let quote = self.gateway.current_price(self.grid.instrument())?;
        let pending = self.gateway.pending_orders()?;
        let positions = self.gateway.open_positions()?;
        let levels = calculate_grid_levels(&self.grid, Some(quote.mid))?;

        debug!(
            "Price: {:.5} | Pending: {} | Positions: {}",
            quote.mid,
            pending.len(),
            positions.len()
        );

        let range = self.grid.upper_level() - self.grid.lower_level();
        let needs_rebalance = (quote.mid - self.grid.center()).abs() > range * REBALANCE_THRESHOLD;
        if needs_rebalance {
            info!("🔄 Price {:.5} moved to edge of range, consider rebalancing", quote.mid);
        }

        Ok(GridSnapshot {
            price: quote.mid,
            spread_pips: quote.spread_pips,
            grid_levels: levels.total_levels(),
            pending_orders: pending.len(),
            open_positions: positions.len(),
            needs_rebalance,
        })
    }

    /// One loop iteration: emergency-stop check, then monitoring.
    ///
    /// A failed health or loss check halts this cycle only. Just the kill
    /// switch makes a halt persist.
    pub fn run_cycle(&self) -> TradingResult<CycleOutcome> {
        if let GateState::Halted(reason) = self.gate.state() {
            return Ok(CycleOutcome::Halted(reason));
        }

        let account = self.gateway.account_snapshot()?;
        let positions = self.gateway.open_positions()?;
        let stop = self.gate.should_emergency_stop(&account, &positions)?;
        if stop.stop {
            return Ok(CycleOutcome::Halted(stop.reason));
        }

        if let Err(e) = self.monitor_grid() {
            error!("❌ Monitoring error: {}", e);
        }

        Ok(CycleOutcome::Continue)
    }

    pub async fn run(&mut self, duration: Option<Duration>) -> TradingResult<BotStatistics> {
        self.run_with(duration, |_| {}).await
    }

    /// Polling loop with a hook invoked on the gateway before every cycle
    pub async fn run_with<F>(&mut self, duration: Option<Duration>, mut before_cycle: F) -> TradingResult<BotStatistics>
    where
        F: FnMut(&mut G),
    {
        let start_time = Instant::now();

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("🚀 GRID TRADING BOT STARTED");
        info!("Instrument: {}", self.grid.instrument());
        info!("Check interval: {:?}", self.check_interval);
        if let Some(duration) = duration {
            info!("Duration: {:?}", duration);
        }
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        loop {
            if let Some(duration) = duration {
                if start_time.elapsed() >= duration {
                    info!("⏰ Duration limit reached ({:?})", duration);
                    break;
                }
            }

            self.iterations += 1;
            before_cycle(&mut self.gateway);

            match self.run_cycle() {
                Ok(CycleOutcome::Continue) => {}
                Ok(CycleOutcome::Halted(reason)) => {
                    error!("🛑 Emergency stop triggered: {}", reason);
                    break;
                }
                Err(e) if e.is_retryable() => {
                    warn!("⚠️  Cycle {} failed, retrying next cycle: {}", self.iterations, e);
                }
                Err(e) => {
                    error!("❌ Fatal error in trading loop: {}", e);
                    self.log_status();
                    return Err(e);
                }
            }

            if self.iterations % STATUS_LOG_INTERVAL == 0 {
                self.log_status();
            }

            sleep(self.check_interval).await;
        }

        self.log_status();
        info!("🛑 Grid trading bot stopped after {} iterations", self.iterations);
        Ok(self.final_statistics())
    }

    /// Statistics for a finished loop; the counters survive a failed account read
    fn final_statistics(&self) -> BotStatistics {
        self.statistics().unwrap_or_else(|e| {
            warn!("⚠️  Could not read final account state: {}", e);
            BotStatistics {
                timestamp: Utc::now(),
                balance: 0.0,
                equity: 0.0,
                unrealized_pl: 0.0,
                open_positions: 0,
                pending_orders: 0,
                iterations: self.iterations,
                orders_placed: self.orders_placed,
            }
        })
    }

    pub fn log_status(&self) {
        let status = self.gateway.account_snapshot().and_then(|account| {
            let positions = self.gateway.open_positions()?;
            self.gate.log_safety_status(&account, &positions)?;
            let pending = self.gateway.pending_orders()?;

            info!("Pending Orders: {}", pending.len());
            info!("Open Positions: {}", positions.len());
            for position in &positions {
                info!(
                    "  {}: {} L / {} S",
                    position.instrument, position.long_units, position.short_units
                );
            }
            Ok(())
        });

        if let Err(e) = status {
            warn!("⚠️  Could not log bot status: {}", e);
        }
    }

    pub fn statistics(&self) -> TradingResult<BotStatistics> {
        let account = self.gateway.account_snapshot()?;
        let positions = self.gateway.open_positions()?;
        let pending = self.gateway.pending_orders()?;

        Ok(BotStatistics {
            timestamp: Utc::now(),
            balance: account.balance,
            equity: account.equity,
            unrealized_pl: account.unrealized_pl,
            open_positions: positions.len(),
            pending_orders: pending.len(),
            iterations: self.iterations,
            orders_placed: self.orders_placed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AccountSnapshot;
    use crate::gateway::PaperGateway;

    fn bot() -> GridBot<PaperGateway> {
        let gateway = PaperGateway::new("EUR_USD", 10_000.0, 1.08, 1.0);
        GridBot::new(&BotConfig::default(), gateway).unwrap()
    }

    #[test]
    fn test_initialize_grid_places_every_level() {
        let mut bot = bot();
        let placement = bot.initialize_grid().unwrap();

        assert_eq!(placement.buy_orders, 5);
        assert_eq!(placement.sell_orders, 5);
        assert_eq!(placement.rejected, 0);
        assert_eq!(bot.gateway().pending_orders().unwrap().len(), 10);
    }

    #[test]
    fn test_protective_levels_mirror_by_side() {
        let bot = bot();
        // Default limits: 50 pip stop, 10 pip target
        let buy = bot.order_request(Side::Buy, 1.0800);
        assert_eq!(buy.stop_loss, Some(1.075));
        assert_eq!(buy.take_profit, Some(1.081));

        let sell = bot.order_request(Side::Sell, 1.0800);
        assert_eq!(sell.stop_loss, Some(1.085));
        assert_eq!(sell.take_profit, Some(1.079));
    }

    #[test]
    fn test_reinitialize_cancels_previous_orders() {
        let mut bot = bot();
        bot.initialize_grid().unwrap();
        let placement = bot.initialize_grid().unwrap();
        assert_eq!(placement.cancelled, 10);
        assert_eq!(bot.gateway().pending_orders().unwrap().len(), 10);
    }

    #[test]
    fn test_rebalance_hint_near_range_edge() {
        let mut bot = bot();
        assert!(!bot.monitor_grid().unwrap().needs_rebalance);

        // Centre 1.08, range 0.02: beyond 0.007 from centre
        bot.gateway_mut().set_price(1.0875);
        assert!(bot.monitor_grid().unwrap().needs_rebalance);
    }

    #[test]
    fn test_loss_halt_clears_with_the_loss() {
        let mut bot = bot();
        assert_eq!(bot.run_cycle().unwrap(), CycleOutcome::Continue);

        bot.gateway_mut().set_account(AccountSnapshot {
            balance: 10_000.0,
            equity: 9_900.0,
            margin_available: 9_000.0,
            margin_used: 100.0,
            unrealized_pl: -100.0,
            open_position_count: 0,
        });
        let outcome = bot.run_cycle().unwrap();
        assert!(matches!(outcome, CycleOutcome::Halted(ref r) if r.starts_with("Loss control")));
        assert!(!bot.gate().is_halted());

        bot.gateway_mut().set_account(AccountSnapshot {
            balance: 10_000.0,
            equity: 10_000.0,
            margin_available: 9_000.0,
            margin_used: 100.0,
            unrealized_pl: 0.0,
            open_position_count: 0,
        });
        assert_eq!(bot.run_cycle().unwrap(), CycleOutcome::Continue);
        assert_eq!(bot.initialize_grid().unwrap().total_placed(), 10);
    }

    #[test]
    fn test_kill_switch_halt_is_sticky() {
        let mut bot = bot();
        bot.kill_switch().activate("operator stop");

        assert_eq!(
            bot.run_cycle().unwrap(),
            CycleOutcome::Halted("operator stop".to_string())
        );
        assert!(matches!(bot.initialize_grid(), Err(TradingError::OrderRejected(_))));
    }
}
