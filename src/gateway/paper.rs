// In-memory paper trading gateway
//
// Holds an account, a position book, resting limit orders and a quote. Used by
// `grid-bot check`/`grid-bot run --paper` and by the tests to drive the bot
// without a broker. Limit orders fill when the quote crosses them.

use crate::core::types::{
    AccountSnapshot, Order, OrderRequest, OrderResult, Position, PriceQuote, Side,
};
use crate::error::{TradingError, TradingResult};
use crate::gateway::OrderGateway;
use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

pub struct PaperGateway {
    instrument: String,
    account: AccountSnapshot,
    quote: PriceQuote,
    spread_pips: f64,
    pending: Vec<Order>,
    positions: HashMap<String, Position>,
    connected: bool,
    /// Largest relative step of the random walk; 0 disables drift
    drift: f64,
}

impl PaperGateway {
    pub fn new(instrument: &str, balance: f64, mid_price: f64, spread_pips: f64) -> Self {
        Self {
            instrument: instrument.to_string(),
            account: AccountSnapshot {
                balance,
                equity: balance,
                margin_available: balance,
                margin_used: 0.0,
                unrealized_pl: 0.0,
                open_position_count: 0,
            },
            quote: quote_around(mid_price, spread_pips),
            spread_pips,
            pending: Vec::new(),
            positions: HashMap::new(),
            connected: true,
            drift: 0.0,
        }
    }

    /// Enable a random walk of at most `max_step` (relative) per `tick`
    pub fn with_drift(mut self, max_step: f64) -> TradingResult<Self> {
        if !max_step.is_finite() || max_step.abs() >= 1.0 {
            return Err(TradingError::invalid_param(
                "drift",
                format!("must be a finite step below 1.0: {}", max_step),
            ));
        }
        self.drift = max_step.abs();
        Ok(self)
    }

    pub fn set_account(&mut self, account: AccountSnapshot) {
        self.account = account;
    }

    pub fn set_positions(&mut self, positions: Vec<Position>) {
        self.positions = positions
            .into_iter()
            .map(|p| (p.instrument.clone(), p))
            .collect();
        self.account.open_position_count = self.positions.values().filter(|p| p.is_open()).count() as u32;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Move the market and fill any resting orders it crosses
    pub fn set_price(&mut self, mid_price: f64) {
        self.quote = quote_around(mid_price, self.spread_pips);
        self.fill_crossed_orders();
    }

    pub fn quote(&self) -> PriceQuote {
        self.quote
    }

    /// Advance the random walk by one step
    pub fn tick(&mut self) {
        if self.drift <= 0.0 {
            return;
        }
        let step = rand::thread_rng().gen_range(-self.drift..self.drift);
        let next = self.quote.mid * (1.0 + step);
        self.set_price(next);
    }

    fn ensure_connected(&self) -> TradingResult<()> {
        if !self.connected {
            return Err(TradingError::Gateway("paper gateway disconnected".to_string()));
        }
        Ok(())
    }

    fn fill_crossed_orders(&mut self) {
        let quote = self.quote;
        let (filled, resting): (Vec<Order>, Vec<Order>) = self.pending.drain(..).partition(|order| match order.side {
            Side::Buy => quote.ask <= order.price,
            Side::Sell => quote.bid >= order.price,
        });
        self.pending = resting;

        for order in filled {
            debug!("Paper fill: {} {} @ {:.5}", order.side, order.units, order.price);
            let position = self
                .positions
                .entry(order.instrument.clone())
                .or_insert_with(|| Position {
                    instrument: order.instrument.clone(),
                    long_units: 0,
                    short_units: 0,
                    unrealized_pl: 0.0,
                });
            let units = order.units as i64;
            match order.side {
                Side::Buy => position.long_units += units,
                Side::Sell => position.short_units -= units,
            }
        }

        self.account.open_position_count = self.positions.values().filter(|p| p.is_open()).count() as u32;
    }
}

fn quote_around(mid_price: f64, spread_pips: f64) -> PriceQuote {
    let half_spread = spread_pips / 10_000.0 / 2.0;
    PriceQuote::from_bid_ask(mid_price - half_spread, mid_price + half_spread)
}

impl OrderGateway for PaperGateway {
    fn account_snapshot(&self) -> TradingResult<AccountSnapshot> {
        self.ensure_connected()?;
        Ok(self.account.clone())
    }

    fn open_positions(&self) -> TradingResult<Vec<Position>> {
        self.ensure_connected()?;
        Ok(self.positions.values().filter(|p| p.is_open()).cloned().collect())
    }

    fn current_price(&self, instrument: &str) -> TradingResult<PriceQuote> {
        self.ensure_connected()?;
        if instrument != self.instrument {
            return Err(TradingError::Gateway(format!("no quote for {}", instrument)));
        }
        Ok(self.quote)
    }

    fn place_limit_order(&mut self, request: &OrderRequest) -> TradingResult<OrderResult> {
        self.ensure_connected()?;
        if request.instrument != self.instrument {
            return Ok(OrderResult {
                order_id: None,
                accepted: false,
                message: format!("unknown instrument {}", request.instrument),
            });
        }

        let id = Uuid::new_v4().to_string();
        self.pending.push(Order {
            id: id.clone(),
            instrument: request.instrument.clone(),
            units: request.units,
            price: request.price,
            side: request.side,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            created_at: Utc::now(),
        });
        info!("✅ {} limit order placed: {} units @ {:.5}", request.side, request.units, request.price);

        Ok(OrderResult {
            order_id: Some(id),
            accepted: true,
            message: "Order created".to_string(),
        })
    }

    fn cancel_order(&mut self, order_id: &str) -> TradingResult<bool> {
        self.ensure_connected()?;
        let before = self.pending.len();
        self.pending.retain(|order| order.id != order_id);
        Ok(self.pending.len() < before)
    }

    fn pending_orders(&self) -> TradingResult<Vec<Order>> {
        self.ensure_connected()?;
        Ok(self.pending.clone())
    }
}
