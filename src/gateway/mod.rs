// Broker gateway boundary
//
// The bot talks to the broker only through this trait. Transport, auth and
// retry policy belong to the implementation; the core treats every call as
// synchronous.

pub mod paper;

use crate::core::types::{AccountSnapshot, Order, OrderRequest, OrderResult, Position, PriceQuote};
use crate::error::TradingResult;
use tracing::{info, warn};

pub use paper::PaperGateway;

pub trait OrderGateway {
    fn account_snapshot(&self) -> TradingResult<AccountSnapshot>;

    fn open_positions(&self) -> TradingResult<Vec<Position>>;

    fn current_price(&self, instrument: &str) -> TradingResult<PriceQuote>;

    fn place_limit_order(&mut self, request: &OrderRequest) -> TradingResult<OrderResult>;

    fn cancel_order(&mut self, order_id: &str) -> TradingResult<bool>;

    fn pending_orders(&self) -> TradingResult<Vec<Order>>;

    /// Cancel every pending order, returning how many were cancelled
    fn cancel_all_orders(&mut self) -> TradingResult<usize> {
        let pending = self.pending_orders()?;
        let mut cancelled = 0;

        for order in &pending {
            if self.cancel_order(&order.id)? {
                cancelled += 1;
            } else {
                warn!("⚠️  Could not cancel order {}", order.id);
            }
        }

        info!("🧹 Cancelled {}/{} pending orders", cancelled, pending.len());
        Ok(cancelled)
    }

    /// Cheap reachability check used by the pre-flight checks
    fn test_connection(&self) -> bool {
        self.account_snapshot().is_ok()
    }
}
