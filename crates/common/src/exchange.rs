use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{Fill, LimitOrder, OrderAck, OrderSide, PriceBar, Result, StopMarketOrder};

/// Source of historical candles.
///
/// Transport failures surface as `Error::DataUnavailable`; the orchestrator
/// skips the instrument for the cycle.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Most recent `limit` closed bars, oldest first.
    async fn bars(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<PriceBar>>;
}

/// Read-only view of open positions at the venue.
#[async_trait]
pub trait ExposureQuery: Send + Sync {
    /// True when any non-zero position exists for `symbol`.
    async fn has_open_position(&self, symbol: &str) -> Result<bool>;
}

/// Order placement at the venue.
///
/// `BinanceFutures` implements this for live trading and `PaperVenue` for
/// simulation. Only `BracketExecutor` calls these methods. Every call fails
/// with `Error::OrderRejected` carrying the venue's reason text.
#[async_trait]
pub trait OrderExecutionSink: Send + Sync {
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<Fill>;

    async fn submit_stop_market_order(&self, order: &StopMarketOrder) -> Result<OrderAck>;

    async fn submit_limit_order(&self, order: &LimitOrder) -> Result<OrderAck>;

    /// Set the leverage used for new positions in `symbol`.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;
}
