use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Error, ExposureQuery, Fill, LimitOrder, MarketDataSource, OrderAck, OrderExecutionSink,
    OrderSide, PriceBar, Result, StopMarketOrder,
};

/// A simulated open position with its resting protective legs.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperPosition {
    pub id: String,
    pub symbol: String,
    /// Side of the entry order: `Buy` is long, `Sell` is short.
    pub side: OrderSide,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub opened_at: DateTime<Utc>,
    pub stop: Option<Decimal>,
    pub target: Option<Decimal>,
}

impl PaperPosition {
    /// Price at which the bar closes this position, stop checked first.
    fn exit_on(&self, bar: &PriceBar) -> Option<(Decimal, &'static str)> {
        let high = Decimal::try_from(bar.high).ok()?;
        let low = Decimal::try_from(bar.low).ok()?;
        let long = self.side == OrderSide::Buy;

        if let Some(stop) = self.stop {
            let hit = if long { low <= stop } else { high >= stop };
            if hit {
                return Some((stop, "stop"));
            }
        }
        if let Some(target) = self.target {
            let hit = if long { high >= target } else { low <= target };
            if hit {
                return Some((target, "target"));
            }
        }
        None
    }

    fn pnl(&self, exit: Decimal) -> Decimal {
        let per_unit = match self.side {
            OrderSide::Buy => exit - self.entry_price,
            OrderSide::Sell => self.entry_price - exit,
        };
        per_unit * self.quantity
    }
}

/// Simulated futures venue for paper trading.
///
/// Candles come from a real feed. Market orders fill at the latest close with
/// slippage; stop and target legs rest on the position and close it when a
/// later candle trades through them. Nothing is ever sent to the exchange.
pub struct PaperVenue {
    feed: Arc<dyn MarketDataSource>,
    /// Slippage as a fraction of price (bps / 10 000).
    slippage: Decimal,
    /// Latest close per symbol, updated on every bar fetch.
    prices: Arc<RwLock<HashMap<String, Decimal>>>,
    positions: Arc<RwLock<HashMap<String, PaperPosition>>>,
    leverage: Arc<RwLock<HashMap<String, u32>>>,
}

impl PaperVenue {
    pub fn new(feed: Arc<dyn MarketDataSource>, slippage_bps: f64) -> Result<Self> {
        let bps = Decimal::try_from(slippage_bps)
            .map_err(|e| Error::Config(format!("PAPER_SLIPPAGE_BPS '{slippage_bps}': {e}")))?;
        info!(slippage_bps, "PaperVenue initialized");
        Ok(Self {
            feed,
            slippage: bps / Decimal::from(10_000),
            prices: Arc::new(RwLock::new(HashMap::new())),
            positions: Arc::new(RwLock::new(HashMap::new())),
            leverage: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Snapshot of open simulated positions.
    pub async fn positions(&self) -> Vec<PaperPosition> {
        self.positions.read().await.values().cloned().collect()
    }

    pub async fn leverage(&self, symbol: &str) -> Option<u32> {
        self.leverage.read().await.get(symbol).copied()
    }

    async fn settle(&self, symbol: &str, bars: &[PriceBar]) {
        let mut positions = self.positions.write().await;
        let Some(position) = positions.get(symbol) else {
            return;
        };

        let exit = bars
            .iter()
            .filter(|b| b.open_time >= position.opened_at)
            .find_map(|b| position.exit_on(b));
        if let Some((price, leg)) = exit {
            info!(
                symbol = %symbol,
                leg,
                exit = %price,
                pnl = %position.pnl(price),
                "Paper position closed"
            );
            positions.remove(symbol);
        }
    }

    fn rejected(reason: String) -> Error {
        Error::OrderRejected { reason }
    }
}

#[async_trait]
impl MarketDataSource for PaperVenue {
    async fn bars(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<PriceBar>> {
        let bars = self.feed.bars(symbol, interval, limit).await?;
        if let Some(last) = bars.last() {
            if let Ok(close) = Decimal::try_from(last.close) {
                self.prices.write().await.insert(symbol.to_string(), close);
            }
        }
        self.settle(symbol, &bars).await;
        Ok(bars)
    }
}

#[async_trait]
impl ExposureQuery for PaperVenue {
    async fn has_open_position(&self, symbol: &str) -> Result<bool> {
        Ok(self.positions.read().await.contains_key(symbol))
    }
}

#[async_trait]
impl OrderExecutionSink for PaperVenue {
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<Fill> {
        let mid = self
            .prices
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| Self::rejected(format!("no price for {symbol}, fetch bars first")))?;

        // Buys pay more, sells receive less
        let price = match side {
            OrderSide::Buy => mid * (Decimal::ONE + self.slippage),
            OrderSide::Sell => mid * (Decimal::ONE - self.slippage),
        }
        .round_dp(8);

        let mut positions = self.positions.write().await;
        let id = uuid::Uuid::new_v4().to_string();
        match positions.get(symbol) {
            Some(open) if open.side == side => {
                return Err(Self::rejected(format!(
                    "{symbol} already has an open paper position"
                )));
            }
            Some(open) => {
                info!(symbol = %symbol, pnl = %open.pnl(price), "Paper position closed by market order");
                positions.remove(symbol);
            }
            None => {
                positions.insert(
                    symbol.to_string(),
                    PaperPosition {
                        id: id.clone(),
                        symbol: symbol.to_string(),
                        side,
                        entry_price: price,
                        quantity,
                        opened_at: Utc::now(),
                        stop: None,
                        target: None,
                    },
                );
            }
        }

        debug!(symbol = %symbol, side = %side, mid = %mid, fill = %price, qty = %quantity, "Paper fill simulated");
        Ok(Fill {
            order_id: id,
            symbol: symbol.to_string(),
            side,
            price: Some(price),
            quantity,
            timestamp: Utc::now(),
        })
    }

    async fn submit_stop_market_order(&self, order: &StopMarketOrder) -> Result<OrderAck> {
        let last = self.prices.read().await.get(&order.symbol).copied();
        let mut positions = self.positions.write().await;
        let position = positions
            .get_mut(&order.symbol)
            .filter(|p| p.side == order.side.opposite())
            .ok_or_else(|| Self::rejected(format!("no {} position to protect", order.symbol)))?;

        let triggers_now = match (last, position.side) {
            (Some(last), OrderSide::Buy) => order.stop_price >= last,
            (Some(last), OrderSide::Sell) => order.stop_price <= last,
            (None, _) => false,
        };
        if triggers_now {
            return Err(Self::rejected(format!(
                "stop {} would immediately trigger",
                order.stop_price
            )));
        }

        position.stop = Some(order.stop_price);
        debug!(symbol = %order.symbol, stop = %order.stop_price, "Paper stop resting");
        Ok(OrderAck {
            order_id: uuid::Uuid::new_v4().to_string(),
            symbol: order.symbol.clone(),
        })
    }

    async fn submit_limit_order(&self, order: &LimitOrder) -> Result<OrderAck> {
        let mut positions = self.positions.write().await;
        let position = positions
            .get_mut(&order.symbol)
            .filter(|p| p.side == order.side.opposite())
            .ok_or_else(|| {
                Self::rejected(format!("reduce-only target with no {} position", order.symbol))
            })?;

        position.target = Some(order.price);
        debug!(symbol = %order.symbol, target = %order.price, "Paper target resting");
        Ok(OrderAck {
            order_id: uuid::Uuid::new_v4().to_string(),
            symbol: order.symbol.clone(),
        })
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        self.leverage
            .write()
            .await
            .insert(symbol.to_string(), leverage);
        Ok(())
    }
}
