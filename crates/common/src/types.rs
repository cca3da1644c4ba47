use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One closed OHLCV candle from the market data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// High-low range of the candle.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Check that a series is usable: strictly increasing `open_time`,
    /// finite non-negative values and `low <= high`.
    pub fn validate_series(symbol: &str, bars: &[PriceBar]) -> Result<()> {
        let malformed = |reason: String| Error::MalformedData {
            symbol: symbol.to_string(),
            reason,
        };

        for (i, bar) in bars.iter().enumerate() {
            let values = [bar.open, bar.high, bar.low, bar.close, bar.volume];
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(malformed(format!("bar {i} has a non-finite or negative value")));
            }
            if bar.low > bar.high {
                return Err(malformed(format!(
                    "bar {i} has low {} above high {}",
                    bar.low, bar.high
                )));
            }
        }

        if let Some(i) = bars
            .windows(2)
            .position(|w| w[1].open_time <= w[0].open_time)
        {
            return Err(malformed(format!(
                "open times not strictly increasing at bar {}",
                i + 1
            )));
        }
        Ok(())
    }
}

/// Static venue constraints for one tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Venue symbol, e.g. "BTCUSDT". Unique across the instrument list.
    pub symbol: String,
    /// Decimal places allowed in an order quantity.
    pub quantity_precision: u32,
    /// Decimal places allowed in an order price.
    #[serde(default = "InstrumentSpec::default_price_precision")]
    pub price_precision: u32,
    /// Smallest accepted `quantity * price`.
    pub min_notional: Decimal,
}

impl InstrumentSpec {
    fn default_price_precision() -> u32 {
        2
    }

    /// Round a price to the instrument tick.
    pub fn round_price(&self, price: Decimal) -> Decimal {
        price.round_dp_with_strategy(self.price_precision, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Truncate a quantity toward zero to the instrument precision.
    pub fn truncate_quantity(&self, quantity: Decimal) -> Decimal {
        quantity.round_dp_with_strategy(self.quantity_precision, RoundingStrategy::ToZero)
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Side of the order that opens a position in this direction.
    pub fn entry_side(self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }

    /// Side of the orders that close a position in this direction.
    pub fn exit_side(self) -> OrderSide {
        self.entry_side().opposite()
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LONG" => Ok(Direction::Long),
            "SHORT" => Ok(Direction::Short),
            other => Err(Error::Other(format!("unknown direction '{other}'"))),
        }
    }
}

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Time-in-force for resting limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Gtc,
    Ioc,
    Fok,
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
        }
    }
}

/// Protective stop leg. Triggers a market order once `stop_price` trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopMarketOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub stop_price: Decimal,
    /// Ignored by the venue when `close_position` is set.
    pub quantity: Decimal,
    pub close_position: bool,
    pub reduce_only: bool,
}

/// Resting limit leg, used for the profit target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub time_in_force: TimeInForce,
    pub close_position: bool,
    pub reduce_only: bool,
}

/// Confirmation of a filled market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    /// Average fill price, when the venue reports one.
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement of an accepted resting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub symbol: String,
}

/// Whether orders go to the real venue or to the paper simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}
