#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{
    Error, ExposureQuery, Fill, InstrumentSpec, LedgerEntry, LimitOrder, MarketDataSource, OrderAck,
    OrderExecutionSink, OrderSide, PriceBar, Result, StopMarketOrder, TradeLedger,
};
use engine::{Collaborators, CycleOrchestrator};
use strategy::indicators::AverageKind;
use strategy::{CrossoverStrategy, StrategyConfig, StrategyParams};

// ─── Bars ─────────────────────────────────────────────────────────────────────

pub fn bar(i: usize, close: f64, high: f64, low: f64, volume: f64) -> PriceBar {
    PriceBar {
        open_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::hours(i as i64),
        open: close,
        high,
        low,
        close,
        volume,
    }
}

fn quiet(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar(i, c, c + 0.5, c - 0.5, 100.0))
        .collect()
}

/// Clean upward cross: close 100.56 about 0.5% above SMA6, body 60% of the
/// range, volume 1.3x the trailing average. Stop reference is the low, 99.9.
pub fn long_setup() -> Vec<PriceBar> {
    let mut bars = quiet(&[100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 99.8]);
    bars.push(bar(7, 100.56, 101.15, 99.9, 130.0));
    bars
}

/// Mirror of `long_setup`: close 99.44 below the trend, stop reference is the
/// high, 100.1.
pub fn short_setup() -> Vec<PriceBar> {
    let mut bars = quiet(&[100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 100.2]);
    bars.push(bar(7, 99.44, 100.1, 98.85, 130.0));
    bars
}

/// No crossover anywhere.
pub fn flat_setup() -> Vec<PriceBar> {
    quiet(&[100.0; 8])
}

// ─── Config ───────────────────────────────────────────────────────────────────

pub fn params() -> StrategyParams {
    StrategyParams {
        short_period: 2,
        long_period: 4,
        trend_period: 6,
        volume_lookback: 4,
        volume_multiplier: 1.2,
        trend_threshold_pct: 0.3,
        crossover_average: AverageKind::Sma,
        trend_average: AverageKind::Sma,
        risk_budget: dec!(1),
        risk_reward: dec!(1.5),
        leverage: None,
    }
}

pub fn instrument(symbol: &str) -> InstrumentSpec {
    InstrumentSpec {
        symbol: symbol.into(),
        quantity_precision: 3,
        price_precision: 2,
        min_notional: dec!(5),
    }
}

pub fn config(symbols: &[&str], params: StrategyParams) -> StrategyConfig {
    StrategyConfig {
        interval: "1h".into(),
        bar_limit: 8,
        params,
        instruments: symbols.iter().map(|s| instrument(s)).collect(),
    }
}

pub fn orchestrator(
    config: StrategyConfig,
    venue: Arc<FakeVenue>,
    ledger: Arc<dyn TradeLedger>,
) -> Arc<CycleOrchestrator> {
    let strategy = Arc::new(CrossoverStrategy::new(config.params.clone()).unwrap());
    Arc::new(CycleOrchestrator::new(
        config,
        strategy,
        Collaborators {
            market_data: venue.clone(),
            exposure: venue.clone(),
            execution: venue,
            ledger,
        },
    ))
}

// ─── Fake venue ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Leverage(String, u32),
    Market {
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
    },
    Stop(StopMarketOrder),
    Limit(LimitOrder),
}

/// Scripted stand-in for the exchange, playing all three venue roles.
#[derive(Default)]
pub struct FakeVenue {
    bars: Mutex<HashMap<String, Vec<PriceBar>>>,
    unavailable: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    open: Mutex<HashSet<String>>,
    exposure_down: Mutex<HashSet<String>>,
    entry_times_out: Mutex<bool>,
    rejected_legs: Mutex<HashSet<&'static str>>,
    fill_price: Mutex<Option<Decimal>>,
    pub calls: Mutex<Vec<Call>>,
    pub bar_requests: Mutex<usize>,
}

impl FakeVenue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_bars(self: &Arc<Self>, symbol: &str, bars: Vec<PriceBar>) -> Arc<Self> {
        self.bars.lock().unwrap().insert(symbol.into(), bars);
        self.clone()
    }

    pub fn unavailable(self: &Arc<Self>, symbol: &str) -> Arc<Self> {
        self.unavailable.lock().unwrap().insert(symbol.into());
        self.clone()
    }

    pub fn panics_on(self: &Arc<Self>, symbol: &str) -> Arc<Self> {
        self.panicking.lock().unwrap().insert(symbol.into());
        self.clone()
    }

    pub fn with_open_position(self: &Arc<Self>, symbol: &str) -> Arc<Self> {
        self.open.lock().unwrap().insert(symbol.into());
        self.clone()
    }

    pub fn exposure_unavailable(self: &Arc<Self>, symbol: &str) -> Arc<Self> {
        self.exposure_down.lock().unwrap().insert(symbol.into());
        self.clone()
    }

    /// The market order reaches the venue and opens the position, but the
    /// response is lost.
    pub fn timing_out_entry(self: &Arc<Self>) -> Arc<Self> {
        *self.entry_times_out.lock().unwrap() = true;
        self.clone()
    }

    /// `leg` is one of "leverage", "entry", "stop", "target".
    pub fn rejecting(self: &Arc<Self>, leg: &'static str) -> Arc<Self> {
        self.rejected_legs.lock().unwrap().insert(leg);
        self.clone()
    }

    pub fn filling_at(self: &Arc<Self>, price: Decimal) -> Arc<Self> {
        *self.fill_price.lock().unwrap() = Some(price);
        self.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, leg: &'static str) -> Result<()> {
        if self.rejected_legs.lock().unwrap().contains(leg) {
            return Err(Error::OrderRejected {
                reason: format!("{leg} rejected: -2021 Order would immediately trigger"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataSource for FakeVenue {
    async fn bars(&self, symbol: &str, _interval: &str, limit: usize) -> Result<Vec<PriceBar>> {
        *self.bar_requests.lock().unwrap() += 1;
        if self.panicking.lock().unwrap().contains(symbol) {
            panic!("feed for {symbol} blew up");
        }
        if self.unavailable.lock().unwrap().contains(symbol) {
            return Err(Error::DataUnavailable {
                symbol: symbol.into(),
                reason: "connection reset by peer".into(),
            });
        }
        let bars = self
            .bars
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        let skip = bars.len().saturating_sub(limit);
        Ok(bars.into_iter().skip(skip).collect())
    }
}

#[async_trait]
impl ExposureQuery for FakeVenue {
    async fn has_open_position(&self, symbol: &str) -> Result<bool> {
        if self.exposure_down.lock().unwrap().contains(symbol) {
            return Err(Error::Exchange("positionRisk: -1001 Internal error".into()));
        }
        Ok(self.open.lock().unwrap().contains(symbol))
    }
}

#[async_trait]
impl OrderExecutionSink for FakeVenue {
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<Fill> {
        self.calls.lock().unwrap().push(Call::Market {
            symbol: symbol.into(),
            side,
            quantity,
        });
        self.check("entry")?;
        self.open.lock().unwrap().insert(symbol.into());
        if *self.entry_times_out.lock().unwrap() {
            return Err(Error::Http("operation timed out".into()));
        }
        Ok(Fill {
            order_id: "1001".into(),
            symbol: symbol.into(),
            side,
            price: *self.fill_price.lock().unwrap(),
            quantity,
            timestamp: Utc::now(),
        })
    }

    async fn submit_stop_market_order(&self, order: &StopMarketOrder) -> Result<OrderAck> {
        self.calls.lock().unwrap().push(Call::Stop(order.clone()));
        self.check("stop")?;
        Ok(OrderAck {
            order_id: "1002".into(),
            symbol: order.symbol.clone(),
        })
    }

    async fn submit_limit_order(&self, order: &LimitOrder) -> Result<OrderAck> {
        self.calls.lock().unwrap().push(Call::Limit(order.clone()));
        self.check("target")?;
        Ok(OrderAck {
            order_id: "1003".into(),
            symbol: order.symbol.clone(),
        })
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Leverage(symbol.into(), leverage));
        self.check("leverage")
    }
}

// ─── Ledger ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryLedger {
    pub rows: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn rows(&self) -> Vec<LedgerEntry> {
        self.rows.lock().unwrap().clone()
    }

    pub fn row(&self, symbol: &str) -> LedgerEntry {
        self.rows()
            .into_iter()
            .find(|r| r.symbol == symbol)
            .unwrap_or_else(|| panic!("no ledger row for {symbol}"))
    }
}

#[async_trait]
impl TradeLedger for MemoryLedger {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        self.rows.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
