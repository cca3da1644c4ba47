use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};

use common::{
    Direction, Error, Fill, InstrumentSpec, LimitOrder, OrderAck, OrderExecutionSink, OrderIntent,
    StopMarketOrder, TimeInForce,
};

/// One venue call of a bracket submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Leverage,
    Entry,
    Stop,
    Target,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Leverage => write!(f, "leverage"),
            Leg::Entry => write!(f, "entry"),
            Leg::Stop => write!(f, "stop"),
            Leg::Target => write!(f, "target"),
        }
    }
}

/// A fully placed bracket.
#[derive(Debug, Clone)]
pub struct BracketReport {
    pub entry: Fill,
    pub stop: OrderAck,
    pub target: OrderAck,
    /// Prices actually sent for the protective legs, after fill anchoring.
    pub stop_price: Decimal,
    pub target_price: Decimal,
    /// Quantity the protective legs were sized for.
    pub quantity: Decimal,
}

/// How a bracket submission went wrong. The variants separate "nothing was
/// submitted" from "a position is open without full protection".
#[derive(Debug, Error)]
pub enum BracketError {
    #[error("leverage not set, nothing submitted: {0}")]
    Leverage(Error),

    #[error("entry rejected, nothing open: {0}")]
    EntryRejected(Error),

    /// The entry call failed in transport; the venue may or may not have
    /// opened a position.
    #[error("entry outcome unknown, reconcile with the venue: {0}")]
    EntryUnknown(Error),

    #[error("partial bracket: entry filled, {} protective leg(s) failed", failures.len())]
    Partial {
        entry: Fill,
        stop: Option<OrderAck>,
        target: Option<OrderAck>,
        stop_price: Decimal,
        target_price: Decimal,
        quantity: Decimal,
        failures: Vec<(Leg, Error)>,
    },
}

impl BracketError {
    /// True when a position may be open at the venue.
    pub fn position_at_risk(&self) -> bool {
        matches!(self, BracketError::EntryUnknown(_) | BracketError::Partial { .. })
    }
}

/// Places the three legs of an [`OrderIntent`]: market entry, stop-market
/// closing the whole position, reduce-only limit take-profit.
///
/// This is the only caller of [`OrderExecutionSink`]. Once the entry has
/// filled both protective legs are always attempted.
pub struct BracketExecutor {
    sink: Arc<dyn OrderExecutionSink>,
    leverage: Option<u32>,
}

impl BracketExecutor {
    pub fn new(sink: Arc<dyn OrderExecutionSink>, leverage: Option<u32>) -> Self {
        Self { sink, leverage }
    }

    pub async fn submit(
        &self,
        intent: &OrderIntent,
        spec: &InstrumentSpec,
    ) -> Result<BracketReport, BracketError> {
        let symbol = intent.symbol();
        let direction = intent.direction();

        if let Some(leverage) = self.leverage {
            self.sink
                .set_leverage(symbol, leverage)
                .await
                .map_err(BracketError::Leverage)?;
        }

        info!(
            symbol = %symbol,
            %direction,
            qty = %intent.quantity(),
            entry = %intent.entry_price(),
            "Submitting entry"
        );
        let entry = match self
            .sink
            .submit_market_order(symbol, direction.entry_side(), intent.quantity())
            .await
        {
            Ok(fill) => fill,
            Err(e @ Error::OrderRejected { .. }) => {
                warn!(symbol = %symbol, error = %e, "Entry rejected, nothing submitted");
                return Err(BracketError::EntryRejected(e));
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Entry outcome unknown, reconcile position");
                return Err(BracketError::EntryUnknown(e));
            }
        };

        let (stop_price, target_price) = anchor_to_fill(intent, spec, entry.price);
        let quantity = if entry.quantity > Decimal::ZERO {
            entry.quantity
        } else {
            intent.quantity()
        };
        let exit_side = direction.exit_side();

        let stop_order = StopMarketOrder {
            symbol: symbol.to_string(),
            side: exit_side,
            stop_price,
            quantity,
            close_position: true,
            reduce_only: false,
        };
        let target_order = LimitOrder {
            symbol: symbol.to_string(),
            side: exit_side,
            price: target_price,
            quantity,
            time_in_force: TimeInForce::Gtc,
            close_position: false,
            reduce_only: true,
        };

        let mut failures = Vec::new();
        let stop = match self.sink.submit_stop_market_order(&stop_order).await {
            Ok(ack) => Some(ack),
            Err(e) => {
                failures.push((Leg::Stop, e));
                None
            }
        };
        let target = match self.sink.submit_limit_order(&target_order).await {
            Ok(ack) => Some(ack),
            Err(e) => {
                failures.push((Leg::Target, e));
                None
            }
        };

        match (stop, target) {
            (Some(stop), Some(target)) => {
                info!(
                    symbol = %symbol,
                    %direction,
                    fill = ?entry.price,
                    stop = %stop_price,
                    target = %target_price,
                    qty = %quantity,
                    "Bracket placed"
                );
                Ok(BracketReport {
                    entry,
                    stop,
                    target,
                    stop_price,
                    target_price,
                    quantity,
                })
            }
            (stop, target) => {
                for (leg, e) in &failures {
                    error!(
                        symbol = %symbol,
                        leg = %leg,
                        error = %e,
                        qty = %quantity,
                        "PARTIAL BRACKET: entry filled but protective leg failed, position needs manual attention"
                    );
                }
                Err(BracketError::Partial {
                    entry,
                    stop,
                    target,
                    stop_price,
                    target_price,
                    quantity,
                    failures,
                })
            }
        }
    }
}

/// Re-anchor stop and target to the reported fill price, keeping the
/// intent's distances. Falls back to the intent's prices when no fill price
/// is known or the anchored legs would land on the wrong side.
fn anchor_to_fill(
    intent: &OrderIntent,
    spec: &InstrumentSpec,
    fill_price: Option<Decimal>,
) -> (Decimal, Decimal) {
    let planned = (intent.stop_price(), intent.target_price());
    let Some(fill) = fill_price.filter(|p| *p > Decimal::ZERO) else {
        return planned;
    };
    if fill == intent.entry_price() {
        return planned;
    }

    let (stop, target) = match intent.direction() {
        Direction::Long => (
            spec.round_price(fill - intent.stop_distance()),
            spec.round_price(fill + intent.target_distance()),
        ),
        Direction::Short => (
            spec.round_price(fill + intent.stop_distance()),
            spec.round_price(fill - intent.target_distance()),
        ),
    };
    let sides_hold = match intent.direction() {
        Direction::Long => stop < fill && fill < target && stop > Decimal::ZERO,
        Direction::Short => target < fill && fill < stop && target > Decimal::ZERO,
    };
    if sides_hold {
        (stop, target)
    } else {
        planned
    }
}
