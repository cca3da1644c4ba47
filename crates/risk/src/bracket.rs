use rust_decimal::Decimal;
use tracing::debug;

use common::{Direction, InstrumentSpec, IntentRejection, OrderIntent};

use crate::sizer::PositionSizer;

/// Turns a directional signal's reference prices into a validated bracket.
///
/// Entry and stop are rounded to the instrument tick before sizing so the
/// risk bound holds on the prices actually sent. The target sits
/// `risk_reward` stop-distances beyond entry, on the profit side.
#[derive(Debug, Clone)]
pub struct BracketBuilder {
    sizer: PositionSizer,
    risk_reward: Decimal,
}

impl BracketBuilder {
    pub fn new(risk_budget: Decimal, risk_reward: Decimal) -> Self {
        Self {
            sizer: PositionSizer::new(risk_budget),
            risk_reward,
        }
    }

    pub fn risk_reward(&self) -> Decimal {
        self.risk_reward
    }

    pub fn build(
        &self,
        spec: &InstrumentSpec,
        direction: Direction,
        entry_ref: f64,
        stop_ref: f64,
    ) -> Result<OrderIntent, IntentRejection> {
        let entry = spec.round_price(to_decimal(entry_ref)?);
        let stop = spec.round_price(to_decimal(stop_ref)?);

        let sizing = self.sizer.size(entry, stop, spec)?;
        let reward = sizing.stop_distance * self.risk_reward;
        let target = spec.round_price(match direction {
            Direction::Long => entry + reward,
            Direction::Short => entry - reward,
        });

        let intent = OrderIntent::new(
            spec.symbol.clone(),
            direction,
            entry,
            stop,
            target,
            sizing.quantity,
            spec.min_notional,
        )?;

        debug!(
            symbol = %spec.symbol,
            %direction,
            entry = %intent.entry_price(),
            stop = %intent.stop_price(),
            target = %intent.target_price(),
            quantity = %intent.quantity(),
            "Bracket built"
        );
        Ok(intent)
    }
}

fn to_decimal(value: f64) -> Result<Decimal, IntentRejection> {
    Decimal::try_from(value).map_err(|_| IntentRejection::UnrepresentablePrice {
        value: value.to_string(),
    })
}
