use rust_decimal::Decimal;
use tracing::debug;

use common::{InstrumentSpec, SizingRejection};

/// Fixed-risk position sizer: the loss taken at the stop never exceeds the
/// configured budget (in quote currency).
#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk_budget: Decimal,
}

/// Result of a successful sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sizing {
    pub stop_distance: Decimal,
    /// `risk_budget / stop_distance` before truncation.
    pub raw_quantity: Decimal,
    /// Truncated toward zero to the instrument precision; always `> 0`.
    pub quantity: Decimal,
    pub notional: Decimal,
}

impl PositionSizer {
    pub fn new(risk_budget: Decimal) -> Self {
        Self { risk_budget }
    }

    pub fn risk_budget(&self) -> Decimal {
        self.risk_budget
    }

    /// Size a trade entered at `entry` with its protective stop at `stop`.
    ///
    /// Truncation (never rounding up) keeps `quantity * |entry - stop|` at or
    /// below the budget.
    pub fn size(
        &self,
        entry: Decimal,
        stop: Decimal,
        spec: &InstrumentSpec,
    ) -> Result<Sizing, SizingRejection> {
        let stop_distance = (entry - stop).abs();
        if stop_distance.is_zero() {
            return Err(SizingRejection::DegenerateStop { entry, stop });
        }

        let raw_quantity = self
            .risk_budget
            .checked_div(stop_distance)
            .ok_or(SizingRejection::DegenerateStop { entry, stop })?;

        let quantity = spec.truncate_quantity(raw_quantity);
        if quantity <= Decimal::ZERO {
            return Err(SizingRejection::ZeroQuantity {
                raw: raw_quantity,
                precision: spec.quantity_precision,
            });
        }

        let notional = quantity
            .checked_mul(entry)
            .ok_or(SizingRejection::DegenerateStop { entry, stop })?;
        if notional < spec.min_notional {
            return Err(SizingRejection::BelowMinimumNotional {
                notional,
                min_notional: spec.min_notional,
            });
        }

        debug!(
            symbol = %spec.symbol,
            %stop_distance,
            %raw_quantity,
            %quantity,
            %notional,
            "Position sized"
        );

        Ok(Sizing {
            stop_distance,
            raw_quantity,
            quantity,
            notional,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn spec(quantity_precision: u32, min_notional: Decimal) -> InstrumentSpec {
        InstrumentSpec {
            symbol: "BTCUSDT".into(),
            quantity_precision,
            price_precision: 2,
            min_notional,
        }
    }

    #[test]
    fn one_unit_of_risk_per_unit_of_distance() {
        let sizing = PositionSizer::new(dec!(1))
            .size(dec!(100), dec!(99), &spec(3, dec!(5)))
            .unwrap();
        assert_eq!(sizing.quantity, dec!(1));
        assert_eq!(sizing.notional, dec!(100));
        assert_eq!(sizing.stop_distance, dec!(1));
    }

    #[test]
    fn quantity_is_truncated_not_rounded() {
        // 1 / 0.66 = 1.5151...
        let sizing = PositionSizer::new(dec!(1))
            .size(dec!(100.56), dec!(99.90), &spec(3, dec!(5)))
            .unwrap();
        assert_eq!(sizing.quantity, dec!(1.515));
        assert!(sizing.quantity * sizing.stop_distance <= dec!(1));
    }

    #[test]
    fn short_side_distance_is_absolute() {
        let sizing = PositionSizer::new(dec!(2))
            .size(dec!(50), dec!(54), &spec(2, dec!(5)))
            .unwrap();
        assert_eq!(sizing.quantity, dec!(0.5));
        assert_eq!(sizing.notional, dec!(25.0));
    }

    #[test]
    fn stop_equal_to_entry_is_degenerate() {
        let err = PositionSizer::new(dec!(1))
            .size(dec!(100), dec!(100), &spec(3, dec!(5)))
            .unwrap_err();
        assert!(matches!(err, SizingRejection::DegenerateStop { .. }));
    }

    #[test]
    fn wide_stop_truncates_to_zero() {
        let err = PositionSizer::new(dec!(1))
            .size(dec!(30000), dec!(28000), &spec(3, dec!(5)))
            .unwrap_err();
        assert_eq!(
            err,
            SizingRejection::ZeroQuantity {
                raw: dec!(0.0005),
                precision: 3
            }
        );
    }

    #[test]
    fn notional_below_venue_minimum_is_rejected() {
        let err = PositionSizer::new(dec!(1))
            .size(dec!(100), dec!(99), &spec(3, dec!(150)))
            .unwrap_err();
        assert!(matches!(
            err,
            SizingRejection::BelowMinimumNotional { .. }
        ));
    }
}
