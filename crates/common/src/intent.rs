use rust_decimal::Decimal;
use serde::Serialize;

use crate::{Direction, IntentRejection, SizingRejection};

/// A fully validated three-leg bracket: market entry, protective stop and
/// profit target.
///
/// The only way to obtain one is [`OrderIntent::new`], which enforces
/// `quantity > 0`, `notional >= min_notional` and stop/target on the correct
/// side of entry. Fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderIntent {
    symbol: String,
    direction: Direction,
    entry_price: Decimal,
    stop_price: Decimal,
    target_price: Decimal,
    quantity: Decimal,
    notional: Decimal,
}

impl OrderIntent {
    pub fn new(
        symbol: impl Into<String>,
        direction: Direction,
        entry_price: Decimal,
        stop_price: Decimal,
        target_price: Decimal,
        quantity: Decimal,
        min_notional: Decimal,
    ) -> Result<Self, IntentRejection> {
        if quantity <= Decimal::ZERO {
            return Err(IntentRejection::NonPositiveQuantity { quantity });
        }

        let notional = quantity * entry_price;
        if notional < min_notional {
            return Err(SizingRejection::BelowMinimumNotional {
                notional,
                min_notional,
            }
            .into());
        }

        let (stop_ok, target_ok) = match direction {
            Direction::Long => (stop_price < entry_price, target_price > entry_price),
            Direction::Short => (stop_price > entry_price, target_price < entry_price),
        };
        if !stop_ok {
            return Err(IntentRejection::StopOnWrongSide {
                direction,
                entry: entry_price,
                stop: stop_price,
            });
        }
        if !target_ok {
            return Err(IntentRejection::TargetOnWrongSide {
                direction,
                entry: entry_price,
                target: target_price,
            });
        }

        Ok(Self {
            symbol: symbol.into(),
            direction,
            entry_price,
            stop_price,
            target_price,
            quantity,
            notional,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn stop_price(&self) -> Decimal {
        self.stop_price
    }

    pub fn target_price(&self) -> Decimal {
        self.target_price
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn notional(&self) -> Decimal {
        self.notional
    }

    pub fn stop_distance(&self) -> Decimal {
        (self.entry_price - self.stop_price).abs()
    }

    pub fn target_distance(&self) -> Decimal {
        (self.target_price - self.entry_price).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn long_intent_accepts_stop_below_and_target_above() {
        let intent = OrderIntent::new(
            "BTCUSDT",
            Direction::Long,
            dec!(100),
            dec!(99),
            dec!(101.5),
            dec!(1),
            dec!(5),
        )
        .unwrap();
        assert_eq!(intent.notional(), dec!(100));
        assert_eq!(intent.stop_distance(), dec!(1));
        assert_eq!(intent.target_distance(), dec!(1.5));
    }

    #[test]
    fn long_intent_rejects_stop_above_entry() {
        let err = OrderIntent::new(
            "BTCUSDT",
            Direction::Long,
            dec!(100),
            dec!(101),
            dec!(102),
            dec!(1),
            dec!(5),
        )
        .unwrap_err();
        assert!(matches!(err, IntentRejection::StopOnWrongSide { .. }));
    }

    #[test]
    fn short_intent_rejects_target_above_entry() {
        let err = OrderIntent::new(
            "ETHUSDT",
            Direction::Short,
            dec!(100),
            dec!(101),
            dec!(100.5),
            dec!(1),
            dec!(5),
        )
        .unwrap_err();
        assert!(matches!(err, IntentRejection::TargetOnWrongSide { .. }));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        for quantity in [Decimal::ZERO, dec!(-0.5)] {
            let err = OrderIntent::new(
                "ETHUSDT",
                Direction::Short,
                dec!(100),
                dec!(101),
                dec!(98),
                quantity,
                Decimal::ZERO,
            )
            .unwrap_err();
            assert_eq!(err, IntentRejection::NonPositiveQuantity { quantity });
        }
    }

    #[test]
    fn notional_below_minimum_is_rejected() {
        let err = OrderIntent::new(
            "ETHUSDT",
            Direction::Long,
            dec!(100),
            dec!(99),
            dec!(102),
            dec!(0.04),
            dec!(5),
        )
        .unwrap_err();
        assert_eq!(
            err,
            IntentRejection::Sizing(SizingRejection::BelowMinimumNotional {
                notional: dec!(4.00),
                min_notional: dec!(5),
            })
        );
    }
}
