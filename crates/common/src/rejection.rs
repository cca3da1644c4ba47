//! Expected "no trade" outcomes. These are not failures and never travel as
//! [`crate::Error`].

use rust_decimal::Decimal;
use thiserror::Error;

use crate::Direction;

/// Reason the position sizer declined to size a trade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingRejection {
    #[error("degenerate stop: entry {entry} and stop {stop} leave no distance")]
    DegenerateStop { entry: Decimal, stop: Decimal },

    #[error("quantity {raw} truncates to zero at precision {precision}")]
    ZeroQuantity { raw: Decimal, precision: u32 },

    #[error("notional {notional} below minimum {min_notional}")]
    BelowMinimumNotional {
        notional: Decimal,
        min_notional: Decimal,
    },
}

/// Reason an order intent could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentRejection {
    #[error(transparent)]
    Sizing(#[from] SizingRejection),

    #[error("quantity {quantity} is not positive")]
    NonPositiveQuantity { quantity: Decimal },

    #[error("reference price {value} has no decimal representation")]
    UnrepresentablePrice { value: String },

    #[error("stop {stop} on the wrong side of entry {entry} for {direction}")]
    StopOnWrongSide {
        direction: Direction,
        entry: Decimal,
        stop: Decimal,
    },

    #[error("target {target} on the wrong side of entry {entry} for {direction}")]
    TargetOnWrongSide {
        direction: Direction,
        entry: Decimal,
        target: Decimal,
    },
}
