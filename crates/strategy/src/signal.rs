use common::Direction;
use thiserror::Error;

/// Verdict of one evaluation. Recomputed every cycle and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    None { reason: NoSignalReason },
    /// `entry` is the reference entry price, `stop` the protective stop reference.
    Long { entry: f64, stop: f64 },
    Short { entry: f64, stop: f64 },
}

impl Signal {
    pub fn none(reason: NoSignalReason) -> Self {
        Signal::None { reason }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Signal::None { .. })
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Signal::None { .. } => None,
            Signal::Long { .. } => Some(Direction::Long),
            Signal::Short { .. } => Some(Direction::Short),
        }
    }

    /// `(entry, stop)` reference prices for a directional signal.
    pub fn references(&self) -> Option<(f64, f64)> {
        match self {
            Signal::None { .. } => None,
            Signal::Long { entry, stop } | Signal::Short { entry, stop } => Some((*entry, *stop)),
        }
    }
}

/// Which filter stopped a signal, with the numbers that decided it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoSignalReason {
    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("range-bound: price {displacement_pct:.3}% from trend average, threshold {threshold_pct}%")]
    TrendTooFlat {
        displacement_pct: f64,
        threshold_pct: f64,
    },

    #[error("short and long averages are equal ({value})")]
    AveragesTied { value: f64 },

    #[error("no crossover on the latest bar")]
    NoCrossover,

    #[error("{direction} crossover against the trend ({displacement_pct:.3}% from trend average)")]
    AgainstTrend {
        direction: Direction,
        displacement_pct: f64,
    },

    #[error("weak candle: body {body} not above half the range {range}")]
    WeakCandle { body: f64, range: f64 },

    #[error("low volume: {volume} not above {multiplier}x trailing average {average}")]
    LowVolume {
        volume: f64,
        average: f64,
        multiplier: f64,
    },
}
