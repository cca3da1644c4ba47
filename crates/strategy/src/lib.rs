pub mod config;
pub mod crossover;
pub mod indicators;
pub mod signal;

pub use config::{Preset, StrategyConfig, StrategyParams};
pub use crossover::CrossoverStrategy;
pub use signal::{NoSignalReason, Signal};

use common::PriceBar;

/// All strategy implementations must satisfy this trait.
pub trait Strategy: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Bars needed before `evaluate` can return anything but `Signal::None`.
    fn required_bars(&self) -> usize;

    /// Evaluate closed bars (oldest first) for one instrument.
    ///
    /// Never fails: missing history, ties and filter rejections all come back
    /// as `Signal::None` with a reason.
    fn evaluate(&self, symbol: &str, bars: &[PriceBar]) -> Signal;
}
