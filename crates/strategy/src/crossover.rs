use tracing::debug;

use common::{Direction, PriceBar, Result};

use crate::config::StrategyParams;
use crate::signal::{NoSignalReason, Signal};
use crate::Strategy;

/// Moving-average crossover confirmed by trend, candle-strength and volume
/// filters. Every filter must pass; the first one that fails is reported.
///
/// Filter order:
/// 1. history long enough for every lookback
/// 2. close displaced from the trend average by more than the threshold
/// 3. short average crossed the long average on the latest bar
/// 4. the cross agrees with the side of the trend average price is on
/// 5. `|close - previous close| > 0.5 * (high - low)`
/// 6. latest volume above `multiplier * ` trailing average volume
#[derive(Debug, Clone)]
pub struct CrossoverStrategy {
    params: StrategyParams,
}

impl CrossoverStrategy {
    /// Fails with `Error::Config` when `params` would make a filter
    /// meaningless (zero lookback, inverted periods).
    pub fn new(params: StrategyParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn confirm(&self, bars: &[PriceBar]) -> Result<Signal, NoSignalReason> {
        let p = &self.params;
        let need = p.required_bars();
        let insufficient = || NoSignalReason::InsufficientHistory {
            have: bars.len(),
            need,
        };
        if bars.len() < need {
            return Err(insufficient());
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let last = &bars[bars.len() - 1];
        let prev = &bars[bars.len() - 2];

        // Trend regime
        let trend = p
            .trend_average
            .latest(&closes, p.trend_period)
            .map_err(|_| insufficient())?;
        let displacement_pct = if trend > 0.0 {
            (last.close - trend) / trend * 100.0
        } else {
            0.0
        };
        if displacement_pct.abs() <= p.trend_threshold_pct {
            return Err(NoSignalReason::TrendTooFlat {
                displacement_pct,
                threshold_pct: p.trend_threshold_pct,
            });
        }

        // Crossover on the latest bar
        let (prev_short, short) = p
            .crossover_average
            .previous_and_latest(&closes, p.short_period)
            .map_err(|_| insufficient())?;
        let (prev_long, long) = p
            .crossover_average
            .previous_and_latest(&closes, p.long_period)
            .map_err(|_| insufficient())?;

        if short == long {
            return Err(NoSignalReason::AveragesTied { value: short });
        }
        let direction = if prev_short < prev_long && short > long {
            Direction::Long
        } else if prev_short > prev_long && short < long {
            Direction::Short
        } else {
            return Err(NoSignalReason::NoCrossover);
        };

        let with_trend = match direction {
            Direction::Long => displacement_pct > 0.0,
            Direction::Short => displacement_pct < 0.0,
        };
        if !with_trend {
            return Err(NoSignalReason::AgainstTrend {
                direction,
                displacement_pct,
            });
        }

        // Candle strength
        let body = (last.close - prev.close).abs();
        let range = last.range();
        if body <= 0.5 * range {
            return Err(NoSignalReason::WeakCandle { body, range });
        }

        // Volume against the trailing average, latest bar excluded
        let trailing = &bars[bars.len() - 1 - p.volume_lookback..bars.len() - 1];
        let average = trailing.iter().map(|b| b.volume).sum::<f64>() / trailing.len() as f64;
        if last.volume <= p.volume_multiplier * average {
            return Err(NoSignalReason::LowVolume {
                volume: last.volume,
                average,
                multiplier: p.volume_multiplier,
            });
        }

        Ok(match direction {
            Direction::Long => Signal::Long {
                entry: last.close,
                stop: last.low,
            },
            Direction::Short => Signal::Short {
                entry: last.close,
                stop: last.high,
            },
        })
    }
}

impl Strategy for CrossoverStrategy {
    fn name(&self) -> &str {
        "ma-crossover"
    }

    fn required_bars(&self) -> usize {
        self.params.required_bars()
    }

    fn evaluate(&self, symbol: &str, bars: &[PriceBar]) -> Signal {
        match self.confirm(bars) {
            Ok(signal) => {
                debug!(symbol = %symbol, signal = ?signal, "Filters passed");
                signal
            }
            Err(reason) => {
                debug!(symbol = %symbol, reason = %reason, "No signal");
                Signal::none(reason)
            }
        }
    }
}
