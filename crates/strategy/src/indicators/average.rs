//! Simple and exponential moving averages over a series of values (oldest
//! first). Pure functions: no state is carried between calls.

use common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Arithmetic mean of the last `period` values.
///
/// Fails with `Error::InsufficientData` when `series` is shorter than `period`.
pub fn simple_moving_average(series: &[f64], period: usize) -> Result<f64> {
    require(series.len(), period)?;
    let window = &series[series.len() - period..];
    Ok(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average aligned to `series`.
///
/// Seeded with the SMA of the first `period` values, then
/// `ema[i] = x[i]*k + ema[i-1]*(1-k)` with `k = 2/(period+1)`.
/// Indices before `period - 1` are `None`.
pub fn exponential_moving_average(series: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    require(series.len(), period)?;

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(series.len());
    out.resize(period - 1, None);

    let mut ema = series[..period].iter().sum::<f64>() / period as f64;
    out.push(Some(ema));
    for &value in &series[period..] {
        ema = value * k + ema * (1.0 - k);
        out.push(Some(ema));
    }
    Ok(out)
}

fn require(have: usize, period: usize) -> Result<()> {
    if period == 0 {
        return Err(Error::Config("moving average period must be at least 1".into()));
    }
    if have < period {
        return Err(Error::InsufficientData { have, need: period });
    }
    Ok(())
}

/// Which moving average a filter uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AverageKind {
    Sma,
    Ema,
}

impl AverageKind {
    /// Average on the latest value.
    pub fn latest(self, series: &[f64], period: usize) -> Result<f64> {
        match self {
            AverageKind::Sma => simple_moving_average(series, period),
            AverageKind::Ema => last_ema(series, period),
        }
    }

    /// Average on the previous and the latest value, in that order.
    /// Needs `period + 1` values.
    pub fn previous_and_latest(self, series: &[f64], period: usize) -> Result<(f64, f64)> {
        if series.len() < period + 1 {
            return Err(Error::InsufficientData {
                have: series.len(),
                need: period + 1,
            });
        }
        match self {
            AverageKind::Sma => Ok((
                simple_moving_average(&series[..series.len() - 1], period)?,
                simple_moving_average(series, period)?,
            )),
            AverageKind::Ema => {
                let ema = exponential_moving_average(series, period)?;
                match &ema[ema.len() - 2..] {
                    [Some(prev), Some(curr)] => Ok((*prev, *curr)),
                    _ => Err(Error::InsufficientData {
                        have: series.len(),
                        need: period + 1,
                    }),
                }
            }
        }
    }
}

fn last_ema(series: &[f64], period: usize) -> Result<f64> {
    exponential_moving_average(series, period)?
        .last()
        .copied()
        .flatten()
        .ok_or(Error::InsufficientData {
            have: series.len(),
            need: period,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sma_is_mean_of_last_period_values() {
        let series = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(simple_moving_average(&series, 3).unwrap(), 4.0);
        assert_eq!(simple_moving_average(&series, 5).unwrap(), 3.0);
    }

    #[test]
    fn sma_insufficient_data() {
        let err = simple_moving_average(&[1.0, 2.0], 3).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { have: 2, need: 3 }));
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(simple_moving_average(&[1.0], 0).is_err());
        assert!(exponential_moving_average(&[1.0], 0).is_err());
    }

    #[test]
    fn ema_matches_manual_computation() {
        let ema = exponential_moving_average(&[10.0, 11.0, 12.0, 13.0, 14.0], 3).unwrap();
        assert_eq!(ema, vec![None, None, Some(11.0), Some(12.0), Some(13.0)]);
    }

    #[test]
    fn ema_seed_only_when_series_equals_period() {
        let ema = exponential_moving_average(&[10.0, 20.0, 30.0], 3).unwrap();
        assert_eq!(ema, vec![None, None, Some(20.0)]);
    }

    #[test]
    fn ema_period_one_tracks_input() {
        let ema = exponential_moving_average(&[3.0, 7.0, 5.0], 1).unwrap();
        assert_eq!(ema, vec![Some(3.0), Some(7.0), Some(5.0)]);
    }

    #[test]
    fn ema_insufficient_data() {
        assert!(matches!(
            exponential_moving_average(&[1.0, 2.0], 3),
            Err(Error::InsufficientData { have: 2, need: 3 })
        ));
    }

    #[test]
    fn previous_and_latest_sma() {
        let series = [1.0, 2.0, 3.0, 4.0];
        let (prev, curr) = AverageKind::Sma.previous_and_latest(&series, 2).unwrap();
        assert_eq!(prev, 2.5);
        assert_eq!(curr, 3.5);
    }

    #[test]
    fn previous_and_latest_ema() {
        let series = [10.0, 11.0, 12.0, 13.0, 14.0];
        let (prev, curr) = AverageKind::Ema.previous_and_latest(&series, 3).unwrap();
        assert_eq!(prev, 12.0);
        assert_eq!(curr, 13.0);
    }

    #[test]
    fn previous_and_latest_needs_one_extra_value() {
        assert!(AverageKind::Ema.previous_and_latest(&[1.0, 2.0, 3.0], 3).is_err());
        assert!(AverageKind::Sma.previous_and_latest(&[1.0, 2.0, 3.0], 3).is_err());
    }

    proptest! {
        #[test]
        fn sma_is_pure_and_matches_mean(
            series in prop::collection::vec(0.01f64..100_000.0, 1..300),
            period in 1usize..50,
        ) {
            prop_assume!(series.len() >= period);
            let first = simple_moving_average(&series, period).unwrap();
            let second = simple_moving_average(&series, period).unwrap();
            prop_assert_eq!(first, second);

            let tail = &series[series.len() - period..];
            let mean = tail.iter().sum::<f64>() / period as f64;
            prop_assert!((first - mean).abs() <= 1e-9 * mean.abs().max(1.0));
        }

        #[test]
        fn ema_stays_within_input_bounds(
            series in prop::collection::vec(0.01f64..100_000.0, 1..300),
            period in 1usize..50,
        ) {
            prop_assume!(series.len() >= period);
            let lo = series.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = series.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let ema = exponential_moving_average(&series, period).unwrap();
            prop_assert_eq!(ema.len(), series.len());
            for (i, value) in ema.iter().enumerate() {
                if i + 1 < period {
                    prop_assert!(value.is_none());
                } else {
                    let v = value.unwrap();
                    prop_assert!(v >= lo - 1e-6 && v <= hi + 1e-6);
                }
            }
        }
    }
}
