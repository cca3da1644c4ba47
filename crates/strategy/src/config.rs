use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{Error, InstrumentSpec, Result};

use crate::indicators::AverageKind;

/// Binance futures returns at most 1500 klines per request and the last one
/// is the candle still forming, so 1499 closed bars is the most a cycle sees.
pub const MAX_BAR_LIMIT: usize = 1499;

/// Named threshold sets. The filters are identical across presets; only the
/// trend and volume thresholds differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// 0.3% trend displacement, 1.2x volume.
    #[default]
    Standard,
    /// 0.5% trend displacement, 0.9x volume.
    WideTrend,
    /// 0.3% trend displacement, 0.75x volume.
    RelaxedVolume,
}

/// Resolved strategy parameters. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyParams {
    pub short_period: usize,
    pub long_period: usize,
    pub trend_period: usize,
    /// Bars in the trailing volume average (latest bar excluded).
    pub volume_lookback: usize,
    pub volume_multiplier: f64,
    /// Minimum |close - trend| / trend, in percent.
    pub trend_threshold_pct: f64,
    pub crossover_average: AverageKind,
    pub trend_average: AverageKind,
    /// Quote-currency loss accepted if the stop is hit.
    pub risk_budget: Decimal,
    /// Target distance as a multiple of the stop distance.
    pub risk_reward: Decimal,
    /// Leverage applied before each entry, if set.
    pub leverage: Option<u32>,
}

impl StrategyParams {
    pub fn preset(preset: Preset) -> Self {
        let (trend_threshold_pct, volume_multiplier) = match preset {
            Preset::Standard => (0.3, 1.2),
            Preset::WideTrend => (0.5, 0.9),
            Preset::RelaxedVolume => (0.3, 0.75),
        };
        Self {
            short_period: 9,
            long_period: 21,
            trend_period: 200,
            volume_lookback: 20,
            volume_multiplier,
            trend_threshold_pct,
            crossover_average: AverageKind::Ema,
            trend_average: AverageKind::Sma,
            risk_budget: Decimal::ONE,
            risk_reward: Decimal::new(15, 1),
            leverage: None,
        }
    }

    /// Bars needed before every filter can be evaluated.
    pub fn required_bars(&self) -> usize {
        [
            self.short_period + 1,
            self.long_period + 1,
            self.trend_period,
            self.volume_lookback + 1,
            2,
        ]
        .into_iter()
        .max()
        .unwrap_or(2)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));

        if self.short_period == 0 || self.long_period == 0 || self.trend_period == 0 {
            return fail("moving average periods must be at least 1".into());
        }
        if self.short_period >= self.long_period {
            return fail(format!(
                "short_period ({}) must be below long_period ({})",
                self.short_period, self.long_period
            ));
        }
        if self.volume_lookback == 0 {
            return fail("volume_lookback must be at least 1".into());
        }
        if !(self.volume_multiplier.is_finite() && self.volume_multiplier > 0.0) {
            return fail(format!(
                "volume_multiplier must be positive, got {}",
                self.volume_multiplier
            ));
        }
        if !(self.trend_threshold_pct.is_finite() && self.trend_threshold_pct >= 0.0) {
            return fail(format!(
                "trend_threshold_pct must be non-negative, got {}",
                self.trend_threshold_pct
            ));
        }
        if self.risk_budget <= Decimal::ZERO {
            return fail(format!("risk_budget must be positive, got {}", self.risk_budget));
        }
        if self.risk_reward <= Decimal::ZERO {
            return fail(format!("risk_reward must be positive, got {}", self.risk_reward));
        }
        if let Some(leverage) = self.leverage {
            if !(1..=125).contains(&leverage) {
                return fail(format!("leverage must be within 1..=125, got {leverage}"));
            }
        }
        Ok(())
    }
}

/// `[params]` table. Every field overrides the chosen preset when present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamOverrides {
    short_period: Option<usize>,
    long_period: Option<usize>,
    trend_period: Option<usize>,
    volume_lookback: Option<usize>,
    volume_multiplier: Option<f64>,
    trend_threshold_pct: Option<f64>,
    crossover_average: Option<AverageKind>,
    trend_average: Option<AverageKind>,
    risk_budget: Option<Decimal>,
    risk_reward: Option<Decimal>,
    leverage: Option<u32>,
}

impl ParamOverrides {
    fn apply(self, base: StrategyParams) -> StrategyParams {
        StrategyParams {
            short_period: self.short_period.unwrap_or(base.short_period),
            long_period: self.long_period.unwrap_or(base.long_period),
            trend_period: self.trend_period.unwrap_or(base.trend_period),
            volume_lookback: self.volume_lookback.unwrap_or(base.volume_lookback),
            volume_multiplier: self.volume_multiplier.unwrap_or(base.volume_multiplier),
            trend_threshold_pct: self.trend_threshold_pct.unwrap_or(base.trend_threshold_pct),
            crossover_average: self.crossover_average.unwrap_or(base.crossover_average),
            trend_average: self.trend_average.unwrap_or(base.trend_average),
            risk_budget: self.risk_budget.unwrap_or(base.risk_budget),
            risk_reward: self.risk_reward.unwrap_or(base.risk_reward),
            leverage: self.leverage.or(base.leverage),
        }
    }
}

/// On-disk strategy file (TOML).
///
/// Example `config/strategy.toml`:
/// ```toml
/// interval = "1h"
/// preset = "standard"
///
/// [params]
/// risk_budget = 1
/// risk_reward = 1.5
///
/// [[instrument]]
/// symbol = "BTCUSDT"
/// quantity_precision = 3
/// price_precision = 1
/// min_notional = 100
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrategyFile {
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default)]
    bar_limit: Option<usize>,
    #[serde(default)]
    preset: Preset,
    #[serde(default)]
    params: ParamOverrides,
    #[serde(rename = "instrument", default)]
    instruments: Vec<InstrumentSpec>,
}

fn default_interval() -> String {
    "1h".to_string()
}

/// Validated strategy configuration: what to trade and how.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    /// Kline interval, e.g. "5m" or "1h".
    pub interval: String,
    /// Bars requested per instrument per cycle.
    pub bar_limit: usize,
    pub params: StrategyParams,
    pub instruments: Vec<InstrumentSpec>,
}

impl StrategyConfig {
    /// Load and validate a TOML strategy file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read strategy config at '{path}': {e}"))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("Invalid strategy config at '{path}': {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: StrategyFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;

        let params = file.params.apply(StrategyParams::preset(file.preset));
        params.validate()?;

        let required = params.required_bars();
        if required > MAX_BAR_LIMIT {
            return Err(Error::Config(format!(
                "lookbacks need {required} closed bars, more than the {MAX_BAR_LIMIT} one request returns"
            )));
        }
        let bar_limit = file.bar_limit.unwrap_or_else(|| (required + 50).min(MAX_BAR_LIMIT));
        if bar_limit < required || bar_limit > MAX_BAR_LIMIT {
            return Err(Error::Config(format!(
                "bar_limit {bar_limit} must be within {required}..={MAX_BAR_LIMIT}"
            )));
        }

        if file.instruments.is_empty() {
            return Err(Error::Config("at least one [[instrument]] is required".into()));
        }
        let mut seen = HashSet::new();
        for spec in &file.instruments {
            if spec.symbol.trim().is_empty() {
                return Err(Error::Config("instrument symbol must not be empty".into()));
            }
            if !seen.insert(spec.symbol.as_str()) {
                return Err(Error::Config(format!("duplicate instrument '{}'", spec.symbol)));
            }
            if spec.min_notional < Decimal::ZERO {
                return Err(Error::Config(format!(
                    "min_notional for '{}' must not be negative",
                    spec.symbol
                )));
            }
        }

        Ok(Self {
            interval: file.interval,
            bar_limit,
            params,
            instruments: file.instruments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"
        [[instrument]]
        symbol = "BTCUSDT"
        quantity_precision = 3
        min_notional = 100
    "#;

    #[test]
    fn defaults_follow_standard_preset() {
        let cfg = StrategyConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(cfg.interval, "1h");
        assert_eq!(cfg.params, StrategyParams::preset(Preset::Standard));
        assert_eq!(cfg.params.trend_threshold_pct, 0.3);
        assert_eq!(cfg.params.volume_multiplier, 1.2);
        assert_eq!(cfg.bar_limit, 250);
        assert_eq!(cfg.instruments[0].price_precision, 2);
        assert_eq!(cfg.instruments[0].min_notional, dec!(100));
    }

    #[test]
    fn preset_and_overrides_combine() {
        let cfg = StrategyConfig::from_toml(
            r#"
            interval = "5m"
            preset = "relaxed_volume"
            bar_limit = 300

            [params]
            trend_threshold_pct = 0.5
            risk_budget = "2.5"
            leverage = 10
            crossover_average = "sma"

            [[instrument]]
            symbol = "SOLUSDT"
            quantity_precision = 0
            price_precision = 3
            min_notional = 5

            [[instrument]]
            symbol = "ETHUSDT"
            quantity_precision = 3
            min_notional = 20
            "#,
        )
        .unwrap();
        assert_eq!(cfg.interval, "5m");
        assert_eq!(cfg.bar_limit, 300);
        assert_eq!(cfg.params.volume_multiplier, 0.75);
        assert_eq!(cfg.params.trend_threshold_pct, 0.5);
        assert_eq!(cfg.params.risk_budget, dec!(2.5));
        assert_eq!(cfg.params.leverage, Some(10));
        assert_eq!(cfg.params.crossover_average, AverageKind::Sma);
        assert_eq!(cfg.instruments.len(), 2);
    }

    #[test]
    fn wide_trend_preset_thresholds() {
        let params = StrategyParams::preset(Preset::WideTrend);
        assert_eq!(params.trend_threshold_pct, 0.5);
        assert_eq!(params.volume_multiplier, 0.9);
    }

    #[test]
    fn required_bars_covers_longest_lookback() {
        let mut params = StrategyParams::preset(Preset::Standard);
        assert_eq!(params.required_bars(), 200);
        params.trend_period = 10;
        assert_eq!(params.required_bars(), 22);
        params.volume_lookback = 40;
        assert_eq!(params.required_bars(), 41);
    }

    #[test]
    fn short_period_must_be_below_long_period() {
        let err = StrategyConfig::from_toml(&format!(
            "[params]\nshort_period = 21\nlong_period = 9\n{MINIMAL}"
        ))
        .unwrap_err();
        assert!(err.to_string().contains("short_period"), "got: {err}");
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let err = StrategyConfig::from_toml(&format!("{MINIMAL}{MINIMAL}")).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "got: {err}");
    }

    #[test]
    fn bar_limit_below_required_history_is_rejected() {
        let err = StrategyConfig::from_toml(&format!("bar_limit = 50\n{MINIMAL}")).unwrap_err();
        assert!(err.to_string().contains("bar_limit"), "got: {err}");
    }

    #[test]
    fn bar_limit_leaves_room_for_the_forming_candle() {
        let err = StrategyConfig::from_toml(&format!("bar_limit = 1500\n{MINIMAL}")).unwrap_err();
        assert!(err.to_string().contains("bar_limit"), "got: {err}");

        let cfg = StrategyConfig::from_toml(&format!("bar_limit = 1499\n{MINIMAL}")).unwrap();
        assert_eq!(cfg.bar_limit, MAX_BAR_LIMIT);

        let err = StrategyConfig::from_toml(&format!("[params]\ntrend_period = 1500\n{MINIMAL}"))
            .unwrap_err();
        assert!(err.to_string().contains("closed bars"), "got: {err}");
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let err = StrategyConfig::from_toml(&format!("[params]\nstop_pct = 1.0\n{MINIMAL}"))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn non_positive_risk_budget_is_rejected() {
        let err = StrategyConfig::from_toml(&format!("[params]\nrisk_budget = 0\n{MINIMAL}"))
            .unwrap_err();
        assert!(err.to_string().contains("risk_budget"), "got: {err}");
    }

    #[test]
    fn empty_instrument_list_is_rejected() {
        assert!(StrategyConfig::from_toml("interval = \"1h\"").is_err());
    }
}
