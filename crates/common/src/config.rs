use std::time::Duration;

use crate::{Error, Result, TradingMode};

pub const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";

/// Where the trade ledger is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Sqlite,
    Csv,
}

/// Process configuration loaded from environment variables at startup.
/// Immutable for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub binance_api_key: String,
    pub binance_secret: String,
    pub binance_base_url: String,
    pub http_timeout: Duration,

    // Trading
    pub trading_mode: TradingMode,
    pub paper_slippage_bps: f64,

    // Ledger
    pub ledger_backend: LedgerBackend,
    pub database_url: String,
    pub trade_log_path: String,

    // Strategy config file path
    pub strategy_config_path: String,

    // Scheduling
    pub cycle_interval: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let trading_mode = match required(&lookup, "TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        // Market data is public; credentials only matter for live orders.
        let (binance_api_key, binance_secret) = match trading_mode {
            TradingMode::Live => (
                required(&lookup, "BINANCE_API_KEY")?,
                required(&lookup, "BINANCE_SECRET")?,
            ),
            TradingMode::Paper => (
                lookup("BINANCE_API_KEY").unwrap_or_default(),
                lookup("BINANCE_SECRET").unwrap_or_default(),
            ),
        };

        let ledger_backend = match lookup("LEDGER_BACKEND")
            .unwrap_or_else(|| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => LedgerBackend::Sqlite,
            "csv" => LedgerBackend::Csv,
            other => {
                return Err(Error::Config(format!(
                    "LEDGER_BACKEND must be 'sqlite' or 'csv', got: '{other}'"
                )))
            }
        };

        let cycle_interval_secs: u64 = parsed(&lookup, "CYCLE_INTERVAL_SECS", 300)?;
        if cycle_interval_secs == 0 {
            return Err(Error::Config("CYCLE_INTERVAL_SECS must be positive".into()));
        }

        Ok(Config {
            binance_api_key,
            binance_secret,
            binance_base_url: lookup("BINANCE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http_timeout: Duration::from_secs(parsed(&lookup, "HTTP_TIMEOUT_SECS", 10)?),
            trading_mode,
            paper_slippage_bps: parsed(&lookup, "PAPER_SLIPPAGE_BPS", 10.0)?,
            ledger_backend,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:crossbot.db?mode=rwc".to_string()),
            trade_log_path: lookup("TRADE_LOG_PATH").unwrap_or_else(|| "trades.csv".to_string()),
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategy.toml".to_string()),
            cycle_interval: Duration::from_secs(cycle_interval_secs),
        })
    }
}

fn required<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Result<String> {
    lookup(key).ok_or_else(|| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
    }
}
