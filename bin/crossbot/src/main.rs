use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{
    Config, ExposureQuery, LedgerBackend, MarketDataSource, OrderExecutionSink, TradeLedger,
    TradingMode,
};
use engine::{BinanceFutures, Collaborators, CsvLedger, CycleOrchestrator, CycleScheduler, SqliteLedger};
use paper::PaperVenue;
use strategy::{CrossoverStrategy, Strategy, StrategyConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading environment configuration")?;
    let strategy_cfg = StrategyConfig::load(&cfg.strategy_config_path)
        .with_context(|| format!("loading strategy config {}", cfg.strategy_config_path))?;
    info!(
        mode = %cfg.trading_mode,
        interval = %strategy_cfg.interval,
        instruments = strategy_cfg.instruments.len(),
        "Crossbot starting"
    );

    // ── Ledger ────────────────────────────────────────────────────────────────
    let ledger: Arc<dyn TradeLedger> = match cfg.ledger_backend {
        LedgerBackend::Sqlite => Arc::new(
            SqliteLedger::connect(&cfg.database_url)
                .await
                .context("opening SQLite trade ledger")?,
        ),
        LedgerBackend::Csv => Arc::new(
            CsvLedger::open(&cfg.trade_log_path).context("opening CSV trade ledger")?,
        ),
    };

    // ── Venue (injected based on TRADING_MODE) ────────────────────────────────
    let binance = Arc::new(
        BinanceFutures::new(
            &cfg.binance_api_key,
            &cfg.binance_secret,
            &cfg.binance_base_url,
            cfg.http_timeout,
        )
        .context("building Binance client")?,
    );
    let (market_data, exposure, execution) = match cfg.trading_mode {
        TradingMode::Live => {
            warn!("Live trading mode, orders go to Binance futures");
            venue_roles(binance)
        }
        TradingMode::Paper => {
            info!(slippage_bps = cfg.paper_slippage_bps, "Paper trading mode");
            let venue =
                PaperVenue::new(binance, cfg.paper_slippage_bps).context("building paper venue")?;
            venue_roles(Arc::new(venue))
        }
    };

    // ── Orchestrator ──────────────────────────────────────────────────────────
    let strategy: Arc<dyn Strategy> = Arc::new(
        CrossoverStrategy::new(strategy_cfg.params.clone()).context("building strategy")?,
    );
    info!(strategy = strategy.name(), required_bars = strategy.required_bars(), "Strategy loaded");
    let orchestrator = Arc::new(CycleOrchestrator::new(
        strategy_cfg,
        strategy,
        Collaborators {
            market_data,
            exposure,
            execution,
            ledger,
        },
    ));

    // ── Shutdown ──────────────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, finishing current cycle"),
            Err(e) => error!(error = %e, "Cannot listen for ctrl-c, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    let cycles = CycleScheduler::new(orchestrator, cfg.cycle_interval)
        .run(shutdown_rx)
        .await;
    info!(cycles, "Crossbot stopped");
    Ok(())
}

type VenueRoles = (
    Arc<dyn MarketDataSource>,
    Arc<dyn ExposureQuery>,
    Arc<dyn OrderExecutionSink>,
);

/// One venue object serving market data, exposure and execution.
fn venue_roles<V>(venue: Arc<V>) -> VenueRoles
where
    V: MarketDataSource + ExposureQuery + OrderExecutionSink + 'static,
{
    (venue.clone(), venue.clone(), venue)
}
