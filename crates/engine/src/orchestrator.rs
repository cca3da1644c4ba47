use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{error, info, warn};

use common::{
    Direction, ExposureQuery, InstrumentSpec, IntentRejection, LedgerEntry, MarketDataSource,
    OrderExecutionSink, OrderIntent, Outcome, PriceBar, Stage, TradeLedger,
};
use risk::{BracketBuilder, Exposure, ExposureGuard};
use strategy::{NoSignalReason, Signal, Strategy, StrategyConfig};

use crate::executor::{BracketError, BracketExecutor, BracketReport};

/// Venue-facing dependencies of the orchestrator. Live trading passes the
/// same Binance client for the three venue roles; tests pass fakes.
#[derive(Clone)]
pub struct Collaborators {
    pub market_data: Arc<dyn MarketDataSource>,
    pub exposure: Arc<dyn ExposureQuery>,
    pub execution: Arc<dyn OrderExecutionSink>,
    pub ledger: Arc<dyn TradeLedger>,
}

/// What the pipeline decided for one instrument in one cycle.
#[derive(Debug)]
pub enum Decision {
    Skipped {
        reason: String,
    },
    NoSignal {
        reason: NoSignalReason,
    },
    ExposureOpen {
        direction: Direction,
    },
    Rejected {
        direction: Direction,
        reason: IntentRejection,
    },
    Failed {
        direction: Option<Direction>,
        stage: Stage,
        reason: String,
    },
    EntryRejected {
        intent: OrderIntent,
        reason: String,
    },
    /// The entry call failed in transport; the venue may hold an
    /// unprotected position.
    EntryUnknown {
        intent: OrderIntent,
        reason: String,
    },
    PartialBracket {
        intent: OrderIntent,
        error: BracketError,
    },
    Submitted {
        intent: OrderIntent,
        report: BracketReport,
    },
}

impl Decision {
    pub fn outcome(&self) -> Outcome {
        match self {
            Decision::Skipped { .. } => Outcome::Skipped,
            Decision::NoSignal { .. } => Outcome::NoSignal,
            Decision::ExposureOpen { .. } => Outcome::ExposureOpen,
            Decision::Rejected { .. } => Outcome::Rejected,
            Decision::Failed { .. } => Outcome::Failed,
            Decision::EntryRejected { .. } => Outcome::EntryRejected,
            Decision::EntryUnknown { .. } => Outcome::EntryUnknown,
            Decision::PartialBracket { .. } => Outcome::PartialBracket,
            Decision::Submitted { .. } => Outcome::Submitted,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Decision::Skipped { .. } => Stage::MarketData,
            Decision::NoSignal { .. } => Stage::Signal,
            Decision::ExposureOpen { .. } => Stage::Exposure,
            Decision::Rejected {
                reason: IntentRejection::Sizing(_),
                ..
            } => Stage::Sizing,
            Decision::Rejected { .. } => Stage::Intent,
            Decision::Failed { stage, .. } => *stage,
            Decision::EntryRejected { .. }
            | Decision::EntryUnknown { .. }
            | Decision::PartialBracket { .. }
            | Decision::Submitted { .. } => Stage::Execution,
        }
    }

    /// The intent, when one was built.
    pub fn intent(&self) -> Option<&OrderIntent> {
        match self {
            Decision::EntryRejected { intent, .. }
            | Decision::EntryUnknown { intent, .. }
            | Decision::PartialBracket { intent, .. }
            | Decision::Submitted { intent, .. } => Some(intent),
            _ => None,
        }
    }

    pub fn ledger_entry(&self, symbol: &str) -> LedgerEntry {
        let detail = match self {
            Decision::Skipped { reason } => reason.clone(),
            Decision::NoSignal { reason } => reason.to_string(),
            Decision::ExposureOpen { .. } => "position already open".to_string(),
            Decision::Rejected { reason, .. } => reason.to_string(),
            Decision::Failed { reason, .. } => reason.clone(),
            Decision::EntryRejected { reason, .. } | Decision::EntryUnknown { reason, .. } => {
                reason.clone()
            }
            Decision::PartialBracket { intent, error } => {
                format!("{}; {}", partial_detail(error), planned(intent))
            }
            Decision::Submitted { intent, report } => format!(
                "entry {} filled at {}; stop {} at {}; target {} at {}; {}",
                report.entry.order_id,
                report
                    .entry
                    .price
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "unknown".into()),
                report.stop.order_id,
                report.stop_price,
                report.target.order_id,
                report.target_price,
                planned(intent),
            ),
        };

        let entry = LedgerEntry::new(symbol, self.outcome(), self.stage(), detail);
        match self {
            Decision::ExposureOpen { direction } | Decision::Rejected { direction, .. } => {
                entry.with_direction(*direction)
            }
            Decision::Failed {
                direction: Some(direction),
                ..
            } => entry.with_direction(*direction),
            Decision::Submitted { intent, report } => entry.with_intent(intent).with_execution(
                report.entry.price,
                report.stop_price,
                report.target_price,
                report.quantity,
            ),
            Decision::PartialBracket {
                intent,
                error:
                    BracketError::Partial {
                        entry: fill,
                        stop_price,
                        target_price,
                        quantity,
                        ..
                    },
            } => entry
                .with_intent(intent)
                .with_execution(fill.price, *stop_price, *target_price, *quantity),
            _ => match self.intent() {
                Some(intent) => entry.with_intent(intent),
                None => entry,
            },
        }
    }
}

fn planned(intent: &OrderIntent) -> String {
    format!(
        "planned entry {} stop {} target {} qty {}",
        intent.entry_price(),
        intent.stop_price(),
        intent.target_price(),
        intent.quantity()
    )
}

fn partial_detail(error: &BracketError) -> String {
    match error {
        BracketError::Partial {
            entry, failures, ..
        } => {
            let legs: Vec<String> = failures
                .iter()
                .map(|(leg, e)| format!("{leg}: {e}"))
                .collect();
            format!(
                "PARTIAL BRACKET: entry {} filled, unprotected ({})",
                entry.order_id,
                legs.join("; ")
            )
        }
        other => other.to_string(),
    }
}

/// Per-cycle summary, in instrument order.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub decisions: Vec<(String, Decision)>,
}

impl CycleReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.decisions
            .iter()
            .filter(|(_, d)| d.outcome() == outcome)
            .count()
    }

    pub fn decision(&self, symbol: &str) -> Option<&Decision> {
        self.decisions
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, d)| d)
    }
}

/// Runs the pipeline (bars → signal → exposure → bracket → execution) for
/// every configured instrument. Instruments are evaluated concurrently and
/// share nothing but read-only configuration and the ledger; a failure in
/// one never reaches another.
pub struct CycleOrchestrator {
    config: StrategyConfig,
    strategy: Arc<dyn Strategy>,
    market_data: Arc<dyn MarketDataSource>,
    guard: ExposureGuard,
    builder: BracketBuilder,
    executor: BracketExecutor,
    ledger: Arc<dyn TradeLedger>,
}

impl CycleOrchestrator {
    pub fn new(
        config: StrategyConfig,
        strategy: Arc<dyn Strategy>,
        collaborators: Collaborators,
    ) -> Self {
        let params = &config.params;
        let builder = BracketBuilder::new(params.risk_budget, params.risk_reward);
        let executor = BracketExecutor::new(collaborators.execution, params.leverage);
        Self {
            strategy,
            market_data: collaborators.market_data,
            guard: ExposureGuard::new(collaborators.exposure),
            builder,
            executor,
            ledger: collaborators.ledger,
            config,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// One pass over all instruments. Each pipeline runs in its own task, so
    /// a bracket in flight completes even if the caller stops waiting.
    pub async fn run_cycle(self: &Arc<Self>) -> CycleReport {
        let handles: Vec<_> = self
            .config
            .instruments
            .iter()
            .cloned()
            .map(|spec| {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let decision = this.evaluate(&spec).await;
                    this.record(&spec.symbol, &decision).await;
                    decision
                })
            })
            .collect();

        let results = join_all(handles).await;

        let mut report = CycleReport::default();
        for (spec, result) in self.config.instruments.iter().zip(results) {
            let decision = match result {
                Ok(decision) => decision,
                Err(e) => {
                    error!(symbol = %spec.symbol, error = %e, "Instrument pipeline task failed");
                    let decision = Decision::Failed {
                        direction: None,
                        stage: Stage::Orchestration,
                        reason: format!("pipeline task failed: {e}"),
                    };
                    self.record(&spec.symbol, &decision).await;
                    decision
                }
            };
            report.decisions.push((spec.symbol.clone(), decision));
        }

        info!(
            instruments = report.decisions.len(),
            submitted = report.count(Outcome::Submitted),
            no_signal = report.count(Outcome::NoSignal),
            skipped = report.count(Outcome::Skipped),
            partial = report.count(Outcome::PartialBracket),
            entry_unknown = report.count(Outcome::EntryUnknown),
            "Cycle complete"
        );
        report
    }

    /// Full pipeline for one instrument. Every failure is turned into a
    /// `Decision`; nothing propagates.
    pub async fn evaluate(&self, spec: &InstrumentSpec) -> Decision {
        let symbol = spec.symbol.as_str();

        let bars = match self.fetch_bars(symbol).await {
            Ok(bars) => bars,
            Err(reason) => {
                warn!(symbol = %symbol, reason = %reason, "Market data unusable, skipping");
                return Decision::Skipped { reason };
            }
        };

        let (direction, entry_ref, stop_ref) = match self.strategy.evaluate(symbol, &bars) {
            Signal::None { reason } => {
                info!(symbol = %symbol, reason = %reason, "No signal");
                return Decision::NoSignal { reason };
            }
            Signal::Long { entry, stop } => (Direction::Long, entry, stop),
            Signal::Short { entry, stop } => (Direction::Short, entry, stop),
        };
        info!(symbol = %symbol, %direction, entry = entry_ref, stop = stop_ref, "Signal");

        match self.guard.check(symbol).await {
            Ok(Exposure::Flat) => {}
            Ok(Exposure::Open) => return Decision::ExposureOpen { direction },
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Exposure query failed, no entry");
                return Decision::Failed {
                    direction: Some(direction),
                    stage: Stage::Exposure,
                    reason: e.to_string(),
                };
            }
        }

        let intent = match self.builder.build(spec, direction, entry_ref, stop_ref) {
            Ok(intent) => intent,
            Err(reason) => {
                warn!(symbol = %symbol, %direction, reason = %reason, "No trade");
                return Decision::Rejected { direction, reason };
            }
        };

        match self.executor.submit(&intent, spec).await {
            Ok(report) => Decision::Submitted { intent, report },
            Err(BracketError::EntryRejected(e)) => Decision::EntryRejected {
                intent,
                reason: e.to_string(),
            },
            Err(BracketError::Leverage(e)) => Decision::Failed {
                direction: Some(direction),
                stage: Stage::Execution,
                reason: format!("leverage not set, nothing submitted: {e}"),
            },
            Err(e @ BracketError::EntryUnknown(_)) => Decision::EntryUnknown {
                intent,
                reason: format!("{e}; reconcile before the next entry"),
            },
            Err(error @ BracketError::Partial { .. }) => Decision::PartialBracket { intent, error },
        }
    }

    async fn fetch_bars(&self, symbol: &str) -> Result<Vec<PriceBar>, String> {
        let bars = self
            .market_data
            .bars(symbol, &self.config.interval, self.config.bar_limit)
            .await
            .map_err(|e| e.to_string())?;
        PriceBar::validate_series(symbol, &bars).map_err(|e| e.to_string())?;
        Ok(bars)
    }

    async fn record(&self, symbol: &str, decision: &Decision) {
        let entry = decision.ledger_entry(symbol);
        if let Err(e) = self.ledger.append(&entry).await {
            error!(
                symbol = %symbol,
                outcome = %entry.outcome,
                error = %e,
                "Failed to append to trade ledger"
            );
        }
    }
}
