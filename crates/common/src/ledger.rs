use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Direction, Error, OrderIntent, Result};

/// What happened to one instrument in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Market data could not be used; instrument skipped.
    Skipped,
    NoSignal,
    /// Signal present but a position is already open.
    ExposureOpen,
    /// Sizing or intent construction declined the trade.
    Rejected,
    /// A venue call failed before any order was placed.
    Failed,
    /// The entry leg was rejected. Nothing is open.
    EntryRejected,
    /// The entry call failed in transport. A position may be open without
    /// protection. Needs manual attention.
    EntryUnknown,
    /// The entry filled but a protective leg did not. Needs manual attention.
    PartialBracket,
    Submitted,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::NoSignal => "no_signal",
            Outcome::ExposureOpen => "exposure_open",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
            Outcome::EntryRejected => "entry_rejected",
            Outcome::EntryUnknown => "entry_unknown",
            Outcome::PartialBracket => "partial_bracket",
            Outcome::Submitted => "submitted",
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            Outcome::Skipped,
            Outcome::NoSignal,
            Outcome::ExposureOpen,
            Outcome::Rejected,
            Outcome::Failed,
            Outcome::EntryRejected,
            Outcome::EntryUnknown,
            Outcome::PartialBracket,
            Outcome::Submitted,
        ]
        .into_iter()
        .find(|o| o.as_str() == s)
        .ok_or_else(|| Error::Other(format!("unknown outcome '{s}'")))
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage an outcome was decided at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MarketData,
    Signal,
    Exposure,
    Sizing,
    Intent,
    Execution,
    /// The instrument's pipeline task itself failed.
    Orchestration,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::MarketData => "market_data",
            Stage::Signal => "signal",
            Stage::Exposure => "exposure",
            Stage::Sizing => "sizing",
            Stage::Intent => "intent",
            Stage::Execution => "execution",
            Stage::Orchestration => "orchestration",
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            Stage::MarketData,
            Stage::Signal,
            Stage::Exposure,
            Stage::Sizing,
            Stage::Intent,
            Stage::Execution,
            Stage::Orchestration,
        ]
        .into_iter()
        .find(|st| st.as_str() == s)
        .ok_or_else(|| Error::Other(format!("unknown stage '{s}'")))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger row. Enough context to reconstruct the decision offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub outcome: Outcome,
    pub stage: Stage,
    pub direction: Option<Direction>,
    pub entry: Option<Decimal>,
    pub stop: Option<Decimal>,
    pub target: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub detail: String,
}

impl LedgerEntry {
    pub fn new(
        symbol: impl Into<String>,
        outcome: Outcome,
        stage: Stage,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            symbol: symbol.into(),
            outcome,
            stage,
            direction: None,
            entry: None,
            stop: None,
            target: None,
            quantity: None,
            detail: detail.into(),
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Fill price columns from a built intent.
    pub fn with_intent(mut self, intent: &OrderIntent) -> Self {
        self.direction = Some(intent.direction());
        self.entry = Some(intent.entry_price());
        self.stop = Some(intent.stop_price());
        self.target = Some(intent.target_price());
        self.quantity = Some(intent.quantity());
        self
    }

    /// Overwrite the price columns with what went to the venue after the
    /// entry filled. A missing fill price keeps the entry column as is.
    pub fn with_execution(
        mut self,
        fill_price: Option<Decimal>,
        stop: Decimal,
        target: Decimal,
        quantity: Decimal,
    ) -> Self {
        if let Some(price) = fill_price {
            self.entry = Some(price);
        }
        self.stop = Some(stop);
        self.target = Some(target);
        self.quantity = Some(quantity);
        self
    }
}

/// Append-only decision log. Implementations must tolerate concurrent
/// appends from instruments evaluated in parallel.
#[async_trait]
pub trait TradeLedger: Send + Sync {
    async fn append(&self, entry: &LedgerEntry) -> Result<()>;
}
