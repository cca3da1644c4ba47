pub mod config;
pub mod error;
pub mod exchange;
pub mod intent;
pub mod ledger;
pub mod rejection;
pub mod types;

pub use config::{Config, LedgerBackend};
pub use error::{Error, Result};
pub use exchange::{ExposureQuery, MarketDataSource, OrderExecutionSink};
pub use intent::OrderIntent;
pub use ledger::{LedgerEntry, Outcome, Stage, TradeLedger};
pub use rejection::{IntentRejection, SizingRejection};
pub use types::*;
