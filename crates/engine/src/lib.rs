pub mod binance;
pub mod executor;
pub mod ledger;
pub mod orchestrator;
pub mod scheduler;

pub use binance::BinanceFutures;
pub use executor::{BracketError, BracketExecutor, BracketReport, Leg};
pub use ledger::{CsvLedger, SqliteLedger};
pub use orchestrator::{Collaborators, CycleOrchestrator, CycleReport, Decision};
pub use scheduler::CycleScheduler;
