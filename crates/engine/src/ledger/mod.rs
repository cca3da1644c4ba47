//! Durable [`common::TradeLedger`] backends.

mod csv_log;
mod sqlite;

pub use csv_log::CsvLedger;
pub use sqlite::SqliteLedger;
