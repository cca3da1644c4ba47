use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use common::{Error, LedgerEntry, Result, TradeLedger};

const HEADER: [&str; 10] = [
    "timestamp",
    "symbol",
    "outcome",
    "stage",
    "side",
    "entry_price",
    "stop_loss",
    "take_profit",
    "quantity",
    "detail",
];

/// Append-only `trades.csv`. Every decision is a row; the header is written
/// once when the file is created. Each row is flushed before `append`
/// returns.
///
/// File writes run on the blocking pool. The writer sits behind a std
/// mutex, so one row is written and flushed before the next starts.
pub struct CsvLedger {
    path: PathBuf,
    writer: Arc<Mutex<::csv::Writer<File>>>,
}

impl CsvLedger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fresh = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        info!(path = %path.display(), fresh, "CSV trade ledger ready");
        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TradeLedger for CsvLedger {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let text = |d: Option<rust_decimal::Decimal>| d.map(|v| v.to_string()).unwrap_or_default();
        let side = entry
            .direction
            .map(|d| d.entry_side().to_string())
            .unwrap_or_default();

        let record = [
            entry.timestamp.to_rfc3339(),
            entry.symbol.clone(),
            entry.outcome.to_string(),
            entry.stage.to_string(),
            side,
            text(entry.entry),
            text(entry.stop),
            text(entry.target),
            text(entry.quantity),
            entry.detail.clone(),
        ];

        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut writer = writer
                .lock()
                .map_err(|_| Error::Other("CSV ledger writer poisoned".into()))?;
            writer.write_record(&record)?;
            writer.flush()?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Other(format!("CSV ledger write task failed: {e}")))?
    }
}
