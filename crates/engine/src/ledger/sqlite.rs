use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::info;

use common::{Direction, Error, LedgerEntry, Result, TradeLedger};

/// Trade ledger in a SQLite table (`trade_ledger`). Appends are single
/// INSERTs, so concurrent instruments never interleave partial rows.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Connect to `database_url` and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        let ledger = Self::from_pool(pool).await?;
        info!(url = %database_url, "SQLite trade ledger ready");
        Ok(ledger)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(Self { pool })
    }

    /// All rows in insertion order.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, symbol, outcome, stage, direction,
                   entry, stop, target, quantity, detail
            FROM trade_ledger
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }
}

#[async_trait]
impl TradeLedger for SqliteLedger {
    async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        let text = |d: Option<Decimal>| d.map(|v| v.to_string());

        sqlx::query(
            r#"
            INSERT INTO trade_ledger
                (timestamp, symbol, outcome, stage, direction,
                 entry, stop, target, quantity, detail)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(entry.timestamp.to_rfc3339())
        .bind(&entry.symbol)
        .bind(entry.outcome.as_str())
        .bind(entry.stage.as_str())
        .bind(entry.direction.map(|d| d.to_string()))
        .bind(text(entry.entry))
        .bind(text(entry.stop))
        .bind(text(entry.target))
        .bind(text(entry.quantity))
        .bind(&entry.detail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry> {
    let decimal = |column: &str| -> Result<Option<Decimal>> {
        row.try_get::<Option<String>, _>(column)?
            .map(|s| {
                Decimal::from_str(&s)
                    .map_err(|e| Error::Other(format!("bad decimal '{s}' in {column}: {e}")))
            })
            .transpose()
    };

    let timestamp: String = row.try_get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| Error::Other(format!("bad timestamp '{timestamp}': {e}")))?
        .with_timezone(&Utc);

    Ok(LedgerEntry {
        timestamp,
        symbol: row.try_get("symbol")?,
        outcome: row.try_get::<String, _>("outcome")?.parse()?,
        stage: row.try_get::<String, _>("stage")?.parse()?,
        direction: row
            .try_get::<Option<String>, _>("direction")?
            .map(|d| Direction::from_str(&d))
            .transpose()?,
        entry: decimal("entry")?,
        stop: decimal("stop")?,
        target: decimal("target")?,
        quantity: decimal("quantity")?,
        detail: row.try_get("detail")?,
    })
}
