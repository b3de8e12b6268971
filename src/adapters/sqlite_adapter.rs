//! SQLite market data store.

use crate::domain::error::BottomscanError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::Instrument;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::debug;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: r2d2::Error) -> BottomscanError {
    BottomscanError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> BottomscanError {
    BottomscanError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BottomscanError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| BottomscanError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_count("sqlite", "pool_size", 4).max(1) as u32;
        let busy_timeout = config.get_millis("sqlite", "busy_timeout_ms", 5000);

        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(move |conn| conn.busy_timeout(busy_timeout));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        debug!(path = %db_path, pool_size, "sqlite pool ready");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, BottomscanError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, BottomscanError> {
        self.pool.get().map_err(db_err)
    }

    pub fn initialize_schema(&self) -> Result<(), BottomscanError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS instruments (
                    code TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    position INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS ohlcv (
                    code TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    PRIMARY KEY (code, date)
                );
                CREATE INDEX IF NOT EXISTS idx_ohlcv_date ON ohlcv(date);",
            )
            .map_err(query_err)
    }

    /// Replaces the instrument listing; list order becomes scan order.
    pub fn replace_instruments(&self, instruments: &[Instrument]) -> Result<(), BottomscanError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute("DELETE FROM instruments", []).map_err(query_err)?;
        for (position, instrument) in instruments.iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO instruments (code, name, position) VALUES (?1, ?2, ?3)",
                params![instrument.code, instrument.name, position as i64],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    pub fn insert_bars(&self, code: &str, bars: &[OhlcvBar]) -> Result<(), BottomscanError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (code, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    code,
                    bar.date.format("%Y-%m-%d").to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }
}

impl MarketDataPort for SqliteAdapter {
    fn list_instruments(&self) -> Result<Vec<Instrument>, BottomscanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT code, name FROM instruments ORDER BY position, code")
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| Ok(Instrument::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn fetch_daily_bars(
        &self,
        code: &str,
        as_of: NaiveDate,
        lookback: usize,
    ) -> Result<Vec<OhlcvBar>, BottomscanError> {
        let conn = self.conn()?;
        let as_of_str = as_of.format("%Y-%m-%d").to_string();

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM ohlcv
                 WHERE code = ?1 AND date <= ?2
                 ORDER BY date DESC
                 LIMIT ?3",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![code, as_of_str, lookback as i64], |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(OhlcvBar {
                    date,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(query_err)?;

        let mut bars = rows.collect::<Result<Vec<_>, _>>().map_err(query_err)?;
        bars.reverse();
        Ok(bars)
    }
}
