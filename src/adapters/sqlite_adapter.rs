//! SQLite store: price series tables plus the trade/signal/config ledger.

use crate::domain::error::LeaptraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::ClosedPosition;
use crate::domain::signals::{Signal, SignalKind};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::ledger_port::LedgerPort;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

/// Series table names come from configuration and cannot be bound as SQL
/// parameters, so restrict them to a safe charset before interpolation.
fn validate_table_name(name: &str) -> Result<(), LeaptraderError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Ok(())
    } else {
        Err(LeaptraderError::InvalidTableName {
            name: name.to_string(),
        })
    }
}

fn parse_row_date(s: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(s.len(), rusqlite::types::Type::Text, Box::new(e))
    })
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LeaptraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| LeaptraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| LeaptraderError::Database {
                    reason: e.to_string(),
                })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, LeaptraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| LeaptraderError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, LeaptraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| LeaptraderError::Database {
                reason: e.to_string(),
            })
    }

    /// Create the ledger tables. Price tables are created on first insert
    /// since their names are data.
    pub fn initialize_schema(&self) -> Result<(), LeaptraderError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_date TEXT NOT NULL,
                exit_date TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL NOT NULL,
                strike REAL NOT NULL,
                entry_premium REAL NOT NULL,
                exit_premium REAL NOT NULL,
                contracts INTEGER NOT NULL,
                pnl REAL NOT NULL,
                notes TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                signal_type TEXT NOT NULL,
                details TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS config (
                run_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                params TEXT NOT NULL
            );",
        )
        .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Insert (or replace) daily bars into the named series table, creating
    /// the table on first use.
    pub fn insert_bars(&self, table: &str, bars: &[OhlcvBar]) -> Result<(), LeaptraderError> {
        validate_table_name(table)?;
        let mut conn = self.conn()?;

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                date TEXT PRIMARY KEY,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL
            )"
        ))
        .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        for bar in bars {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {table} (date, open, high, low, close, volume)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    bar.date.format("%Y-%m-%d").to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool, LeaptraderError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        Ok(count > 0)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_prices(
        &self,
        table: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, LeaptraderError> {
        validate_table_name(table)?;
        let conn = self.conn()?;

        let start_str = start.format("%Y-%m-%d").to_string();
        // Dates compare lexicographically in ISO form; an open end bound
        // becomes the largest representable day.
        let end_str = end
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "9999-12-31".to_string());

        let query = format!(
            "SELECT date, open, high, low, close, volume FROM {table}
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC"
        );

        let mut stmt =
            conn.prepare(&query)
                .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

        let rows = stmt
            .query_map(params![start_str, end_str], |row| {
                let date_str: String = row.get(0)?;
                Ok(OhlcvBar {
                    date: parse_row_date(&date_str)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(
                row.map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?,
            );
        }

        Ok(bars)
    }

    fn fetch_prices_optional(
        &self,
        table: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Option<Vec<OhlcvBar>>, LeaptraderError> {
        validate_table_name(table)?;
        if !self.table_exists(table)? {
            return Ok(None);
        }
        self.fetch_prices(table, start, end).map(Some)
    }

    fn data_range(
        &self,
        table: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LeaptraderError> {
        validate_table_name(table)?;
        if !self.table_exists(table)? {
            return Ok(None);
        }

        let conn = self.conn()?;
        let query = format!("SELECT MIN(date), MAX(date), COUNT(*) FROM {table}");

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(&query, [], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = NaiveDate::parse_from_str(&min_str, "%Y-%m-%d").map_err(
                    |e: chrono::ParseError| LeaptraderError::Database {
                        reason: e.to_string(),
                    },
                )?;
                let max = NaiveDate::parse_from_str(&max_str, "%Y-%m-%d").map_err(
                    |e: chrono::ParseError| LeaptraderError::Database {
                        reason: e.to_string(),
                    },
                )?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl LedgerPort for SqliteAdapter {
    fn save_trade(&self, trade: &ClosedPosition) -> Result<(), LeaptraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trades (entry_date, exit_date, entry_price, exit_price,
                                 strike, entry_premium, exit_premium, contracts, pnl, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                trade.entry_date.format("%Y-%m-%d").to_string(),
                trade.exit_date.format("%Y-%m-%d").to_string(),
                trade.entry_price,
                trade.exit_price,
                trade.strike,
                trade.entry_premium,
                trade.exit_premium,
                trade.contracts,
                trade.pnl,
                trade.notes
            ],
        )
        .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn save_signal(&self, signal: &Signal) -> Result<(), LeaptraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO signals (date, signal_type, details) VALUES (?1, ?2, ?3)",
            params![
                signal.date.format("%Y-%m-%d").to_string(),
                signal.kind.as_str(),
                signal.details
            ],
        )
        .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn clear_trades(&self) -> Result<(), LeaptraderError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM trades", [])
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn clear_signals(&self) -> Result<(), LeaptraderError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM signals", [])
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn save_run_config(&self, run_id: &str, params_text: &str) -> Result<(), LeaptraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO config (run_id, created_at, params)
             VALUES (?1, datetime('now'), ?2)",
            params![run_id, params_text],
        )
        .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn load_trades(&self) -> Result<Vec<ClosedPosition>, LeaptraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT entry_date, exit_date, entry_price, exit_price, strike,
                        entry_premium, exit_premium, contracts, pnl, notes
                 FROM trades ORDER BY entry_date, id",
            )
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                let entry_str: String = row.get(0)?;
                let exit_str: String = row.get(1)?;
                Ok(ClosedPosition {
                    entry_date: parse_row_date(&entry_str)?,
                    exit_date: parse_row_date(&exit_str)?,
                    entry_price: row.get(2)?,
                    exit_price: row.get(3)?,
                    strike: row.get(4)?,
                    entry_premium: row.get(5)?,
                    exit_premium: row.get(6)?,
                    contracts: row.get(7)?,
                    pnl: row.get(8)?,
                    notes: row.get(9)?,
                })
            })
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(
                row.map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?,
            );
        }
        Ok(trades)
    }

    fn load_signals(&self) -> Result<Vec<Signal>, LeaptraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT date, signal_type, details FROM signals ORDER BY date, id")
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                let date_str: String = row.get(0)?;
                let kind_str: String = row.get(1)?;
                let details: String = row.get(2)?;
                Ok((parse_row_date(&date_str)?, kind_str, details))
            })
            .map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut signals = Vec::new();
        for row in rows {
            let (date, kind_str, details) =
                row.map_err(|e: rusqlite::Error| LeaptraderError::DatabaseQuery {
                    reason: e.to_string(),
                })?;
            let kind =
                SignalKind::parse(&kind_str).ok_or_else(|| LeaptraderError::DatabaseQuery {
                    reason: format!("unknown signal type: {kind_str}"),
                })?;
            signals.push(Signal {
                date,
                kind,
                details,
            });
        }
        Ok(signals)
    }
}
