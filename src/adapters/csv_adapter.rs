//! CSV file data adapter.
//!
//! Reads normalized daily price files (`<dir>/<table>.csv` with a
//! `date,open,high,low,close,volume` header — extra columns such as
//! `adj_close` are ignored) and writes trade/signal exports.

use crate::domain::error::LeaptraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::position::ClosedPosition;
use crate::domain::signals::Signal;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, table: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", table))
    }
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, LeaptraderError> {
    record
        .get(index)
        .ok_or_else(|| LeaptraderError::Database {
            reason: format!("missing {} column", name),
        })?
        .parse()
        .map_err(|e| LeaptraderError::Database {
            reason: format!("invalid {} value: {}", name, e),
        })
}

/// Parse a normalized price CSV. Column order is taken from the header, so
/// files carrying extra columns (adj_close) load fine.
pub fn parse_price_csv(content: &str) -> Result<Vec<OhlcvBar>, LeaptraderError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| LeaptraderError::Database {
            reason: format!("CSV parse error: {}", e),
        })?
        .clone();

    let column = |name: &str| -> Result<usize, LeaptraderError> {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| LeaptraderError::Database {
                reason: format!("missing {} column", name),
            })
    };

    let date_col = column("date")?;
    let open_col = column("open")?;
    let high_col = column("high")?;
    let low_col = column("low")?;
    let close_col = column("close")?;
    let volume_col = column("volume")?;

    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| LeaptraderError::Database {
            reason: format!("CSV parse error: {}", e),
        })?;

        let date_str = record.get(date_col).ok_or_else(|| LeaptraderError::Database {
            reason: "missing date column".into(),
        })?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
            LeaptraderError::Database {
                reason: format!("invalid date format: {}", e),
            }
        })?;

        bars.push(OhlcvBar {
            date,
            open: parse_field(&record, open_col, "open")?,
            high: parse_field(&record, high_col, "high")?,
            low: parse_field(&record, low_col, "low")?,
            close: parse_field(&record, close_col, "close")?,
            volume: parse_field(&record, volume_col, "volume")?,
        });
    }

    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        table: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, LeaptraderError> {
        let path = self.csv_path(table);
        let content = fs::read_to_string(&path).map_err(|e| LeaptraderError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let bars = parse_price_csv(&content)?
            .into_iter()
            .filter(|b| b.date >= start && end.is_none_or(|e| b.date <= e))
            .collect();
        Ok(bars)
    }

    fn fetch_prices_optional(
        &self,
        table: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Option<Vec<OhlcvBar>>, LeaptraderError> {
        if !self.csv_path(table).exists() {
            return Ok(None);
        }
        self.fetch_prices(table, start, end).map(Some)
    }

    fn data_range(
        &self,
        table: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LeaptraderError> {
        if !self.csv_path(table).exists() {
            return Ok(None);
        }
        let bars = self.fetch_prices(table, NaiveDate::MIN, None)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, bars.len()))),
            _ => Ok(None),
        }
    }
}

/// Write the trade ledger as CSV.
pub fn export_trades_csv(path: &Path, trades: &[ClosedPosition]) -> Result<(), LeaptraderError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| LeaptraderError::Database {
        reason: format!("failed to write {}: {}", path.display(), e),
    })?;

    wtr.write_record([
        "entry_date",
        "exit_date",
        "entry_price",
        "exit_price",
        "strike",
        "entry_premium",
        "exit_premium",
        "contracts",
        "pnl",
        "notes",
    ])
    .map_err(|e| LeaptraderError::Database {
        reason: e.to_string(),
    })?;

    for trade in trades {
        wtr.write_record([
            trade.entry_date.format("%Y-%m-%d").to_string(),
            trade.exit_date.format("%Y-%m-%d").to_string(),
            trade.entry_price.to_string(),
            trade.exit_price.to_string(),
            trade.strike.to_string(),
            trade.entry_premium.to_string(),
            trade.exit_premium.to_string(),
            trade.contracts.to_string(),
            trade.pnl.to_string(),
            trade.notes.clone(),
        ])
        .map_err(|e| LeaptraderError::Database {
            reason: e.to_string(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write the signal log as CSV.
pub fn export_signals_csv(path: &Path, signals: &[Signal]) -> Result<(), LeaptraderError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| LeaptraderError::Database {
        reason: format!("failed to write {}: {}", path.display(), e),
    })?;

    wtr.write_record(["date", "signal_type", "details"])
        .map_err(|e| LeaptraderError::Database {
            reason: e.to_string(),
        })?;

    for signal in signals {
        wtr.write_record([
            signal.date.format("%Y-%m-%d").to_string(),
            signal.kind.as_str().to_string(),
            signal.details.clone(),
        ])
        .map_err(|e| LeaptraderError::Database {
            reason: e.to_string(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}
