#![allow(dead_code)]

use chrono::NaiveDate;
use leaptrader::domain::config::StrategyConfig;
use leaptrader::domain::error::LeaptraderError;
pub use leaptrader::domain::ohlcv::OhlcvBar;
use leaptrader::domain::position::ClosedPosition;
use leaptrader::domain::signals::Signal;
use leaptrader::ports::data_port::DataPort;
use leaptrader::ports::ledger_port::LedgerPort;
use std::cell::RefCell;
use std::collections::HashMap;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bars on consecutive calendar days starting 2020-01-01 (a Wednesday).
pub fn make_bars(closes: &[f64]) -> Vec<OhlcvBar> {
    let start = date(2020, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000_000.0,
        })
        .collect()
}

/// Upward-drifting series with a deterministic wiggle, so the volatility
/// estimator has something to chew on.
pub fn drifting_series(days: usize) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..days)
        .map(|i| 400.0 * (1.0 + 0.0005 * i as f64) * (1.0 + 0.01 * (i as f64 * 0.7).sin()))
        .collect();
    make_bars(&closes)
}

/// `flat` days at 500 followed by a linear slide to `target`.
pub fn decline_series(flat: usize, slide: usize, target: f64) -> Vec<OhlcvBar> {
    let mut closes = vec![500.0; flat];
    for i in 0..slide {
        closes.push(500.0 + (target - 500.0) * (i + 1) as f64 / slide as f64);
    }
    make_bars(&closes)
}

/// Linear rise from 400 to 500 then symmetric fall back to 400.
pub fn rise_fall_series(half: usize) -> Vec<OhlcvBar> {
    let mut closes: Vec<f64> = (0..half)
        .map(|i| 400.0 + 100.0 * (i + 1) as f64 / half as f64)
        .collect();
    closes.extend((0..half).map(|i| 500.0 - 100.0 * (i + 1) as f64 / half as f64));
    make_bars(&closes)
}

/// In-memory data port keyed by table name.
pub struct MockDataPort {
    pub tables: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_table(mut self, table: &str, bars: Vec<OhlcvBar>) -> Self {
        self.tables.insert(table.to_string(), bars);
        self
    }

    pub fn with_error(mut self, table: &str, reason: &str) -> Self {
        self.errors.insert(table.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        table: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, LeaptraderError> {
        if let Some(reason) = self.errors.get(table) {
            return Err(LeaptraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .tables
            .get(table)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && end.is_none_or(|e| b.date <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_prices_optional(
        &self,
        table: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Option<Vec<OhlcvBar>>, LeaptraderError> {
        if self.errors.contains_key(table) {
            return self.fetch_prices(table, start, end).map(Some);
        }
        if !self.tables.contains_key(table) {
            return Ok(None);
        }
        self.fetch_prices(table, start, end).map(Some)
    }

    fn data_range(
        &self,
        table: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LeaptraderError> {
        match self.tables.get(table) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

/// In-memory ledger capturing everything the engine persists.
pub struct MemoryLedger {
    pub trades: RefCell<Vec<ClosedPosition>>,
    pub signals: RefCell<Vec<Signal>>,
    pub configs: RefCell<Vec<(String, String)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            trades: RefCell::new(Vec::new()),
            signals: RefCell::new(Vec::new()),
            configs: RefCell::new(Vec::new()),
        }
    }
}

impl LedgerPort for MemoryLedger {
    fn save_trade(&self, trade: &ClosedPosition) -> Result<(), LeaptraderError> {
        self.trades.borrow_mut().push(trade.clone());
        Ok(())
    }

    fn save_signal(&self, signal: &Signal) -> Result<(), LeaptraderError> {
        self.signals.borrow_mut().push(signal.clone());
        Ok(())
    }

    fn clear_trades(&self) -> Result<(), LeaptraderError> {
        self.trades.borrow_mut().clear();
        Ok(())
    }

    fn clear_signals(&self) -> Result<(), LeaptraderError> {
        self.signals.borrow_mut().clear();
        Ok(())
    }

    fn save_run_config(&self, run_id: &str, params: &str) -> Result<(), LeaptraderError> {
        self.configs
            .borrow_mut()
            .push((run_id.to_string(), params.to_string()));
        Ok(())
    }

    fn load_trades(&self) -> Result<Vec<ClosedPosition>, LeaptraderError> {
        Ok(self.trades.borrow().clone())
    }

    fn load_signals(&self) -> Result<Vec<Signal>, LeaptraderError> {
        Ok(self.signals.borrow().clone())
    }
}

/// Config whose date range covers every synthetic series above.
pub fn test_config() -> StrategyConfig {
    StrategyConfig {
        start_date: date(2020, 1, 1),
        end_date: None,
        ..StrategyConfig::default()
    }
}
