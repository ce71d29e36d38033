//! Parameter-sweep driver: re-run the backtest across a range of values for
//! one configuration key and collect summary rows.
//!
//! Each run owns an isolated engine; the only shared input is the read-only
//! price history behind the data port. A failure for one value is collected
//! and the sweep continues — one bad parameter must not abort the rest.

use crate::domain::config::StrategyConfig;
use crate::domain::engine::BacktestEngine;
use crate::domain::error::LeaptraderError;
use crate::ports::data_port::DataPort;
use crate::ports::ledger_port::LedgerPort;

/// Summary of one parameter value's run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRow {
    pub parameter: String,
    pub value: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    pub total_trades: usize,
}

/// Rows for the values that ran, plus the values that failed and why.
#[derive(Debug)]
pub struct SweepOutcome {
    pub rows: Vec<SweepRow>,
    pub failures: Vec<(f64, LeaptraderError)>,
}

/// Inclusive numeric range with a positive step.
pub fn sweep_values(min: f64, max: f64, step: f64) -> Result<Vec<f64>, LeaptraderError> {
    if step <= 0.0 || max < min {
        return Err(LeaptraderError::ConfigInvalid {
            section: "sweep".to_string(),
            key: "range".to_string(),
            reason: "step must be positive and max must not be below min".to_string(),
        });
    }
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + 1e-9 {
        values.push(v);
        v += step;
    }
    Ok(values)
}

/// Run the backtest once per value of `parameter`. An unknown parameter name
/// is an error for the whole sweep; a failure for an individual value is
/// isolated into `failures`.
pub fn run_sweep(
    base: &StrategyConfig,
    data: &dyn DataPort,
    ledger: &dyn LedgerPort,
    parameter: &str,
    values: &[f64],
) -> Result<SweepOutcome, LeaptraderError> {
    // Reject typos up front rather than failing every value identically.
    {
        let mut probe = base.clone();
        if let Err(err @ LeaptraderError::UnknownParameter { .. }) =
            probe.apply_override(parameter, values.first().copied().unwrap_or(0.0))
        {
            return Err(err);
        }
    }

    let mut rows = Vec::new();
    let mut failures = Vec::new();

    for &value in values {
        let mut config = base.clone();
        let result = config
            .apply_override(parameter, value)
            .and_then(|_| BacktestEngine::new(config, data, ledger).run());

        match result {
            Ok(report) => rows.push(SweepRow {
                parameter: parameter.to_string(),
                value,
                total_return: report.total_return,
                cagr: report.cagr,
                max_drawdown: report.max_drawdown,
                sharpe_ratio: report.sharpe_ratio,
                win_rate: report.win_rate,
                total_trades: report.total_trades,
            }),
            Err(err) => failures.push((value, err)),
        }
    }

    Ok(SweepOutcome { rows, failures })
}
