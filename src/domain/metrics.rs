//! Performance metrics reduced from the equity curve and closed trades.
//!
//! Ratio-style values are percentages. Sharpe and Sortino use the sample
//! standard deviation of daily returns; Sortino's denominator takes only the
//! negative returns and is zero when fewer than two exist.

use crate::domain::engine::EquitySample;
use crate::domain::position::ClosedPosition;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Result of one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub total_return: f64,
    pub buy_hold_return: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub final_value: f64,
    pub equity_curve: Vec<EquitySample>,
}

pub fn compute_report(
    initial_capital: f64,
    equity_curve: Vec<EquitySample>,
    closed: &[ClosedPosition],
) -> BacktestReport {
    let final_value = equity_curve
        .last()
        .map(|s| s.value)
        .unwrap_or(initial_capital);

    let total_return = (final_value - initial_capital) / initial_capital * 100.0;

    let buy_hold_return = match (equity_curve.first(), equity_curve.last()) {
        (Some(first), Some(last)) if first.underlying_price > 0.0 => {
            (last.underlying_price - first.underlying_price) / first.underlying_price * 100.0
        }
        _ => 0.0,
    };

    let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
    let cagr = if years > 0.0 {
        ((final_value / initial_capital).powf(1.0 / years) - 1.0) * 100.0
    } else {
        0.0
    };

    let max_drawdown = compute_max_drawdown(&equity_curve);

    let winning_trades = closed.iter().filter(|t| t.pnl > 0.0).count();
    let total_trades = closed.len();
    let win_rate = if total_trades > 0 {
        winning_trades as f64 / total_trades as f64 * 100.0
    } else {
        0.0
    };

    let wins: Vec<f64> = closed.iter().map(|t| t.pnl).filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = closed.iter().map(|t| t.pnl).filter(|&p| p < 0.0).collect();
    let avg_win = mean(&wins);
    let avg_loss = mean(&losses);

    let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&equity_curve);

    BacktestReport {
        total_return,
        buy_hold_return,
        cagr,
        max_drawdown,
        win_rate,
        avg_win,
        avg_loss,
        sharpe_ratio,
        sortino_ratio,
        total_trades,
        winning_trades,
        losing_trades: total_trades - winning_trades,
        final_value,
        equity_curve,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1 denominator); zero below two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

/// Minimum of (value − running peak) / running peak, in percent. At most 0.
fn compute_max_drawdown(equity_curve: &[EquitySample]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;

    for sample in equity_curve {
        if sample.value > peak {
            peak = sample.value;
        }
        if peak > 0.0 {
            let dd = (sample.value - peak) / peak * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

fn compute_risk_adjusted(equity_curve: &[EquitySample]) -> (f64, f64) {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].value;
            if prev > 0.0 {
                (w[1].value - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let mean_return = mean(&returns);
    let std = sample_std(&returns);

    let sharpe = if std > 0.0 {
        mean_return / std * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let downside_std = sample_std(&downside);
    let sortino = if downside_std > 0.0 {
        mean_return / downside_std * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
