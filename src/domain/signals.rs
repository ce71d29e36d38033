//! Technical indicators and the pause/liquidate/resume/buy-day predicates.
//!
//! Indicators that lack sufficient trailing history are `None`, and every
//! predicate treats `None` as not evaluable: the condition does not trigger.
//! The consecutive-days-above-MA counter is threaded through
//! [`should_resume`] explicitly, so the predicates stay pure functions of
//! their arguments.

use chrono::{Datelike, NaiveDate};

use crate::domain::config::StrategyConfig;
use crate::domain::ohlcv::OhlcvBar;

const SHORT_MA_DAYS: usize = 50;
const LONG_MA_DAYS: usize = 200;

/// Category of an emitted signal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Buy,
    Pause,
    Resume,
    Liquidate,
    MaxExposure,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Buy => "BUY",
            SignalKind::Pause => "PAUSE",
            SignalKind::Resume => "RESUME",
            SignalKind::Liquidate => "LIQUIDATE",
            SignalKind::MaxExposure => "MAX_EXPOSURE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(SignalKind::Buy),
            "PAUSE" => Some(SignalKind::Pause),
            "RESUME" => Some(SignalKind::Resume),
            "LIQUIDATE" => Some(SignalKind::Liquidate),
            "MAX_EXPOSURE" => Some(SignalKind::MaxExposure),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the append-only signal log.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub date: NaiveDate,
    pub kind: SignalKind,
    pub details: String,
}

/// One day's indicator values.
#[derive(Debug, Clone, PartialEq)]
pub struct DayIndicators {
    pub date: NaiveDate,
    pub close: f64,
    pub ma_50: Option<f64>,
    pub ma_200: Option<f64>,
    pub rolling_high: Option<f64>,
    pub drawdown_pct: Option<f64>,
    pub pct_from_200ma: Option<f64>,
    pub death_cross: Option<bool>,
}

fn rolling_mean(closes: &[f64], i: usize, window: usize) -> Option<f64> {
    if i + 1 < window {
        return None;
    }
    let slice = &closes[i + 1 - window..=i];
    Some(slice.iter().sum::<f64>() / window as f64)
}

fn rolling_max(closes: &[f64], i: usize, window: usize) -> Option<f64> {
    if i + 1 < window {
        return None;
    }
    closes[i + 1 - window..=i]
        .iter()
        .copied()
        .fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |a| a.max(v)))
        })
}

/// Compute the full indicator table for a price series. The rolling-high
/// window is the configured pause lookback.
pub fn compute_indicators(bars: &[OhlcvBar], pause_lookback_days: usize) -> Vec<DayIndicators> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let ma_50 = rolling_mean(&closes, i, SHORT_MA_DAYS);
            let ma_200 = rolling_mean(&closes, i, LONG_MA_DAYS);
            let rolling_high = rolling_max(&closes, i, pause_lookback_days);

            let drawdown_pct = rolling_high.map(|high| (bar.close - high) / high * 100.0);
            let pct_from_200ma = ma_200.map(|ma| (bar.close - ma) / ma * 100.0);
            let death_cross = match (ma_50, ma_200) {
                (Some(short), Some(long)) => Some(short < long),
                _ => None,
            };

            DayIndicators {
                date: bar.date,
                close: bar.close,
                ma_50,
                ma_200,
                rolling_high,
                drawdown_pct,
                pct_from_200ma,
                death_cross,
            }
        })
        .collect()
}

/// Pause check, evaluated on buy days only: drawdown from the lookback high,
/// or the volatility index closing above its threshold when a reading exists
/// for this date.
pub fn should_pause(
    cfg: &StrategyConfig,
    row: &DayIndicators,
    vix_close: Option<f64>,
) -> Option<String> {
    if let Some(dd) = row.drawdown_pct {
        if dd <= -cfg.pause_drawdown_pct {
            return Some(format!("Drawdown {:.1}% exceeds threshold", dd));
        }
    }

    if let Some(vix) = vix_close {
        if vix > cfg.vix_threshold {
            return Some(format!(
                "VIX {:.1} exceeds threshold {}",
                vix, cfg.vix_threshold
            ));
        }
    }

    None
}

/// Liquidation check, evaluated every day regardless of pause state.
pub fn should_liquidate(cfg: &StrategyConfig, row: &DayIndicators) -> Option<String> {
    if let Some(pct) = row.pct_from_200ma {
        if pct <= -cfg.liquidate_pct_from_200ma {
            return Some(format!("Price {:.1}% below 200-day MA", pct));
        }
    }

    if let Some(dd) = row.drawdown_pct {
        if dd <= -cfg.liquidate_pct_from_peak {
            return Some(format!(
                "Drawdown {:.1}% from peak exceeds liquidation threshold",
                dd
            ));
        }
    }

    if cfg.use_death_cross && row.death_cross == Some(true) {
        return Some("Death cross detected (50-day MA < 200-day MA)".to_string());
    }

    None
}

/// Resume check, meaningful only while paused. Returns the triggered reason
/// (if any) and the updated consecutive-days counter.
pub fn should_resume(
    cfg: &StrategyConfig,
    row: &DayIndicators,
    days_above_ma: u32,
) -> (Option<String>, u32) {
    let mut counter = days_above_ma;

    if let Some(ma) = row.ma_200 {
        if row.close > ma {
            counter += 1;
            if counter >= cfg.resume_consec_days {
                return (
                    Some(format!(
                        "Price above 200-day MA for {} consecutive days",
                        cfg.resume_consec_days
                    )),
                    0,
                );
            }
        } else {
            counter = 0;
        }
    }

    if let Some(dd) = row.drawdown_pct {
        if dd >= -cfg.resume_pct {
            return (Some(format!("Drawdown recovered to {:.1}%", dd)), counter);
        }
    }

    (None, counter)
}

/// True iff the date falls on the configured buy weekday (Monday = 0).
pub fn is_buy_day(cfg: &StrategyConfig, date: NaiveDate) -> bool {
    date.weekday().num_days_from_monday() == cfg.buy_weekday
}
