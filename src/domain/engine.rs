//! Day-by-day backtest driver.
//!
//! The engine owns cash, the open/closed position sets, the equity curve, and
//! the signal log. Each simulated day runs a fixed sequence: mark open
//! positions to market, then apply the outcome of [`evaluate_day`] —
//! liquidate, resume, pause, or buy, in that precedence. The buying state and
//! the consecutive-days-above-MA counter are threaded through the loop as
//! plain values.

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

use crate::domain::config::StrategyConfig;
use crate::domain::error::LeaptraderError;
use crate::domain::metrics::{compute_report, BacktestReport};
use crate::domain::ohlcv;
use crate::domain::position::{ClosedPosition, Position, CONTRACT_MULTIPLIER};
use crate::domain::pricing;
use crate::domain::signals::{self, DayIndicators, Signal, SignalKind};
use crate::ports::data_port::DataPort;
use crate::ports::ledger_port::LedgerPort;

pub const END_OF_BACKTEST_REASON: &str = "End of backtest period";

/// Buying state threaded through the day loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineState {
    pub paused: bool,
    pub days_above_ma: u32,
}

/// What the engine does after the mark-to-market step of a day.
#[derive(Debug, Clone, PartialEq)]
pub enum DayAction {
    /// Close every open position and skip the rest of the day.
    LiquidateAll { reason: String },
    /// Suspend buying; no purchase today.
    PauseBuying { reason: String },
    /// Attempt to open a new lot.
    OpenPosition,
    Hold,
}

/// Outcome of one day's rule evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct DayEvaluation {
    /// Resume reason when the paused state cleared this day. Processing
    /// continues into the buy step within the same day.
    pub resumed: Option<String>,
    pub action: DayAction,
    pub state: EngineState,
}

/// Evaluate one day's rules in their fixed precedence:
/// liquidate, then resume (while paused), then the buy-day pause/open gate.
///
/// When the liquidation condition holds but nothing is open, no event fires
/// and the paused flag is left untouched; the rest of the day still runs and
/// a buy may proceed.
pub fn evaluate_day(
    cfg: &StrategyConfig,
    row: &DayIndicators,
    vix_close: Option<f64>,
    state: EngineState,
    has_open_positions: bool,
) -> DayEvaluation {
    let mut state = state;

    if let Some(reason) = signals::should_liquidate(cfg, row) {
        if has_open_positions {
            state.paused = true;
            return DayEvaluation {
                resumed: None,
                action: DayAction::LiquidateAll { reason },
                state,
            };
        }
    }

    let mut resumed = None;
    if state.paused {
        let (reason, counter) = signals::should_resume(cfg, row, state.days_above_ma);
        state.days_above_ma = counter;
        if let Some(reason) = reason {
            state.paused = false;
            resumed = Some(reason);
        }
    }

    let action = if signals::is_buy_day(cfg, row.date) && !state.paused {
        if let Some(reason) = signals::should_pause(cfg, row, vix_close) {
            state.paused = true;
            DayAction::PauseBuying { reason }
        } else {
            DayAction::OpenPosition
        }
    } else {
        DayAction::Hold
    };

    DayEvaluation {
        resumed,
        action,
        state,
    }
}

/// One row of the equity curve.
#[derive(Debug, Clone, PartialEq)]
pub struct EquitySample {
    pub date: NaiveDate,
    pub value: f64,
    pub underlying_price: f64,
    pub open_positions: usize,
}

pub struct BacktestEngine<'a> {
    config: StrategyConfig,
    data: &'a dyn DataPort,
    ledger: &'a dyn LedgerPort,

    cash: f64,
    positions: Vec<Position>,
    closed_positions: Vec<ClosedPosition>,
    equity_curve: Vec<EquitySample>,
    signals: Vec<Signal>,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(config: StrategyConfig, data: &'a dyn DataPort, ledger: &'a dyn LedgerPort) -> Self {
        let cash = config.initial_capital;
        BacktestEngine {
            config,
            data,
            ledger,
            cash,
            positions: Vec::new(),
            closed_positions: Vec::new(),
            equity_curve: Vec::new(),
            signals: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn closed_positions(&self) -> &[ClosedPosition] {
        &self.closed_positions
    }

    /// Notional entry cost of open lots as a percentage of initial capital.
    /// Deliberately not mark-to-market: realized swings on open positions do
    /// not move this gate.
    fn exposure_pct(&self) -> f64 {
        let total_premium: f64 = self.positions.iter().map(|p| p.notional_cost()).sum();
        total_premium / self.config.initial_capital * 100.0
    }

    fn mark_to_market_all(&self, date: NaiveDate, price: f64, history: &[f64]) -> f64 {
        let positions_value: f64 = self
            .positions
            .iter()
            .map(|p| p.mark_to_market(price, date, self.config.risk_free_rate, history))
            .sum();
        self.cash + positions_value
    }

    fn open_position(&mut self, date: NaiveDate, price: f64, history: &[f64]) {
        let strike = pricing::select_strike(price, self.config.strike_moneyness, 1.0);
        let tenor_days = (self.config.time_to_expiry_years * pricing::DAYS_PER_YEAR) as i64;
        let expiry_date = date + Duration::days(tenor_days);

        let premium = pricing::price_contract(
            price,
            strike,
            tenor_days as f64,
            self.config.risk_free_rate,
            history,
        );

        let contract_cost = premium * CONTRACT_MULTIPLIER;
        let contracts = if contract_cost > 0.0 {
            ((self.config.weekly_amount / contract_cost).floor() as i64).max(1)
        } else {
            1
        };
        let total_cost = premium * contracts as f64 * CONTRACT_MULTIPLIER;

        // Insufficient cash is a silent no-op, not an event.
        if total_cost > self.cash {
            return;
        }

        let added_exposure = total_cost / self.config.initial_capital * 100.0;
        if self.exposure_pct() + added_exposure > self.config.max_exposure_pct {
            self.signals.push(Signal {
                date,
                kind: SignalKind::MaxExposure,
                details: "Maximum exposure reached, skipping buy".to_string(),
            });
            return;
        }

        self.positions.push(Position {
            entry_date: date,
            entry_price: price,
            strike,
            entry_premium: premium,
            contracts,
            expiry_date,
        });
        self.cash -= total_cost;

        self.signals.push(Signal {
            date,
            kind: SignalKind::Buy,
            details: format!(
                "Bought {} contracts, strike {:.0}, premium ${:.2}",
                contracts, strike, premium
            ),
        });
    }

    fn close_all_positions(
        &mut self,
        date: NaiveDate,
        price: f64,
        history: &[f64],
        reason: &str,
    ) -> Result<(), LeaptraderError> {
        for position in self.positions.drain(..) {
            let days = position.days_to_expiry(date);
            let exit_premium = if days <= 0 {
                (price - position.strike).max(0.0)
            } else {
                pricing::price_contract(
                    price,
                    position.strike,
                    days as f64,
                    self.config.risk_free_rate,
                    history,
                )
            };

            let closed = position.close(date, price, exit_premium);
            self.cash += closed.proceeds();
            self.ledger.save_trade(&closed)?;
            self.closed_positions.push(closed);
        }

        self.signals.push(Signal {
            date,
            kind: SignalKind::Liquidate,
            details: reason.to_string(),
        });

        Ok(())
    }

    /// Run the full simulation and reduce it to a report.
    ///
    /// Clears prior trade/signal records, loads the price series (empty is
    /// fatal) and the optional volatility-index series, folds the day loop,
    /// force-closes whatever is still open on the final day, and persists the
    /// signal log.
    pub fn run(&mut self) -> Result<BacktestReport, LeaptraderError> {
        let bars = self.data.fetch_prices(
            &self.config.prices_table,
            self.config.start_date,
            self.config.end_date,
        )?;
        if bars.is_empty() {
            return Err(LeaptraderError::NoData {
                table: self.config.prices_table.clone(),
            });
        }

        let vix_closes: HashMap<NaiveDate, f64> = self
            .data
            .fetch_prices_optional(
                &self.config.vix_table,
                self.config.start_date,
                self.config.end_date,
            )?
            .map(|rows| rows.iter().map(|b| (b.date, b.close)).collect())
            .unwrap_or_default();

        self.ledger.clear_trades()?;
        self.ledger.clear_signals()?;

        self.cash = self.config.initial_capital;
        self.positions.clear();
        self.closed_positions.clear();
        self.equity_curve.clear();
        self.signals.clear();

        let indicators = signals::compute_indicators(&bars, self.config.pause_lookback_days);
        let closes = ohlcv::closes(&bars);
        let mut state = EngineState::default();

        for (i, bar) in bars.iter().enumerate() {
            let history = &closes[..=i];

            let value = self.mark_to_market_all(bar.date, bar.close, history);
            self.equity_curve.push(EquitySample {
                date: bar.date,
                value,
                underlying_price: bar.close,
                open_positions: self.positions.len(),
            });

            let evaluation = evaluate_day(
                &self.config,
                &indicators[i],
                vix_closes.get(&bar.date).copied(),
                state,
                !self.positions.is_empty(),
            );
            state = evaluation.state;

            if let Some(reason) = evaluation.resumed {
                self.signals.push(Signal {
                    date: bar.date,
                    kind: SignalKind::Resume,
                    details: reason,
                });
            }

            match evaluation.action {
                DayAction::LiquidateAll { reason } => {
                    self.close_all_positions(bar.date, bar.close, history, &reason)?;
                }
                DayAction::PauseBuying { reason } => {
                    self.signals.push(Signal {
                        date: bar.date,
                        kind: SignalKind::Pause,
                        details: reason,
                    });
                }
                DayAction::OpenPosition => {
                    self.open_position(bar.date, bar.close, history);
                }
                DayAction::Hold => {}
            }
        }

        if !self.positions.is_empty() {
            if let Some(last) = bars.last() {
                self.close_all_positions(last.date, last.close, &closes, END_OF_BACKTEST_REASON)?;
            }
        }

        for signal in &self.signals {
            self.ledger.save_signal(signal)?;
        }

        Ok(compute_report(
            self.config.initial_capital,
            self.equity_curve.clone(),
            &self.closed_positions,
        ))
    }
}
