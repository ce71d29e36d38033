//! Open and closed contract lots.
//!
//! A [`Position`] is created only by the engine's open action and consumed
//! exactly once by [`Position::close`]; lots are never partially closed.

use chrono::NaiveDate;

use crate::domain::pricing;

/// Shares controlled by one option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// One open contract lot.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub strike: f64,
    pub entry_premium: f64,
    pub contracts: i64,
    pub expiry_date: NaiveDate,
}

impl Position {
    pub fn days_to_expiry(&self, on: NaiveDate) -> i64 {
        (self.expiry_date - on).num_days()
    }

    /// Entry cost of the lot; the exposure gate sums this across open lots.
    pub fn notional_cost(&self) -> f64 {
        self.entry_premium * self.contracts as f64 * CONTRACT_MULTIPLIER
    }

    /// Current value of the lot: the contract repriced at today's spot with
    /// the history available so far, intrinsic once expired.
    pub fn mark_to_market(
        &self,
        spot: f64,
        on: NaiveDate,
        risk_free_rate: f64,
        price_history: &[f64],
    ) -> f64 {
        let days = self.days_to_expiry(on);
        let premium = if days <= 0 {
            (spot - self.strike).max(0.0)
        } else {
            pricing::price_contract(spot, self.strike, days as f64, risk_free_rate, price_history)
        };
        premium * self.contracts as f64 * CONTRACT_MULTIPLIER
    }

    /// Close the lot, realizing P&L against the exit premium.
    pub fn close(self, exit_date: NaiveDate, exit_price: f64, exit_premium: f64) -> ClosedPosition {
        let pnl = (exit_premium - self.entry_premium) * self.contracts as f64 * CONTRACT_MULTIPLIER;
        ClosedPosition {
            entry_date: self.entry_date,
            exit_date,
            entry_price: self.entry_price,
            exit_price,
            strike: self.strike,
            entry_premium: self.entry_premium,
            exit_premium,
            contracts: self.contracts,
            pnl,
            notes: String::new(),
        }
    }
}

/// A fully closed lot, as persisted to the trade ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub strike: f64,
    pub entry_premium: f64,
    pub exit_premium: f64,
    pub contracts: i64,
    pub pnl: f64,
    pub notes: String,
}

impl ClosedPosition {
    pub fn proceeds(&self) -> f64 {
        self.exit_premium * self.contracts as f64 * CONTRACT_MULTIPLIER
    }
}
