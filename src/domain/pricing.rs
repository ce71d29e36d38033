//! Synthetic option valuation: trailing historical volatility feeding a
//! closed-form Black-Scholes call pricer. No live option market exists for the
//! simulated contracts, so every premium in the system comes from here.

use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

/// Fallback when the price history cannot support a volatility estimate.
pub const DEFAULT_VOLATILITY: f64 = 0.20;
/// Trailing window used when pricing contracts.
pub const VOL_WINDOW: usize = 30;
/// Calendar days per year, for tenor conversion.
pub const DAYS_PER_YEAR: f64 = 365.0;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

fn norm_cdf(x: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).unwrap();
    normal.cdf(x)
}

fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

fn d1(spot: f64, strike: f64, t: f64, rate: f64, sigma: f64) -> f64 {
    ((spot / strike).ln() + (rate + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Annualized volatility from log returns over the trailing `window + 1`
/// closes. The window shrinks when history is shorter; with fewer than two
/// observations (or a flat series) the estimate degrades to
/// [`DEFAULT_VOLATILITY`] instead of failing.
pub fn estimate_volatility(prices: &[f64], window: usize) -> f64 {
    if prices.len() < 2 {
        return DEFAULT_VOLATILITY;
    }

    let window = window.min(prices.len() - 1);
    if window == 0 {
        return DEFAULT_VOLATILITY;
    }

    let slice = &prices[prices.len() - window - 1..];
    let returns: Vec<f64> = slice.windows(2).map(|w| (w[1] / w[0]).ln()).collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let volatility = variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt();

    if volatility > 0.0 {
        volatility
    } else {
        DEFAULT_VOLATILITY
    }
}

/// Black-Scholes call price. At or past expiry this is the intrinsic value
/// `max(spot - strike, 0)`.
pub fn price_call(spot: f64, strike: f64, t_years: f64, rate: f64, sigma: f64) -> f64 {
    if t_years <= 0.0 {
        return (spot - strike).max(0.0);
    }

    let d1 = d1(spot, strike, t_years, rate, sigma);
    let d2 = d1 - sigma * t_years.sqrt();

    spot * norm_cdf(d1) - strike * (-rate * t_years).exp() * norm_cdf(d2)
}

/// Strike for a given moneyness offset, rounded to the strike spacing.
/// Positive moneyness is out-of-the-money for a call.
pub fn select_strike(spot: f64, moneyness_pct: f64, spacing: f64) -> f64 {
    let target = spot * (1.0 + moneyness_pct / 100.0);
    (target / spacing).round() * spacing
}

/// Premium for one contract: converts days to a calendar-year fraction,
/// estimates volatility from the supplied close history, and prices the call.
pub fn price_contract(
    spot: f64,
    strike: f64,
    days_to_expiry: f64,
    rate: f64,
    price_history: &[f64],
) -> f64 {
    let t = days_to_expiry / DAYS_PER_YEAR;
    if t <= 0.0 {
        return (spot - strike).max(0.0);
    }

    let sigma = estimate_volatility(price_history, VOL_WINDOW);
    price_call(spot, strike, t, rate, sigma)
}

/// First-order call option sensitivities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
}

/// Call Greeks; degenerate at expiry (delta collapses to 0 or 1).
pub fn call_greeks(spot: f64, strike: f64, t_years: f64, rate: f64, sigma: f64) -> Greeks {
    if t_years <= 0.0 {
        return Greeks {
            delta: if spot > strike { 1.0 } else { 0.0 },
            gamma: 0.0,
            theta: 0.0,
            vega: 0.0,
        };
    }

    let d1 = d1(spot, strike, t_years, rate, sigma);
    let d2 = d1 - sigma * t_years.sqrt();

    let delta = norm_cdf(d1);
    let gamma = norm_pdf(d1) / (spot * sigma * t_years.sqrt());
    let theta = (-spot * norm_pdf(d1) * sigma / (2.0 * t_years.sqrt())
        - rate * strike * (-rate * t_years).exp() * norm_cdf(d2))
        / DAYS_PER_YEAR;
    let vega = spot * norm_pdf(d1) * t_years.sqrt() / 100.0;

    Greeks {
        delta,
        gamma,
        theta,
        vega,
    }
}
