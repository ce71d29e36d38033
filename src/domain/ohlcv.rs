//! Daily OHLCV bar representation.
//!
//! A series is identified by the store table it came from (`prices`, `vix`),
//! so the bar itself carries only the date and the quote fields.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Extract the close series from a slice of bars.
pub fn closes(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 470.0,
            high: 475.0,
            low: 468.0,
            close: 473.5,
            volume: 80_000_000.0,
        }
    }

    #[test]
    fn bar_fields() {
        let bar = sample_bar();
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!((bar.close - 473.5).abs() < f64::EPSILON);
    }

    #[test]
    fn closes_preserves_order() {
        let mut bars = vec![sample_bar(), sample_bar()];
        bars[1].date = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        bars[1].close = 474.0;
        assert_eq!(closes(&bars), vec![473.5, 474.0]);
    }
}
