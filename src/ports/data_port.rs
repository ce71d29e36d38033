//! Price-series access port trait.

use crate::domain::error::LeaptraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily rows from `table` within the inclusive range, ordered by date.
    fn fetch_prices(
        &self,
        table: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<OhlcvBar>, LeaptraderError>;

    /// Like [`fetch_prices`](Self::fetch_prices), but an absent series is
    /// `Ok(None)` rather than an error. Storage failures still surface as
    /// errors; only "this series does not exist" is the absent variant.
    fn fetch_prices_optional(
        &self,
        table: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Option<Vec<OhlcvBar>>, LeaptraderError>;

    /// First date, last date, and row count for a series, if any rows exist.
    fn data_range(
        &self,
        table: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LeaptraderError>;
}
