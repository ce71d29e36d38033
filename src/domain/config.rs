//! Strategy configuration: defaults, INI round-trip, validation.

use chrono::NaiveDate;

use crate::domain::error::LeaptraderError;
use crate::ports::config_port::ConfigPort;

/// All tunable parameters for one backtest run.
///
/// Thresholds are percentages of the relevant reference value. Weekdays are
/// numbered from Monday = 0.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub weekly_amount: f64,
    pub buy_weekday: u32,
    pub strike_moneyness: f64,

    pub pause_drawdown_pct: f64,
    pub pause_lookback_days: usize,
    pub vix_threshold: f64,

    pub liquidate_pct_from_200ma: f64,
    pub liquidate_pct_from_peak: f64,
    pub use_death_cross: bool,

    pub resume_consec_days: u32,
    pub resume_pct: f64,

    pub max_exposure_pct: f64,

    pub time_to_expiry_years: f64,
    pub risk_free_rate: f64,

    pub initial_capital: f64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,

    pub prices_table: String,
    pub vix_table: String,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            weekly_amount: 1000.0,
            buy_weekday: 4,
            strike_moneyness: 0.0,
            pause_drawdown_pct: 10.0,
            pause_lookback_days: 100,
            vix_threshold: 25.0,
            liquidate_pct_from_200ma: 15.0,
            liquidate_pct_from_peak: 18.0,
            use_death_cross: false,
            resume_consec_days: 15,
            resume_pct: 5.0,
            max_exposure_pct: 10.0,
            time_to_expiry_years: 1.0,
            risk_free_rate: 0.045,
            initial_capital: 100_000.0,
            start_date: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            end_date: None,
            prices_table: "prices".to_string(),
            vix_table: "vix".to_string(),
        }
    }
}

impl StrategyConfig {
    /// Build a config from `[strategy]` and `[backtest]` sections, falling back
    /// to defaults for absent keys. Returns an error for malformed dates.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LeaptraderError> {
        let d = StrategyConfig::default();

        let start_date = match config.get_string("backtest", "start_date") {
            Some(s) => parse_date(&s, "start_date")?,
            None => d.start_date,
        };
        let end_date = match config.get_string("backtest", "end_date") {
            Some(s) => Some(parse_date(&s, "end_date")?),
            None => None,
        };

        let cfg = StrategyConfig {
            weekly_amount: config.get_double("strategy", "weekly_amount", d.weekly_amount),
            buy_weekday: config.get_int("strategy", "buy_weekday", d.buy_weekday as i64) as u32,
            strike_moneyness: config.get_double("strategy", "strike_moneyness", d.strike_moneyness),
            pause_drawdown_pct: config.get_double(
                "strategy",
                "pause_drawdown_pct",
                d.pause_drawdown_pct,
            ),
            pause_lookback_days: config.get_int(
                "strategy",
                "pause_lookback_days",
                d.pause_lookback_days as i64,
            ) as usize,
            vix_threshold: config.get_double("strategy", "vix_threshold", d.vix_threshold),
            liquidate_pct_from_200ma: config.get_double(
                "strategy",
                "liquidate_pct_from_200ma",
                d.liquidate_pct_from_200ma,
            ),
            liquidate_pct_from_peak: config.get_double(
                "strategy",
                "liquidate_pct_from_peak",
                d.liquidate_pct_from_peak,
            ),
            use_death_cross: config.get_bool("strategy", "use_death_cross", d.use_death_cross),
            resume_consec_days: config.get_int(
                "strategy",
                "resume_consec_days",
                d.resume_consec_days as i64,
            ) as u32,
            resume_pct: config.get_double("strategy", "resume_pct", d.resume_pct),
            max_exposure_pct: config.get_double("strategy", "max_exposure_pct", d.max_exposure_pct),
            time_to_expiry_years: config.get_double(
                "strategy",
                "time_to_expiry_years",
                d.time_to_expiry_years,
            ),
            risk_free_rate: config.get_double("backtest", "risk_free_rate", d.risk_free_rate),
            initial_capital: config.get_double("backtest", "initial_capital", d.initial_capital),
            start_date,
            end_date,
            prices_table: config
                .get_string("backtest", "prices_table")
                .unwrap_or(d.prices_table),
            vix_table: config
                .get_string("backtest", "vix_table")
                .unwrap_or(d.vix_table),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), LeaptraderError> {
        validate_positive("strategy", "weekly_amount", self.weekly_amount)?;
        if self.buy_weekday > 6 {
            return Err(invalid(
                "strategy",
                "buy_weekday",
                "buy_weekday must be 0 (Monday) through 6 (Sunday)",
            ));
        }
        if self.pause_lookback_days == 0 {
            return Err(invalid(
                "strategy",
                "pause_lookback_days",
                "pause_lookback_days must be at least 1",
            ));
        }
        if self.resume_consec_days == 0 {
            return Err(invalid(
                "strategy",
                "resume_consec_days",
                "resume_consec_days must be at least 1",
            ));
        }
        validate_positive("strategy", "max_exposure_pct", self.max_exposure_pct)?;
        validate_positive("strategy", "time_to_expiry_years", self.time_to_expiry_years)?;
        if self.risk_free_rate < 0.0 || self.risk_free_rate >= 1.0 {
            return Err(invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be between 0 and 1",
            ));
        }
        validate_positive("backtest", "initial_capital", self.initial_capital)?;
        if let Some(end) = self.end_date {
            if self.start_date >= end {
                return Err(invalid(
                    "backtest",
                    "start_date",
                    "start_date must be before end_date",
                ));
            }
        }
        Ok(())
    }

    /// Flat INI text for run persistence; parses back via `FileConfigAdapter`.
    pub fn to_ini_string(&self) -> String {
        let mut out = String::from("[strategy]\n");
        out.push_str(&format!("weekly_amount = {}\n", self.weekly_amount));
        out.push_str(&format!("buy_weekday = {}\n", self.buy_weekday));
        out.push_str(&format!("strike_moneyness = {}\n", self.strike_moneyness));
        out.push_str(&format!("pause_drawdown_pct = {}\n", self.pause_drawdown_pct));
        out.push_str(&format!("pause_lookback_days = {}\n", self.pause_lookback_days));
        out.push_str(&format!("vix_threshold = {}\n", self.vix_threshold));
        out.push_str(&format!(
            "liquidate_pct_from_200ma = {}\n",
            self.liquidate_pct_from_200ma
        ));
        out.push_str(&format!(
            "liquidate_pct_from_peak = {}\n",
            self.liquidate_pct_from_peak
        ));
        out.push_str(&format!("use_death_cross = {}\n", self.use_death_cross));
        out.push_str(&format!("resume_consec_days = {}\n", self.resume_consec_days));
        out.push_str(&format!("resume_pct = {}\n", self.resume_pct));
        out.push_str(&format!("max_exposure_pct = {}\n", self.max_exposure_pct));
        out.push_str(&format!(
            "time_to_expiry_years = {}\n",
            self.time_to_expiry_years
        ));
        out.push_str("\n[backtest]\n");
        out.push_str(&format!("risk_free_rate = {}\n", self.risk_free_rate));
        out.push_str(&format!("initial_capital = {}\n", self.initial_capital));
        out.push_str(&format!("start_date = {}\n", self.start_date.format("%Y-%m-%d")));
        if let Some(end) = self.end_date {
            out.push_str(&format!("end_date = {}\n", end.format("%Y-%m-%d")));
        }
        out.push_str(&format!("prices_table = {}\n", self.prices_table));
        out.push_str(&format!("vix_table = {}\n", self.vix_table));
        out
    }

    /// Set a numeric parameter by its INI key name. Used by the sweep driver.
    pub fn apply_override(&mut self, name: &str, value: f64) -> Result<(), LeaptraderError> {
        match name {
            "weekly_amount" => self.weekly_amount = value,
            "strike_moneyness" => self.strike_moneyness = value,
            "pause_drawdown_pct" => self.pause_drawdown_pct = value,
            "pause_lookback_days" => self.pause_lookback_days = value as usize,
            "vix_threshold" => self.vix_threshold = value,
            "liquidate_pct_from_200ma" => self.liquidate_pct_from_200ma = value,
            "liquidate_pct_from_peak" => self.liquidate_pct_from_peak = value,
            "resume_consec_days" => self.resume_consec_days = value as u32,
            "resume_pct" => self.resume_pct = value,
            "max_exposure_pct" => self.max_exposure_pct = value,
            "time_to_expiry_years" => self.time_to_expiry_years = value,
            "risk_free_rate" => self.risk_free_rate = value,
            "initial_capital" => self.initial_capital = value,
            _ => {
                return Err(LeaptraderError::UnknownParameter {
                    name: name.to_string(),
                })
            }
        }
        self.validate()
    }
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, LeaptraderError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| LeaptraderError::ConfigInvalid {
        section: "backtest".to_string(),
        key: field.to_string(),
        reason: format!("invalid {} format, expected YYYY-MM-DD", field),
    })
}

fn validate_positive(section: &str, key: &str, value: f64) -> Result<(), LeaptraderError> {
    if value <= 0.0 {
        return Err(invalid(section, key, &format!("{} must be positive", key)));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> LeaptraderError {
    LeaptraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
