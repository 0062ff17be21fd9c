//! Strategy and market-calendar configuration.
//!
//! All fields have defaults matching the production strategy, so a config
//! file only needs to list what it overrides.

use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{StrategyError, StrategyResult};

/// Every position is exactly one lot.
pub const LOT_QUANTITY: u32 = 1;

/// Parameters of the open-interest breakout strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Underlying index name (e.g., "NIFTY").
    pub underlying: String,

    /// Local time at which the baseline strikes and premiums are captured.
    pub reference_time: NaiveTime,

    /// Minimum premium rise over baseline to trigger entry (0.10 = 10%).
    pub breakout_threshold: Decimal,

    /// Stoploss distance as a fraction of entry premium (0.20 = 20%).
    pub stoploss_pct: Decimal,

    /// Target distance in multiples of the stoploss distance.
    pub reward_risk: Decimal,

    /// Maximum holding time before a forced exit.
    pub max_hold_minutes: i64,

    /// Positions are squared off this many minutes before market close.
    pub eod_exit_buffer_minutes: i64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            underlying: "NIFTY".to_string(),
            reference_time: NaiveTime::from_hms_opt(9, 20, 0).unwrap_or_default(),
            breakout_threshold: Decimal::new(10, 2),
            stoploss_pct: Decimal::new(20, 2),
            reward_risk: Decimal::from(2),
            max_hold_minutes: 30,
            eod_exit_buffer_minutes: 15,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> StrategyResult<()> {
        if self.breakout_threshold <= Decimal::ZERO {
            return Err(StrategyError::config("breakout_threshold must be positive"));
        }
        if self.stoploss_pct <= Decimal::ZERO || self.stoploss_pct >= Decimal::ONE {
            return Err(StrategyError::config("stoploss_pct must be in (0, 1)"));
        }
        if self.reward_risk <= Decimal::ZERO {
            return Err(StrategyError::config("reward_risk must be positive"));
        }
        if self.max_hold_minutes <= 0 {
            return Err(StrategyError::config("max_hold_minutes must be positive"));
        }
        if self.eod_exit_buffer_minutes < 0 {
            return Err(StrategyError::config(
                "eod_exit_buffer_minutes must not be negative",
            ));
        }
        Ok(())
    }
}

/// A holiday that falls on the same calendar day every year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualHoliday {
    pub month: u32,
    pub day: u32,
}

/// Exchange session and holiday configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA timezone of the exchange.
    pub timezone: String,
    /// Regular session open (local time).
    pub market_open: NaiveTime,
    /// Regular session close (local time).
    pub market_close: NaiveTime,
    /// One-off exchange holidays.
    pub holidays: Vec<NaiveDate>,
    /// Holidays observed on the same date every year.
    pub annual_holidays: Vec<AnnualHoliday>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Kolkata".to_string(),
            market_open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            market_close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            holidays: Vec::new(),
            // Republic Day, Independence Day, Gandhi Jayanti, Christmas
            annual_holidays: vec![
                AnnualHoliday { month: 1, day: 26 },
                AnnualHoliday { month: 8, day: 15 },
                AnnualHoliday { month: 10, day: 2 },
                AnnualHoliday { month: 12, day: 25 },
            ],
        }
    }
}

/// Top-level application configuration, loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub calendar: CalendarConfig,
}

impl AppConfig {
    pub fn from_json(json: &str) -> StrategyResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.strategy.validate()?;
        if config.calendar.market_open >= config.calendar.market_close {
            return Err(StrategyError::config("market_open must precede market_close"));
        }
        let session_minutes = config
            .calendar
            .market_close
            .signed_duration_since(config.calendar.market_open)
            .num_minutes();
        if config.strategy.eod_exit_buffer_minutes >= session_minutes {
            return Err(StrategyError::config(format!(
                "eod_exit_buffer_minutes must be shorter than the {} minute session",
                session_minutes
            )));
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> StrategyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
