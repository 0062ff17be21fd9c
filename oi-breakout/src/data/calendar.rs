//! Market calendar collaborator.
//!
//! The pipeline never decides on its own whether the market is open: it
//! asks a [`MarketCalendar`] once per day and carries the answer in a
//! [`TradingSession`].

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::CalendarConfig;
use crate::error::{StrategyError, StrategyResult};

/// Regular session hours for one date, `[open, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl MarketHours {
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.open && time < self.close
    }
}

/// Authoritative source of trading days and session hours.
pub trait MarketCalendar: Send + Sync {
    fn is_trading_day(&self, date: NaiveDate) -> StrategyResult<bool>;

    fn market_hours(&self, date: NaiveDate) -> StrategyResult<MarketHours>;
}

/// Why an entry was refused by the session gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionGate {
    /// Weekend or exchange holiday.
    ClosedDay,
    /// Before the open or at/after the close.
    OutsideHours,
    /// Inside the square-off window before the close.
    PastEntryCutoff,
}

/// Calendar facts for one trading date, resolved once per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingSession {
    pub date: NaiveDate,
    pub is_trading_day: bool,
    pub hours: MarketHours,
    /// Open positions are closed at or after this time; no entries either.
    pub eod_cutoff: NaiveTime,
}

impl TradingSession {
    pub fn resolve(
        calendar: &dyn MarketCalendar,
        date: NaiveDate,
        eod_buffer_minutes: i64,
    ) -> StrategyResult<Self> {
        let is_trading_day = calendar.is_trading_day(date)?;
        let hours = calendar.market_hours(date)?;
        let buffer = Duration::minutes(eod_buffer_minutes);
        if buffer < Duration::zero() || buffer >= hours.close.signed_duration_since(hours.open) {
            return Err(StrategyError::config(format!(
                "EOD buffer of {} minutes does not fit the {} session {}-{}",
                eod_buffer_minutes, date, hours.open, hours.close
            )));
        }
        let eod_cutoff = hours.close - buffer;
        Ok(Self {
            date,
            is_trading_day,
            hours,
            eod_cutoff,
        })
    }

    /// Check whether a new position may be opened at `timestamp`.
    pub fn entry_gate(&self, timestamp: NaiveDateTime) -> Result<(), SessionGate> {
        if !self.is_trading_day || timestamp.date() != self.date {
            return Err(SessionGate::ClosedDay);
        }
        let time = timestamp.time();
        if !self.hours.contains(time) {
            return Err(SessionGate::OutsideHours);
        }
        if time >= self.eod_cutoff {
            return Err(SessionGate::PastEntryCutoff);
        }
        Ok(())
    }

    pub fn is_eod(&self, timestamp: NaiveDateTime) -> bool {
        timestamp.date() > self.date || timestamp.time() >= self.eod_cutoff
    }
}

/// Calendar driven by [`CalendarConfig`]: weekends and configured holidays
/// are closed, every other day trades the same fixed session.
#[derive(Debug, Clone)]
pub struct ExchangeCalendar {
    config: CalendarConfig,
    tz: Tz,
}

impl ExchangeCalendar {
    pub fn new(config: CalendarConfig) -> StrategyResult<Self> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|e| StrategyError::config(format!("Unknown timezone {}: {}", config.timezone, e)))?;
        Ok(Self { config, tz })
    }

    /// Convert epoch seconds into exchange-local time.
    pub fn local_from_epoch(&self, epoch_secs: i64) -> Option<NaiveDateTime> {
        self.tz
            .timestamp_opt(epoch_secs, 0)
            .single()
            .map(|dt| dt.naive_local())
    }

    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.config.holidays.contains(&date)
            || self
                .config
                .annual_holidays
                .iter()
                .any(|h| h.month == date.month() && h.day == date.day())
    }
}

impl MarketCalendar for ExchangeCalendar {
    fn is_trading_day(&self, date: NaiveDate) -> StrategyResult<bool> {
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        Ok(!weekend && !self.is_holiday(date))
    }

    fn market_hours(&self, _date: NaiveDate) -> StrategyResult<MarketHours> {
        Ok(MarketHours {
            open: self.config.market_open,
            close: self.config.market_close,
        })
    }
}

/// Trading dates between `start` and `end` (inclusive), per the calendar.
pub fn trading_days(
    calendar: &dyn MarketCalendar,
    start: NaiveDate,
    end: NaiveDate,
) -> StrategyResult<Vec<NaiveDate>> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        if calendar.is_trading_day(current)? {
            days.push(current);
        }
        current += Duration::days(1);
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar() -> ExchangeCalendar {
        let mut config = CalendarConfig::default();
        config.holidays.push(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        ExchangeCalendar::new(config).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_weekends_and_holidays() {
        let cal = calendar();
        // 2024-03-04 is a Monday
        assert!(cal.is_trading_day(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()).unwrap());
        assert!(!cal.is_trading_day(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()).unwrap());
        assert!(!cal.is_trading_day(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()).unwrap());
        assert!(!cal.is_trading_day(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()).unwrap());
        // Independence Day on a Thursday
        assert!(!cal.is_trading_day(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap()).unwrap());
    }

    #[test]
    fn test_trading_days_range() {
        let cal = calendar();
        let days = trading_days(
            &cal,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        )
        .unwrap();
        // Mon-Thu; Friday is a configured holiday
        assert_eq!(days.len(), 4);

        let empty = trading_days(
            &cal,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        )
        .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_entry_gate() {
        let cal = calendar();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let session = TradingSession::resolve(&cal, date, 15).unwrap();

        assert_eq!(session.eod_cutoff, NaiveTime::from_hms_opt(15, 15, 0).unwrap());
        assert_eq!(session.entry_gate(at(date, 9, 0)), Err(SessionGate::OutsideHours));
        assert_eq!(session.entry_gate(at(date, 9, 25)), Ok(()));
        assert_eq!(session.entry_gate(at(date, 15, 20)), Err(SessionGate::PastEntryCutoff));
        assert_eq!(session.entry_gate(at(date, 15, 30)), Err(SessionGate::OutsideHours));
        assert!(!session.is_eod(at(date, 15, 14)));
        assert!(session.is_eod(at(date, 15, 15)));
    }

    #[test]
    fn test_buffer_longer_than_session_rejected() {
        let cal = calendar();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert!(matches!(
            TradingSession::resolve(&cal, date, 375),
            Err(StrategyError::Config(_))
        ));
        assert!(matches!(
            TradingSession::resolve(&cal, date, 1000),
            Err(StrategyError::Config(_))
        ));
        let late = TradingSession::resolve(&cal, date, 374).unwrap();
        assert_eq!(late.eod_cutoff, NaiveTime::from_hms_opt(9, 16, 0).unwrap());
    }

    #[test]
    fn test_closed_day_gate() {
        let cal = calendar();
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let session = TradingSession::resolve(&cal, saturday, 15).unwrap();
        assert_eq!(session.entry_gate(at(saturday, 10, 0)), Err(SessionGate::ClosedDay));
    }

    #[test]
    fn test_epoch_conversion() {
        let cal = calendar();
        // 2024-03-04 03:50:00 UTC == 09:20:00 IST
        let local = cal.local_from_epoch(1_709_524_200).unwrap();
        assert_eq!(local, at(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), 9, 20));
    }

    #[test]
    fn test_unknown_timezone() {
        let config = CalendarConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(matches!(ExchangeCalendar::new(config), Err(StrategyError::Config(_))));
    }
}
