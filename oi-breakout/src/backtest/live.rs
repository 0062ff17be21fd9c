//! Live session: the same per-day pipeline fed one polled snapshot at a time.
//!
//! Stopping a session never fabricates a trade. [`LiveSession::shutdown`]
//! hands back a [`SessionState`] with any open position still open, and
//! [`LiveSession::resume`] reconciles it on the next start.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::context::{DayContext, DayState, TickOutcome};
use super::ledger::DaySummary;
use crate::config::StrategyConfig;
use crate::data::{MarketCalendar, OptionChainSnapshot, SnapshotSource};
use crate::error::{StrategyError, StrategyResult};

/// Persistable session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub underlying: String,
    pub day: Option<DayState>,
}

pub struct LiveSession<C> {
    config: StrategyConfig,
    calendar: C,
    day: Option<DayContext>,
    completed: Vec<DaySummary>,
}

impl<C: MarketCalendar> LiveSession<C> {
    pub fn new(config: StrategyConfig, calendar: C) -> Self {
        Self {
            config,
            calendar,
            day: None,
            completed: Vec::new(),
        }
    }

    /// Restart from a saved state as of `today`.
    ///
    /// State from today resumes as-is, including an open position. State
    /// from an earlier day is closed out: its open position exits as EOD
    /// at the last premium seen, and that day's summary is completed.
    pub fn resume(
        state: SessionState,
        config: StrategyConfig,
        calendar: C,
        today: NaiveDate,
    ) -> StrategyResult<Self> {
        if state.underlying != config.underlying {
            return Err(StrategyError::config(format!(
                "Saved session is for {}, configured underlying is {}",
                state.underlying, config.underlying
            )));
        }
        let mut session = Self::new(config, calendar);
        let Some(day) = state.day else {
            return Ok(session);
        };

        if day.date > today {
            return Err(StrategyError::state(format!(
                "Saved session for {} is ahead of {}",
                day.date, today
            )));
        }
        let ctx = DayContext::from_state(day, &session.config, &session.calendar)?;
        if ctx.date() == today {
            info!(
                "Resuming {} with {} trades and {:?} position",
                today,
                ctx.ledger().len(),
                ctx.machine_state()
            );
            session.day = Some(ctx);
        } else {
            info!("Reconciling stale session from {}", ctx.date());
            session.completed.push(ctx.finish_day());
        }
        Ok(session)
    }

    pub fn current_day(&self) -> Option<&DayContext> {
        self.day.as_ref()
    }

    /// Feed one live snapshot. A new date finalizes the previous day.
    pub fn process_snapshot(&mut self, snapshot: &OptionChainSnapshot) -> StrategyResult<TickOutcome> {
        let date = snapshot.date();
        let ctx = match self.day.take() {
            Some(ctx) if ctx.date() == date => ctx,
            Some(ctx) if ctx.date() > date => {
                let current = ctx.date();
                self.day = Some(ctx);
                return Err(StrategyError::sequence(format!(
                    "Snapshot for {} arrived after trading day {} began",
                    date, current
                )));
            }
            Some(ctx) => {
                self.completed.push(ctx.finish_day());
                DayContext::new(date, &self.config, &self.calendar)?
            }
            None => DayContext::new(date, &self.config, &self.calendar)?,
        };
        self.day.insert(ctx).process_snapshot(snapshot)
    }

    /// Summaries of days finished since the last call.
    pub fn take_completed(&mut self) -> Vec<DaySummary> {
        std::mem::take(&mut self.completed)
    }

    /// Stop without closing anything.
    pub fn shutdown(self) -> SessionState {
        if let Some(position) = self.day.as_ref().and_then(|d| d.position()) {
            info!(
                "Shutting down with {} still open (unrealized P&L {})",
                position.leg(),
                position.unrealized_pnl()
            );
        }
        SessionState {
            underlying: self.config.underlying,
            day: self.day.as_ref().map(DayContext::to_state),
        }
    }

    /// End of stream: close the current day, returning every completed day.
    pub fn finish(mut self) -> Vec<DaySummary> {
        if let Some(ctx) = self.day.take() {
            self.completed.push(ctx.finish_day());
        }
        self.completed
    }
}

/// Pull loop: acquire the next snapshot, feed it, repeat.
///
/// Returns the number of snapshots accepted once the source ends or `stop`
/// is raised. Rejected ticks are logged; anything else propagates.
pub fn run_live<S, C>(source: &mut S, session: &mut LiveSession<C>, stop: &AtomicBool) -> StrategyResult<usize>
where
    S: SnapshotSource,
    C: MarketCalendar,
{
    let mut accepted = 0usize;
    while !stop.load(Ordering::Relaxed) {
        let Some(snapshot) = source.next_snapshot()? else {
            break;
        };
        match session.process_snapshot(&snapshot) {
            Ok(_) => accepted += 1,
            Err(e) if e.is_recoverable() => warn!("Dropped tick at {}: {}", snapshot.timestamp(), e),
            Err(e) => return Err(e),
        }
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{ExitReason, MachineState};
    use crate::config::CalendarConfig;
    use crate::data::{ExchangeCalendar, OptionQuote, OptionType, ReplaySource};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn cal() -> ExchangeCalendar {
        ExchangeCalendar::new(CalendarConfig::default()).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn snap(date: NaiveDate, h: u32, m: u32, call: Decimal) -> OptionChainSnapshot {
        OptionChainSnapshot::new(
            date.and_hms_opt(h, m, 0).unwrap(),
            dec!(22000),
            vec![
                OptionQuote::new(dec!(22000), OptionType::Call, call, 900),
                OptionQuote::new(dec!(22000), OptionType::Put, dec!(90), 800),
            ],
        )
    }

    fn open_session() -> LiveSession<ExchangeCalendar> {
        let mut session = LiveSession::new(StrategyConfig::default(), cal());
        session.process_snapshot(&snap(d(4), 9, 20, dec!(100))).unwrap();
        session.process_snapshot(&snap(d(4), 9, 25, dec!(112))).unwrap();
        session
    }

    #[test]
    fn test_shutdown_leaves_position_open() {
        let state = open_session().shutdown();
        let day = state.day.unwrap();
        assert!(day.position.unwrap().is_open());
        assert!(day.trades.is_empty());
    }

    #[test]
    fn test_resume_same_day() {
        let state = open_session().shutdown();
        let json = serde_json::to_string(&state).unwrap();
        let state: SessionState = serde_json::from_str(&json).unwrap();

        let mut session = LiveSession::resume(state, StrategyConfig::default(), cal(), d(4)).unwrap();
        assert_eq!(session.current_day().unwrap().machine_state(), MachineState::Open);

        let out = session.process_snapshot(&snap(d(4), 9, 30, dec!(170))).unwrap();
        assert_eq!(out.closed.unwrap().exit_reason, ExitReason::Target);
    }

    #[test]
    fn test_resume_next_day_closes_stale_position() {
        let state = open_session().shutdown();
        let mut session = LiveSession::resume(state, StrategyConfig::default(), cal(), d(5)).unwrap();
        assert!(session.current_day().is_none());

        let completed = session.take_completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].date, d(4));
        assert_eq!(completed[0].trades[0].exit_reason, ExitReason::Eod);
        assert_eq!(completed[0].trades[0].exit_premium, dec!(112));
    }

    #[test]
    fn test_resume_rejects_other_underlying() {
        let mut state = open_session().shutdown();
        state.underlying = "BANKNIFTY".to_string();
        let result = LiveSession::resume(state, StrategyConfig::default(), cal(), d(4));
        assert!(matches!(result, Err(StrategyError::Config(_))));
    }

    #[test]
    fn test_date_change_finalizes_day() {
        let mut session = open_session();
        session.process_snapshot(&snap(d(5), 9, 16, dec!(100))).unwrap();

        let completed = session.take_completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].trades.len(), 1);
        assert_eq!(session.current_day().unwrap().date(), d(5));

        let stale = session.process_snapshot(&snap(d(4), 15, 0, dec!(100))).unwrap_err();
        assert!(stale.is_recoverable());
    }

    #[test]
    fn test_run_live_pull_loop() {
        let mut source = ReplaySource::new(vec![
            snap(d(4), 9, 20, dec!(100)),
            snap(d(4), 9, 20, dec!(100)),
            snap(d(4), 9, 25, dec!(112)),
            snap(d(4), 9, 30, dec!(170)),
        ]);
        let mut session = LiveSession::new(StrategyConfig::default(), cal());
        let stop = AtomicBool::new(false);

        let accepted = run_live(&mut source, &mut session, &stop).unwrap();
        assert_eq!(accepted, 3);

        let days = session.finish();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].trades[0].exit_reason, ExitReason::Target);
    }

    #[test]
    fn test_run_live_honours_stop_flag() {
        let mut source = ReplaySource::new(vec![snap(d(4), 9, 20, dec!(100))]);
        let mut session = LiveSession::new(StrategyConfig::default(), cal());
        let stop = AtomicBool::new(true);

        assert_eq!(run_live(&mut source, &mut session, &stop).unwrap(), 0);
        assert_eq!(source.remaining(), 1);
    }
}
