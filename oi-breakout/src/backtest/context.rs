//! Per-day pipeline context.
//!
//! Everything that changes during a trading day (baseline, open position,
//! closed trades, last accepted timestamp) lives in one [`DayContext`].
//! Days share nothing, so separate contexts can run on separate threads.
//!
//! Each accepted tick runs, in order:
//! 1. Sequence and integrity checks
//! 2. Exit evaluation for the open position
//! 3. Baseline observation
//! 4. Entry evaluation, only once the baseline was locked on an earlier
//!    tick and no position is open

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ledger::{DaySummary, TradeLedger};
use super::position::{ExitRules, MachineState, Position, PositionStateMachine, TradeRecord};
use crate::config::StrategyConfig;
use crate::data::{MarketCalendar, OptionChainSnapshot, TradingSession};
use crate::error::{StrategyError, StrategyResult};
use crate::signal::{Baseline, BaselineTracker, BaselineUpdate, EntryDecision, EntryEvaluator};
use crate::validation::SnapshotValidator;

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub timestamp: NaiveDateTime,
    pub baseline: BaselineUpdate,
    pub closed: Option<TradeRecord>,
    pub opened: Option<Position>,
}

/// Serializable day state, used to carry an open position across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayState {
    pub date: NaiveDate,
    pub baseline: Option<Baseline>,
    pub position: Option<Position>,
    pub positions_opened: u32,
    pub trades: Vec<TradeRecord>,
    pub last_timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct DayContext {
    session: TradingSession,
    tracker: BaselineTracker,
    evaluator: EntryEvaluator,
    machine: PositionStateMachine,
    ledger: TradeLedger,
    validator: SnapshotValidator,
    last_timestamp: Option<NaiveDateTime>,
}

impl DayContext {
    pub fn new(date: NaiveDate, config: &StrategyConfig, calendar: &dyn MarketCalendar) -> StrategyResult<Self> {
        let session = TradingSession::resolve(calendar, date, config.eod_exit_buffer_minutes)?;
        Ok(Self::with_session(session, config))
    }

    pub fn with_session(session: TradingSession, config: &StrategyConfig) -> Self {
        Self {
            session,
            tracker: BaselineTracker::new(config.reference_time),
            evaluator: EntryEvaluator::new(config.breakout_threshold),
            machine: PositionStateMachine::new(ExitRules::from_config(config)),
            ledger: TradeLedger::new(session.date),
            validator: SnapshotValidator,
            last_timestamp: None,
        }
    }

    /// Rebuild a context from state saved by [`DayContext::to_state`].
    pub fn from_state(
        state: DayState,
        config: &StrategyConfig,
        calendar: &dyn MarketCalendar,
    ) -> StrategyResult<Self> {
        let mut ctx = Self::new(state.date, config, calendar)?;
        if let Some(baseline) = state.baseline {
            if baseline.date != state.date {
                return Err(StrategyError::state(format!(
                    "Saved baseline for {} does not belong to {}",
                    baseline.date, state.date
                )));
            }
            ctx.tracker.restore(baseline);
        }
        ctx.machine.restore(state.position, state.positions_opened)?;
        ctx.ledger = TradeLedger::from_trades(state.date, state.trades);
        ctx.last_timestamp = state.last_timestamp;
        Ok(ctx)
    }

    pub fn to_state(&self) -> DayState {
        DayState {
            date: self.session.date,
            baseline: self.tracker.baseline().copied(),
            position: self.machine.position().cloned(),
            positions_opened: self.machine.positions_opened(),
            trades: self.ledger.trades().to_vec(),
            last_timestamp: self.last_timestamp,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.session.date
    }

    pub fn session(&self) -> &TradingSession {
        &self.session
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.tracker.baseline()
    }

    pub fn position(&self) -> Option<&Position> {
        self.machine.position()
    }

    pub fn machine_state(&self) -> MachineState {
        self.machine.state()
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.last_timestamp
    }

    /// Run one snapshot through the pipeline.
    ///
    /// `Data` and `Sequence` errors reject the tick without touching any
    /// state; `State` errors mean the day can no longer be trusted.
    pub fn process_snapshot(&mut self, snapshot: &OptionChainSnapshot) -> StrategyResult<TickOutcome> {
        let now = snapshot.timestamp();
        if snapshot.date() != self.session.date {
            return Err(StrategyError::sequence(format!(
                "Snapshot at {} does not belong to trading day {}",
                now, self.session.date
            )));
        }
        if let Some(last) = self.last_timestamp {
            if now <= last {
                return Err(StrategyError::sequence(format!(
                    "Snapshot at {} is not after previous tick at {}",
                    now, last
                )));
            }
        }
        self.validator.validate(snapshot)?;
        self.last_timestamp = Some(now);

        let closed = self.machine.on_tick(snapshot, &self.session);
        if let Some(trade) = &closed {
            self.ledger.record(trade.clone());
        }
        let excluded = closed.as_ref().map(|t| t.position.leg());

        let baseline = match self.tracker.observe(snapshot) {
            Ok(update) => update,
            Err(e) if e.is_recoverable() => {
                warn!("Baseline not captured at {}: {}", now, e);
                BaselineUpdate::Awaiting
            }
            Err(e) => return Err(e),
        };

        let mut opened = None;
        if baseline == BaselineUpdate::Locked && self.machine.state() == MachineState::Idle {
            if let Some(locked) = self.tracker.baseline() {
                match self.evaluator.evaluate(locked, snapshot, &self.session, excluded) {
                    EntryDecision::Enter(signal) => {
                        info!(
                            "Breakout on {} at {}: {} -> {} ({})",
                            signal.leg(),
                            now,
                            signal.baseline_premium,
                            signal.trigger_premium,
                            signal.breakout.round_dp(4)
                        );
                        opened = Some(self.machine.open(&signal)?.clone());
                    }
                    EntryDecision::Gated(gate) => debug!("Entry window closed at {}: {:?}", now, gate),
                    EntryDecision::NoBreakout => {}
                }
            }
        }

        Ok(TickOutcome {
            timestamp: now,
            baseline,
            closed,
            opened,
        })
    }

    /// End the day: an open position is closed at its last premium, as of
    /// the last accepted tick.
    pub fn finish_day(mut self) -> DaySummary {
        let now = self
            .last_timestamp
            .or_else(|| self.machine.position().map(|p| p.last_marked));
        if let Some(trade) = now.and_then(|now| self.machine.force_close(now)) {
            self.ledger.record(trade);
        }
        let summary = self.ledger.into_summary();
        info!(
            "Day {} finished: {} trades, {} wins, {} losses, P&L {}",
            summary.date,
            summary.trades.len(),
            summary.wins,
            summary.losses,
            summary.total_pnl
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::ExitReason;
    use crate::config::CalendarConfig;
    use crate::data::{ExchangeCalendar, OptionQuote, OptionType};
    use crate::error::ErrorKind;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn ctx() -> DayContext {
        let cal = ExchangeCalendar::new(CalendarConfig::default()).unwrap();
        DayContext::new(date(), &StrategyConfig::default(), &cal).unwrap()
    }

    fn snap(h: u32, m: u32, call: Decimal, put: Decimal) -> OptionChainSnapshot {
        OptionChainSnapshot::new(
            date().and_hms_opt(h, m, 0).unwrap(),
            dec!(22000),
            vec![
                OptionQuote::new(dec!(22100), OptionType::Call, call, 900),
                OptionQuote::new(dec!(22000), OptionType::Call, dec!(200), 100),
                OptionQuote::new(dec!(21900), OptionType::Put, put, 800),
            ],
        )
    }

    #[test]
    fn test_no_entry_before_lock() {
        let mut ctx = ctx();
        // huge premiums before the reference time never trigger anything
        let out = ctx.process_snapshot(&snap(9, 16, dec!(500), dec!(500))).unwrap();
        assert_eq!(out.baseline, BaselineUpdate::Awaiting);
        assert!(out.opened.is_none());

        let out = ctx.process_snapshot(&snap(9, 20, dec!(100), dec!(50))).unwrap();
        assert_eq!(out.baseline, BaselineUpdate::JustLocked);
        assert!(out.opened.is_none());
    }

    #[test]
    fn test_entry_and_exit_flow() {
        let mut ctx = ctx();
        ctx.process_snapshot(&snap(9, 20, dec!(100), dec!(50))).unwrap();
        let out = ctx.process_snapshot(&snap(9, 21, dec!(111), dec!(50))).unwrap();
        let opened = out.opened.unwrap();
        assert_eq!(opened.option_type, OptionType::Call);
        assert_eq!(opened.entry_premium, dec!(111));

        let out = ctx.process_snapshot(&snap(9, 22, dec!(160), dec!(50))).unwrap();
        let closed = out.closed.unwrap();
        assert_eq!(closed.exit_reason, ExitReason::Target);
        // the call just closed, so it cannot be re-entered on this tick
        assert!(out.opened.is_none());

        let summary = ctx.finish_day();
        assert_eq!(summary.trades.len(), 1);
    }

    #[test]
    fn test_other_leg_may_enter_on_close_tick() {
        let mut ctx = ctx();
        ctx.process_snapshot(&snap(9, 20, dec!(100), dec!(50))).unwrap();
        ctx.process_snapshot(&snap(9, 21, dec!(111), dec!(50))).unwrap();

        let out = ctx.process_snapshot(&snap(9, 22, dec!(80), dec!(60))).unwrap();
        assert_eq!(out.closed.unwrap().exit_reason, ExitReason::Stoploss);
        assert_eq!(out.opened.unwrap().option_type, OptionType::Put);
    }

    #[test]
    fn test_sequence_errors_drop_tick() {
        let mut ctx = ctx();
        ctx.process_snapshot(&snap(9, 20, dec!(100), dec!(50))).unwrap();

        let dup = ctx.process_snapshot(&snap(9, 20, dec!(200), dec!(50))).unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Sequence);
        let back = ctx.process_snapshot(&snap(9, 19, dec!(200), dec!(50))).unwrap_err();
        assert_eq!(back.kind(), ErrorKind::Sequence);

        let other_day = OptionChainSnapshot::new(
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(9, 30, 0).unwrap(),
            dec!(22000),
            vec![],
        );
        assert_eq!(ctx.process_snapshot(&other_day).unwrap_err().kind(), ErrorKind::Sequence);
        assert!(ctx.position().is_none());
    }

    #[test]
    fn test_invalid_snapshot_is_skipped() {
        let mut ctx = ctx();
        let empty = OptionChainSnapshot::new(date().and_hms_opt(9, 20, 0).unwrap(), dec!(22000), vec![]);
        assert_eq!(ctx.process_snapshot(&empty).unwrap_err().kind(), ErrorKind::Data);
        assert!(ctx.last_timestamp().is_none());

        let out = ctx.process_snapshot(&snap(9, 20, dec!(100), dec!(50))).unwrap();
        assert_eq!(out.baseline, BaselineUpdate::JustLocked);
    }

    #[test]
    fn test_finish_day_closes_open_position() {
        let mut ctx = ctx();
        ctx.process_snapshot(&snap(9, 20, dec!(100), dec!(50))).unwrap();
        ctx.process_snapshot(&snap(9, 21, dec!(112), dec!(50))).unwrap();
        ctx.process_snapshot(&snap(9, 22, dec!(115), dec!(50))).unwrap();

        let summary = ctx.finish_day();
        assert_eq!(summary.trades.len(), 1);
        assert_eq!(summary.trades[0].exit_reason, ExitReason::Eod);
        assert_eq!(summary.trades[0].exit_premium, dec!(115));
        assert_eq!(summary.total_pnl, dec!(3));
    }

    #[test]
    fn test_finish_day_after_leg_quote_disappears() {
        let mut ctx = ctx();
        ctx.process_snapshot(&snap(9, 20, dec!(80), dec!(50))).unwrap();
        ctx.process_snapshot(&snap(9, 21, dec!(100), dec!(50))).unwrap();
        assert_eq!(ctx.machine_state(), MachineState::Open);

        // the call stops quoting from 10:25 while ticks keep arriving
        for h in 10..16 {
            let no_call = OptionChainSnapshot::new(
                date().and_hms_opt(h, 25, 0).unwrap(),
                dec!(22000),
                vec![OptionQuote::new(dec!(21900), OptionType::Put, dec!(50), 800)],
            );
            assert!(ctx.process_snapshot(&no_call).unwrap().closed.is_none());
        }

        let summary = ctx.finish_day();
        let trade = &summary.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::Timeout);
        assert_eq!(trade.exit_time, date().and_hms_opt(15, 25, 0).unwrap());
        assert_eq!(trade.exit_premium, dec!(100));
        assert_eq!(trade.held_minutes(), 364);
    }

    #[test]
    fn test_state_round_trip() {
        let mut ctx = ctx();
        ctx.process_snapshot(&snap(9, 20, dec!(100), dec!(50))).unwrap();
        ctx.process_snapshot(&snap(9, 21, dec!(112), dec!(50))).unwrap();

        let state = ctx.to_state();
        let json = serde_json::to_string(&state).unwrap();
        let restored: DayState = serde_json::from_str(&json).unwrap();

        let cal = ExchangeCalendar::new(CalendarConfig::default()).unwrap();
        let mut resumed = DayContext::from_state(restored, &StrategyConfig::default(), &cal).unwrap();
        assert_eq!(resumed.machine_state(), MachineState::Open);

        assert!(resumed.process_snapshot(&snap(9, 21, dec!(85), dec!(50))).is_err());
        let out = resumed.process_snapshot(&snap(9, 25, dec!(85), dec!(50))).unwrap();
        assert_eq!(out.closed.unwrap().exit_reason, ExitReason::Stoploss);
    }
}
