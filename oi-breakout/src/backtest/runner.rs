//! Backtest runner.
//!
//! Runs the simulation loop over a date range:
//! 1. Ask the calendar for the trading days in range
//! 2. Load each day's snapshots from the source
//! 3. Replay them through a fresh [`DayContext`]
//! 4. Collect the day's summary into the report
//!
//! Days are independent, so [`BacktestRunner::run_parallel`] can replay
//! preloaded days on the rayon pool and still report them in date order.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use super::context::DayContext;
use super::ledger::DaySummary;
use crate::config::StrategyConfig;
use crate::data::{trading_days, DaySnapshots, MarketCalendar, OptionChainSnapshot, ReplaySource, SnapshotSource};
use crate::error::{ErrorKind, StrategyResult};
use crate::metrics::{AbortedDay, BacktestReport};

/// One preloaded trading day.
pub type LoadedDay = (NaiveDate, Vec<OptionChainSnapshot>);

pub struct BacktestRunner<C> {
    config: StrategyConfig,
    calendar: C,
}

impl<C: MarketCalendar> BacktestRunner<C> {
    pub fn new(config: StrategyConfig, calendar: C) -> Self {
        Self { config, calendar }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    /// Replay one day's snapshots from a fresh context.
    ///
    /// Rejected ticks are logged and skipped; a `State` error ends the day.
    pub fn run_day(&self, date: NaiveDate, snapshots: Vec<OptionChainSnapshot>) -> StrategyResult<DaySummary> {
        let mut ctx = DayContext::new(date, &self.config, &self.calendar)?;
        let mut source = ReplaySource::new(snapshots);
        let mut skipped = 0usize;

        while let Some(snapshot) = source.next_snapshot()? {
            match ctx.process_snapshot(&snapshot) {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    skipped += 1;
                    warn!("Skipping tick at {}: {}", snapshot.timestamp(), e);
                }
                Err(e) => return Err(e),
            }
        }
        if skipped > 0 {
            debug!("{} ticks skipped on {}", skipped, date);
        }
        Ok(ctx.finish_day())
    }

    pub fn run<S: DaySnapshots>(
        &self,
        source: &mut S,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StrategyResult<BacktestReport> {
        self.run_with(source, start, end, |_| {})
    }

    /// Sequential run; `on_day` is called after each trading day.
    pub fn run_with<S: DaySnapshots>(
        &self,
        source: &mut S,
        start: NaiveDate,
        end: NaiveDate,
        mut on_day: impl FnMut(NaiveDate),
    ) -> StrategyResult<BacktestReport> {
        let days = trading_days(&self.calendar, start, end)?;
        info!("Backtesting {} trading days from {} to {}", days.len(), start, end);

        let mut report = BacktestReport::new(start, end);
        for date in days {
            let snapshots = source.snapshots_for(date)?;
            if snapshots.is_empty() {
                debug!("No snapshots for {}", date);
                report.skipped_days.push(date);
            } else {
                Self::record(&mut report, date, self.run_day(date, snapshots))?;
            }
            on_day(date);
        }
        Ok(report)
    }

    /// Load every trading day in range up front (for [`Self::run_parallel`]).
    pub fn load_days<S: DaySnapshots>(
        &self,
        source: &mut S,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StrategyResult<Vec<LoadedDay>> {
        trading_days(&self.calendar, start, end)?
            .into_iter()
            .map(|date| -> StrategyResult<LoadedDay> { Ok((date, source.snapshots_for(date)?)) })
            .collect()
    }

    /// Replay preloaded days in parallel, one context per day.
    pub fn run_parallel(
        &self,
        days: Vec<LoadedDay>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StrategyResult<BacktestReport> {
        info!("Backtesting {} days in parallel", days.len());
        let results: Vec<(NaiveDate, Option<StrategyResult<DaySummary>>)> = days
            .into_par_iter()
            .map(|(date, snapshots)| {
                if snapshots.is_empty() {
                    (date, None)
                } else {
                    (date, Some(self.run_day(date, snapshots)))
                }
            })
            .collect();

        let mut report = BacktestReport::new(start, end);
        for (date, result) in results {
            match result {
                None => report.skipped_days.push(date),
                Some(result) => Self::record(&mut report, date, result)?,
            }
        }
        Ok(report)
    }

    fn record(report: &mut BacktestReport, date: NaiveDate, result: StrategyResult<DaySummary>) -> StrategyResult<()> {
        match result {
            Ok(summary) => report.days.push(summary),
            Err(e) if e.kind() == ErrorKind::State => {
                error!("Aborting {}: {}", date, e);
                report.aborted_days.push(AbortedDay {
                    date,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}
