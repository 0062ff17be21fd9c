//! Snapshot sources.
//!
//! Live polling and historical or synthetic replay all hand the pipeline the
//! same [`OptionChainSnapshot`] values, so the core cannot tell them apart.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::NaiveDate;
use tracing::debug;

use super::types::OptionChainSnapshot;
use crate::error::StrategyResult;

/// Ordered stream of snapshots. `Ok(None)` is end of stream.
pub trait SnapshotSource {
    fn next_snapshot(&mut self) -> StrategyResult<Option<OptionChainSnapshot>>;
}

/// Replays a fixed, already-loaded sequence.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    queue: VecDeque<OptionChainSnapshot>,
}

impl ReplaySource {
    pub fn new(snapshots: Vec<OptionChainSnapshot>) -> Self {
        Self {
            queue: snapshots.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl SnapshotSource for ReplaySource {
    fn next_snapshot(&mut self) -> StrategyResult<Option<OptionChainSnapshot>> {
        Ok(self.queue.pop_front())
    }
}

/// Retrieves the current option chain from the broker.
///
/// Transport, authentication and retries live behind this trait. A failure
/// should surface as `StrategyError::ExternalUnavailable`.
pub trait ChainFetcher {
    fn fetch_chain(&mut self) -> StrategyResult<OptionChainSnapshot>;
}

/// Live source: fetches one snapshot per poll interval.
pub struct PollingSource<F> {
    fetcher: F,
    interval: StdDuration,
    polls: u64,
}

impl<F: ChainFetcher> PollingSource<F> {
    pub fn new(fetcher: F, interval: StdDuration) -> Self {
        Self {
            fetcher,
            interval,
            polls: 0,
        }
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }
}

impl<F: ChainFetcher> SnapshotSource for PollingSource<F> {
    fn next_snapshot(&mut self) -> StrategyResult<Option<OptionChainSnapshot>> {
        if self.polls > 0 && !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
        self.polls += 1;
        let snapshot = self.fetcher.fetch_chain()?;
        debug!("Poll #{} returned chain at {}", self.polls, snapshot.timestamp());
        Ok(Some(snapshot))
    }
}

/// Supplies a whole trading day of snapshots at a time (backtest mode).
pub trait DaySnapshots {
    /// Snapshots for `date` in timestamp order; an empty vec means no data.
    fn snapshots_for(&mut self, date: NaiveDate) -> StrategyResult<Vec<OptionChainSnapshot>>;
}

/// Historical data retrieval collaborator.
pub trait HistoricalFeed {
    /// `Ok(None)` when the feed has nothing for `date`.
    fn fetch_day(&mut self, date: NaiveDate) -> StrategyResult<Option<Vec<OptionChainSnapshot>>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use rust_decimal_macros::dec;

    fn snap(m: u32) -> OptionChainSnapshot {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, m, 0)
            .unwrap();
        OptionChainSnapshot::new(ts, dec!(22000), vec![])
    }

    struct Scripted {
        ticks: Vec<StrategyResult<OptionChainSnapshot>>,
    }

    impl ChainFetcher for Scripted {
        fn fetch_chain(&mut self) -> StrategyResult<OptionChainSnapshot> {
            self.ticks.remove(0)
        }
    }

    #[test]
    fn test_replay_source_drains_in_order() {
        let mut source = ReplaySource::new(vec![snap(20), snap(21)]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_snapshot().unwrap().unwrap().time().to_string(), "09:20:00");
        assert_eq!(source.next_snapshot().unwrap().unwrap().time().to_string(), "09:21:00");
        assert!(source.next_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_polling_source_propagates_failure() {
        let fetcher = Scripted {
            ticks: vec![Ok(snap(20)), Err(StrategyError::unavailable("broker down"))],
        };
        let mut source = PollingSource::new(fetcher, StdDuration::ZERO);
        assert!(source.next_snapshot().unwrap().is_some());
        assert!(matches!(
            source.next_snapshot(),
            Err(StrategyError::ExternalUnavailable(_))
        ));
        assert_eq!(source.polls(), 2);
    }
}
