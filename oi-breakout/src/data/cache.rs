//! Per-day snapshot caching.
//!
//! Historical days are fetched once and kept in memory; with a cache
//! directory they also persist as `<dir>/<YYYY-MM-DD>.json` so repeated
//! backtests never hit the feed for a day they already have. Days the feed
//! has no data for are cached as empty days.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info};

use super::source::{DaySnapshots, HistoricalFeed};
use super::types::OptionChainSnapshot;
use crate::error::StrategyResult;

/// File name used for one day's snapshots.
pub fn day_file(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.json", date.format("%Y-%m-%d")))
}

/// Write one day's snapshots in the cache file format.
pub fn write_day(dir: &Path, date: NaiveDate, snapshots: &[OptionChainSnapshot]) -> StrategyResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = day_file(dir, date);
    fs::write(&path, serde_json::to_string(snapshots)?)?;
    Ok(path)
}

/// Read one day's snapshots, or `None` if the file does not exist.
pub fn read_day(dir: &Path, date: NaiveDate) -> StrategyResult<Option<Vec<OptionChainSnapshot>>> {
    let path = day_file(dir, date);
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(&path)?;
    let snapshots: Vec<OptionChainSnapshot> = serde_json::from_str(&json)?;
    Ok(Some(snapshots))
}

/// Day-keyed snapshot cache.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    memory: HashMap<NaiveDate, Vec<OptionChainSnapshot>>,
    dir: Option<PathBuf>,
}

impl SnapshotCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> StrategyResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            memory: HashMap::new(),
            dir: Some(dir),
        })
    }

    pub fn get(&mut self, date: NaiveDate) -> StrategyResult<Option<Vec<OptionChainSnapshot>>> {
        if let Some(day) = self.memory.get(&date) {
            return Ok(Some(day.clone()));
        }
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        match read_day(dir, date)? {
            Some(day) => {
                debug!("Loaded {} snapshots for {} from {:?}", day.len(), date, dir);
                self.memory.insert(date, day.clone());
                Ok(Some(day))
            }
            None => Ok(None),
        }
    }

    pub fn put(&mut self, date: NaiveDate, snapshots: Vec<OptionChainSnapshot>) -> StrategyResult<()> {
        if let Some(dir) = &self.dir {
            let path = write_day(dir, date, &snapshots)?;
            debug!("Cached {} snapshots for {} at {:?}", snapshots.len(), date, path);
        }
        self.memory.insert(date, snapshots);
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.memory.contains_key(&date)
            || self
                .dir
                .as_deref()
                .map(|dir| day_file(dir, date).exists())
                .unwrap_or(false)
    }

    pub fn cached_days(&self) -> usize {
        self.memory.len()
    }
}

/// Historical feed backed by a directory of day files.
#[derive(Debug, Clone)]
pub struct DirectoryFeed {
    dir: PathBuf,
}

impl DirectoryFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl HistoricalFeed for DirectoryFeed {
    fn fetch_day(&mut self, date: NaiveDate) -> StrategyResult<Option<Vec<OptionChainSnapshot>>> {
        let Some(mut day) = read_day(&self.dir, date)? else {
            return Ok(None);
        };
        day.sort_by_key(|s| s.timestamp());
        Ok(Some(day))
    }
}

/// Historical replay: feed lookups go through the cache first.
pub struct HistoricalReplay<F> {
    feed: F,
    cache: SnapshotCache,
    fetches: usize,
}

impl<F: HistoricalFeed> HistoricalReplay<F> {
    pub fn new(feed: F, cache: SnapshotCache) -> Self {
        Self {
            feed,
            cache,
            fetches: 0,
        }
    }

    /// Number of days actually retrieved from the feed.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }
}

impl<F: HistoricalFeed> DaySnapshots for HistoricalReplay<F> {
    fn snapshots_for(&mut self, date: NaiveDate) -> StrategyResult<Vec<OptionChainSnapshot>> {
        if let Some(day) = self.cache.get(date)? {
            return Ok(day);
        }
        self.fetches += 1;
        match self.feed.fetch_day(date)? {
            Some(day) => {
                info!("Fetched {} snapshots for {}", day.len(), date);
                self.cache.put(date, day.clone())?;
                Ok(day)
            }
            None => {
                debug!("No data for {}; remembering it as empty", date);
                self.cache.put(date, Vec::new())?;
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{OptionQuote, OptionType};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn day() -> Vec<OptionChainSnapshot> {
        (20..23)
            .map(|m| {
                OptionChainSnapshot::new(
                    date().and_hms_opt(9, m, 0).unwrap(),
                    dec!(22000),
                    vec![OptionQuote::new(dec!(22000), OptionType::Call, dec!(100), 10)],
                )
            })
            .collect()
    }

    struct CountingFeed {
        calls: usize,
    }

    impl HistoricalFeed for CountingFeed {
        fn fetch_day(&mut self, d: NaiveDate) -> StrategyResult<Option<Vec<OptionChainSnapshot>>> {
            self.calls += 1;
            Ok((d == date()).then(day))
        }
    }

    #[test]
    fn test_disk_round_trip() {
        let dir = tempdir().unwrap();
        let mut cache = SnapshotCache::with_dir(dir.path()).unwrap();
        cache.put(date(), day()).unwrap();
        assert!(day_file(dir.path(), date()).exists());

        let mut reopened = SnapshotCache::with_dir(dir.path()).unwrap();
        assert!(reopened.contains(date()));
        assert_eq!(reopened.get(date()).unwrap().unwrap(), day());
    }

    #[test]
    fn test_replay_fetches_each_day_once() {
        let mut replay = HistoricalReplay::new(CountingFeed { calls: 0 }, SnapshotCache::in_memory());
        assert_eq!(replay.snapshots_for(date()).unwrap().len(), 3);
        assert_eq!(replay.snapshots_for(date()).unwrap().len(), 3);
        assert_eq!(replay.fetches(), 1);
        assert_eq!(replay.feed.calls, 1);
    }

    #[test]
    fn test_missing_day_is_empty() {
        let mut replay = HistoricalReplay::new(CountingFeed { calls: 0 }, SnapshotCache::in_memory());
        let other = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(replay.snapshots_for(other).unwrap().is_empty());
        assert!(replay.snapshots_for(other).unwrap().is_empty());
        assert!(replay.snapshots_for(other).unwrap().is_empty());
        assert_eq!(replay.fetches(), 1);
        assert_eq!(replay.feed.calls, 1);
        assert!(replay.cache().contains(other));
    }

    #[test]
    fn test_missing_day_persists_across_runs() {
        let dir = tempdir().unwrap();
        let other = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        let mut first = HistoricalReplay::new(CountingFeed { calls: 0 }, SnapshotCache::with_dir(dir.path()).unwrap());
        assert!(first.snapshots_for(other).unwrap().is_empty());
        assert_eq!(first.fetches(), 1);

        let mut second = HistoricalReplay::new(CountingFeed { calls: 0 }, SnapshotCache::with_dir(dir.path()).unwrap());
        assert!(second.snapshots_for(other).unwrap().is_empty());
        assert_eq!(second.fetches(), 0);
        assert_eq!(second.feed.calls, 0);
    }

    #[test]
    fn test_directory_feed() {
        let dir = tempdir().unwrap();
        let mut reversed = day();
        reversed.reverse();
        write_day(dir.path(), date(), &reversed).unwrap();

        let mut feed = DirectoryFeed::new(dir.path());
        let loaded = feed.fetch_day(date()).unwrap().unwrap();
        assert_eq!(loaded, day());
        assert!(feed
            .fetch_day(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
            .unwrap()
            .is_none());
    }
}
