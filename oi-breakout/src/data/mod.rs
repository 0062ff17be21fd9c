//! Option-chain data: typed snapshots, boundary normalization, calendar,
//! and the live, historical and synthetic snapshot sources.

pub mod cache;
pub mod calendar;
pub mod normalize;
pub mod source;
pub mod synthetic;
pub mod types;

pub use cache::{DirectoryFeed, HistoricalReplay, SnapshotCache};
pub use calendar::{trading_days, ExchangeCalendar, MarketCalendar, MarketHours, SessionGate, TradingSession};
pub use normalize::{normalize_payload, RawChainResponse, RawLeg, RawStrikeRecord};
pub use source::{ChainFetcher, DaySnapshots, HistoricalFeed, PollingSource, ReplaySource, SnapshotSource};
pub use synthetic::{ScenarioTemplate, SyntheticScenario};
pub use types::{LegKey, OptionChainSnapshot, OptionQuote, OptionType};
