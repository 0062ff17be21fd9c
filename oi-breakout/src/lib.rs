pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod validation;

// Re-export commonly used types
pub use backtest::{BacktestRunner, DayContext, DaySummary, ExitReason, LiveSession, Position, PositionStateMachine, TradeLedger, TradeRecord};
pub use config::{AppConfig, CalendarConfig, StrategyConfig};
pub use data::{ExchangeCalendar, MarketCalendar, OptionChainSnapshot, OptionQuote, OptionType, SnapshotSource};
pub use error::{ErrorKind, StrategyError, StrategyResult};
pub use metrics::BacktestReport;
pub use signal::{BaselineTracker, EntryEvaluator, EntrySignal, StrikeSelector};
pub use validation::SnapshotValidator;
