//! Backtesting and live-session engine for the breakout strategy.
//!
//! This module provides:
//! - Position lifecycle (entry, mark-to-market, exits)
//! - Per-day trade ledger and summaries
//! - Per-day pipeline context shared by backtest and live modes
//! - Date-range backtest runner, sequential or parallel
//! - Live pull loop with shutdown and resume

pub mod context;
pub mod ledger;
pub mod live;
pub mod position;
pub mod runner;

pub use context::{DayContext, DayState, TickOutcome};
pub use ledger::{DaySummary, TradeLedger};
pub use live::{run_live, LiveSession, SessionState};
pub use position::{ExitReason, ExitRules, MachineState, Position, PositionStateMachine, PositionStatus, TradeRecord};
pub use runner::{BacktestRunner, LoadedDay};
