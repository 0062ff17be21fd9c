//! Backtest reporting.
//!
//! Provides aggregate statistics over a run:
//! - Win rate, profit factor
//! - Largest win and loss
//! - Exit reason breakdown
//! - Maximum drawdown

pub mod report;

pub use report::{AbortedDay, BacktestReport};
