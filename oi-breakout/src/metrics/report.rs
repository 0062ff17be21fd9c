//! Backtest report.
//!
//! Aggregates the per-day summaries of a run:
//! - Win/loss counts, win rate, profit factor
//! - Largest win and loss
//! - Exit reason breakdown
//! - Maximum drawdown of cumulative realized P&L

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{DaySummary, ExitReason, TradeRecord};

/// A day whose run was abandoned after an invariant violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortedDay {
    pub date: NaiveDate,
    pub reason: String,
}

/// Result of a backtest over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Completed days in date order.
    pub days: Vec<DaySummary>,
    pub aborted_days: Vec<AbortedDay>,
    /// Trading days for which the source had no snapshots.
    pub skipped_days: Vec<NaiveDate>,
}

impl BacktestReport {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            days: Vec::new(),
            aborted_days: Vec::new(),
            skipped_days: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.days.iter().flat_map(|d| d.trades.iter())
    }

    pub fn total_trades(&self) -> usize {
        self.days.iter().map(|d| d.trades.len()).sum()
    }

    pub fn total_pnl(&self) -> Decimal {
        self.days.iter().map(|d| d.total_pnl).sum()
    }

    pub fn wins(&self) -> usize {
        self.days.iter().map(|d| d.wins).sum()
    }

    pub fn losses(&self) -> usize {
        self.days.iter().map(|d| d.losses).sum()
    }

    /// Fraction of trades that made money, 0.0 with no trades.
    pub fn win_rate(&self) -> f64 {
        let total = self.total_trades();
        if total == 0 {
            return 0.0;
        }
        self.wins() as f64 / total as f64
    }

    pub fn largest_win(&self) -> Option<Decimal> {
        self.days.iter().filter_map(|d| d.largest_win).max()
    }

    pub fn largest_loss(&self) -> Option<Decimal> {
        self.days.iter().filter_map(|d| d.largest_loss).min()
    }

    pub fn gross_profit(&self) -> Decimal {
        self.trades()
            .map(|t| t.realized_pnl)
            .filter(|p| *p > Decimal::ZERO)
            .sum()
    }

    pub fn gross_loss(&self) -> Decimal {
        self.trades()
            .map(|t| t.realized_pnl)
            .filter(|p| *p < Decimal::ZERO)
            .sum()
    }

    /// Gross profit over gross loss; infinite when nothing was lost.
    pub fn profit_factor(&self) -> f64 {
        let loss: f64 = self.gross_loss().abs().try_into().unwrap_or(0.0);
        if loss == 0.0 {
            return f64::INFINITY;
        }
        let profit: f64 = self.gross_profit().try_into().unwrap_or(0.0);
        profit / loss
    }

    pub fn exit_reason_counts(&self) -> BTreeMap<ExitReason, usize> {
        let mut counts = BTreeMap::new();
        for trade in self.trades() {
            *counts.entry(trade.exit_reason).or_insert(0) += 1;
        }
        counts
    }

    /// Largest peak-to-trough fall of cumulative realized P&L, trade by trade.
    pub fn max_drawdown(&self) -> Decimal {
        let mut equity = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_drawdown = Decimal::ZERO;
        for trade in self.trades() {
            equity += trade.realized_pnl;
            peak = peak.max(equity);
            max_drawdown = max_drawdown.max(peak - equity);
        }
        max_drawdown
    }

    pub fn summary(&self) -> String {
        let reasons = self
            .exit_reason_counts()
            .iter()
            .map(|(reason, n)| format!("{}: {}", reason, n))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Backtest Summary {} to {}\n\
             ====================\n\
             \n\
             Days: {} traded, {} skipped, {} aborted\n\
             Trades: {} (W: {}, L: {})\n\
             Win Rate: {:.1}%\n\
             Profit Factor: {:.2}\n\
             \n\
             Total P&L: {:.2}\n\
             Largest Win: {:.2}\n\
             Largest Loss: {:.2}\n\
             Max Drawdown: {:.2}\n\
             \n\
             Exits: {}",
            self.start,
            self.end,
            self.days.len(),
            self.skipped_days.len(),
            self.aborted_days.len(),
            self.total_trades(),
            self.wins(),
            self.losses(),
            self.win_rate() * 100.0,
            self.profit_factor(),
            self.total_pnl(),
            self.largest_win().unwrap_or_default(),
            self.largest_loss().unwrap_or_default(),
            self.max_drawdown(),
            if reasons.is_empty() { "none".to_string() } else { reasons },
        )
    }
}
