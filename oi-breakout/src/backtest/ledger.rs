//! Per-day trade ledger and summary.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::position::TradeRecord;

/// Append-only record of one trading day's closed trades.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLedger {
    date: NaiveDate,
    trades: Vec<TradeRecord>,
}

impl TradeLedger {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            trades: Vec::new(),
        }
    }

    /// Rebuild a ledger from trades recorded earlier the same day.
    pub fn from_trades(date: NaiveDate, trades: Vec<TradeRecord>) -> Self {
        Self { date, trades }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn record(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn total_pnl(&self) -> Decimal {
        self.trades.iter().map(|t| t.realized_pnl).sum()
    }

    pub fn wins(&self) -> usize {
        self.trades.iter().filter(|t| t.is_winner()).count()
    }

    /// Trades that did not make money; a flat trade counts as a loss.
    pub fn losses(&self) -> usize {
        self.trades.len() - self.wins()
    }

    pub fn largest_win(&self) -> Option<Decimal> {
        self.trades
            .iter()
            .map(|t| t.realized_pnl)
            .filter(|p| *p > Decimal::ZERO)
            .max()
    }

    pub fn largest_loss(&self) -> Option<Decimal> {
        self.trades
            .iter()
            .map(|t| t.realized_pnl)
            .filter(|p| *p <= Decimal::ZERO)
            .min()
    }

    pub fn summary(&self) -> DaySummary {
        DaySummary {
            date: self.date,
            trades: self.trades.clone(),
            total_pnl: self.total_pnl(),
            wins: self.wins(),
            losses: self.losses(),
            largest_win: self.largest_win(),
            largest_loss: self.largest_loss(),
        }
    }

    pub fn into_summary(self) -> DaySummary {
        let mut summary = self.summary();
        summary.trades = self.trades;
        summary
    }
}

/// One trading day's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub trades: Vec<TradeRecord>,
    pub total_pnl: Decimal,
    pub wins: usize,
    pub losses: usize,
    pub largest_win: Option<Decimal>,
    pub largest_loss: Option<Decimal>,
}

impl DaySummary {
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Human-readable daily report.
    pub fn report(&self) -> String {
        let mut lines = vec![
            format!("Daily report for {}", self.date),
            format!("Total trades: {}", self.trades.len()),
            format!("Winning trades: {}", self.wins),
            format!("Losing trades: {}", self.losses),
            format!("Total P&L: {:.2}", self.total_pnl),
        ];
        for (i, trade) in self.trades.iter().enumerate() {
            let p = &trade.position;
            lines.push(format!(
                "  #{} {}{} entry {} @ {} exit {} @ {} [{}] P&L {:.2}",
                i + 1,
                p.strike,
                p.option_type,
                p.entry_premium,
                p.entry_time.time(),
                trade.exit_premium,
                trade.exit_time.time(),
                trade.exit_reason,
                trade.realized_pnl
            ));
        }
        lines.join("\n")
    }
}
