//! Position lifecycle for the breakout strategy.
//!
//! Handles the complete single-position lifecycle:
//! - Entry from an accepted [`EntrySignal`]
//! - Mark-to-market on every tick
//! - Exit conditions (stoploss, target, holding time, end of day)
//! - Realized P&L
//!
//! Exit rules are checked in a fixed precedence and the first match wins.
//! Stoploss and target behave as resting orders and fill at their own
//! level; time and end-of-day exits fill at the tick's premium.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{StrategyConfig, LOT_QUANTITY};
use crate::data::{LegKey, OptionChainSnapshot, OptionType, TradingSession};
use crate::error::{StrategyError, StrategyResult};
use crate::signal::EntrySignal;

/// Reason for exiting a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Premium fell to the stoploss.
    Stoploss,
    /// Premium rose to the target.
    Target,
    /// Held for the maximum holding time.
    Timeout,
    /// Square-off before market close.
    Eod,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stoploss => "STOPLOSS",
            Self::Target => "TARGET",
            Self::Timeout => "TIMEOUT",
            Self::Eod => "EOD",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Price levels and holding limit applied to every new position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitRules {
    pub stoploss_pct: Decimal,
    pub reward_risk: Decimal,
    pub max_hold_minutes: i64,
}

impl ExitRules {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            stoploss_pct: config.stoploss_pct,
            reward_risk: config.reward_risk,
            max_hold_minutes: config.max_hold_minutes,
        }
    }

    pub fn stoploss(&self, entry: Decimal) -> Decimal {
        entry * (Decimal::ONE - self.stoploss_pct)
    }

    /// Entry plus `reward_risk` times the stoploss distance.
    pub fn target(&self, entry: Decimal) -> Decimal {
        entry + self.reward_risk * (entry - self.stoploss(entry))
    }

    pub fn max_hold(&self) -> Duration {
        Duration::minutes(self.max_hold_minutes)
    }
}

impl Default for ExitRules {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

/// A single-leg long option position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Sequence number within the trading day, starting at 1.
    pub id: u32,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub entry_premium: Decimal,
    pub entry_time: NaiveDateTime,
    pub stoploss: Decimal,
    pub target: Decimal,
    /// Always [`LOT_QUANTITY`].
    pub quantity: u32,
    /// Most recent premium seen for this leg.
    pub last_premium: Decimal,
    pub last_marked: NaiveDateTime,
    pub status: PositionStatus,
}

impl Position {
    pub fn from_signal(id: u32, signal: &EntrySignal, rules: &ExitRules) -> Self {
        let entry = signal.trigger_premium;
        Self {
            id,
            strike: signal.strike,
            option_type: signal.option_type,
            entry_premium: entry,
            entry_time: signal.timestamp,
            stoploss: rules.stoploss(entry),
            target: rules.target(entry),
            quantity: LOT_QUANTITY,
            last_premium: entry,
            last_marked: signal.timestamp,
            status: PositionStatus::Open,
        }
    }

    pub fn leg(&self) -> LegKey {
        LegKey {
            strike: self.strike,
            option_type: self.option_type,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn held_for(&self, now: NaiveDateTime) -> Duration {
        now.signed_duration_since(self.entry_time)
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        (self.last_premium - self.entry_premium) * Decimal::from(self.quantity)
    }

    /// First exit rule that fires for `premium` at `now`, with its fill price.
    pub fn exit_signal(
        &self,
        premium: Decimal,
        now: NaiveDateTime,
        max_hold: Duration,
        session: &TradingSession,
    ) -> Option<(ExitReason, Decimal)> {
        if premium <= self.stoploss {
            Some((ExitReason::Stoploss, self.stoploss))
        } else if premium >= self.target {
            Some((ExitReason::Target, self.target))
        } else if self.held_for(now) >= max_hold {
            Some((ExitReason::Timeout, premium))
        } else if session.is_eod(now) {
            Some((ExitReason::Eod, premium))
        } else {
            None
        }
    }

    fn mark(&mut self, premium: Decimal, now: NaiveDateTime) {
        self.last_premium = premium;
        self.last_marked = now;
    }
}

/// A closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub position: Position,
    pub exit_premium: Decimal,
    pub exit_time: NaiveDateTime,
    pub exit_reason: ExitReason,
    pub realized_pnl: Decimal,
}

impl TradeRecord {
    fn close(mut position: Position, exit_premium: Decimal, exit_time: NaiveDateTime, exit_reason: ExitReason) -> Self {
        position.status = PositionStatus::Closed;
        let realized_pnl = (exit_premium - position.entry_premium) * Decimal::from(position.quantity);
        Self {
            position,
            exit_premium,
            exit_time,
            exit_reason,
            realized_pnl,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }

    pub fn pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn held_minutes(&self) -> i64 {
        self.exit_time
            .signed_duration_since(self.position.entry_time)
            .num_minutes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    Idle,
    Open,
}

/// Owns at most one open position and turns ticks into closed trades.
#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    rules: ExitRules,
    position: Option<Position>,
    opened: u32,
}

impl PositionStateMachine {
    pub fn new(rules: ExitRules) -> Self {
        Self {
            rules,
            position: None,
            opened: 0,
        }
    }

    pub fn rules(&self) -> &ExitRules {
        &self.rules
    }

    pub fn state(&self) -> MachineState {
        if self.position.is_some() {
            MachineState::Open
        } else {
            MachineState::Idle
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Accept an entry signal. Opening over an existing position is an
    /// invariant violation.
    pub fn open(&mut self, signal: &EntrySignal) -> StrategyResult<&Position> {
        if let Some(existing) = &self.position {
            return Err(StrategyError::state(format!(
                "Cannot open {} at {}: position {} on {} is still open",
                signal.leg(),
                signal.timestamp,
                existing.id,
                existing.leg()
            )));
        }
        self.opened += 1;
        let position = Position::from_signal(self.opened, signal, &self.rules);
        info!(
            "Opened #{} {} @ {} (SL {}, target {}) at {}",
            position.id,
            position.leg(),
            position.entry_premium,
            position.stoploss,
            position.target,
            position.entry_time
        );
        Ok(&*self.position.insert(position))
    }

    /// Mark the open position against a tick and close it if an exit fires.
    pub fn on_tick(&mut self, snapshot: &OptionChainSnapshot, session: &TradingSession) -> Option<TradeRecord> {
        let position = self.position.as_mut()?;
        let now = snapshot.timestamp();
        let Some(premium) = snapshot.premium(position.leg()) else {
            warn!("No quote for open leg {} at {}; exits not evaluated", position.leg(), now);
            return None;
        };
        position.mark(premium, now);

        let (reason, fill) = position.exit_signal(premium, now, self.rules.max_hold(), session)?;
        self.close(fill, now, reason)
    }

    /// Close at the last marked premium when the stream ends at `now`.
    ///
    /// The reason is `Timeout` if the holding limit had already passed by
    /// `now`, otherwise `Eod`.
    pub fn force_close(&mut self, now: NaiveDateTime) -> Option<TradeRecord> {
        let (premium, at, reason) = {
            let position = self.position.as_ref()?;
            let at = now.max(position.last_marked);
            let reason = if position.held_for(at) >= self.rules.max_hold() {
                ExitReason::Timeout
            } else {
                ExitReason::Eod
            };
            (position.last_premium, at, reason)
        };
        self.close(premium, at, reason)
    }

    /// Number of positions opened so far today.
    pub fn positions_opened(&self) -> u32 {
        self.opened
    }

    /// Reinstate state carried over from a previous process.
    pub fn restore(&mut self, position: Option<Position>, opened: u32) -> StrategyResult<()> {
        if self.position.is_some() {
            return Err(StrategyError::state("Cannot restore over an open position"));
        }
        if let Some(p) = &position {
            if !p.is_open() {
                return Err(StrategyError::state(format!("Position {} is already closed", p.id)));
            }
        }
        self.opened = opened.max(position.as_ref().map_or(0, |p| p.id));
        self.position = position;
        Ok(())
    }

    fn close(&mut self, exit_premium: Decimal, exit_time: NaiveDateTime, reason: ExitReason) -> Option<TradeRecord> {
        let position = self.position.take()?;
        let trade = TradeRecord::close(position, exit_premium, exit_time, reason);
        info!(
            "Closed #{} {} @ {} [{}] P&L {}",
            trade.position.id,
            trade.position.leg(),
            trade.exit_premium,
            trade.exit_reason,
            trade.realized_pnl
        );
        Some(trade)
    }
}
