//! Reference-time baseline capture.
//!
//! The tracker stays in `AwaitingReference` until the first snapshot at or
//! after the reference time, then locks the highest-OI call and put with
//! their premiums for the rest of the day. A new date discards the lock.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::selector::StrikeSelector;
use crate::data::{LegKey, OptionChainSnapshot, OptionQuote, OptionType};
use crate::error::StrategyResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineState {
    AwaitingReference,
    Locked,
}

/// One leg of the baseline: the selected strike and its reference premium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegBaseline {
    pub strike: Decimal,
    pub option_type: OptionType,
    pub premium: Decimal,
    pub open_interest: i64,
}

impl LegBaseline {
    fn from_quote(quote: &OptionQuote) -> Self {
        Self {
            strike: quote.strike,
            option_type: quote.option_type,
            premium: quote.premium,
            open_interest: quote.open_interest,
        }
    }

    pub fn leg(&self) -> LegKey {
        LegKey {
            strike: self.strike,
            option_type: self.option_type,
        }
    }
}

/// The day's breakout reference, immutable once captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub date: NaiveDate,
    /// Timestamp of the snapshot the baseline was taken from.
    pub captured_at: NaiveDateTime,
    pub spot: Decimal,
    pub call: LegBaseline,
    pub put: LegBaseline,
}

/// What a snapshot did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineUpdate {
    /// Still before the reference time.
    Awaiting,
    /// This snapshot locked the baseline.
    JustLocked,
    /// Baseline was already locked earlier today.
    Locked,
}

#[derive(Debug, Clone)]
pub struct BaselineTracker {
    reference_time: NaiveTime,
    selector: StrikeSelector,
    date: Option<NaiveDate>,
    baseline: Option<Baseline>,
}

impl BaselineTracker {
    pub fn new(reference_time: NaiveTime) -> Self {
        Self {
            reference_time,
            selector: StrikeSelector,
            date: None,
            baseline: None,
        }
    }

    pub fn state(&self) -> BaselineState {
        if self.baseline.is_some() {
            BaselineState::Locked
        } else {
            BaselineState::AwaitingReference
        }
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    /// Feed one snapshot.
    ///
    /// On the reference tick a chain missing one side fails with
    /// `EmptyChain`; the tracker stays awaiting and retries on the next tick.
    pub fn observe(&mut self, snapshot: &OptionChainSnapshot) -> StrategyResult<BaselineUpdate> {
        let date = snapshot.date();
        if self.date != Some(date) {
            self.reset(date);
        }
        if self.baseline.is_some() {
            return Ok(BaselineUpdate::Locked);
        }
        if snapshot.time() < self.reference_time {
            return Ok(BaselineUpdate::Awaiting);
        }

        let selected = self.selector.select(snapshot)?;
        let baseline = Baseline {
            date,
            captured_at: snapshot.timestamp(),
            spot: snapshot.spot(),
            call: LegBaseline::from_quote(&selected.call),
            put: LegBaseline::from_quote(&selected.put),
        };
        info!(
            "Baseline locked at {}: CALL {} @ {} (OI {}), PUT {} @ {} (OI {})",
            baseline.captured_at,
            baseline.call.strike,
            baseline.call.premium,
            baseline.call.open_interest,
            baseline.put.strike,
            baseline.put.premium,
            baseline.put.open_interest,
        );
        self.baseline = Some(baseline);
        Ok(BaselineUpdate::JustLocked)
    }

    /// Reinstate a baseline captured earlier in the same day.
    pub fn restore(&mut self, baseline: Baseline) {
        self.date = Some(baseline.date);
        self.baseline = Some(baseline);
    }

    fn reset(&mut self, date: NaiveDate) {
        self.date = Some(date);
        self.baseline = None;
    }
}
