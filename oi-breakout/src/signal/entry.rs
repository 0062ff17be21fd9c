//! Breakout entry evaluation.
//!
//! For each tick after the baseline is locked, both baseline legs are
//! compared against their reference premium:
//!
//! ```text
//! breakout = (current - baseline) / baseline
//! ```
//!
//! A leg qualifies when `breakout >= threshold`. When both qualify on the
//! same tick the larger breakout wins, and the call wins an exact tie.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::baseline::{Baseline, LegBaseline};
use crate::data::{LegKey, OptionChainSnapshot, OptionType, SessionGate, TradingSession};

/// A leg that satisfied the breakout condition on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntrySignal {
    pub strike: Decimal,
    pub option_type: OptionType,
    pub baseline_premium: Decimal,
    /// Premium at the tick that triggered the signal; becomes the entry price.
    pub trigger_premium: Decimal,
    pub breakout: Decimal,
    pub timestamp: NaiveDateTime,
}

impl EntrySignal {
    pub fn leg(&self) -> LegKey {
        LegKey {
            strike: self.strike,
            option_type: self.option_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryDecision {
    Enter(EntrySignal),
    NoBreakout,
    /// A breakout, if any, was dropped by the session gate.
    Gated(SessionGate),
}

#[derive(Debug, Clone, Copy)]
pub struct EntryEvaluator {
    threshold: Decimal,
}

impl EntryEvaluator {
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Evaluate one tick against the locked baseline.
    ///
    /// `excluded` names a leg that closed on this same tick and may not be
    /// re-entered until the next one.
    pub fn evaluate(
        &self,
        baseline: &Baseline,
        snapshot: &OptionChainSnapshot,
        session: &TradingSession,
        excluded: Option<LegKey>,
    ) -> EntryDecision {
        if let Err(gate) = session.entry_gate(snapshot.timestamp()) {
            debug!("Entry gated at {}: {:?}", snapshot.timestamp(), gate);
            return EntryDecision::Gated(gate);
        }

        let call = self.candidate(&baseline.call, snapshot, excluded);
        let put = self.candidate(&baseline.put, snapshot, excluded);

        let chosen = match (call, put) {
            (Some(c), Some(p)) => Some(if p.breakout > c.breakout { p } else { c }),
            (c, p) => c.or(p),
        };

        match chosen {
            Some(signal) => EntryDecision::Enter(signal),
            None => EntryDecision::NoBreakout,
        }
    }

    fn candidate(
        &self,
        leg: &LegBaseline,
        snapshot: &OptionChainSnapshot,
        excluded: Option<LegKey>,
    ) -> Option<EntrySignal> {
        if excluded == Some(leg.leg()) {
            return None;
        }
        let Some(current) = snapshot.premium(leg.leg()) else {
            warn!("No quote for baseline leg {} at {}; skipping leg", leg.leg(), snapshot.timestamp());
            return None;
        };
        let breakout = breakout(leg.premium, current)?;
        debug!("{} premium {} vs baseline {}: breakout {}", leg.leg(), current, leg.premium, breakout);

        (breakout >= self.threshold).then(|| EntrySignal {
            strike: leg.strike,
            option_type: leg.option_type,
            baseline_premium: leg.premium,
            trigger_premium: current,
            breakout,
            timestamp: snapshot.timestamp(),
        })
    }
}

/// Fractional rise of `current` over `baseline`; undefined for a
/// non-positive baseline.
pub fn breakout(baseline: Decimal, current: Decimal) -> Option<Decimal> {
    if baseline <= Decimal::ZERO {
        return None;
    }
    Some((current - baseline) / baseline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalendarConfig;
    use crate::data::{ExchangeCalendar, OptionQuote};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn session() -> TradingSession {
        let cal = ExchangeCalendar::new(CalendarConfig::default()).unwrap();
        TradingSession::resolve(&cal, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), 15).unwrap()
    }

    fn baseline() -> Baseline {
        Baseline {
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            captured_at: at(9, 20),
            spot: dec!(22000),
            call: LegBaseline {
                strike: dec!(22200),
                option_type: OptionType::Call,
                premium: dec!(100),
                open_interest: 900,
            },
            put: LegBaseline {
                strike: dec!(21800),
                option_type: OptionType::Put,
                premium: dec!(50),
                open_interest: 800,
            },
        }
    }

    fn snap(ts: NaiveDateTime, call: Decimal, put: Decimal) -> OptionChainSnapshot {
        OptionChainSnapshot::new(
            ts,
            dec!(22000),
            vec![
                OptionQuote::new(dec!(22200), OptionType::Call, call, 900),
                OptionQuote::new(dec!(21800), OptionType::Put, put, 800),
            ],
        )
    }

    #[test]
    fn test_breakout_formula() {
        assert_eq!(breakout(dec!(100), dec!(110)), Some(dec!(0.1)));
        assert_eq!(breakout(dec!(50), dec!(45)), Some(dec!(-0.1)));
        assert_eq!(breakout(dec!(0), dec!(5)), None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let eval = EntryEvaluator::new(dec!(0.10));
        let decision = eval.evaluate(&baseline(), &snap(at(9, 30), dec!(110), dec!(50)), &session(), None);
        match decision {
            EntryDecision::Enter(signal) => {
                assert_eq!(signal.option_type, OptionType::Call);
                assert_eq!(signal.trigger_premium, dec!(110));
                assert_eq!(signal.baseline_premium, dec!(100));
            }
            other => panic!("expected entry, got {:?}", other),
        }

        let decision = eval.evaluate(&baseline(), &snap(at(9, 30), dec!(109.99), dec!(54.99)), &session(), None);
        assert_eq!(decision, EntryDecision::NoBreakout);
    }

    #[test]
    fn test_larger_breakout_wins() {
        let eval = EntryEvaluator::new(dec!(0.10));
        // call +15%, put +20%
        let decision = eval.evaluate(&baseline(), &snap(at(10, 0), dec!(115), dec!(60)), &session(), None);
        assert!(matches!(decision, EntryDecision::Enter(s) if s.option_type == OptionType::Put));
    }

    #[test]
    fn test_equal_breakout_prefers_call() {
        let eval = EntryEvaluator::new(dec!(0.10));
        let decision = eval.evaluate(&baseline(), &snap(at(10, 0), dec!(120), dec!(60)), &session(), None);
        assert!(matches!(decision, EntryDecision::Enter(s) if s.option_type == OptionType::Call));
    }

    #[test]
    fn test_excluded_leg_falls_back_to_other() {
        let eval = EntryEvaluator::new(dec!(0.10));
        let call_leg = baseline().call.leg();
        let decision = eval.evaluate(
            &baseline(),
            &snap(at(10, 0), dec!(130), dec!(56)),
            &session(),
            Some(call_leg),
        );
        assert!(matches!(decision, EntryDecision::Enter(s) if s.option_type == OptionType::Put));
    }

    #[test]
    fn test_gated_outside_window() {
        let eval = EntryEvaluator::new(dec!(0.10));
        let decision = eval.evaluate(&baseline(), &snap(at(15, 20), dec!(150), dec!(50)), &session(), None);
        assert_eq!(decision, EntryDecision::Gated(SessionGate::PastEntryCutoff));
    }

    #[test]
    fn test_missing_leg_quote_is_skipped() {
        let eval = EntryEvaluator::new(dec!(0.10));
        let only_put = OptionChainSnapshot::new(
            at(10, 0),
            dec!(22000),
            vec![OptionQuote::new(dec!(21800), OptionType::Put, dec!(60), 800)],
        );
        let decision = eval.evaluate(&baseline(), &only_put, &session(), None);
        assert!(matches!(decision, EntryDecision::Enter(s) if s.option_type == OptionType::Put));
    }
}
