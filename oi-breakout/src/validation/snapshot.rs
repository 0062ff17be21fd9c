//! Integrity checks on a single option-chain snapshot.
//!
//! Validates:
//! - Chain is non-empty and the spot price is positive
//! - No duplicate (strike, type) quotes
//! - Premiums and open interest are non-negative
//! - Bid <= ask whenever both sides are quoted

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::data::OptionChainSnapshot;
use crate::error::{StrategyError, StrategyResult};

/// Result of a single validation check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &'static str) -> Self {
        Self {
            name,
            passed: true,
            details: None,
        }
    }

    pub fn fail(name: &'static str, details: String) -> Self {
        Self {
            name,
            passed: false,
            details: Some(details),
        }
    }
}

/// All checks run against one snapshot.
#[derive(Debug)]
pub struct SnapshotReport {
    pub checks: Vec<CheckResult>,
}

impl SnapshotReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}

/// Validator for incoming snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotValidator;

impl SnapshotValidator {
    pub fn inspect(&self, snapshot: &OptionChainSnapshot) -> SnapshotReport {
        SnapshotReport {
            checks: vec![
                self.check_non_empty(snapshot),
                self.check_spot(snapshot),
                self.check_unique_legs(snapshot),
                self.check_non_negative(snapshot),
                self.check_book(snapshot),
            ],
        }
    }

    /// Reject the snapshot with a data error on the first failed check.
    pub fn validate(&self, snapshot: &OptionChainSnapshot) -> StrategyResult<()> {
        let report = self.inspect(snapshot);
        match report.failed_checks().first() {
            None => Ok(()),
            Some(check) => Err(StrategyError::data(format!(
                "Snapshot at {} failed {}: {}",
                snapshot.timestamp(),
                check.name,
                check.details.as_deref().unwrap_or("")
            ))),
        }
    }

    fn check_non_empty(&self, snapshot: &OptionChainSnapshot) -> CheckResult {
        if snapshot.is_empty() {
            CheckResult::fail("non_empty", "snapshot has no quotes".to_string())
        } else {
            CheckResult::pass("non_empty")
        }
    }

    fn check_spot(&self, snapshot: &OptionChainSnapshot) -> CheckResult {
        if snapshot.spot() > Decimal::ZERO {
            CheckResult::pass("spot")
        } else {
            CheckResult::fail("spot", format!("spot price {} is not positive", snapshot.spot()))
        }
    }

    fn check_unique_legs(&self, snapshot: &OptionChainSnapshot) -> CheckResult {
        let mut seen = HashSet::new();
        for quote in snapshot.quotes() {
            if !seen.insert(quote.leg()) {
                return CheckResult::fail("unique_legs", format!("duplicate quote for {}", quote.leg()));
            }
        }
        CheckResult::pass("unique_legs")
    }

    fn check_non_negative(&self, snapshot: &OptionChainSnapshot) -> CheckResult {
        let bad: Vec<_> = snapshot
            .quotes()
            .iter()
            .filter(|q| q.premium < Decimal::ZERO || q.open_interest < 0)
            .map(|q| q.leg().to_string())
            .collect();
        if bad.is_empty() {
            CheckResult::pass("non_negative")
        } else {
            CheckResult::fail("non_negative", format!("negative premium or OI on {}", bad.join(", ")))
        }
    }

    fn check_book(&self, snapshot: &OptionChainSnapshot) -> CheckResult {
        let crossed: Vec<_> = snapshot
            .quotes()
            .iter()
            .filter(|q| matches!((q.bid, q.ask), (Some(bid), Some(ask)) if bid > ask))
            .map(|q| q.leg().to_string())
            .collect();
        if crossed.is_empty() {
            CheckResult::pass("book")
        } else {
            CheckResult::fail("book", format!("bid above ask on {}", crossed.join(", ")))
        }
    }
}
