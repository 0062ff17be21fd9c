//! Highest open-interest strike selection.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::data::{OptionChainSnapshot, OptionQuote, OptionType};
use crate::error::{StrategyError, StrategyResult};

/// The call and put chosen from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedStrikes {
    pub call: OptionQuote,
    pub put: OptionQuote,
}

/// Picks, per option type, the quote with the largest open interest.
///
/// Ties go to the strike closest to spot, then to the lower strike.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrikeSelector;

impl StrikeSelector {
    pub fn select(&self, snapshot: &OptionChainSnapshot) -> StrategyResult<SelectedStrikes> {
        Ok(SelectedStrikes {
            call: self.select_leg(snapshot, OptionType::Call)?.clone(),
            put: self.select_leg(snapshot, OptionType::Put)?.clone(),
        })
    }

    pub fn select_leg<'a>(
        &self,
        snapshot: &'a OptionChainSnapshot,
        option_type: OptionType,
    ) -> StrategyResult<&'a OptionQuote> {
        let spot = snapshot.spot();
        snapshot
            .of_type(option_type)
            .min_by(|a, b| rank(a, b, spot))
            .ok_or(StrategyError::EmptyChain(option_type))
    }
}

/// `Less` means `a` is the better pick.
fn rank(a: &OptionQuote, b: &OptionQuote, spot: rust_decimal::Decimal) -> Ordering {
    b.open_interest
        .cmp(&a.open_interest)
        .then_with(|| a.distance_from(spot).cmp(&b.distance_from(spot)))
        .then_with(|| a.strike.cmp(&b.strike))
}
