//! Synthetic option-chain scenarios.
//!
//! Generates a full chain every minute of the session from a seeded random
//! walk of the underlying. The same (seed, date) always yields the same day,
//! so synthetic backtests are reproducible.
//!
//! Premium model (per strike `K`, spot `S`):
//! - intrinsic value plus a time value that peaks at the money, narrows
//!   with distance and decays toward the close
//! - open interest peaks two strikes out of the money on each side

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::calendar::MarketHours;
use super::source::DaySnapshots;
use super::types::{OptionChainSnapshot, OptionQuote, OptionType};
use crate::error::{StrategyError, StrategyResult};

/// Market behaviour template for a synthetic day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioTemplate {
    Bullish,
    Bearish,
    Sideways,
    Volatile,
}

impl ScenarioTemplate {
    /// Expected fractional spot move per minute.
    pub fn drift(&self) -> f64 {
        match self {
            Self::Bullish => 0.00004,
            Self::Bearish => -0.00004,
            Self::Sideways | Self::Volatile => 0.0,
        }
    }

    /// Standard deviation of the per-minute fractional spot move.
    pub fn volatility(&self) -> f64 {
        match self {
            Self::Bullish | Self::Bearish => 0.0004,
            Self::Sideways => 0.0003,
            Self::Volatile => 0.0010,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Sideways => "sideways",
            Self::Volatile => "volatile",
        }
    }
}

impl fmt::Display for ScenarioTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioTemplate {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bullish" => Ok(Self::Bullish),
            "bearish" => Ok(Self::Bearish),
            "sideways" => Ok(Self::Sideways),
            "volatile" => Ok(Self::Volatile),
            other => Err(StrategyError::config(format!("Unknown scenario template: {}", other))),
        }
    }
}

/// Seeded generator of synthetic trading days.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    pub template: ScenarioTemplate,
    pub seed: u64,
    pub base_spot: f64,
    pub strike_step: f64,
    pub strikes_each_side: usize,
    pub hours: MarketHours,
}

impl SyntheticScenario {
    pub fn new(template: ScenarioTemplate, seed: u64, hours: MarketHours) -> Self {
        Self {
            template,
            seed,
            base_spot: 22000.0,
            strike_step: 50.0,
            strikes_each_side: 10,
            hours,
        }
    }

    /// Generate every one-minute snapshot of `date`'s session.
    pub fn generate(&self, date: NaiveDate) -> StrategyResult<Vec<OptionChainSnapshot>> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ u64::from(date.num_days_from_ce().unsigned_abs()));
        let shocks = Normal::new(self.template.drift(), self.template.volatility())
            .map_err(|e| StrategyError::config(format!("Invalid scenario distribution: {}", e)))?;

        let open = date.and_time(self.hours.open);
        let close = date.and_time(self.hours.close);
        let session_minutes = (close - open).num_minutes().max(1) as f64;

        // Opening gap of up to +/-0.5%
        let mut spot = self.base_spot * (1.0 + rng.gen_range(-0.005..0.005));
        let atm = (spot / self.strike_step).round() * self.strike_step;
        let strikes: Vec<f64> = (-(self.strikes_each_side as i64)..=self.strikes_each_side as i64)
            .map(|i| atm + i as f64 * self.strike_step)
            .collect();

        let mut snapshots = Vec::with_capacity(session_minutes as usize);
        let mut ts = open;
        while ts < close {
            let elapsed = (ts - open).num_minutes() as f64;
            let remaining = 1.0 - elapsed / session_minutes;

            let mut quotes = Vec::with_capacity(strikes.len() * 2);
            for &strike in &strikes {
                for option_type in [OptionType::Call, OptionType::Put] {
                    let premium = self.premium(spot, strike, option_type, remaining);
                    let oi = self.open_interest(atm, strike, option_type, elapsed) + rng.gen_range(0..500);
                    quotes.push(OptionQuote::new(
                        to_decimal(strike, 0)?,
                        option_type,
                        to_decimal(premium, 2)?,
                        oi,
                    ));
                }
            }
            snapshots.push(OptionChainSnapshot::new(ts, to_decimal(spot, 2)?, quotes));

            spot *= 1.0 + shocks.sample(&mut rng);
            ts += Duration::minutes(1);
        }
        Ok(snapshots)
    }

    fn premium(&self, spot: f64, strike: f64, option_type: OptionType, remaining: f64) -> f64 {
        let intrinsic = match option_type {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        };
        let width = 4.0 * self.strike_step;
        let moneyness = (spot - strike) / width;
        let atm_value = spot * 0.006 * (0.2 + 0.8 * remaining.max(0.0)).sqrt();
        let time_value = atm_value * (-0.5 * moneyness * moneyness).exp();
        (intrinsic + time_value).max(0.05)
    }

    fn open_interest(&self, atm: f64, strike: f64, option_type: OptionType, elapsed: f64) -> i64 {
        let peak = match option_type {
            OptionType::Call => atm + 2.0 * self.strike_step,
            OptionType::Put => atm - 2.0 * self.strike_step,
        };
        let z = (strike - peak) / (3.0 * self.strike_step);
        let build_up = 1.0 + elapsed / 1000.0;
        (50_000.0 * (-0.5 * z * z).exp() * build_up) as i64
    }
}

impl DaySnapshots for SyntheticScenario {
    fn snapshots_for(&mut self, date: NaiveDate) -> StrategyResult<Vec<OptionChainSnapshot>> {
        self.generate(date)
    }
}

fn to_decimal(value: f64, dp: u32) -> StrategyResult<Decimal> {
    Decimal::try_from(value)
        .map(|d| d.round_dp(dp))
        .map_err(|e| StrategyError::data(format!("Cannot represent {} as decimal: {}", value, e)))
}
