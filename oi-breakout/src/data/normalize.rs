//! Normalization of broker option-chain payloads.
//!
//! The broker returns a loosely typed JSON document. It is deserialized into
//! the `Raw*` records below and converted into an [`OptionChainSnapshot`]
//! right here, so nothing past this module ever sees the raw shape.
//!
//! Expected payload:
//!
//! ```json
//! {"s": "ok", "d": {"underlyingLtp": 22010.5, "optionsChain": [
//!     {"strikePrice": 22000, "CE": {"lastPrice": 110.0, "openInterest": 120000}},
//!     {"strikePrice": 22000, "PE": {"lastPrice": 95.0, "openInterest": 98000}}
//! ]}}
//! ```

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::calendar::ExchangeCalendar;
use super::types::{OptionChainSnapshot, OptionQuote, OptionType};
use crate::error::{StrategyError, StrategyResult};

/// Top-level broker response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChainResponse {
    /// Status flag, `"ok"` on success.
    pub s: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub d: Option<RawChainData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChainData {
    #[serde(default)]
    pub underlying_ltp: Option<f64>,
    #[serde(default)]
    pub options_chain: Vec<RawStrikeRecord>,
}

/// One strike row; either side may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStrikeRecord {
    pub strike_price: f64,
    #[serde(rename = "CE", default)]
    pub ce: Option<RawLeg>,
    #[serde(rename = "PE", default)]
    pub pe: Option<RawLeg>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLeg {
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub open_interest: Option<i64>,
    #[serde(default)]
    pub volume: Option<i64>,
    #[serde(default)]
    pub bid_price: Option<f64>,
    #[serde(default)]
    pub ask_price: Option<f64>,
}

impl RawLeg {
    /// Convert to a quote. Legs without premium or open interest are dropped.
    pub fn to_quote(&self, strike: Decimal, option_type: OptionType) -> Option<OptionQuote> {
        let premium = Decimal::try_from(self.last_price?).ok()?;
        let open_interest = self.open_interest?;

        let mut quote = OptionQuote::new(strike, option_type, premium, open_interest)
            .with_volume(self.volume.unwrap_or(0));
        quote.bid = self.bid_price.and_then(|p| Decimal::try_from(p).ok());
        quote.ask = self.ask_price.and_then(|p| Decimal::try_from(p).ok());
        Some(quote)
    }
}

impl RawChainResponse {
    pub fn from_json(json: &str) -> StrategyResult<Self> {
        serde_json::from_str(json).map_err(|e| StrategyError::data(format!("Malformed chain payload: {}", e)))
    }

    /// Normalize into a typed snapshot stamped with `timestamp`.
    pub fn into_snapshot(self, timestamp: NaiveDateTime) -> StrategyResult<OptionChainSnapshot> {
        if !self.s.eq_ignore_ascii_case("ok") {
            return Err(StrategyError::unavailable(format!(
                "Option chain request failed: {}",
                self.message.unwrap_or(self.s)
            )));
        }
        let data = self
            .d
            .ok_or_else(|| StrategyError::data("Option chain response has no data"))?;

        let spot = data
            .underlying_ltp
            .and_then(|p| Decimal::try_from(p).ok())
            .ok_or_else(|| StrategyError::data("Option chain response has no underlying price"))?;

        let mut quotes = Vec::with_capacity(data.options_chain.len() * 2);
        let mut dropped = 0usize;
        for record in &data.options_chain {
            let Ok(strike) = Decimal::try_from(record.strike_price) else {
                dropped += 1;
                continue;
            };
            for (leg, option_type) in [(&record.ce, OptionType::Call), (&record.pe, OptionType::Put)] {
                if let Some(raw) = leg {
                    match raw.to_quote(strike, option_type) {
                        Some(quote) => quotes.push(quote),
                        None => dropped += 1,
                    }
                }
            }
        }
        if dropped > 0 {
            debug!("Dropped {} incomplete legs while normalizing chain at {}", dropped, timestamp);
        }

        Ok(OptionChainSnapshot::new(timestamp, spot, quotes))
    }
}

/// Normalize a raw payload stamped with broker epoch seconds.
pub fn normalize_payload(
    json: &str,
    epoch_secs: i64,
    calendar: &ExchangeCalendar,
) -> StrategyResult<OptionChainSnapshot> {
    let timestamp = calendar
        .local_from_epoch(epoch_secs)
        .ok_or_else(|| StrategyError::data(format!("Invalid epoch timestamp {}", epoch_secs)))?;
    RawChainResponse::from_json(json)?.into_snapshot(timestamp)
}
