//! Core data types for the option-chain pipeline.
//!
//! A snapshot is the unit the whole pipeline consumes: one timestamp, the
//! underlying spot, and one quote per (strike, option type). Broker
//! payloads are normalized into these types at the boundary
//! (see [`super::normalize`]) and never travel through the core untyped.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Option type (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "C" | "CE" | "CALL" => Some(Self::Call),
            "P" | "PE" | "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    /// Exchange suffix used in NSE symbols.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Call => Self::Put,
            Self::Put => Self::Call,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single option quote inside a snapshot.
///
/// Uniquely identified by `(strike, option_type)` within its snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Strike price
    pub strike: Decimal,

    /// Option type (call or put)
    pub option_type: OptionType,

    /// Last traded premium
    pub premium: Decimal,

    /// Open interest (outstanding contracts)
    pub open_interest: i64,

    /// Best bid, if the feed supplied one
    #[serde(default)]
    pub bid: Option<Decimal>,

    /// Best ask, if the feed supplied one
    #[serde(default)]
    pub ask: Option<Decimal>,

    /// Traded volume
    #[serde(default)]
    pub volume: i64,
}

impl OptionQuote {
    pub fn new(strike: Decimal, option_type: OptionType, premium: Decimal, open_interest: i64) -> Self {
        Self {
            strike,
            option_type,
            premium,
            open_interest,
            bid: None,
            ask: None,
            volume: 0,
        }
    }

    pub fn with_book(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    pub fn with_volume(mut self, volume: i64) -> Self {
        self.volume = volume;
        self
    }

    /// Distance of the strike from a reference price.
    pub fn distance_from(&self, price: Decimal) -> Decimal {
        (self.strike - price).abs()
    }

    /// The leg this quote belongs to.
    pub fn leg(&self) -> LegKey {
        LegKey {
            strike: self.strike,
            option_type: self.option_type,
        }
    }
}

/// Identity of one candidate contract: a strike on one side of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegKey {
    pub strike: Decimal,
    pub option_type: OptionType,
}

impl fmt::Display for LegKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.strike, self.option_type)
    }
}

/// One option-chain snapshot for the underlying at a point in time.
///
/// Quotes are kept ordered by `(strike, option_type)`. Snapshots are
/// immutable once built: fields are private and only readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChainSnapshot {
    /// Exchange-local timestamp
    timestamp: NaiveDateTime,

    /// Underlying spot price
    spot: Decimal,

    /// Quotes ordered by strike, calls before puts
    quotes: Vec<OptionQuote>,
}

impl OptionChainSnapshot {
    pub fn new(timestamp: NaiveDateTime, spot: Decimal, mut quotes: Vec<OptionQuote>) -> Self {
        quotes.sort_by(|a, b| {
            a.strike
                .cmp(&b.strike)
                .then(a.option_type.cmp(&b.option_type))
        });
        Self {
            timestamp,
            spot,
            quotes,
        }
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    pub fn spot(&self) -> Decimal {
        self.spot
    }

    pub fn quotes(&self) -> &[OptionQuote] {
        &self.quotes
    }

    pub fn calls(&self) -> impl Iterator<Item = &OptionQuote> {
        self.of_type(OptionType::Call)
    }

    pub fn puts(&self) -> impl Iterator<Item = &OptionQuote> {
        self.of_type(OptionType::Put)
    }

    pub fn of_type(&self, option_type: OptionType) -> impl Iterator<Item = &OptionQuote> {
        self.quotes
            .iter()
            .filter(move |q| q.option_type == option_type)
    }

    /// Find the quote for a specific leg.
    pub fn quote(&self, leg: LegKey) -> Option<&OptionQuote> {
        self.quotes
            .iter()
            .find(|q| q.strike == leg.strike && q.option_type == leg.option_type)
    }

    /// Current premium for a leg, if quoted in this snapshot.
    pub fn premium(&self, leg: LegKey) -> Option<Decimal> {
        self.quote(leg).map(|q| q.premium)
    }

    /// Get all strikes available in this snapshot.
    pub fn strikes(&self) -> Vec<Decimal> {
        let mut strikes: Vec<_> = self.quotes.iter().map(|q| q.strike).collect();
        strikes.dedup();
        strikes
    }

    pub fn total_quotes(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_option_type_parsing() {
        assert_eq!(OptionType::from_str("CE"), Some(OptionType::Call));
        assert_eq!(OptionType::from_str("pe"), Some(OptionType::Put));
        assert_eq!(OptionType::from_str("call"), Some(OptionType::Call));
        assert_eq!(OptionType::from_str("P"), Some(OptionType::Put));
        assert_eq!(OptionType::from_str("X"), None);
        assert_eq!(OptionType::Call.other(), OptionType::Put);
    }

    #[test]
    fn test_snapshot_orders_quotes() {
        let snapshot = OptionChainSnapshot::new(
            ts(9, 20),
            dec!(22010),
            vec![
                OptionQuote::new(dec!(22100), OptionType::Put, dec!(150), 10),
                OptionQuote::new(dec!(22000), OptionType::Put, dec!(90), 20),
                OptionQuote::new(dec!(22000), OptionType::Call, dec!(110), 30),
            ],
        );

        let order: Vec<_> = snapshot.quotes().iter().map(|q| q.leg()).collect();
        assert_eq!(
            order,
            vec![
                LegKey { strike: dec!(22000), option_type: OptionType::Call },
                LegKey { strike: dec!(22000), option_type: OptionType::Put },
                LegKey { strike: dec!(22100), option_type: OptionType::Put },
            ]
        );
        assert_eq!(snapshot.strikes(), vec![dec!(22000), dec!(22100)]);
        assert_eq!(snapshot.calls().count(), 1);
        assert_eq!(snapshot.puts().count(), 2);
    }

    #[test]
    fn test_premium_lookup() {
        let snapshot = OptionChainSnapshot::new(
            ts(9, 25),
            dec!(22010),
            vec![OptionQuote::new(dec!(22000), OptionType::Call, dec!(110.5), 30)],
        );
        let leg = LegKey { strike: dec!(22000), option_type: OptionType::Call };
        assert_eq!(snapshot.premium(leg), Some(dec!(110.5)));

        let missing = LegKey { strike: dec!(22000), option_type: OptionType::Put };
        assert_eq!(snapshot.premium(missing), None);
        assert_eq!(leg.to_string(), "22000CE");
    }
}
