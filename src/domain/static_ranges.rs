use super::account_range::{AccountRange, BinRange};
use super::brand::CardBrand;
use super::card_number::UnvalidatedCardNumber;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::{Arc, LazyLock};

/// Version of the range data compiled into the crate.
pub const BUNDLED_VERSION: u32 = 1;

const BUNDLED_RANGES: &[(&str, &str, usize, CardBrand)] = &[
    ("4000000000000000", "4999999999999999", 16, CardBrand::Visa),
    ("2221000000000000", "2720999999999999", 16, CardBrand::MasterCard),
    ("5100000000000000", "5599999999999999", 16, CardBrand::MasterCard),
    ("340000000000000", "349999999999999", 15, CardBrand::AmericanExpress),
    ("370000000000000", "379999999999999", 15, CardBrand::AmericanExpress),
    ("6000000000000000", "6099999999999999", 16, CardBrand::Discover),
    ("6400000000000000", "6499999999999999", 16, CardBrand::Discover),
    ("6500000000000000", "6599999999999999", 16, CardBrand::Discover),
    ("3528000000000000", "3589999999999999", 16, CardBrand::Jcb),
    ("6200000000000000", "6299999999999999", 16, CardBrand::UnionPay),
    ("8100000000000000", "8199999999999999", 16, CardBrand::UnionPay),
    ("6200000000000000000", "6299999999999999999", 19, CardBrand::UnionPay),
    ("8100000000000000000", "8199999999999999999", 19, CardBrand::UnionPay),
    ("36000000000000", "36999999999999", 14, CardBrand::DinersClub),
    ("3000000000000000", "3059999999999999", 16, CardBrand::DinersClub),
    ("3095000000000000", "3095999999999999", 16, CardBrand::DinersClub),
    ("3800000000000000", "3999999999999999", 16, CardBrand::DinersClub),
];

static BUNDLED: LazyLock<Arc<StaticRangeTable>> = LazyLock::new(|| {
    let ranges = BUNDLED_RANGES
        .iter()
        .filter_map(|&(low, high, pan_length, brand)| {
            BinRange::new(low, high)
                .ok()
                .map(|bin_range| AccountRange::new(bin_range, pan_length, brand))
        })
        .collect();
    Arc::new(StaticRangeTable::new(BUNDLED_VERSION, ranges))
});

/// Read-only table of known issuer ranges, answered synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRangeTable {
    version: u32,
    ranges: Vec<AccountRange>,
}

impl StaticRangeTable {
    pub fn new(version: u32, ranges: Vec<AccountRange>) -> Self {
        Self { version, ranges }
    }

    /// The process-wide table built from the data compiled into the crate.
    pub fn bundled() -> Arc<StaticRangeTable> {
        Arc::clone(&BUNDLED)
    }

    /// Loads a table from JSON of the form `{"version": 1, "ranges": [...]}`.
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn ranges(&self) -> &[AccountRange] {
        &self.ranges
    }

    /// All ranges the number falls into, in table order.
    pub fn filter(&self, number: &UnvalidatedCardNumber) -> Vec<&AccountRange> {
        self.ranges.iter().filter(|range| range.matches(number)).collect()
    }

    /// First matching range in table order. Only good as a PAN length hint.
    pub fn first(&self, number: &UnvalidatedCardNumber) -> Option<&AccountRange> {
        self.ranges.iter().find(|range| range.matches(number))
    }

    /// PAN length to format with before a range is confirmed: the first match
    /// that can still hold every digit typed, else the longest match.
    pub fn length_hint(&self, number: &UnvalidatedCardNumber) -> Option<usize> {
        let matches = self.filter(number);
        matches
            .iter()
            .find(|range| range.pan_length >= number.len())
            .or_else(|| matches.iter().max_by_key(|range| range.pan_length))
            .map(|range| range.pan_length)
    }

    /// Longest PAN any matching range allows.
    pub fn max_pan_length(&self, number: &UnvalidatedCardNumber) -> Option<usize> {
        self.ranges
            .iter()
            .filter(|range| range.matches(number))
            .map(|range| range.pan_length)
            .max()
    }

    /// False once the digits entered so far rule out every known range.
    pub fn is_possible_brand(&self, number: &UnvalidatedCardNumber) -> bool {
        number.is_empty() || self.first(number).is_some()
    }
}
