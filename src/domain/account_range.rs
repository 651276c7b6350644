use super::brand::CardBrand;
use super::card_number::UnvalidatedCardNumber;
use crate::error::CardEntryError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An inclusive interval of card numbers, bounds written as equal-length digit strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBinRange")]
pub struct BinRange {
    low: String,
    high: String,
}

#[derive(Deserialize)]
struct RawBinRange {
    low: String,
    high: String,
}

impl TryFrom<RawBinRange> for BinRange {
    type Error = CardEntryError;

    fn try_from(raw: RawBinRange) -> Result<Self, Self::Error> {
        Self::new(raw.low, raw.high)
    }
}

impl BinRange {
    pub fn new(low: impl Into<String>, high: impl Into<String>) -> Result<Self, CardEntryError> {
        let low = low.into();
        let high = high.into();

        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(&low) || !all_digits(&high) {
            return Err(CardEntryError::ValidationError(format!(
                "BIN bounds must be digits: {low}..{high}"
            )));
        }
        if low.len() != high.len() {
            return Err(CardEntryError::ValidationError(format!(
                "BIN bounds must have equal length: {low}..{high}"
            )));
        }
        if low > high {
            return Err(CardEntryError::ValidationError(format!(
                "BIN low bound exceeds high bound: {low}..{high}"
            )));
        }

        Ok(Self { low, high })
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }

    /// Whether the number's leading digits fall inside the interval.
    ///
    /// Bounds and number are compared on their common prefix length, so a
    /// partial number matches every range it could still grow into.
    pub fn matches(&self, number: &UnvalidatedCardNumber) -> bool {
        let digits = number.normalized();
        if digits.is_empty() {
            return false;
        }

        compare_prefix(digits, &self.low) != Ordering::Less
            && compare_prefix(digits, &self.high) != Ordering::Greater
    }
}

// Same-length ASCII digit strings order numerically.
fn compare_prefix(digits: &str, bound: &str) -> Ordering {
    let len = digits.len().min(bound.len());
    digits[..len].cmp(&bound[..len])
}

/// Issuer data for a BIN interval: brand and expected PAN length.
///
/// Ranges from the bundled table and from a remote lookup share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRange {
    pub bin_range: BinRange,
    pub pan_length: usize,
    pub brand: CardBrand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl AccountRange {
    pub fn new(bin_range: BinRange, pan_length: usize, brand: CardBrand) -> Self {
        Self {
            bin_range,
            pan_length,
            brand,
            country: None,
        }
    }

    pub fn matches(&self, number: &UnvalidatedCardNumber) -> bool {
        self.bin_range.matches(number)
    }
}
