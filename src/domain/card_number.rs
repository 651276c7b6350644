use serde::{Deserialize, Serialize};

/// PAN length assumed when neither a resolved nor a static range gives one.
pub const DEFAULT_PAN_LENGTH: usize = 16;
/// Shortest PAN that can ever validate.
pub const MIN_PAN_LENGTH: usize = 14;
pub const MAX_PAN_LENGTH: usize = 19;
pub const BIN_LENGTH: usize = 6;
/// Minimum digit count for an insertion at offset 0 to be treated as a paste.
pub const MIN_PASTE_LENGTH: usize = 8;

const SHORT_SPACE_POSITIONS: &[usize] = &[4, 11];
const DEFAULT_SPACE_POSITIONS: &[usize] = &[4, 9, 14];
const LONG_SPACE_POSITIONS: &[usize] = &[4, 9, 14, 19];

/// Offsets in the formatted text where a separator sits for a given PAN length.
pub fn space_positions(pan_length: usize) -> &'static [usize] {
    match pan_length {
        14 | 15 => SHORT_SPACE_POSITIONS,
        19 => LONG_SPACE_POSITIONS,
        _ => DEFAULT_SPACE_POSITIONS,
    }
}

/// Length of the fully formatted text for a PAN of `pan_length` digits.
pub fn formatted_pan_length(pan_length: usize) -> usize {
    pan_length + space_positions(pan_length).len()
}

/// Mod-10 checksum. Empty or non-digit input is never valid.
pub fn is_valid_luhn(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

/// A card number as typed: only the digits, in order, nothing checked yet.
///
/// Every non-digit character of the raw input is discarded, so `"4242 4242"`,
/// `"4242-4242"` and `"42424242"` normalize to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UnvalidatedCardNumber {
    normalized: String,
}

impl UnvalidatedCardNumber {
    pub fn new(raw: &str) -> Self {
        Self {
            normalized: raw.chars().filter(char::is_ascii_digit).collect(),
        }
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// The issuer prefix, present only once `BIN_LENGTH` digits are entered.
    pub fn bin(&self) -> Option<&str> {
        self.normalized.get(..BIN_LENGTH)
    }

    pub fn is_valid_luhn(&self) -> bool {
        is_valid_luhn(&self.normalized)
    }

    /// All digits for a PAN of `pan_length` are present.
    pub fn is_max_length(&self, pan_length: usize) -> bool {
        self.len() == pan_length
    }

    pub fn is_partial_entry(&self, pan_length: usize) -> bool {
        !self.is_empty() && self.len() != pan_length
    }

    /// Returns the validated number if it is complete for `pan_length` and passes Luhn.
    pub fn validate(&self, pan_length: usize) -> Option<ValidatedCardNumber> {
        if pan_length >= MIN_PAN_LENGTH && self.is_max_length(pan_length) && self.is_valid_luhn() {
            Some(ValidatedCardNumber {
                normalized: self.normalized.clone(),
            })
        } else {
            None
        }
    }

    /// Groups the first `pan_length` digits with single spaces.
    ///
    /// A separator is only written when a digit follows it, so partial input
    /// never ends in a space.
    pub fn formatted(&self, pan_length: usize) -> String {
        let boundaries: Vec<usize> = space_positions(pan_length)
            .iter()
            .enumerate()
            .map(|(idx, position)| position - idx)
            .collect();

        let mut formatted = String::with_capacity(formatted_pan_length(pan_length));
        for (idx, digit) in self.normalized.chars().take(pan_length).enumerate() {
            if idx > 0 && boundaries.contains(&idx) {
                formatted.push(' ');
            }
            formatted.push(digit);
        }
        formatted
    }
}

impl From<&str> for UnvalidatedCardNumber {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// A complete card number that passed the length and Luhn checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedCardNumber {
    normalized: String,
}

impl ValidatedCardNumber {
    pub fn value(&self) -> &str {
        &self.normalized
    }

    pub fn last4(&self) -> &str {
        &self.normalized[self.normalized.len() - 4..]
    }
}
