use crate::error::CardEntryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Card networks the field can recognise.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Visa,
    MasterCard,
    #[serde(rename = "amex")]
    AmericanExpress,
    Discover,
    #[serde(rename = "jcb")]
    Jcb,
    #[serde(rename = "diners")]
    DinersClub,
    UnionPay,
    #[default]
    Unknown,
}

impl CardBrand {
    pub const ALL: [CardBrand; 8] = [
        CardBrand::Visa,
        CardBrand::MasterCard,
        CardBrand::AmericanExpress,
        CardBrand::Discover,
        CardBrand::Jcb,
        CardBrand::DinersClub,
        CardBrand::UnionPay,
        CardBrand::Unknown,
    ];

    /// Stable lowercase identifier, matching the serde representation.
    pub fn code(self) -> &'static str {
        match self {
            CardBrand::Visa => "visa",
            CardBrand::MasterCard => "mastercard",
            CardBrand::AmericanExpress => "amex",
            CardBrand::Discover => "discover",
            CardBrand::Jcb => "jcb",
            CardBrand::DinersClub => "diners",
            CardBrand::UnionPay => "unionpay",
            CardBrand::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CardBrand {
    type Err = CardEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CardBrand::ALL
            .into_iter()
            .find(|brand| brand.code() == wanted)
            .ok_or_else(|| CardEntryError::ValidationError(format!("Unknown card brand: {s}")))
    }
}
