//! Domain layer: card numbers, brands, issuer ranges and the lookup port.

pub mod account_range;
pub mod brand;
pub mod card_number;
pub mod ports;
pub mod static_ranges;
