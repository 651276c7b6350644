//! Implementations of the account range lookup port.

pub mod cached;
pub mod in_memory;
pub mod loading;
