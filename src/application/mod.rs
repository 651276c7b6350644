//! Application layer: the edit cycle of the card number field.
//!
//! [`coordinator::EditCoordinator`] sequences each edit through capture,
//! resolution, reformatting and rewrite. [`resolver::AccountRangeResolver`]
//! decides between the static table and the remote lookup, and
//! [`cursor::compute_cursor`] places the cursor in the reformatted text.

pub mod coordinator;
pub mod cursor;
pub mod resolver;
