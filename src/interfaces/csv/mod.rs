//! CSV edit scripts in, CSV field states out.

pub mod edit_reader;
pub mod replay;
pub mod state_writer;
