use super::edit_reader::EditAction;
use crate::domain::brand::CardBrand;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Field state after one script step.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct StateRecord {
    pub step: usize,
    pub action: EditAction,
    pub text: String,
    pub cursor: usize,
    pub brand: CardBrand,
    pub valid: bool,
    pub error: bool,
    pub loading: bool,
    /// Events fired during the step, `;`-separated.
    pub events: String,
}

pub struct StateWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StateWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, record: &StateRecord) -> Result<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
