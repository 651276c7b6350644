use crate::error::{CardEntryError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EditAction {
    /// Types `text` one character at a time at the cursor.
    Type,
    /// Deletes `removed` characters (default 1) before the cursor, one at a time.
    Backspace,
    /// Replaces `removed` characters at `start` with `text`.
    Edit,
    /// Reports the whole field content as `text`.
    Replace,
    /// Waits for an outstanding account range lookup.
    Settle,
    Blur,
    Focus,
}

/// One row of an edit script: `action,start,removed,text`.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct EditCommand {
    pub action: EditAction,
    pub start: Option<usize>,
    pub removed: Option<usize>,
    pub text: Option<String>,
}

/// Reads edit commands from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace around fields and tolerating rows
/// that omit trailing columns.
pub struct EditScriptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EditScriptReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes commands; a bad row yields an error and
    /// reading continues with the next one.
    pub fn commands(self) -> impl Iterator<Item = Result<EditCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CardEntryError::from))
    }
}
