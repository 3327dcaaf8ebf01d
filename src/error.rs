// Error taxonomy for reading, writing, and configuration.
//
// Runtime failures carry the positional tuple (row index, line number, field
// index). Configuration failures are raised at construction and never routed
// through the bad-data callback.

use std::fmt;
use std::io;

use thiserror::Error;

/// Where in the input a runtime failure happened.
///
/// `row_index` counts emitted data rows (0-based, header excluded);
/// `line_number` counts physical lines (1-based); `field_index` is the
/// ordinal of the field being processed when the failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub row_index: u64,
    pub line_number: u64,
    pub field_index: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}, line {}, field {}",
            self.row_index, self.line_number, self.field_index
        )
    }
}

/// Context handed to the bad-data callback in lenient mode.
///
/// `raw_field` is a copy of the field contents accumulated so far; the
/// zero-copy row path is unaffected by the copy.
#[derive(Debug, Clone)]
pub struct BadDataContext {
    pub row_index: u64,
    pub line_number: u64,
    pub field_index: usize,
    pub message: String,
    pub raw_field: String,
}

impl BadDataContext {
    pub(crate) fn new(position: Position, message: String, raw_field: String) -> Self {
        BadDataContext {
            row_index: position.row_index,
            line_number: position.line_number,
            field_index: position.field_index,
            message,
            raw_field,
        }
    }
}

/// Any failure surfaced by a reader or writer.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Rejected option values, raised at construction regardless of read
    /// mode.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// EOF was reached while inside a quoted field.
    #[error("unterminated quoted field at end of input ({0})")]
    UnterminatedQuote(Position),

    /// A quote character appeared in the middle of an unquoted field.
    #[error("unexpected quote in unquoted field ({0})")]
    StrayQuote(Position),

    /// A non-delimiter, non-whitespace character followed a closing quote.
    #[error("unexpected character after closing quote ({0})")]
    TrailingAfterQuote(Position),

    /// A row's field count diverged from the detected column count. The
    /// position's field index is the actual count.
    #[error("expected {expected} fields but row has {actual} ({position})")]
    ColumnCountMismatch {
        expected: usize,
        actual: usize,
        position: Position,
    },

    /// A mapped member names a column the header does not contain.
    #[error("no column named '{column}' for member '{member}'")]
    MissingColumn { column: String, member: String },

    /// A mapped member resolved to a field index the row does not have.
    #[error("row has no field at index {index} for member '{member}' ({position})")]
    MissingField {
        index: usize,
        member: String,
        position: Position,
    },

    /// A field's text could not be converted to the member's type.
    #[error("cannot convert '{value}' to {target} ({position})")]
    Convert {
        value: String,
        target: &'static str,
        position: Position,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CsvError {
    /// The positional tuple, for errors that carry one.
    pub fn position(&self) -> Option<Position> {
        match self {
            CsvError::UnterminatedQuote(p)
            | CsvError::StrayQuote(p)
            | CsvError::TrailingAfterQuote(p) => Some(*p),
            CsvError::ColumnCountMismatch { position, .. }
            | CsvError::MissingField { position, .. }
            | CsvError::Convert { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        let p = Position {
            row_index: 3,
            line_number: 5,
            field_index: 1,
        };
        assert_eq!(p.to_string(), "row 3, line 5, field 1");
    }

    #[test]
    fn test_error_carries_position() {
        let p = Position {
            row_index: 0,
            line_number: 2,
            field_index: 1,
        };
        let err = CsvError::StrayQuote(p);
        assert_eq!(err.position(), Some(p));
        assert!(err.to_string().contains("line 2"));

        let cfg = CsvError::Config("delimiter must not be NUL".into());
        assert_eq!(cfg.position(), None);
    }
}
