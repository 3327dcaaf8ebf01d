// Reader/writer configuration.
//
// Plain struct with `Default`; validated once by the reader/writer
// constructors. Invalid values surface as `CsvError::Config` and are never
// routed to the bad-data callback.

use std::fmt;
use std::sync::Arc;

use crate::culture::Culture;
use crate::error::{BadDataContext, CsvError};

/// Post-read trim policy, applied by offset adjustment when a field
/// completes. Quoted fields are never trimmed; their window is exactly the
/// quoted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trim {
    #[default]
    None,
    Start,
    End,
    Both,
}

impl Trim {
    pub(crate) fn start(self) -> bool {
        matches!(self, Trim::Start | Trim::Both)
    }

    pub(crate) fn end(self) -> bool {
        matches!(self, Trim::End | Trim::Both)
    }
}

/// Error-handling mode: fail fast, or report through the bad-data callback
/// and continue best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    #[default]
    Strict,
    Lenient,
}

/// How header names are matched against member names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderComparer {
    CaseSensitive,
    #[default]
    CaseInsensitive,
}

impl HeaderComparer {
    /// Lookup key for a header or member name under this comparer.
    pub(crate) fn key(self, name: &str) -> String {
        match self {
            HeaderComparer::CaseSensitive => name.to_string(),
            HeaderComparer::CaseInsensitive => name.to_lowercase(),
        }
    }
}

/// Callback invoked for each bad-data condition in lenient mode.
pub type BadDataHandler = Arc<dyn Fn(&BadDataContext) + Send + Sync>;

/// Recognized options for readers and writers.
#[derive(Clone)]
pub struct CsvOptions {
    /// Field separator. Must not be NUL.
    pub delimiter: char,
    /// Field enclosure. Must not be NUL.
    pub quote: char,
    /// Escape prefix inside quoted fields. When equal to `quote`, escaping
    /// uses the doubled-quote convention. Must not be NUL.
    pub escape: char,
    /// Whether the first row is a header row.
    pub has_header: bool,
    /// Explicit output newline; platform default when absent.
    pub newline: Option<String>,
    pub trim: Trim,
    /// Fix the expected column count from the first row and report rows
    /// that diverge.
    pub detect_column_count: bool,
    /// Discard lines that parse to exactly one zero-length unquoted field.
    pub ignore_blank_lines: bool,
    pub read_mode: ReadMode,
    /// Locale symbols for numeric parsing/formatting.
    pub culture: Culture,
    pub header_comparer: HeaderComparer,
    /// Size of the char read buffer, in chars. Must be positive.
    pub char_buffer_size: usize,
    /// Size of the transcoder byte buffer, in bytes. Must be positive.
    pub byte_buffer_size: usize,
    /// Lenient-mode bad-data callback.
    pub bad_data_handler: Option<BadDataHandler>,
}

pub(crate) const DEFAULT_BUFFER_SIZE: usize = 16384;

#[cfg(windows)]
pub(crate) const PLATFORM_NEWLINE: &str = "\r\n";
#[cfg(not(windows))]
pub(crate) const PLATFORM_NEWLINE: &str = "\n";

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            delimiter: ',',
            quote: '"',
            escape: '"',
            has_header: true,
            newline: None,
            trim: Trim::None,
            detect_column_count: true,
            ignore_blank_lines: false,
            read_mode: ReadMode::Strict,
            culture: Culture::invariant(),
            header_comparer: HeaderComparer::CaseInsensitive,
            char_buffer_size: DEFAULT_BUFFER_SIZE,
            byte_buffer_size: DEFAULT_BUFFER_SIZE,
            bad_data_handler: None,
        }
    }
}

impl CsvOptions {
    /// Checks option values; called by reader/writer constructors.
    pub fn validate(&self) -> Result<(), CsvError> {
        if self.delimiter == '\0' {
            return Err(CsvError::Config("delimiter must not be NUL".into()));
        }
        if self.quote == '\0' {
            return Err(CsvError::Config("quote must not be NUL".into()));
        }
        if self.escape == '\0' {
            return Err(CsvError::Config("escape must not be NUL".into()));
        }
        if self.char_buffer_size == 0 {
            return Err(CsvError::Config("char_buffer_size must be positive".into()));
        }
        if self.byte_buffer_size == 0 {
            return Err(CsvError::Config("byte_buffer_size must be positive".into()));
        }
        Ok(())
    }

    /// The newline emitted between records: the explicit option, or the
    /// platform default.
    pub(crate) fn output_newline(&self) -> &str {
        self.newline.as_deref().unwrap_or(PLATFORM_NEWLINE)
    }
}

impl fmt::Debug for CsvOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvOptions")
            .field("delimiter", &self.delimiter)
            .field("quote", &self.quote)
            .field("escape", &self.escape)
            .field("has_header", &self.has_header)
            .field("newline", &self.newline)
            .field("trim", &self.trim)
            .field("detect_column_count", &self.detect_column_count)
            .field("ignore_blank_lines", &self.ignore_blank_lines)
            .field("read_mode", &self.read_mode)
            .field("culture", &self.culture)
            .field("header_comparer", &self.header_comparer)
            .field("char_buffer_size", &self.char_buffer_size)
            .field("byte_buffer_size", &self.byte_buffer_size)
            .field("bad_data_handler", &self.bad_data_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = CsvOptions::default();
        assert_eq!(opts.delimiter, ',');
        assert_eq!(opts.quote, '"');
        assert_eq!(opts.escape, '"');
        assert!(opts.has_header);
        assert!(opts.detect_column_count);
        assert_eq!(opts.read_mode, ReadMode::Strict);
        assert_eq!(opts.char_buffer_size, 16384);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_rejects_nul_chars() {
        let opts = CsvOptions {
            delimiter: '\0',
            ..CsvOptions::default()
        };
        assert!(matches!(opts.validate(), Err(CsvError::Config(_))));

        let opts = CsvOptions {
            escape: '\0',
            ..CsvOptions::default()
        };
        assert!(matches!(opts.validate(), Err(CsvError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_buffers() {
        let opts = CsvOptions {
            char_buffer_size: 0,
            ..CsvOptions::default()
        };
        assert!(matches!(opts.validate(), Err(CsvError::Config(_))));

        let opts = CsvOptions {
            byte_buffer_size: 0,
            ..CsvOptions::default()
        };
        assert!(matches!(opts.validate(), Err(CsvError::Config(_))));
    }

    #[test]
    fn test_trim_flags() {
        assert!(Trim::Both.start() && Trim::Both.end());
        assert!(Trim::Start.start() && !Trim::Start.end());
        assert!(!Trim::None.start() && !Trim::None.end());
    }

    #[test]
    fn test_header_comparer_keys() {
        assert_eq!(HeaderComparer::CaseInsensitive.key("Name"), "name");
        assert_eq!(HeaderComparer::CaseSensitive.key("Name"), "Name");
    }
}
