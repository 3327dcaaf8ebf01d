// The parse state machine.
//
// Pulls chars from a `CharRead` in buffered increments, accumulates fields
// into the pooled row buffer, and emits one row per call. State is three
// booleans (in quotes, after closing quote, field was quoted) plus a
// one-slot pushback; every transition needs at most one char of lookahead.
//
// `ParserState` carries everything except the refill primitive so the sync
// driver here and the async driver in `crate::aio` stay in lockstep; the
// conformance suite runs every scenario through both.

use std::io;
use std::mem;

use log::{debug, warn};

use crate::core::RowBuffer;
use crate::error::{BadDataContext, CsvError, Position};
use crate::io::CharRead;
use crate::options::{CsvOptions, ReadMode};
use crate::pool;
use crate::row::Row;

/// Line-ending variant, recorded on first observation and stable
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Newline {
    Lf,
    Cr,
    CrLf,
}

impl Newline {
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::Cr => "\r",
            Newline::CrLf => "\r\n",
        }
    }
}

/// Bad-data condition detected by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BadData {
    StrayQuote,
    TrailingAfterQuote,
    UnterminatedQuote,
}

impl BadData {
    fn message(self) -> &'static str {
        match self {
            BadData::StrayQuote => "unexpected quote in unquoted field",
            BadData::TrailingAfterQuote => "unexpected character after closing quote",
            BadData::UnterminatedQuote => "unexpected end of input inside quoted field",
        }
    }

    fn into_error(self, position: Position) -> CsvError {
        match self {
            BadData::StrayQuote => CsvError::StrayQuote(position),
            BadData::TrailingAfterQuote => CsvError::TrailingAfterQuote(position),
            BadData::UnterminatedQuote => CsvError::UnterminatedQuote(position),
        }
    }
}

/// Outcome of one transition that may finish a row.
enum Step {
    Continue,
    Emit,
}

/// Machine state shared by the sync and async drivers: everything except
/// the char-refill primitive.
pub(crate) struct ParserState {
    pub(crate) options: CsvOptions,
    pub(crate) row: RowBuffer,
    pub(crate) row_index: u64,
    pub(crate) line_number: u64,
    emitted_row_index: u64,
    emitted_line: u64,
    pub(crate) detected_newline: Option<Newline>,
    pub(crate) pushback: Option<char>,
    pub(crate) in_quotes: bool,
    pub(crate) after_closing_quote: bool,
    pub(crate) field_was_quoted: bool,
    pub(crate) consumed_any: bool,
    // Hoisted from the options.
    pub(crate) trim_start: bool,
    pub(crate) distinct_escape: bool,
}

impl ParserState {
    pub(crate) fn new(options: CsvOptions) -> Self {
        let trim_start = options.trim.start();
        let distinct_escape = options.escape != options.quote;
        ParserState {
            options,
            row: RowBuffer::new(),
            row_index: 0,
            line_number: 1,
            emitted_row_index: 0,
            emitted_line: 1,
            detected_newline: None,
            pushback: None,
            in_quotes: false,
            after_closing_quote: false,
            field_was_quoted: false,
            consumed_any: false,
            trim_start,
            distinct_escape,
        }
    }

    pub(crate) fn begin_row(&mut self) {
        self.row.reset();
        self.in_quotes = false;
        self.after_closing_quote = false;
        self.field_was_quoted = false;
        self.consumed_any = false;
    }

    pub(crate) fn push(&mut self, ch: char) {
        self.row.push(ch);
    }

    pub(crate) fn complete_field(&mut self, was_quoted: bool) {
        self.row.complete_field(was_quoted, self.options.trim);
    }

    pub(crate) fn note_newline(&mut self, newline: Newline) {
        if self.detected_newline.is_none() {
            debug!("detected newline {:?}", newline);
            self.detected_newline = Some(newline);
        }
    }

    /// Applies the blank-line rule after a terminator. Returns true when
    /// the row was discarded and parsing continues.
    pub(crate) fn discard_if_blank(&mut self) -> bool {
        if self.options.ignore_blank_lines && self.row.is_blank_line() {
            self.begin_row();
            true
        } else {
            false
        }
    }

    pub(crate) fn emit(&mut self, line: u64) {
        self.emitted_row_index = self.row_index;
        self.emitted_line = line;
        self.row_index += 1;
    }

    fn position(&self) -> Position {
        Position {
            row_index: self.row_index,
            line_number: self.line_number,
            field_index: self.row.field_count(),
        }
    }

    /// Strict mode: returns the error. Lenient mode: invokes the callback
    /// and lets the caller continue best-effort.
    pub(crate) fn report(&mut self, kind: BadData) -> Result<(), CsvError> {
        let position = self.position();
        match self.options.read_mode {
            ReadMode::Strict => Err(kind.into_error(position)),
            ReadMode::Lenient => {
                warn!("bad data at {}: {}", position, kind.message());
                if let Some(handler) = &self.options.bad_data_handler {
                    let ctx = BadDataContext::new(
                        position,
                        kind.message().to_string(),
                        self.row.current_field().to_string(),
                    );
                    handler(&ctx);
                }
                Ok(())
            }
        }
    }

    /// View of the row snapshotted by the last emit. The backing storage
    /// stays valid until the next read.
    pub(crate) fn current_row(&self) -> Row<'_> {
        Row::new(
            self.row.arena_str(),
            self.row.tokens(),
            self.emitted_row_index,
            self.emitted_line,
        )
    }

    /// Rebases the data-row counter; the facade calls this after consuming
    /// the header row.
    pub(crate) fn set_row_index(&mut self, row_index: u64) {
        self.row_index = row_index;
    }
}

/// Sync driver: the state machine over a blocking `CharRead`.
pub(crate) struct Parser<C> {
    src: C,
    buf: Vec<char>,
    pos: usize,
    len: usize,
    pub(crate) state: ParserState,
}

impl<C: CharRead> Parser<C> {
    pub(crate) fn new(src: C, options: CsvOptions) -> Self {
        let size = options.char_buffer_size;
        let mut buf = pool::CHARS.rent(size);
        buf.resize(size, '\0');
        Parser {
            src,
            buf,
            pos: 0,
            len: 0,
            state: ParserState::new(options),
        }
    }

    /// The read primitive: pushback slot first, then the buffered window,
    /// refilled from the source on exhaustion. `None` at EOF.
    fn read_char(&mut self) -> io::Result<Option<char>> {
        if let Some(ch) = self.state.pushback.take() {
            return Ok(Some(ch));
        }
        if self.pos == self.len {
            self.len = self.src.read_chars(&mut self.buf)?;
            self.pos = 0;
            if self.len == 0 {
                return Ok(None);
            }
        }
        let ch = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(ch))
    }

    fn push_back(&mut self, ch: char) {
        debug_assert!(self.state.pushback.is_none(), "pushback slot occupied");
        self.state.pushback = Some(ch);
    }

    /// Consumes the rest of a newline after its first char and records the
    /// variant. Increments the line counter; callers snapshot the line
    /// number first.
    fn consume_newline(&mut self, first: char) -> Result<(), CsvError> {
        if first == '\r' {
            match self.read_char()? {
                Some('\n') => self.state.note_newline(Newline::CrLf),
                Some(other) => {
                    self.push_back(other);
                    self.state.note_newline(Newline::Cr);
                }
                None => self.state.note_newline(Newline::Cr),
            }
        } else {
            self.state.note_newline(Newline::Lf);
        }
        self.state.line_number += 1;
        Ok(())
    }

    /// Parses the next row into the internal buffer. Returns false at end
    /// of input. The previous row's storage is recycled on entry.
    pub(crate) fn read_row(&mut self) -> Result<bool, CsvError> {
        self.state.begin_row();
        loop {
            let Some(ch) = self.read_char()? else {
                return self.finish_at_eof();
            };
            self.state.consumed_any = true;

            let step = if self.state.in_quotes {
                self.step_in_quotes(ch)?;
                Step::Continue
            } else if self.state.after_closing_quote {
                self.step_after_quote(ch)?
            } else {
                self.step_unquoted(ch)?
            };
            if let Step::Emit = step {
                return Ok(true);
            }
        }
    }

    fn step_in_quotes(&mut self, ch: char) -> Result<(), CsvError> {
        let quote = self.state.options.quote;
        let escape = self.state.options.escape;
        if self.state.distinct_escape && ch == escape {
            match self.read_char()? {
                Some(next) if next == quote => self.state.push(quote),
                Some(next) => {
                    self.push_back(next);
                    self.state.push(escape);
                }
                None => self.state.push(escape),
            }
        } else if ch == quote {
            match self.read_char()? {
                Some(next) if next == quote => self.state.push(quote),
                Some(next) => {
                    self.push_back(next);
                    self.state.in_quotes = false;
                    self.state.after_closing_quote = true;
                }
                None => {
                    self.state.in_quotes = false;
                    self.state.after_closing_quote = true;
                }
            }
        } else if ch == '\r' || ch == '\n' {
            // Embedded newline: kept verbatim, still a physical line.
            if ch == '\r' {
                match self.read_char()? {
                    Some('\n') => {
                        self.state.push('\r');
                        self.state.push('\n');
                        self.state.note_newline(Newline::CrLf);
                    }
                    Some(next) => {
                        self.push_back(next);
                        self.state.push('\r');
                        self.state.note_newline(Newline::Cr);
                    }
                    None => {
                        self.state.push('\r');
                        self.state.note_newline(Newline::Cr);
                    }
                }
            } else {
                self.state.push('\n');
                self.state.note_newline(Newline::Lf);
            }
            self.state.line_number += 1;
        } else {
            self.state.push(ch);
        }
        Ok(())
    }

    fn step_after_quote(&mut self, ch: char) -> Result<Step, CsvError> {
        if ch == self.state.options.delimiter {
            self.state.complete_field(true);
            self.state.after_closing_quote = false;
            self.state.field_was_quoted = false;
            Ok(Step::Continue)
        } else if ch == '\r' || ch == '\n' {
            self.terminate_row(ch, true)
        } else if ch.is_whitespace() {
            Ok(Step::Continue)
        } else {
            self.state.report(BadData::TrailingAfterQuote)?;
            self.state.push(ch);
            self.state.after_closing_quote = false;
            Ok(Step::Continue)
        }
    }

    fn step_unquoted(&mut self, ch: char) -> Result<Step, CsvError> {
        let delimiter = self.state.options.delimiter;
        let quote = self.state.options.quote;
        if ch == delimiter {
            let quoted = self.state.field_was_quoted;
            self.state.complete_field(quoted);
            self.state.field_was_quoted = false;
            Ok(Step::Continue)
        } else if ch == quote && self.state.row.current_field_len() == 0 {
            self.state.in_quotes = true;
            self.state.field_was_quoted = true;
            Ok(Step::Continue)
        } else if ch == quote {
            self.state.report(BadData::StrayQuote)?;
            self.state.push(ch);
            Ok(Step::Continue)
        } else if ch == '\r' || ch == '\n' {
            let quoted = self.state.field_was_quoted;
            self.terminate_row(ch, quoted)
        } else if self.state.trim_start
            && self.state.row.current_field_len() == 0
            && ch.is_whitespace()
        {
            Ok(Step::Continue)
        } else {
            self.state.push(ch);
            Ok(Step::Continue)
        }
    }

    /// Shared row-terminator path: the emitted row reports the line it
    /// ended on, so the line snapshot happens before the newline is
    /// consumed.
    fn terminate_row(&mut self, first: char, quoted: bool) -> Result<Step, CsvError> {
        let line = self.state.line_number;
        self.consume_newline(first)?;
        self.state.complete_field(quoted);
        self.state.field_was_quoted = false;
        self.state.after_closing_quote = false;
        if self.state.discard_if_blank() {
            return Ok(Step::Continue);
        }
        self.state.emit(line);
        Ok(Step::Emit)
    }

    fn finish_at_eof(&mut self) -> Result<bool, CsvError> {
        if self.state.in_quotes {
            self.state.report(BadData::UnterminatedQuote)?;
            self.state.complete_field(true);
            let line = self.state.line_number;
            self.state.emit(line);
            return Ok(true);
        }
        if !self.state.consumed_any && self.state.row.field_count() == 0 {
            return Ok(false);
        }
        let quoted = self.state.field_was_quoted;
        self.state.complete_field(quoted);
        if self.state.options.ignore_blank_lines && self.state.row.is_blank_line() {
            return Ok(false);
        }
        let line = self.state.line_number;
        self.state.emit(line);
        Ok(true)
    }
}

impl<C> Drop for Parser<C> {
    fn drop(&mut self) {
        pool::CHARS.give_back(mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Utf8CharReader;

    fn parser(input: &str, options: CsvOptions) -> Parser<Utf8CharReader<&[u8]>> {
        Parser::new(Utf8CharReader::new(input.as_bytes(), 64), options)
    }

    fn rows_of(input: &str, options: CsvOptions) -> Vec<Vec<String>> {
        let mut p = parser(input, options);
        let mut rows = Vec::new();
        while p.read_row().unwrap() {
            rows.push(p.state.current_row().iter().map(str::to_string).collect());
        }
        rows
    }

    #[test]
    fn test_simple_rows() {
        let rows = rows_of("a,b\n1,2\n", CsvOptions::default());
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_missing_final_newline() {
        let rows = rows_of("a,b\n1,2", CsvOptions::default());
        assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
    }

    #[test]
    fn test_empty_fields() {
        let rows = rows_of("a,,c\n,,\n", CsvOptions::default());
        assert_eq!(rows, vec![vec!["a", "", "c"], vec!["", "", ""]]);
    }

    #[test]
    fn test_quoted_delimiter_and_marking() {
        let mut p = parser("1,\"Ada,Lovelace\"\n", CsvOptions::default());
        assert!(p.read_row().unwrap());
        let row = p.state.current_row();
        assert_eq!(row.field(1), "Ada,Lovelace");
        assert!(row.was_quoted(1));
        assert!(!row.was_quoted(0));
    }

    #[test]
    fn test_doubled_quote_escape() {
        let rows = rows_of("1,\"a \"\"quote\"\" b\"\n", CsvOptions::default());
        assert_eq!(rows[0][1], "a \"quote\" b");
    }

    #[test]
    fn test_distinct_escape_char() {
        let options = CsvOptions {
            delimiter: ';',
            quote: '\'',
            escape: '\\',
            ..CsvOptions::default()
        };
        let rows = rows_of("1;'Ada;Lovelace';'It\\'s fine'\n", options);
        assert_eq!(rows, vec![vec!["1", "Ada;Lovelace", "It's fine"]]);
    }

    #[test]
    fn test_distinct_escape_before_other_char_is_literal() {
        let options = CsvOptions {
            quote: '\'',
            escape: '\\',
            ..CsvOptions::default()
        };
        let rows = rows_of("'a\\b'\n", options);
        assert_eq!(rows, vec![vec!["a\\b"]]);
    }

    #[test]
    fn test_doubled_quote_still_escapes_with_distinct_escape() {
        let options = CsvOptions {
            quote: '\'',
            escape: '\\',
            ..CsvOptions::default()
        };
        let rows = rows_of("'it''s'\n", options);
        assert_eq!(rows, vec![vec!["it's"]]);
    }

    #[test]
    fn test_embedded_newline_counts_lines() {
        let mut p = parser("1,\"line1\nline2\"\n2,x\n", CsvOptions::default());
        assert!(p.read_row().unwrap());
        let row = p.state.current_row();
        assert_eq!(row.field(1), "line1\nline2");
        assert_eq!(row.line_number(), 2);
        assert!(p.read_row().unwrap());
        assert_eq!(p.state.current_row().line_number(), 3);
    }

    #[test]
    fn test_crlf_detection_is_stable() {
        let mut p = parser("a\r\n1\n2\r\n", CsvOptions::default());
        let mut rows = Vec::new();
        while p.read_row().unwrap() {
            rows.push(p.state.current_row().field(0).to_string());
        }
        assert_eq!(rows, vec!["a", "1", "2"]);
        assert_eq!(p.state.detected_newline, Some(Newline::CrLf));
    }

    #[test]
    fn test_bare_cr_newline() {
        let mut p = parser("a\r1\r", CsvOptions::default());
        assert!(p.read_row().unwrap());
        assert_eq!(p.state.current_row().field(0), "a");
        assert!(p.read_row().unwrap());
        assert!(!p.read_row().unwrap());
        assert_eq!(p.state.detected_newline, Some(Newline::Cr));
    }

    #[test]
    fn test_blank_lines_kept_by_default() {
        let rows = rows_of("a\n\nb\n", CsvOptions::default());
        assert_eq!(rows, vec![vec!["a"], vec![""], vec!["b"]]);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let options = CsvOptions {
            ignore_blank_lines: true,
            ..CsvOptions::default()
        };
        let rows = rows_of("a\n\nb\n\n", options);
        assert_eq!(rows, vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_only_blank_lines_yield_nothing() {
        let options = CsvOptions {
            ignore_blank_lines: true,
            ..CsvOptions::default()
        };
        let rows = rows_of("\n\n\n", options);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_quoted_empty_field_is_not_blank() {
        let options = CsvOptions {
            ignore_blank_lines: true,
            ..CsvOptions::default()
        };
        let rows = rows_of("\"\"\n", options);
        assert_eq!(rows, vec![vec![""]]);
    }

    #[test]
    fn test_trim_start_drops_leading_whitespace() {
        let options = CsvOptions {
            trim: crate::options::Trim::Start,
            ..CsvOptions::default()
        };
        let rows = rows_of("  a, \"q\" \n", options);
        assert_eq!(rows, vec![vec!["a", "q"]]);
    }

    #[test]
    fn test_trim_both_via_offsets() {
        let options = CsvOptions {
            trim: crate::options::Trim::Both,
            ..CsvOptions::default()
        };
        let rows = rows_of(" a \t, b \n", options);
        assert_eq!(rows, vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_quoted_content_never_trimmed() {
        let options = CsvOptions {
            trim: crate::options::Trim::Both,
            ..CsvOptions::default()
        };
        let rows = rows_of("\" padded \"\n", options);
        assert_eq!(rows, vec![vec![" padded "]]);
    }

    #[test]
    fn test_whitespace_around_closing_quote_dropped() {
        let rows = rows_of("\"a\" ,b\n", CsvOptions::default());
        assert_eq!(rows, vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_stray_quote_strict_errors() {
        let mut p = parser("te\"st\n", CsvOptions::default());
        let err = p.read_row().unwrap_err();
        assert!(matches!(err, CsvError::StrayQuote(_)));
    }

    #[test]
    fn test_stray_quote_lenient_appends() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let options = CsvOptions {
            read_mode: ReadMode::Lenient,
            bad_data_handler: Some(Arc::new(move |ctx| {
                seen.fetch_add(1, Ordering::SeqCst);
                assert!(ctx.message.contains("unexpected quote"));
                assert_eq!(ctx.raw_field, "te");
            })),
            ..CsvOptions::default()
        };
        let rows = rows_of("1,te\"st\n", options);
        assert_eq!(rows, vec![vec!["1", "te\"st"]]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unterminated_quote_strict_errors() {
        let mut p = parser("\"open\n", CsvOptions::default());
        let err = p.read_row().unwrap_err();
        assert!(matches!(err, CsvError::UnterminatedQuote(_)));
    }

    #[test]
    fn test_unterminated_quote_lenient_emits_partial() {
        let options = CsvOptions {
            read_mode: ReadMode::Lenient,
            ..CsvOptions::default()
        };
        let rows = rows_of("\"open\nstill", options);
        assert_eq!(rows, vec![vec!["open\nstill"]]);
    }

    #[test]
    fn test_junk_after_closing_quote_lenient() {
        let options = CsvOptions {
            read_mode: ReadMode::Lenient,
            ..CsvOptions::default()
        };
        let rows = rows_of("\"a\"junk,b\n", options);
        assert_eq!(rows, vec![vec!["ajunk", "b"]]);
    }

    #[test]
    fn test_junk_after_closing_quote_strict() {
        let mut p = parser("\"a\"x\n", CsvOptions::default());
        let err = p.read_row().unwrap_err();
        assert!(matches!(err, CsvError::TrailingAfterQuote(_)));
    }

    #[test]
    fn test_empty_input_has_no_rows() {
        let mut p = parser("", CsvOptions::default());
        assert!(!p.read_row().unwrap());
        assert!(!p.read_row().unwrap());
    }

    #[test]
    fn test_token_bounds_at_emit() {
        let mut p = parser("aa,\"bb\",cc\n", CsvOptions::default());
        assert!(p.read_row().unwrap());
        let arena_len = p.state.row.arena_str().len() as u32;
        for token in p.state.row.tokens() {
            assert!(token.end() <= arena_len);
        }
    }
}
