// Async driver for the parse state machine.
//
// Identical control flow to `crate::parser::Parser`; only the refill
// primitive awaits. All machine state lives in the shared `ParserState`,
// and the conformance suite asserts sync/async parity scenario by
// scenario.

use std::io;
use std::mem;

use futures::io::AsyncRead;

use crate::aio::chars::AsyncUtf8CharReader;
use crate::error::CsvError;
use crate::options::CsvOptions;
use crate::parser::{BadData, Newline, ParserState};
use crate::pool;

enum Step {
    Continue,
    Emit,
}

pub(crate) struct AsyncParser<R> {
    src: AsyncUtf8CharReader<R>,
    buf: Vec<char>,
    pos: usize,
    len: usize,
    pub(crate) state: ParserState,
}

impl<R: AsyncRead + Unpin> AsyncParser<R> {
    pub(crate) fn new(src: AsyncUtf8CharReader<R>, options: CsvOptions) -> Self {
        let size = options.char_buffer_size;
        let mut buf = pool::CHARS.rent(size);
        buf.resize(size, '\0');
        AsyncParser {
            src,
            buf,
            pos: 0,
            len: 0,
            state: ParserState::new(options),
        }
    }

    async fn read_char(&mut self) -> io::Result<Option<char>> {
        if let Some(ch) = self.state.pushback.take() {
            return Ok(Some(ch));
        }
        if self.pos == self.len {
            self.len = self.src.read_chars(&mut self.buf).await?;
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

    async fn consume_newline(&mut self, first: char) -> Result<(), CsvError> {
        if first == '\r' {
            match self.read_char().await? {
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

    pub(crate) async fn read_row(&mut self) -> Result<bool, CsvError> {
        self.state.begin_row();
        loop {
            let Some(ch) = self.read_char().await? else {
                return self.finish_at_eof();
            };
            self.state.consumed_any = true;

            let step = if self.state.in_quotes {
                self.step_in_quotes(ch).await?;
                Step::Continue
            } else if self.state.after_closing_quote {
                self.step_after_quote(ch).await?
            } else {
                self.step_unquoted(ch).await?
            };
            if let Step::Emit = step {
                return Ok(true);
            }
        }
    }

    async fn step_in_quotes(&mut self, ch: char) -> Result<(), CsvError> {
        let quote = self.state.options.quote;
        let escape = self.state.options.escape;
        if self.state.distinct_escape && ch == escape {
            match self.read_char().await? {
                Some(next) if next == quote => self.state.push(quote),
                Some(next) => {
                    self.push_back(next);
                    self.state.push(escape);
                }
                None => self.state.push(escape),
            }
        } else if ch == quote {
            match self.read_char().await? {
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
            if ch == '\r' {
                match self.read_char().await? {
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

    async fn step_after_quote(&mut self, ch: char) -> Result<Step, CsvError> {
        if ch == self.state.options.delimiter {
            self.state.complete_field(true);
            self.state.after_closing_quote = false;
            self.state.field_was_quoted = false;
            Ok(Step::Continue)
        } else if ch == '\r' || ch == '\n' {
            self.terminate_row(ch, true).await
        } else if ch.is_whitespace() {
            Ok(Step::Continue)
        } else {
            self.state.report(BadData::TrailingAfterQuote)?;
            self.state.push(ch);
            self.state.after_closing_quote = false;
            Ok(Step::Continue)
        }
    }

    async fn step_unquoted(&mut self, ch: char) -> Result<Step, CsvError> {
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
            self.terminate_row(ch, quoted).await
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

    async fn terminate_row(&mut self, first: char, quoted: bool) -> Result<Step, CsvError> {
        let line = self.state.line_number;
        self.consume_newline(first).await?;
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

impl<R> Drop for AsyncParser<R> {
    fn drop(&mut self) {
        pool::CHARS.give_back(mem::take(&mut self.buf));
    }
}
