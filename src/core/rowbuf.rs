// Row buffer: arena + tokens + current-field bookkeeping.
//
// Trimming adjusts token offsets only; field bytes are never copied or
// rewritten after they land in the arena.

use crate::core::{CharArena, FieldToken, TokenList};
use crate::options::Trim;

/// Accumulates one row's fields into the pooled arena and token list.
#[derive(Debug)]
pub struct RowBuffer {
    arena: CharArena,
    tokens: TokenList,
    current_field_start: u32,
}

impl RowBuffer {
    /// Arena capacity hint for a fresh rental.
    const ARENA_CAPACITY: usize = 256;

    pub fn new() -> Self {
        RowBuffer {
            arena: CharArena::new(Self::ARENA_CAPACITY),
            tokens: TokenList::new(),
            current_field_start: 0,
        }
    }

    /// Clears arena and tokens; keeps their storage.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.tokens.clear();
        self.current_field_start = 0;
    }

    pub fn push(&mut self, ch: char) {
        self.arena.push(ch);
    }

    /// Byte length of the field being accumulated.
    pub fn current_field_len(&self) -> u32 {
        self.arena.len() - self.current_field_start
    }

    /// Text of the field being accumulated (for bad-data reporting).
    pub fn current_field(&self) -> &str {
        self.arena
            .slice(self.current_field_start, self.current_field_len())
    }

    /// Closes the current field: computes the effective window by shrinking
    /// it per `trim` (offset adjustment only), pushes the token, and starts
    /// the next field at the arena head. Quoted fields are not trimmed.
    pub fn complete_field(&mut self, was_quoted: bool, trim: Trim) {
        let mut start = self.current_field_start as usize;
        let mut end = self.arena.len() as usize;
        if !was_quoted {
            let text = self.arena.as_str();
            if trim.start() {
                let seg = &text[start..end];
                start += seg.len() - seg.trim_start().len();
            }
            if trim.end() {
                let seg = &text[start..end];
                end -= seg.len() - seg.trim_end().len();
            }
        }
        self.tokens.push(FieldToken {
            start: start as u32,
            length: (end - start) as u32,
            was_quoted,
        });
        self.current_field_start = self.arena.len();
    }

    /// A blank line parses to exactly one zero-length unquoted field.
    pub fn is_blank_line(&self) -> bool {
        self.tokens.len() == 1
            && self
                .tokens
                .get(0)
                .is_some_and(|t| t.length == 0 && !t.was_quoted)
    }

    pub fn field_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[FieldToken] {
        self.tokens.as_slice()
    }

    pub fn arena_str(&self) -> &str {
        self.arena.as_str()
    }
}

impl Default for RowBuffer {
    fn default() -> Self {
        Self::new()
    }
}
