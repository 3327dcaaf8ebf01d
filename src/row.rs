// Read-only view of the most recently parsed row.
//
// The view borrows the parser's arena. It is valid from emit until the next
// read; the borrow is tied to an exclusive borrow of the reader, so the
// compiler enforces the lifetime. Callers that need to retain field data
// use `field_string` or copy explicitly.

use crate::core::FieldToken;

/// Zero-copy handle to one parsed row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'r> {
    arena: &'r str,
    tokens: &'r [FieldToken],
    row_index: u64,
    line_number: u64,
}

impl<'r> Row<'r> {
    pub(crate) fn new(
        arena: &'r str,
        tokens: &'r [FieldToken],
        row_index: u64,
        line_number: u64,
    ) -> Self {
        Row {
            arena,
            tokens,
            row_index,
            line_number,
        }
    }

    pub fn field_count(&self) -> usize {
        self.tokens.len()
    }

    /// 0-based ordinal among data rows; the header row is not counted.
    pub fn row_index(&self) -> u64 {
        self.row_index
    }

    /// 1-based physical line the row ended on.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Borrowed field contents. Indexing past `field_count` is a
    /// programmer error and panics.
    pub fn field(&self, index: usize) -> &'r str {
        match self.get(index) {
            Some(field) => field,
            None => panic!(
                "field index {} out of range for row with {} fields",
                index,
                self.tokens.len()
            ),
        }
    }

    pub fn get(&self, index: usize) -> Option<&'r str> {
        self.tokens.get(index).map(|t| self.slice(*t))
    }

    /// Owned copy of a field, for callers retaining data past the next
    /// read.
    pub fn field_string(&self, index: usize) -> String {
        self.field(index).to_string()
    }

    pub fn was_quoted(&self, index: usize) -> bool {
        self.tokens
            .get(index)
            .map(|t| t.was_quoted)
            .unwrap_or(false)
    }

    pub fn field_token(&self, index: usize) -> Option<FieldToken> {
        self.tokens.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'r str> + '_ {
        self.tokens.iter().map(|t| self.slice(*t))
    }

    fn slice(&self, token: FieldToken) -> &'r str {
        &self.arena[token.start as usize..token.end() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (&'static str, Vec<FieldToken>) {
        let arena = "1Ada,Lovelace";
        let tokens = vec![
            FieldToken {
                start: 0,
                length: 1,
                was_quoted: false,
            },
            FieldToken {
                start: 1,
                length: 12,
                was_quoted: true,
            },
        ];
        (arena, tokens)
    }

    #[test]
    fn test_field_access() {
        let (arena, tokens) = sample();
        let row = Row::new(arena, &tokens, 0, 2);
        assert_eq!(row.field_count(), 2);
        assert_eq!(row.field(0), "1");
        assert_eq!(row.field(1), "Ada,Lovelace");
        assert!(row.was_quoted(1));
        assert!(!row.was_quoted(0));
        assert_eq!(row.get(2), None);
        assert_eq!(row.row_index(), 0);
        assert_eq!(row.line_number(), 2);
    }

    #[test]
    fn test_iter_collects_fields() {
        let (arena, tokens) = sample();
        let row = Row::new(arena, &tokens, 0, 1);
        let fields: Vec<&str> = row.iter().collect();
        assert_eq!(fields, vec!["1", "Ada,Lovelace"]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_panics() {
        let (arena, tokens) = sample();
        let row = Row::new(arena, &tokens, 0, 1);
        let _ = row.field(5);
    }
}
