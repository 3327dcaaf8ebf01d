// Locale-dependent symbols for value conversion.
//
// Only the pieces the converters consume are modeled: the decimal separator
// and the digit group separator. Date/time kinds use ISO-8601 shapes and are
// culture-independent.

/// Numeric formatting symbols for a locale tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Culture {
    /// Locale tag, kept for diagnostics ("" = invariant).
    pub tag: String,
    pub decimal_separator: char,
    pub group_separator: char,
}

impl Culture {
    /// The invariant culture: `.` decimal point, `,` group separator.
    pub fn invariant() -> Self {
        Culture {
            tag: String::new(),
            decimal_separator: '.',
            group_separator: ',',
        }
    }

    /// Symbols for a BCP-47-style tag. Only the language subtag matters;
    /// unknown languages fall back to the invariant symbols.
    pub fn named(tag: &str) -> Self {
        let language = tag
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        let (decimal_separator, group_separator) = match language.as_str() {
            // Comma decimal, dot grouping.
            "de" | "es" | "it" | "pt" | "nl" | "id" | "tr" | "da" | "el" => (',', '.'),
            // Comma decimal, narrow/no-break space grouping.
            "fr" | "ru" | "cs" | "pl" | "sv" | "nb" | "no" | "fi" | "uk" => (',', '\u{a0}'),
            _ => ('.', ','),
        };
        Culture {
            tag: tag.to_string(),
            decimal_separator,
            group_separator,
        }
    }
}

impl Default for Culture {
    fn default() -> Self {
        Culture::invariant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_symbols() {
        let c = Culture::invariant();
        assert_eq!(c.decimal_separator, '.');
        assert_eq!(c.group_separator, ',');
    }

    #[test]
    fn test_named_german() {
        let c = Culture::named("de-DE");
        assert_eq!(c.decimal_separator, ',');
        assert_eq!(c.group_separator, '.');
    }

    #[test]
    fn test_named_french_space_grouping() {
        let c = Culture::named("fr-FR");
        assert_eq!(c.decimal_separator, ',');
        assert_eq!(c.group_separator, '\u{a0}');
    }

    #[test]
    fn test_unknown_tag_falls_back() {
        let c = Culture::named("tlh");
        assert_eq!(c.decimal_separator, '.');
    }
}
