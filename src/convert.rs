// Span-to-value parsing and value-to-text formatting.
//
// The `CsvConvert` trait is the conversion registry: the compiler resolves
// the converter per member type, and per-member overrides go through
// `ValueConverter` trait objects captured into the mapping accessors.
// Numeric kinds honor the culture's separators; date/time kinds use
// ISO-8601 / RFC 3339 shapes.

use std::borrow::Cow;
use std::fmt::Write as _;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

use crate::culture::Culture;

/// Ambient state handed to every conversion.
pub struct ConvertContext<'a> {
    pub culture: &'a Culture,
}

/// A field's text could not be converted; the caller attaches position.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot convert '{value}' to {target}")]
pub struct ConvertError {
    pub value: String,
    pub target: &'static str,
}

impl ConvertError {
    pub fn new(value: &str, target: &'static str) -> Self {
        ConvertError {
            value: value.to_string(),
            target,
        }
    }
}

/// A type that can be parsed from and formatted to a CSV field.
pub trait CsvConvert: Sized {
    /// Name used in conversion failure messages.
    const TYPE_NAME: &'static str;

    fn parse_field(field: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConvertError>;

    fn format_field(&self, dst: &mut String, ctx: &ConvertContext<'_>);
}

/// A per-member converter override, captured into mapping accessors.
pub trait ValueConverter<V>: Send + Sync {
    fn parse(&self, field: &str, ctx: &ConvertContext<'_>) -> Result<V, ConvertError>;

    fn format(&self, value: &V, dst: &mut String, ctx: &ConvertContext<'_>);
}

/// Removes the culture's group separators so `1,234` / `1.234` / `1 234`
/// parse as integers under their respective cultures.
fn strip_group_separators<'a>(field: &'a str, culture: &Culture) -> Cow<'a, str> {
    if field.contains(culture.group_separator) {
        Cow::Owned(
            field
                .chars()
                .filter(|&c| c != culture.group_separator)
                .collect(),
        )
    } else {
        Cow::Borrowed(field)
    }
}

/// Group separators removed and the culture's decimal separator mapped to
/// `.` so the standard float parser applies.
fn normalize_decimal<'a>(field: &'a str, culture: &Culture) -> Cow<'a, str> {
    let stripped = strip_group_separators(field, culture);
    if culture.decimal_separator != '.' && stripped.contains(culture.decimal_separator) {
        Cow::Owned(
            stripped
                .chars()
                .map(|c| {
                    if c == culture.decimal_separator {
                        '.'
                    } else {
                        c
                    }
                })
                .collect(),
        )
    } else {
        stripped
    }
}

impl CsvConvert for String {
    const TYPE_NAME: &'static str = "string";

    fn parse_field(field: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        Ok(field.to_string())
    }

    fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
        dst.push_str(self);
    }
}

impl CsvConvert for bool {
    const TYPE_NAME: &'static str = "bool";

    // `1`/`0` are accepted regardless of culture, matching the source
    // behavior.
    fn parse_field(field: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        let trimmed = field.trim();
        if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
            Ok(true)
        } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
            Ok(false)
        } else {
            Err(ConvertError::new(field, Self::TYPE_NAME))
        }
    }

    fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
        dst.push_str(if *self { "true" } else { "false" });
    }
}

impl CsvConvert for char {
    const TYPE_NAME: &'static str = "char";

    fn parse_field(field: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        let mut chars = field.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Ok(ch),
            _ => Err(ConvertError::new(field, Self::TYPE_NAME)),
        }
    }

    fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
        dst.push(*self);
    }
}

macro_rules! impl_int_convert {
    ($($ty:ty => $name:literal),+ $(,)?) => {$(
        impl CsvConvert for $ty {
            const TYPE_NAME: &'static str = $name;

            fn parse_field(field: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
                strip_group_separators(field.trim(), ctx.culture)
                    .parse::<$ty>()
                    .map_err(|_| ConvertError::new(field, Self::TYPE_NAME))
            }

            fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
                let _ = write!(dst, "{}", self);
            }
        }
    )+};
}

impl_int_convert! {
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
}

macro_rules! impl_float_convert {
    ($($ty:ty => $name:literal),+ $(,)?) => {$(
        impl CsvConvert for $ty {
            const TYPE_NAME: &'static str = $name;

            fn parse_field(field: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
                normalize_decimal(field.trim(), ctx.culture)
                    .parse::<$ty>()
                    .map_err(|_| ConvertError::new(field, Self::TYPE_NAME))
            }

            fn format_field(&self, dst: &mut String, ctx: &ConvertContext<'_>) {
                let start = dst.len();
                let _ = write!(dst, "{}", self);
                let sep = ctx.culture.decimal_separator;
                if sep != '.' {
                    if let Some(pos) = dst[start..].find('.') {
                        let at = start + pos;
                        dst.replace_range(at..at + 1, sep.encode_utf8(&mut [0u8; 4]));
                    }
                }
            }
        }
    )+};
}

impl_float_convert! {
    f32 => "f32",
    f64 => "f64",
}

impl CsvConvert for Date {
    const TYPE_NAME: &'static str = "date";

    fn parse_field(field: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        Date::parse(field.trim(), format_description!("[year]-[month]-[day]"))
            .map_err(|_| ConvertError::new(field, Self::TYPE_NAME))
    }

    fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
        if let Ok(text) = self.format(format_description!("[year]-[month]-[day]")) {
            dst.push_str(&text);
        }
    }
}

impl CsvConvert for Time {
    const TYPE_NAME: &'static str = "time";

    fn parse_field(field: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        Time::parse(field.trim(), format_description!("[hour]:[minute]:[second]"))
            .map_err(|_| ConvertError::new(field, Self::TYPE_NAME))
    }

    fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
        if let Ok(text) = self.format(format_description!("[hour]:[minute]:[second]")) {
            dst.push_str(&text);
        }
    }
}

impl CsvConvert for PrimitiveDateTime {
    const TYPE_NAME: &'static str = "datetime";

    // Accepts both the space-separated and the `T`-separated forms.
    fn parse_field(field: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        let trimmed = field.trim();
        PrimitiveDateTime::parse(
            trimmed,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
        .or_else(|_| {
            PrimitiveDateTime::parse(
                trimmed,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
        })
        .map_err(|_| ConvertError::new(field, Self::TYPE_NAME))
    }

    fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
        if let Ok(text) = self.format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        )) {
            dst.push_str(&text);
        }
    }
}

impl CsvConvert for OffsetDateTime {
    const TYPE_NAME: &'static str = "datetime-offset";

    fn parse_field(field: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        OffsetDateTime::parse(field.trim(), &Rfc3339)
            .map_err(|_| ConvertError::new(field, Self::TYPE_NAME))
    }

    fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
        if let Ok(text) = self.format(&Rfc3339) {
            dst.push_str(&text);
        }
    }
}

impl CsvConvert for Uuid {
    const TYPE_NAME: &'static str = "uuid";

    fn parse_field(field: &str, _ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        Uuid::parse_str(field.trim()).map_err(|_| ConvertError::new(field, Self::TYPE_NAME))
    }

    fn format_field(&self, dst: &mut String, _ctx: &ConvertContext<'_>) {
        let _ = write!(dst, "{}", self);
    }
}

/// Empty input is `None` for nullable targets; `None` formats as an empty
/// field.
impl<V: CsvConvert> CsvConvert for Option<V> {
    const TYPE_NAME: &'static str = V::TYPE_NAME;

    fn parse_field(field: &str, ctx: &ConvertContext<'_>) -> Result<Self, ConvertError> {
        if field.is_empty() {
            Ok(None)
        } else {
            V::parse_field(field, ctx).map(Some)
        }
    }

    fn format_field(&self, dst: &mut String, ctx: &ConvertContext<'_>) {
        if let Some(value) = self {
            value.format_field(dst, ctx);
        }
    }
}

/// Implements [`CsvConvert`] for a unit enum: variant names are matched
/// case-insensitively on read and written verbatim on write.
#[macro_export]
macro_rules! csv_enum {
    ($ty:ty { $($variant:ident),+ $(,)? }) => {
        impl $crate::CsvConvert for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn parse_field(
                field: &str,
                _ctx: &$crate::ConvertContext<'_>,
            ) -> Result<Self, $crate::ConvertError> {
                let trimmed = field.trim();
                $(
                    if trimmed.eq_ignore_ascii_case(stringify!($variant)) {
                        return Ok(<$ty>::$variant);
                    }
                )+
                Err($crate::ConvertError::new(field, Self::TYPE_NAME))
            }

            fn format_field(&self, dst: &mut String, _ctx: &$crate::ConvertContext<'_>) {
                match self {
                    $(<$ty>::$variant => dst.push_str(stringify!($variant)),)+
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    fn ctx(culture: &Culture) -> ConvertContext<'_> {
        ConvertContext { culture }
    }

    fn parse<T: CsvConvert>(field: &str, culture: &Culture) -> Result<T, ConvertError> {
        T::parse_field(field, &ctx(culture))
    }

    fn format<T: CsvConvert>(value: &T, culture: &Culture) -> String {
        let mut out = String::new();
        value.format_field(&mut out, &ctx(culture));
        out
    }

    #[test]
    fn test_bool_tokens() {
        let c = Culture::invariant();
        assert_eq!(parse::<bool>("TRUE", &c), Ok(true));
        assert_eq!(parse::<bool>("false", &c), Ok(false));
        assert_eq!(parse::<bool>("1", &c), Ok(true));
        assert_eq!(parse::<bool>("0", &c), Ok(false));
        assert!(parse::<bool>("yes", &c).is_err());
    }

    #[test]
    fn test_int_with_thousands_separators() {
        let c = Culture::invariant();
        assert_eq!(parse::<i64>("1,234,567", &c), Ok(1_234_567));
        assert_eq!(parse::<u16>(" 42 ", &c), Ok(42));
        assert!(parse::<u8>("300", &c).is_err());
    }

    #[test]
    fn test_float_honors_culture() {
        let de = Culture::named("de-DE");
        assert_eq!(parse::<f64>("1.234,5", &de), Ok(1234.5));
        assert_eq!(format(&1234.5f64, &de), "1234,5");

        let inv = Culture::invariant();
        assert_eq!(parse::<f64>("1,234.5", &inv), Ok(1234.5));
        assert_eq!(format(&1234.5f64, &inv), "1234.5");
    }

    #[test]
    fn test_char_single_only() {
        let c = Culture::invariant();
        assert_eq!(parse::<char>("x", &c), Ok('x'));
        assert!(parse::<char>("xy", &c).is_err());
        assert!(parse::<char>("", &c).is_err());
    }

    #[test]
    fn test_date_roundtrip() {
        let c = Culture::invariant();
        let d = date!(2024 - 02 - 29);
        assert_eq!(format(&d, &c), "2024-02-29");
        assert_eq!(parse::<Date>("2024-02-29", &c), Ok(d));
        assert!(parse::<Date>("02/29/2024", &c).is_err());
    }

    #[test]
    fn test_datetime_both_separators() {
        let c = Culture::invariant();
        let dt = datetime!(2024-02-29 13:45:10);
        assert_eq!(parse::<PrimitiveDateTime>("2024-02-29 13:45:10", &c), Ok(dt));
        assert_eq!(parse::<PrimitiveDateTime>("2024-02-29T13:45:10", &c), Ok(dt));
        assert_eq!(format(&dt, &c), "2024-02-29 13:45:10");
    }

    #[test]
    fn test_time_of_day() {
        let c = Culture::invariant();
        assert_eq!(parse::<Time>("13:45:10", &c), Ok(time!(13:45:10)));
    }

    #[test]
    fn test_offset_datetime_rfc3339() {
        let c = Culture::invariant();
        let parsed = parse::<OffsetDateTime>("2024-02-29T13:45:10Z", &c).unwrap();
        assert_eq!(format(&parsed, &c), "2024-02-29T13:45:10Z");
    }

    #[test]
    fn test_uuid() {
        let c = Culture::invariant();
        let id = parse::<Uuid>("67e55044-10b1-426f-9247-bb680e5fe0c8", &c).unwrap();
        assert_eq!(format(&id, &c), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert!(parse::<Uuid>("not-a-uuid", &c).is_err());
    }

    #[test]
    fn test_option_empty_is_none() {
        let c = Culture::invariant();
        assert_eq!(parse::<Option<i32>>("", &c), Ok(None));
        assert_eq!(parse::<Option<i32>>("7", &c), Ok(Some(7)));
        assert_eq!(format(&None::<i32>, &c), "");
    }

    #[derive(Debug, PartialEq)]
    enum Color {
        Red,
        DarkBlue,
    }
    csv_enum!(Color { Red, DarkBlue });

    #[test]
    fn test_enum_case_insensitive() {
        let c = Culture::invariant();
        assert_eq!(parse::<Color>("red", &c), Ok(Color::Red));
        assert_eq!(parse::<Color>("DARKBLUE", &c), Ok(Color::DarkBlue));
        assert_eq!(format(&Color::DarkBlue, &c), "DarkBlue");
        assert!(parse::<Color>("green", &c).is_err());
    }
}
