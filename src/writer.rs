// The write emitter.
//
// Quoting is decided strictly on content: boundary whitespace on a
// nonempty field, or any delimiter, quote, CR, or LF. Escaping writes the
// runs between quote occurrences as-is and prefixes each quote with the
// escape char followed by the quote char, so unaffected runs never pass
// through a temporary buffer.

use std::io::Write;
use std::mem;

use log::debug;

use crate::convert::{ConvertContext, CsvConvert};
use crate::error::CsvError;
use crate::io::{CharWrite, Utf8CharWriter};
use crate::mapping::{CsvRecord, MapRegistry, TypeMap};
use crate::options::CsvOptions;
use crate::pool;

/// Content-only quoting decision.
pub(crate) fn needs_quoting(field: &str, delimiter: char, quote: char) -> bool {
    if field.is_empty() {
        return false;
    }
    let starts_ws = field.chars().next().is_some_and(char::is_whitespace);
    let ends_ws = field.chars().next_back().is_some_and(char::is_whitespace);
    if starts_ws || ends_ws {
        return true;
    }
    field
        .chars()
        .any(|c| c == delimiter || c == quote || c == '\r' || c == '\n')
}

/// Streaming CSV writer over any character sink.
pub struct CsvWriter<W> {
    out: W,
    options: CsvOptions,
    first_field: bool,
    field_index: usize,
    row_index: u64,
    maps: MapRegistry,
    scratch: String,
}

impl<W: Write> CsvWriter<Utf8CharWriter<W>> {
    /// Builds a writer encoding UTF-8 into a byte sink.
    pub fn from_writer(writer: W, options: CsvOptions) -> Result<Self, CsvError> {
        options.validate()?;
        let byte_buffer_size = options.byte_buffer_size;
        CsvWriter::new(Utf8CharWriter::new(writer, byte_buffer_size), options)
    }
}

impl<W: CharWrite> CsvWriter<W> {
    pub fn new(out: W, options: CsvOptions) -> Result<Self, CsvError> {
        options.validate()?;
        Ok(CsvWriter {
            out,
            options,
            first_field: true,
            field_index: 0,
            row_index: 0,
            maps: MapRegistry::new(),
            scratch: pool::STRINGS.rent(64),
        })
    }

    pub fn field_index(&self) -> usize {
        self.field_index
    }

    pub fn row_index(&self) -> u64 {
        self.row_index
    }

    /// Overrides the cached mapping for `T`.
    pub fn set_type_map<T: CsvRecord + 'static>(&mut self, map: TypeMap<T>) {
        self.maps.set(map);
    }

    /// Writes one field, quoting and escaping as the content requires.
    pub fn write_field(&mut self, field: &str) -> Result<(), CsvError> {
        if !self.first_field {
            self.out.write_char(self.options.delimiter)?;
        }
        let quote = self.options.quote;
        if needs_quoting(field, self.options.delimiter, quote) {
            self.out.write_char(quote)?;
            let mut rest = field;
            while let Some(i) = rest.find(quote) {
                self.out.write_str(&rest[..i])?;
                self.out.write_char(self.options.escape)?;
                self.out.write_char(quote)?;
                rest = &rest[i + quote.len_utf8()..];
            }
            self.out.write_str(rest)?;
            self.out.write_char(quote)?;
        } else {
            self.out.write_str(field)?;
        }
        self.first_field = false;
        self.field_index += 1;
        Ok(())
    }

    /// Writes one value through its conversion; `None` emits an empty
    /// field. Strings go through `write_field` directly for the fast path.
    pub fn write_value<T: CsvConvert>(&mut self, value: &T) -> Result<(), CsvError> {
        let mut scratch = mem::take(&mut self.scratch);
        scratch.clear();
        {
            let ctx = ConvertContext {
                culture: &self.options.culture,
            };
            value.format_field(&mut scratch, &ctx);
        }
        let result = self.write_field(&scratch);
        self.scratch = scratch;
        result
    }

    /// Ends the current record: emits the configured or platform newline
    /// and resets the field counter.
    pub fn next_record(&mut self) -> Result<(), CsvError> {
        self.out.write_str(self.options.output_newline())?;
        self.first_field = true;
        self.field_index = 0;
        self.row_index += 1;
        Ok(())
    }

    /// Writes the mapped member names of `T` as a record, in member order,
    /// skipping ignored members.
    pub fn write_header<T: CsvRecord + 'static>(&mut self) -> Result<(), CsvError> {
        self.maps.ensure::<T>();
        let names: Vec<String> = match self.maps.get::<T>() {
            Some(map) => map
                .ordered()
                .into_iter()
                .filter(|m| !m.is_ignored())
                .map(|m| m.name().to_string())
                .collect(),
            None => Vec::new(),
        };
        for name in &names {
            self.write_field(name)?;
        }
        self.next_record()
    }

    /// Writes one record's members in order, skipping ignored members,
    /// and ends the record.
    pub fn write_record<T: CsvRecord + 'static>(&mut self, record: &T) -> Result<(), CsvError> {
        self.maps.ensure::<T>();
        let maps = mem::take(&mut self.maps);
        let result = match maps.get::<T>() {
            Some(map) => self.emit_record(record, map),
            None => Ok(()),
        };
        self.maps = maps;
        result?;
        self.next_record()
    }

    fn emit_record<T: CsvRecord>(&mut self, record: &T, map: &TypeMap<T>) -> Result<(), CsvError> {
        let culture = self.options.culture.clone();
        let mut scratch = mem::take(&mut self.scratch);
        let mut result = Ok(());
        for member in map.ordered() {
            if member.is_ignored() {
                continue;
            }
            scratch.clear();
            {
                let ctx = ConvertContext { culture: &culture };
                member.format(record, &mut scratch, &ctx);
            }
            if let Err(err) = self.write_field(&scratch) {
                result = Err(err);
                break;
            }
        }
        self.scratch = scratch;
        result
    }

    pub fn flush(&mut self) -> Result<(), CsvError> {
        self.out.flush()?;
        Ok(())
    }

    /// Flushes the transcoder and returns the formatting scratch to the
    /// pool. Dropping the writer afterwards closes the sink it owns.
    pub fn close(&mut self) -> Result<(), CsvError> {
        debug!("closing writer after {} records", self.row_index);
        self.out.close()?;
        pool::STRINGS.give_back(mem::take(&mut self.scratch));
        Ok(())
    }

    /// Recovers the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}
