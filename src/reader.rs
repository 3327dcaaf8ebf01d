// Reader facade.
//
// Captures the header on first read, enforces the detected column count,
// and materializes dictionaries and mapped records from the zero-copy row.
// The helpers here are shared with the async facade in `crate::aio`.

use std::any::TypeId;
use std::collections::HashMap;
use std::io::Read;

use log::{debug, warn};

use crate::convert::ConvertContext;
use crate::error::{BadDataContext, CsvError, Position};
use crate::io::{CharRead, Utf8CharReader};
use crate::mapping::{CsvRecord, MapRegistry, TypeMap};
use crate::options::{CsvOptions, HeaderComparer, ReadMode};
use crate::parser::{Newline, Parser};
use crate::row::Row;

/// Captured header names, the comparer-keyed lookup, and lazily generated
/// `Column{n}` names for indices beyond the header width.
pub(crate) struct HeaderState {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
    generated: Vec<String>,
    from_header: bool,
    comparer: HeaderComparer,
}

impl HeaderState {
    pub(crate) fn empty(comparer: HeaderComparer) -> Self {
        HeaderState {
            names: Vec::new(),
            lookup: HashMap::new(),
            generated: Vec::new(),
            from_header: false,
            comparer,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>, comparer: HeaderComparer) -> Self {
        let names: Vec<String> = row.iter().map(str::to_string).collect();
        let mut lookup = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins for duplicate header names.
            lookup.entry(comparer.key(name)).or_insert(i);
        }
        HeaderState {
            names,
            lookup,
            generated: Vec::new(),
            from_header: true,
            comparer,
        }
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn from_header(&self) -> bool {
        self.from_header
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(&self.comparer.key(name)).copied()
    }

    /// Name for a column index: the header name, or a generated `Column{n}`
    /// where `n` is the absolute index.
    pub(crate) fn name_for(&mut self, index: usize) -> &str {
        if index < self.names.len() {
            return &self.names[index];
        }
        let overflow = index - self.names.len();
        while self.generated.len() <= overflow {
            let n = self.names.len() + self.generated.len();
            self.generated.push(format!("Column{}", n));
        }
        &self.generated[overflow]
    }
}

/// Strict mode raises `err`; lenient mode hands it to the callback and
/// continues.
pub(crate) fn report_or_raise(
    options: &CsvOptions,
    err: CsvError,
    position: Position,
    raw_field: &str,
) -> Result<(), CsvError> {
    match options.read_mode {
        ReadMode::Strict => Err(err),
        ReadMode::Lenient => {
            warn!("bad data at {}: {}", position, err);
            if let Some(handler) = &options.bad_data_handler {
                let ctx = BadDataContext::new(position, err.to_string(), raw_field.to_string());
                handler(&ctx);
            }
            Ok(())
        }
    }
}

/// Resolves each ordered member to a column index:
/// explicit index, else header name via the comparer, else unresolved,
/// else (no header) a sequential fallback in member order. Ignored members
/// resolve to `None`.
pub(crate) fn resolve_columns<T: CsvRecord>(
    map: &TypeMap<T>,
    headers: &HeaderState,
    options: &CsvOptions,
    position: Position,
) -> Result<Vec<Option<usize>>, CsvError> {
    let mut bindings = Vec::new();
    let mut fallback = 0usize;
    for member in map.ordered() {
        if member.is_ignored() {
            bindings.push(None);
            continue;
        }
        let sequential = fallback;
        fallback += 1;
        let binding = if let Some(index) = member.explicit_index() {
            Some(index)
        } else if headers.from_header() {
            match headers.index_of(member.name()) {
                Some(index) => Some(index),
                None => {
                    let err = CsvError::MissingColumn {
                        column: member.name().to_string(),
                        member: member.name().to_string(),
                    };
                    report_or_raise(options, err, position, "")?;
                    None
                }
            }
        } else {
            Some(sequential)
        };
        bindings.push(binding);
    }
    Ok(bindings)
}

/// Builds a record from the row through the resolved bindings. Lenient
/// conversion failures leave the member at its default.
pub(crate) fn materialize_record<T: CsvRecord>(
    row: &Row<'_>,
    map: &TypeMap<T>,
    bindings: &[Option<usize>],
    options: &CsvOptions,
) -> Result<T, CsvError> {
    let mut record = T::default();
    let ctx = ConvertContext {
        culture: &options.culture,
    };
    for (member, binding) in map.ordered().into_iter().zip(bindings) {
        if member.is_ignored() {
            continue;
        }
        let Some(column) = *binding else {
            // Unresolved members were reported at resolution time.
            continue;
        };
        let position = Position {
            row_index: row.row_index(),
            line_number: row.line_number(),
            field_index: column,
        };
        match row.get(column) {
            None => {
                let err = CsvError::MissingField {
                    index: column,
                    member: member.name().to_string(),
                    position,
                };
                report_or_raise(options, err, position, "")?;
            }
            Some(field) => {
                if let Err(convert) = member.set(&mut record, field, &ctx) {
                    let err = CsvError::Convert {
                        value: convert.value,
                        target: convert.target,
                        position,
                    };
                    report_or_raise(options, err, position, field)?;
                }
            }
        }
    }
    Ok(record)
}

/// Column names for a row: header names, generated names beyond them;
/// empty fields become `None`.
pub(crate) fn row_to_dictionary(
    row: &Row<'_>,
    headers: &mut HeaderState,
) -> HashMap<String, Option<String>> {
    let mut dict = HashMap::with_capacity(row.field_count());
    for i in 0..row.field_count() {
        let name = headers.name_for(i).to_string();
        let field = row.field(i);
        let value = if field.is_empty() {
            None
        } else {
            Some(field.to_string())
        };
        dict.insert(name, value);
    }
    dict
}

/// Streaming CSV reader over any character source.
///
/// Rows are exposed as zero-copy views into the reader's arena; a view is
/// valid until the next read.
pub struct CsvReader<C> {
    parser: Parser<C>,
    headers: Option<HeaderState>,
    expected_columns: Option<usize>,
    maps: MapRegistry,
    bindings: HashMap<TypeId, Vec<Option<usize>>>,
}

impl<R: Read> CsvReader<Utf8CharReader<R>> {
    /// Builds a reader decoding UTF-8 from a byte stream.
    pub fn from_reader(reader: R, options: CsvOptions) -> Result<Self, CsvError> {
        options.validate()?;
        let byte_buffer_size = options.byte_buffer_size;
        CsvReader::new(Utf8CharReader::new(reader, byte_buffer_size), options)
    }
}

impl<C: CharRead> CsvReader<C> {
    pub fn new(source: C, options: CsvOptions) -> Result<Self, CsvError> {
        options.validate()?;
        debug!("opening reader: {:?}", options);
        Ok(CsvReader {
            parser: Parser::new(source, options),
            headers: None,
            expected_columns: None,
            maps: MapRegistry::new(),
            bindings: HashMap::new(),
        })
    }

    fn options(&self) -> &CsvOptions {
        &self.parser.state.options
    }

    /// The captured header names (empty when `has_header` is off). Reads
    /// the header row on first call.
    pub fn headers(&mut self) -> Result<&[String], CsvError> {
        self.ensure_header()?;
        Ok(self.headers.as_ref().map(|h| h.names()).unwrap_or(&[]))
    }

    /// First newline variant observed in the input, if any yet.
    pub fn detected_newline(&self) -> Option<Newline> {
        self.parser.state.detected_newline
    }

    /// Overrides the cached mapping for `T`.
    pub fn set_type_map<T: CsvRecord + 'static>(&mut self, map: TypeMap<T>) {
        self.maps.set(map);
        self.bindings.remove(&TypeId::of::<T>());
    }

    fn ensure_header(&mut self) -> Result<(), CsvError> {
        if self.headers.is_some() {
            return Ok(());
        }
        let comparer = self.options().header_comparer;
        if self.options().has_header {
            if self.parser.read_row()? {
                let header = HeaderState::from_row(&self.parser.state.current_row(), comparer);
                debug!("captured {} header columns", header.names().len());
                if self.options().detect_column_count {
                    self.expected_columns = Some(header.names().len());
                }
                self.headers = Some(header);
                self.parser.state.set_row_index(0);
            } else {
                self.headers = Some(HeaderState::empty(comparer));
            }
        } else {
            self.headers = Some(HeaderState::empty(comparer));
        }
        Ok(())
    }

    /// The first row fixes the expected width; mismatches report the
    /// actual count as the field index.
    fn enforce_column_count(&mut self) -> Result<(), CsvError> {
        if !self.options().detect_column_count {
            return Ok(());
        }
        let row = self.parser.state.current_row();
        let count = row.field_count();
        match self.expected_columns {
            None => {
                self.expected_columns = Some(count);
                Ok(())
            }
            Some(expected) if expected == count => Ok(()),
            Some(expected) => {
                let position = Position {
                    row_index: row.row_index(),
                    line_number: row.line_number(),
                    field_index: count,
                };
                let err = CsvError::ColumnCountMismatch {
                    expected,
                    actual: count,
                    position,
                };
                report_or_raise(self.options(), err, position, "")
            }
        }
    }

    /// Reads the next data row. `None` at end of input. The returned view
    /// borrows this reader and is invalidated by the next read.
    pub fn read_row(&mut self) -> Result<Option<Row<'_>>, CsvError> {
        self.ensure_header()?;
        if !self.parser.read_row()? {
            return Ok(None);
        }
        self.enforce_column_count()?;
        Ok(Some(self.parser.state.current_row()))
    }

    /// Reads the next row as a header-keyed dictionary. Extra columns use
    /// generated `Column{n}` names; empty fields are `None`.
    pub fn read_dictionary(&mut self) -> Result<Option<HashMap<String, Option<String>>>, CsvError> {
        self.ensure_header()?;
        if !self.parser.read_row()? {
            return Ok(None);
        }
        self.enforce_column_count()?;
        let Some(headers) = self.headers.as_mut() else {
            return Ok(None);
        };
        let row = self.parser.state.current_row();
        Ok(Some(row_to_dictionary(&row, headers)))
    }

    /// Reads the next row as a mapped record.
    pub fn read_record<T: CsvRecord + 'static>(&mut self) -> Result<Option<T>, CsvError> {
        self.ensure_header()?;
        self.prepare_bindings::<T>()?;
        if !self.parser.read_row()? {
            return Ok(None);
        }
        self.enforce_column_count()?;
        let Some(map) = self.maps.get::<T>() else {
            return Ok(None);
        };
        let Some(bindings) = self.bindings.get(&TypeId::of::<T>()) else {
            return Ok(None);
        };
        let row = self.parser.state.current_row();
        let record = materialize_record(&row, map, bindings, &self.parser.state.options)?;
        Ok(Some(record))
    }

    fn prepare_bindings<T: CsvRecord + 'static>(&mut self) -> Result<(), CsvError> {
        let type_id = TypeId::of::<T>();
        if self.bindings.contains_key(&type_id) {
            return Ok(());
        }
        self.maps.ensure::<T>();
        let resolved = {
            let Some(map) = self.maps.get::<T>() else {
                return Ok(());
            };
            let Some(headers) = self.headers.as_ref() else {
                return Ok(());
            };
            let position = Position {
                row_index: self.parser.state.row_index,
                line_number: self.parser.state.line_number,
                field_index: 0,
            };
            resolve_columns(map, headers, &self.parser.state.options, position)?
        };
        self.bindings.insert(type_id, resolved);
        Ok(())
    }
}
