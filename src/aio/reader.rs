// Async reader facade.
//
// Operation-for-operation mirror of `crate::reader::CsvReader`; header
// capture, column-count enforcement, and materialization reuse the shared
// helpers, and only the row pull awaits.

use std::any::TypeId;
use std::collections::HashMap;

use futures::io::AsyncRead;
use log::debug;

use crate::aio::chars::AsyncUtf8CharReader;
use crate::aio::parser::AsyncParser;
use crate::error::{CsvError, Position};
use crate::mapping::{CsvRecord, MapRegistry, TypeMap};
use crate::options::CsvOptions;
use crate::parser::Newline;
use crate::reader::{
    materialize_record, report_or_raise, resolve_columns, row_to_dictionary, HeaderState,
};
use crate::row::Row;

/// Streaming CSV reader over an async byte stream. Suspends only at the
/// input boundary; dropping an in-flight future cancels there.
pub struct AsyncCsvReader<R> {
    parser: AsyncParser<R>,
    headers: Option<HeaderState>,
    expected_columns: Option<usize>,
    maps: MapRegistry,
    bindings: HashMap<TypeId, Vec<Option<usize>>>,
}

impl<R: AsyncRead + Unpin> AsyncCsvReader<R> {
    /// Builds a reader decoding UTF-8 from an async byte stream.
    pub fn from_reader(reader: R, options: CsvOptions) -> Result<Self, CsvError> {
        options.validate()?;
        debug!("opening async reader: {:?}", options);
        let source = AsyncUtf8CharReader::new(reader, options.byte_buffer_size);
        Ok(AsyncCsvReader {
            parser: AsyncParser::new(source, options),
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
    pub async fn headers(&mut self) -> Result<&[String], CsvError> {
        self.ensure_header().await?;
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

    async fn ensure_header(&mut self) -> Result<(), CsvError> {
        if self.headers.is_some() {
            return Ok(());
        }
        let comparer = self.options().header_comparer;
        if self.options().has_header {
            if self.parser.read_row().await? {
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
    pub async fn read_row(&mut self) -> Result<Option<Row<'_>>, CsvError> {
        self.ensure_header().await?;
        if !self.parser.read_row().await? {
            return Ok(None);
        }
        self.enforce_column_count()?;
        Ok(Some(self.parser.state.current_row()))
    }

    /// Reads the next row as a header-keyed dictionary. Extra columns use
    /// generated `Column{n}` names; empty fields are `None`.
    pub async fn read_dictionary(
        &mut self,
    ) -> Result<Option<HashMap<String, Option<String>>>, CsvError> {
        self.ensure_header().await?;
        if !self.parser.read_row().await? {
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
    pub async fn read_record<T: CsvRecord + 'static>(&mut self) -> Result<Option<T>, CsvError> {
        self.ensure_header().await?;
        self.prepare_bindings::<T>()?;
        if !self.parser.read_row().await? {
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
