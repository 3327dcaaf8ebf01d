// Async writer facade.
//
// Operation-for-operation mirror of `crate::writer::CsvWriter`; the
// quoting decision and escape segmentation are shared, and only the sink
// pushes await. `close` must be awaited to flush the transcoder.

use std::mem;

use futures::io::AsyncWrite;
use log::debug;

use crate::aio::chars::AsyncUtf8CharWriter;
use crate::convert::{ConvertContext, CsvConvert};
use crate::error::CsvError;
use crate::mapping::{CsvRecord, MapRegistry, TypeMap};
use crate::options::CsvOptions;
use crate::pool;
use crate::writer::needs_quoting;

/// Streaming CSV writer over an async byte sink. Suspends only at the
/// output boundary; dropping an in-flight future cancels there.
pub struct AsyncCsvWriter<W> {
    out: AsyncUtf8CharWriter<W>,
    options: CsvOptions,
    first_field: bool,
    field_index: usize,
    row_index: u64,
    maps: MapRegistry,
    scratch: String,
}

impl<W: AsyncWrite + Unpin> AsyncCsvWriter<W> {
    /// Builds a writer encoding UTF-8 into an async byte sink.
    pub fn from_writer(writer: W, options: CsvOptions) -> Result<Self, CsvError> {
        options.validate()?;
        let out = AsyncUtf8CharWriter::new(writer, options.byte_buffer_size);
        Ok(AsyncCsvWriter {
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
    pub async fn write_field(&mut self, field: &str) -> Result<(), CsvError> {
        if !self.first_field {
            self.out.write_char(self.options.delimiter).await?;
        }
        let quote = self.options.quote;
        if needs_quoting(field, self.options.delimiter, quote) {
            self.out.write_char(quote).await?;
            let mut rest = field;
            while let Some(i) = rest.find(quote) {
                self.out.write_str(&rest[..i]).await?;
                self.out.write_char(self.options.escape).await?;
                self.out.write_char(quote).await?;
                rest = &rest[i + quote.len_utf8()..];
            }
            self.out.write_str(rest).await?;
            self.out.write_char(quote).await?;
        } else {
            self.out.write_str(field).await?;
        }
        self.first_field = false;
        self.field_index += 1;
        Ok(())
    }

    /// Writes one value through its conversion; `None` emits an empty
    /// field.
    pub async fn write_value<T: CsvConvert>(&mut self, value: &T) -> Result<(), CsvError> {
        let mut scratch = mem::take(&mut self.scratch);
        scratch.clear();
        {
            let ctx = ConvertContext {
                culture: &self.options.culture,
            };
            value.format_field(&mut scratch, &ctx);
        }
        let result = self.write_field(&scratch).await;
        self.scratch = scratch;
        result
    }

    /// Ends the current record: emits the configured or platform newline
    /// and resets the field counter.
    pub async fn next_record(&mut self) -> Result<(), CsvError> {
        let newline = self.options.output_newline();
        self.out.write_str(newline).await?;
        self.first_field = true;
        self.field_index = 0;
        self.row_index += 1;
        Ok(())
    }

    /// Writes the mapped member names of `T` as a record, in member order,
    /// skipping ignored members.
    pub async fn write_header<T: CsvRecord + 'static>(&mut self) -> Result<(), CsvError> {
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
            self.write_field(name).await?;
        }
        self.next_record().await
    }

    /// Writes one record's members in order, skipping ignored members,
    /// and ends the record.
    pub async fn write_record<T: CsvRecord + 'static>(
        &mut self,
        record: &T,
    ) -> Result<(), CsvError> {
        self.maps.ensure::<T>();
        let maps = mem::take(&mut self.maps);
        let result = match maps.get::<T>() {
            Some(map) => self.emit_record(record, map).await,
            None => Ok(()),
        };
        self.maps = maps;
        result?;
        self.next_record().await
    }

    async fn emit_record<T: CsvRecord>(
        &mut self,
        record: &T,
        map: &TypeMap<T>,
    ) -> Result<(), CsvError> {
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
            if let Err(err) = self.write_field(&scratch).await {
                result = Err(err);
                break;
            }
        }
        self.scratch = scratch;
        result
    }

    pub async fn flush(&mut self) -> Result<(), CsvError> {
        self.out.flush().await?;
        Ok(())
    }

    /// Flushes the transcoder and returns the formatting scratch to the
    /// pool. Dropping the writer afterwards closes the sink it owns.
    pub async fn close(&mut self) -> Result<(), CsvError> {
        debug!("closing async writer after {} records", self.row_index);
        self.out.close().await?;
        pool::STRINGS.give_back(mem::take(&mut self.scratch));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn nl_options() -> CsvOptions {
        CsvOptions {
            newline: Some("\n".to_string()),
            ..CsvOptions::default()
        }
    }

    #[test]
    fn test_async_writer_quotes_and_escapes() {
        block_on(async {
            let mut sink = Vec::new();
            {
                let mut w = AsyncCsvWriter::from_writer(&mut sink, nl_options()).unwrap();
                w.write_field("1").await.unwrap();
                w.write_field("a \"q\" b").await.unwrap();
                w.next_record().await.unwrap();
                w.write_value(&3.5f64).await.unwrap();
                w.write_value(&None::<i32>).await.unwrap();
                w.next_record().await.unwrap();
                w.close().await.unwrap();
            }
            assert_eq!(
                String::from_utf8(sink).unwrap(),
                "1,\"a \"\"q\"\" b\"\n3.5,\n"
            );
        });
    }
}
