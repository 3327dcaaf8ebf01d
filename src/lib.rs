// csvstream - Streaming CSV reading and writing over pooled buffers
//
// No unwrap/expect in production code. Fallible paths return Result and
// propagate with `?`.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//
// Layout:
//   core:          pooled arena, field tokens, row buffer
//   io:            char-level adapters over byte streams (UTF-8)
//   parser:        the state machine (sync driver + shared state)
//   reader/writer: facades - headers, column counts, mapping, emission
//   convert:       span-to-value parsing, culture-aware
//   mapping:       property-to-column binding with compiled accessors
//   aio:           async counterparts (same state machine, async refills)
//
// Rows are exposed as zero-copy views into a pooled arena; a view is valid
// until the next read and the borrow checker enforces it.

pub mod aio;
mod convert;
pub mod core;
mod culture;
mod error;
pub mod io;
mod mapping;
mod options;
mod parser;
mod pool;
mod reader;
mod row;
mod writer;

pub use convert::{ConvertContext, ConvertError, CsvConvert, ValueConverter};
pub use culture::Culture;
pub use error::{BadDataContext, CsvError, Position};
pub use mapping::{CsvRecord, MemberMap, MemberSettings, TypeMap};
pub use options::{BadDataHandler, CsvOptions, HeaderComparer, ReadMode, Trim};
pub use parser::Newline;
pub use reader::CsvReader;
pub use row::Row;
pub use writer::CsvWriter;

pub use aio::{AsyncCsvReader, AsyncCsvWriter};
