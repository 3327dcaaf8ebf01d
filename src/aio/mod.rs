// Async counterparts.
//
// The state machine is the one in `crate::parser`; only the char-refill
// and byte-flush primitives differ, so the control loops here mirror the
// sync ones around awaited IO. The conformance suite runs every scenario
// through both variants to keep them in lockstep.
//
// Executor agnostic: built on the `futures` IO traits. Dropping an
// in-flight future cancels at the pending IO boundary; the parser stays
// consistent mid-row and the next call resumes or re-reports EOF.

mod chars;
mod parser;
mod reader;
mod writer;

pub use chars::{AsyncUtf8CharReader, AsyncUtf8CharWriter};
pub use reader::AsyncCsvReader;
pub use writer::AsyncCsvWriter;
