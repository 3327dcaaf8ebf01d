// Character adapters between byte streams and the char-level parser/emitter.
//
// The parser pulls chars through `CharRead`; the emitter pushes through
// `CharWrite`. UTF-8 transcoding lives entirely in the adapters, over pooled
// byte buffers. Async twins are in `crate::aio`.

mod read;
mod utf8;
mod write;

pub use read::{CharRead, Utf8CharReader};
pub use write::{CharWrite, Utf8CharWriter};

pub(crate) use utf8::decode_chars;
