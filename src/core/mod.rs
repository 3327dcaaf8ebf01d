// Row storage primitives: pooled arena, field tokens, row buffer.

mod arena;
mod rowbuf;
mod tokens;

pub use arena::CharArena;
pub use rowbuf::RowBuffer;
pub use tokens::{FieldToken, TokenList};
