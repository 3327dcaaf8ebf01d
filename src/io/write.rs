// Push-based character output.
//
// `CharWrite` is the contract the emitter pushes through. `Utf8CharWriter`
// encodes through a pooled byte buffer and flushes the transcoder on close;
// `String` implements the trait directly for in-memory sinks.

use std::io::{self, Write};
use std::mem;

use crate::pool;

/// Push-based character sink over a text destination.
///
/// To keep the underlying stream open past the adapter's lifetime, build
/// the adapter over `&mut W`; `Write` is implemented for mutable
/// references.
pub trait CharWrite {
    fn write_str(&mut self, s: &str) -> io::Result<()>;

    fn write_char(&mut self, ch: char) -> io::Result<()> {
        let mut tmp = [0u8; 4];
        self.write_str(ch.encode_utf8(&mut tmp))
    }

    fn flush(&mut self) -> io::Result<()>;

    /// Flushes any buffered transcoder state. Dropping the adapter closes
    /// the underlying stream it owns.
    fn close(&mut self) -> io::Result<()>;
}

impl<T: CharWrite + ?Sized> CharWrite for &mut T {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        (**self).write_str(s)
    }
    fn write_char(&mut self, ch: char) -> io::Result<()> {
        (**self).write_char(ch)
    }
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// In-memory sink.
impl CharWrite for String {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.push_str(s);
        Ok(())
    }
    fn write_char(&mut self, ch: char) -> io::Result<()> {
        self.push(ch);
        Ok(())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// UTF-8 encoding adapter over any byte writer.
pub struct Utf8CharWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
    limit: usize,
}

impl<W: Write> Utf8CharWriter<W> {
    pub fn new(inner: W, byte_buffer_size: usize) -> Self {
        let limit = byte_buffer_size.max(4);
        Utf8CharWriter {
            inner,
            buf: pool::BYTES.rent(limit),
            limit,
        }
    }

    fn drain(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Recovers the underlying writer after draining buffered bytes.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.drain()?;
        pool::BYTES.give_back(mem::take(&mut self.buf));
        // Move `inner` out without running `drop` (the buffer is already
        // returned).
        let inner = unsafe { std::ptr::read(&self.inner) };
        mem::forget(self);
        Ok(inner)
    }
}

impl<W: Write> CharWrite for Utf8CharWriter<W> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        if self.buf.len() + s.len() > self.limit {
            self.drain()?;
        }
        if s.len() >= self.limit {
            // Oversized spans bypass the buffer entirely.
            self.inner.write_all(s.as_bytes())?;
        } else {
            self.buf.extend_from_slice(s.as_bytes());
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()?;
        self.inner.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        self.drain()?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for Utf8CharWriter<W> {
    fn drop(&mut self) {
        // Best-effort drain; errors cannot surface from drop.
        if !self.buf.is_empty() {
            let _ = self.inner.write_all(&self.buf);
        }
        pool::BYTES.give_back(mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_then_drains() {
        let mut out = Vec::new();
        {
            let mut w = Utf8CharWriter::new(&mut out, 8);
            w.write_str("ab").unwrap();
            w.write_char('é').unwrap();
            w.close().unwrap();
        }
        assert_eq!(out, "abé".as_bytes());
    }

    #[test]
    fn test_oversized_span_bypasses_buffer() {
        let mut out = Vec::new();
        {
            let mut w = Utf8CharWriter::new(&mut out, 4);
            w.write_str("x").unwrap();
            w.write_str("longer than four").unwrap();
            w.write_str("y").unwrap();
            w.close().unwrap();
        }
        assert_eq!(out, b"xlonger than foury");
    }

    #[test]
    fn test_drop_drains_remaining() {
        let mut out = Vec::new();
        {
            let mut w = Utf8CharWriter::new(&mut out, 64);
            w.write_str("tail").unwrap();
        }
        assert_eq!(out, b"tail");
    }

    #[test]
    fn test_into_inner_returns_writer() {
        let mut w = Utf8CharWriter::new(Vec::new(), 64);
        w.write_str("kept").unwrap();
        let out = w.into_inner().unwrap();
        assert_eq!(out, b"kept");
    }

    #[test]
    fn test_string_sink() {
        let mut s = String::new();
        s.write_str("a").unwrap();
        CharWrite::write_char(&mut s, ',').unwrap();
        s.close().unwrap();
        assert_eq!(s, "a,");
    }
}
