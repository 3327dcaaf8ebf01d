// Async UTF-8 character adapters over the `futures` IO traits.
//
// Same transcoding as the sync adapters in `crate::io`; only the refill
// and drain primitives await. To keep the underlying stream open past the
// adapter's lifetime, build the adapter over `&mut R`; the IO traits are
// implemented for mutable references.

use std::io;
use std::mem;

use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::io::decode_chars;
use crate::pool;

/// Async UTF-8 decoding adapter. A single leading byte-order mark is
/// stripped; invalid sequences decode to U+FFFD.
pub struct AsyncUtf8CharReader<R> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
    strip_bom: bool,
}

impl<R: AsyncRead + Unpin> AsyncUtf8CharReader<R> {
    pub fn new(inner: R, byte_buffer_size: usize) -> Self {
        let size = byte_buffer_size.max(4);
        let mut buf = pool::BYTES.rent(size);
        buf.resize(size, 0);
        AsyncUtf8CharReader {
            inner,
            buf,
            start: 0,
            end: 0,
            eof: false,
            strip_bom: true,
        }
    }

    async fn fill(&mut self) -> io::Result<()> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        let n = self.inner.read(&mut self.buf[self.end..]).await?;
        if n == 0 {
            self.eof = true;
        }
        self.end += n;
        Ok(())
    }

    /// Fills `dst` with up to `dst.len()` chars; zero only at end of
    /// input. Never splits a code point across calls.
    pub async fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        loop {
            let window = &self.buf[self.start..self.end];
            let decoded = decode_chars(window, self.eof, dst);
            self.start += decoded.bytes_consumed;
            let mut produced = decoded.chars_written;
            if self.strip_bom && produced > 0 {
                if dst[0] == '\u{feff}' {
                    dst.copy_within(1..produced, 0);
                    produced -= 1;
                }
                self.strip_bom = false;
            }
            if produced > 0 {
                return Ok(produced);
            }
            if self.eof && self.start == self.end {
                return Ok(0);
            }
            self.fill().await?;
        }
    }
}

impl<R> Drop for AsyncUtf8CharReader<R> {
    fn drop(&mut self) {
        pool::BYTES.give_back(mem::take(&mut self.buf));
    }
}

/// Async UTF-8 encoding adapter. `close` must be awaited before drop;
/// drop cannot flush asynchronously and only releases the pooled buffer.
pub struct AsyncUtf8CharWriter<W> {
    inner: W,
    buf: Vec<u8>,
    limit: usize,
}

impl<W: AsyncWrite + Unpin> AsyncUtf8CharWriter<W> {
    pub fn new(inner: W, byte_buffer_size: usize) -> Self {
        let limit = byte_buffer_size.max(4);
        AsyncUtf8CharWriter {
            inner,
            buf: pool::BYTES.rent(limit),
            limit,
        }
    }

    async fn drain(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf).await?;
            self.buf.clear();
        }
        Ok(())
    }

    pub async fn write_str(&mut self, s: &str) -> io::Result<()> {
        if self.buf.len() + s.len() > self.limit {
            self.drain().await?;
        }
        if s.len() >= self.limit {
            self.inner.write_all(s.as_bytes()).await?;
        } else {
            self.buf.extend_from_slice(s.as_bytes());
        }
        Ok(())
    }

    pub async fn write_char(&mut self, ch: char) -> io::Result<()> {
        let mut tmp = [0u8; 4];
        self.write_str(ch.encode_utf8(&mut tmp)).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.drain().await?;
        self.inner.flush().await
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.drain().await?;
        self.inner.flush().await
    }
}

impl<W> Drop for AsyncUtf8CharWriter<W> {
    fn drop(&mut self) {
        pool::BYTES.give_back(mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_async_read_matches_sync() {
        let text = "id,naïve\n1,\u{1F600}\n";
        block_on(async {
            let mut r = AsyncUtf8CharReader::new(text.as_bytes(), 4);
            let mut out = String::new();
            let mut buf = ['\0'; 5];
            loop {
                let n = r.read_chars(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                out.extend(&buf[..n]);
            }
            assert_eq!(out, text);
        });
    }

    #[test]
    fn test_async_write_roundtrip() {
        block_on(async {
            let mut sink = Vec::new();
            {
                let mut w = AsyncUtf8CharWriter::new(&mut sink, 8);
                w.write_str("a,b").await.unwrap();
                w.write_char('\n').await.unwrap();
                w.write_str("longer than the buffer").await.unwrap();
                w.close().await.unwrap();
            }
            assert_eq!(sink, b"a,b\nlonger than the buffer");
        });
    }

    #[test]
    fn test_async_bom_stripped() {
        block_on(async {
            let mut bytes = vec![0xEF, 0xBB, 0xBF];
            bytes.extend_from_slice(b"x");
            let mut r = AsyncUtf8CharReader::new(bytes.as_slice(), 16);
            let mut buf = ['\0'; 4];
            let n = r.read_chars(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &['x']);
        });
    }
}
