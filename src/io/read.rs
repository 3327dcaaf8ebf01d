// Pull-based character input.
//
// `CharRead` is the contract the parser consumes; `Utf8CharReader` is the
// canonical byte-source implementation, decoding UTF-8 through a pooled
// byte buffer. Incomplete sequences are carried across refills so a code
// point is never split between two `read_chars` calls.

use std::io::{self, Read};
use std::mem;

use crate::io::utf8;
use crate::pool;

/// Pull-based character source.
///
/// `read_chars` fills `dst` with up to `dst.len()` chars and returns the
/// number written; zero is returned only at end of input. Implementations
/// own any byte-to-char transcoding and must never split a code point
/// across calls.
///
/// To keep the underlying stream open past the adapter's lifetime, build
/// the adapter over `&mut R`; `Read` is implemented for mutable references.
pub trait CharRead {
    fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize>;
}

impl<T: CharRead + ?Sized> CharRead for &mut T {
    fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize> {
        (**self).read_chars(dst)
    }
}

/// UTF-8 decoding adapter over any byte reader.
///
/// A single leading byte-order mark is stripped; invalid sequences decode
/// to U+FFFD.
pub struct Utf8CharReader<R> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
    strip_bom: bool,
}

impl<R: Read> Utf8CharReader<R> {
    pub fn new(inner: R, byte_buffer_size: usize) -> Self {
        // A window smaller than one code point could never make progress.
        let size = byte_buffer_size.max(4);
        let mut buf = pool::BYTES.rent(size);
        buf.resize(size, 0);
        Utf8CharReader {
            inner,
            buf,
            start: 0,
            end: 0,
            eof: false,
            strip_bom: true,
        }
    }

    /// Compacts the undecoded tail to the front and reads more bytes.
    fn fill(&mut self) -> io::Result<()> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        let n = self.inner.read(&mut self.buf[self.end..])?;
        if n == 0 {
            self.eof = true;
        }
        self.end += n;
        Ok(())
    }
}

impl<R: Read> CharRead for Utf8CharReader<R> {
    fn read_chars(&mut self, dst: &mut [char]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        loop {
            let window = &self.buf[self.start..self.end];
            let decoded = utf8::decode_chars(window, self.eof, dst);
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
            self.fill()?;
        }
    }
}

impl<R> Drop for Utf8CharReader<R> {
    fn drop(&mut self) {
        pool::BYTES.give_back(mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(reader: &mut impl CharRead) -> String {
        let mut out = String::new();
        let mut buf = ['\0'; 7];
        loop {
            let n = reader.read_chars(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend(&buf[..n]);
        }
        out
    }

    #[test]
    fn test_reads_ascii() {
        let mut r = Utf8CharReader::new("id,name\n1,Ada\n".as_bytes(), 16);
        assert_eq!(read_all(&mut r), "id,name\n1,Ada\n");
    }

    #[test]
    fn test_multibyte_across_refills() {
        // A 4-byte window forces every refill boundary to land inside some
        // of these sequences.
        let text = "aéé\u{1F600}béé";
        let mut r = Utf8CharReader::new(text.as_bytes(), 4);
        assert_eq!(read_all(&mut r), text);
    }

    #[test]
    fn test_strips_single_leading_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("a,b\n".as_bytes());
        let mut r = Utf8CharReader::new(bytes.as_slice(), 16);
        assert_eq!(read_all(&mut r), "a,b\n");
    }

    #[test]
    fn test_bom_only_stripped_at_start() {
        let text = "a\u{feff}b";
        let mut r = Utf8CharReader::new(text.as_bytes(), 16);
        assert_eq!(read_all(&mut r), text);
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let bytes = [b'a', 0xFF, b'b'];
        let mut r = Utf8CharReader::new(&bytes[..], 16);
        assert_eq!(read_all(&mut r), "a\u{fffd}b");
    }

    #[test]
    fn test_truncated_tail_replaced_at_eof() {
        let bytes = [b'a', 0xC3];
        let mut r = Utf8CharReader::new(&bytes[..], 16);
        assert_eq!(read_all(&mut r), "a\u{fffd}");
    }

    #[test]
    fn test_borrowed_reader_leaves_stream_open() {
        let mut src = "x,y\nrest".as_bytes();
        {
            let mut r = Utf8CharReader::new(&mut src, 4);
            let mut buf = ['\0'; 4];
            let n = r.read_chars(&mut buf).unwrap();
            assert!(n > 0);
        }
        // The caller still owns the underlying reader afterwards.
        let mut rest = Vec::new();
        src.read_to_end(&mut rest).unwrap();
    }
}
