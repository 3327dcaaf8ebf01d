// Incremental UTF-8 decoding shared by the sync and async readers.
//
// The decoder never consumes a partial code point: an incomplete trailing
// sequence is left in the window for the caller to refill behind, unless the
// stream has ended, in which case it decodes to U+FFFD. Invalid sequences
// also decode to U+FFFD rather than erroring.

use std::str;

pub(crate) const REPLACEMENT: char = '\u{fffd}';

/// Result of one decode pass over a byte window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Decoded {
    pub chars_written: usize,
    pub bytes_consumed: usize,
    /// The window ends mid-sequence and more bytes are required to make
    /// progress.
    pub needs_input: bool,
}

/// Decodes as many chars from `window` into `dst` as fit.
pub(crate) fn decode_chars(window: &[u8], at_eof: bool, dst: &mut [char]) -> Decoded {
    let mut written = 0;
    let mut consumed = 0;

    while written < dst.len() && consumed < window.len() {
        let rest = &window[consumed..];
        match str::from_utf8(rest) {
            Ok(valid) => {
                consumed += copy_chars(valid, dst, &mut written);
                break;
            }
            Err(err) => {
                let valid_len = err.valid_up_to();
                if valid_len > 0 {
                    // SAFETY: `valid_up_to` guarantees this prefix is valid
                    // UTF-8.
                    let valid = unsafe { str::from_utf8_unchecked(&rest[..valid_len]) };
                    let copied = copy_chars(valid, dst, &mut written);
                    consumed += copied;
                    if copied < valid_len {
                        break;
                    }
                    continue;
                }
                match err.error_len() {
                    Some(bad) => {
                        dst[written] = REPLACEMENT;
                        written += 1;
                        consumed += bad;
                    }
                    None if at_eof => {
                        dst[written] = REPLACEMENT;
                        written += 1;
                        consumed = window.len();
                    }
                    None => {
                        return Decoded {
                            chars_written: written,
                            bytes_consumed: consumed,
                            needs_input: true,
                        };
                    }
                }
            }
        }
    }

    Decoded {
        chars_written: written,
        bytes_consumed: consumed,
        needs_input: false,
    }
}

/// Copies chars from `valid` into `dst` until either runs out; returns the
/// number of bytes consumed from `valid`.
fn copy_chars(valid: &str, dst: &mut [char], written: &mut usize) -> usize {
    let mut bytes = 0;
    for ch in valid.chars() {
        if *written == dst.len() {
            break;
        }
        dst[*written] = ch;
        *written += 1;
        bytes += ch.len_utf8();
    }
    bytes
}
