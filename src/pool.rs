// Process-wide buffer pool.
//
// Arenas, token lists, and transcoder scratch buffers are rented here and
// returned on drop, so row-to-row and instance-to-instance churn reuses
// allocations. Shelves are lazily initialized on first rental and live to
// process exit. Retention is capped both per-shelf and per-buffer so a
// one-off huge row does not pin memory forever.

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::core::FieldToken;

/// A buffer type the pool can shelve.
pub(crate) trait PoolBuf: Sized {
    fn with_capacity(capacity: usize) -> Self;
    fn clear(&mut self);
    fn capacity(&self) -> usize;
}

impl PoolBuf for String {
    fn with_capacity(capacity: usize) -> Self {
        String::with_capacity(capacity)
    }
    fn clear(&mut self) {
        self.clear();
    }
    fn capacity(&self) -> usize {
        self.capacity()
    }
}

impl PoolBuf for Vec<u8> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }
    fn clear(&mut self) {
        self.clear();
    }
    fn capacity(&self) -> usize {
        self.capacity()
    }
}

impl PoolBuf for Vec<char> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }
    fn clear(&mut self) {
        self.clear();
    }
    fn capacity(&self) -> usize {
        self.capacity()
    }
}

impl PoolBuf for Vec<FieldToken> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }
    fn clear(&mut self) {
        self.clear();
    }
    fn capacity(&self) -> usize {
        self.capacity()
    }
}

/// One shelf of reusable buffers of a single type.
pub(crate) struct Pool<B> {
    shelf: Mutex<Vec<B>>,
}

impl<B: PoolBuf> Pool<B> {
    /// Maximum buffers retained per shelf.
    const MAX_RETAINED: usize = 64;
    /// Buffers above this capacity are dropped instead of shelved.
    const MAX_RETAINED_CAPACITY: usize = 1 << 20;

    pub(crate) fn new() -> Self {
        Pool {
            shelf: Mutex::new(Vec::new()),
        }
    }

    /// Takes the smallest shelved buffer satisfying `min_capacity`, or
    /// allocates a fresh one.
    pub(crate) fn rent(&self, min_capacity: usize) -> B {
        let mut shelf = self.shelf.lock();
        let mut best: Option<usize> = None;
        for (i, buf) in shelf.iter().enumerate() {
            if buf.capacity() >= min_capacity
                && best.map_or(true, |b| buf.capacity() < shelf[b].capacity())
            {
                best = Some(i);
            }
        }
        match best {
            Some(i) => shelf.swap_remove(i),
            None => B::with_capacity(min_capacity),
        }
    }

    /// Clears and shelves a buffer, subject to the retention caps.
    pub(crate) fn give_back(&self, mut buf: B) {
        if buf.capacity() == 0 || buf.capacity() > Self::MAX_RETAINED_CAPACITY {
            return;
        }
        buf.clear();
        let mut shelf = self.shelf.lock();
        if shelf.len() < Self::MAX_RETAINED {
            shelf.push(buf);
        }
    }
}

lazy_static! {
    /// Arena and formatting scratch storage.
    pub(crate) static ref STRINGS: Pool<String> = Pool::new();
    /// Transcoder byte buffers.
    pub(crate) static ref BYTES: Pool<Vec<u8>> = Pool::new();
    /// Parser read buffers.
    pub(crate) static ref CHARS: Pool<Vec<char>> = Pool::new();
    /// Row token lists.
    pub(crate) static ref TOKENS: Pool<Vec<FieldToken>> = Pool::new();
}
