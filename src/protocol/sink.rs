//! Growable byte accumulator for partial socket reads.
//!
//! Written bytes live in a `Vec<u8>` whose length marks the end of written
//! data. Spare room is reserved but left uninitialized, and reads land in
//! it through [`BufMut`], so growth never zero-fills. Unread data lives in
//! `[off, len)`:
//!
//! ```text
//! 0          off              len              capacity
//! ├──consumed──┼─────unread─────┼──────spare──────┤
//! ```
//!
//! Growth policy for `ensure_capacity(n)`:
//! - spare room already covers `n`: nothing to do
//! - sliding unread bytes to 0 leaves at least half the capacity free: compact
//! - otherwise reallocate to `max(2 * capacity + n, len + n)`
//!
//! Doubling keeps repeated small reads amortized O(n); compaction avoids
//! reallocating when the reader has consumed most of the buffer.

use bytes::buf::Limit;
use bytes::{BufMut, Bytes};

use crate::error::{KasaError, Result};

/// Owned, growable byte region with read-offset tracking.
#[derive(Debug, Default)]
pub struct GrowableByteSink {
    /// Written data. `buf.len()` is the end of written bytes.
    buf: Vec<u8>,
    /// Managed capacity. The allocation may be larger, but writes stop here.
    cap: usize,
    /// Start of unread data.
    off: usize,
}

impl GrowableByteSink {
    /// Create an empty sink without allocating.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink with `capacity` bytes of backing storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            cap: capacity,
            off: 0,
        }
    }

    /// Guarantee `n` bytes of spare room after the unread data.
    ///
    /// Returns the index at which the caller should write; that index is
    /// also the current unread length after any compaction.
    ///
    /// # Errors
    ///
    /// Returns `AllocationTooLarge` when the new size overflows or the
    /// allocator refuses it.
    pub fn ensure_capacity(&mut self, n: usize) -> Result<usize> {
        if self.is_empty() && self.off != 0 {
            self.reset();
        }

        if self.cap - self.buf.len() >= n {
            return Ok(self.buf.len());
        }

        let unread = self.len();
        let capacity = self.cap;
        if n <= (capacity / 2).saturating_sub(unread) {
            self.buf.copy_within(self.off.., 0);
            self.buf.truncate(unread);
        } else {
            let grown = capacity
                .checked_mul(2)
                .and_then(|c| c.checked_add(n))
                .ok_or(KasaError::AllocationTooLarge { requested: n })?;
            let required = unread
                .checked_add(n)
                .ok_or(KasaError::AllocationTooLarge { requested: n })?;
            let new_capacity = grown.max(required);
            if new_capacity > isize::MAX as usize {
                return Err(KasaError::AllocationTooLarge {
                    requested: new_capacity,
                });
            }

            let mut fresh = Vec::new();
            fresh
                .try_reserve_exact(new_capacity)
                .map_err(|_| KasaError::AllocationTooLarge {
                    requested: new_capacity,
                })?;
            fresh.extend_from_slice(&self.buf[self.off..]);
            self.buf = fresh;
            self.cap = new_capacity;
        }

        self.off = 0;
        Ok(unread)
    }

    /// Writable window over the spare room, capped at the managed capacity.
    ///
    /// Bytes put into the window are committed as they are written.
    #[inline]
    pub fn spare_buf(&mut self) -> Limit<&mut Vec<u8>> {
        let room = self.cap - self.buf.len();
        BufMut::limit(&mut self.buf, room)
    }

    /// Append bytes, growing as needed.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_capacity(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Unread bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.off..]
    }

    /// Number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.off
    }

    /// Check if there are no unread bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.len() == self.off
    }

    /// Managed size of the backing storage.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Mark up to `n` unread bytes as read.
    pub fn consume(&mut self, n: usize) {
        self.off += n.min(self.len());
    }

    /// Keep only the first `n` unread bytes.
    pub fn truncate(&mut self, n: usize) {
        if n < self.len() {
            self.buf.truncate(self.off + n);
        }
    }

    /// Logically empty the sink, keeping its storage.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.off = 0;
    }

    /// Convert the unread region into `Bytes` without copying.
    pub fn freeze(self) -> Bytes {
        Bytes::from(self.buf).slice(self.off..)
    }
}
