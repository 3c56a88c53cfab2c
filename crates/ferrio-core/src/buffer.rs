//! Stream-side staging buffer and pushback queue.
//!
//! A single byte region serves both directions, never both at once: either
//! `read_pending` bytes fetched from the store are waiting to be consumed,
//! or `dirty` bytes written by the caller are waiting to be flushed. The
//! stream layer flushes or discards before switching direction, so at most
//! one of the two counts is nonzero at any time.

/// Default buffer capacity, matching the classic stdio BUFSIZ.
pub const BUFSIZ: usize = 8192;

/// Depth of the pushback (unget) queue.
pub const UNGET_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufMode {
    /// Flush only when the buffer fills (or on explicit flush/seek/close).
    Full,
    /// Additionally flush through the last newline of every write.
    Line,
    /// Flush every write immediately.
    None,
}

#[derive(Debug)]
pub struct StreamBuffer {
    data: Vec<u8>,
    /// Bytes at the front of `data` fetched from the store, not yet consumed.
    read_pending: usize,
    /// Bytes at the front of `data` staged by writes, not yet flushed.
    dirty: usize,
    mode: BufMode,
    ungets: [u8; UNGET_CAPACITY],
    num_ungets: usize,
}

impl StreamBuffer {
    pub fn new(mode: BufMode, capacity: usize) -> Self {
        // Unbuffered streams keep a single staging byte; the read path
        // still fills through the region.
        let cap = match mode {
            BufMode::None => 1,
            _ => capacity.max(1),
        };
        StreamBuffer {
            data: vec![0; cap],
            read_pending: 0,
            dirty: 0,
            mode,
            ungets: [0; UNGET_CAPACITY],
            num_ungets: 0,
        }
    }

    /// Swap in a caller-supplied region (or a fresh owned one) and a new
    /// mode. Any staged content must have been flushed or discarded first.
    pub fn reconfigure(&mut self, region: Option<Vec<u8>>, mode: BufMode, size: usize) {
        debug_assert_eq!(self.read_pending, 0);
        debug_assert_eq!(self.dirty, 0);
        self.data = match region {
            Some(v) if !v.is_empty() => v,
            _ if mode == BufMode::None => vec![0],
            _ => vec![0; size.max(1)],
        };
        self.mode = mode;
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn mode(&self) -> BufMode {
        self.mode
    }

    pub fn read_pending(&self) -> usize {
        self.read_pending
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty
    }

    // ------------------------------------------------------------------
    // Write direction
    // ------------------------------------------------------------------

    /// Copy as much of `src` as fits after the dirty region; returns the
    /// number of bytes staged.
    pub fn stage_write(&mut self, src: &[u8]) -> usize {
        debug_assert_eq!(self.read_pending, 0);
        let room = self.data.len() - self.dirty;
        let n = room.min(src.len());
        self.data[self.dirty..self.dirty + n].copy_from_slice(&src[..n]);
        self.dirty += n;
        n
    }

    pub fn dirty_bytes(&self) -> &[u8] {
        &self.data[..self.dirty]
    }

    /// Drop the first `n` dirty bytes after they reach the store, sliding
    /// any remainder to the front.
    pub fn consume_dirty(&mut self, n: usize) {
        debug_assert!(n <= self.dirty);
        self.data.copy_within(n..self.dirty, 0);
        self.dirty -= n;
    }

    /// Index just past the last newline in the dirty region, if any.
    pub fn line_flush_len(&self) -> Option<usize> {
        self.data[..self.dirty]
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| i + 1)
    }

    // ------------------------------------------------------------------
    // Read direction
    // ------------------------------------------------------------------

    pub fn peek_read(&self) -> &[u8] {
        &self.data[..self.read_pending]
    }

    /// Discard the first `n` pending bytes (already handed to the caller).
    pub fn consume_read(&mut self, n: usize) {
        debug_assert!(n <= self.read_pending);
        self.data.copy_within(n..self.read_pending, 0);
        self.read_pending -= n;
    }

    /// Copy pending bytes out to `dst`; returns the count copied.
    pub fn drain_read(&mut self, dst: &mut [u8]) -> usize {
        let n = self.read_pending.min(dst.len());
        dst[..n].copy_from_slice(&self.data[..n]);
        self.consume_read(n);
        n
    }

    /// Room past the pending region for the next store fill.
    pub fn fill_target(&mut self) -> &mut [u8] {
        debug_assert_eq!(self.dirty, 0);
        let start = self.read_pending;
        &mut self.data[start..]
    }

    pub fn commit_fill(&mut self, n: usize) {
        debug_assert!(self.read_pending + n <= self.data.len());
        self.read_pending += n;
    }

    /// Forget pending read bytes (the store cursor must be re-aligned by
    /// the caller).
    pub fn discard_read(&mut self) {
        self.read_pending = 0;
    }

    // ------------------------------------------------------------------
    // Pushback
    // ------------------------------------------------------------------

    pub fn unget(&mut self, byte: u8) -> bool {
        if self.num_ungets == UNGET_CAPACITY {
            return false;
        }
        self.ungets[self.num_ungets] = byte;
        self.num_ungets += 1;
        true
    }

    /// Most recently pushed byte, LIFO.
    pub fn take_unget(&mut self) -> Option<u8> {
        if self.num_ungets == 0 {
            return None;
        }
        self.num_ungets -= 1;
        Some(self.ungets[self.num_ungets])
    }

    pub fn pending_ungets(&self) -> usize {
        self.num_ungets
    }

    pub fn clear_ungets(&mut self) {
        self.num_ungets = 0;
    }
}
