//! Fixed-capacity memory store.
//!
//! The region is shared through a [`MemBuffer`] handle so the opener can
//! inspect bytes after (or while) the stream writes them. Capacity is the
//! handle's length and never changes.
//!
//! A `robust` store never fails on out-of-range traffic: writes past the
//! end report the full requested length and discard the excess, reads past
//! the end zero-fill and report the full requested length, seeks land
//! anywhere non-negative. A non-robust store truncates writes to the space
//! remaining, stops reads at capacity, and rejects seeks past capacity.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::store::{StoreOps, Whence};

/// Shared fixed-size byte region.
pub type MemBuffer = Arc<Mutex<Vec<u8>>>;

/// Initial cursor/high-water placement, derived from the open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemInit {
    /// Write modes: content discarded, leading NUL written.
    Truncate,
    /// Read modes: the whole region counts as content.
    Full,
    /// Append modes: content ends at the first NUL (or capacity).
    Append,
}

#[derive(Debug)]
pub struct MemFileStore {
    buf: MemBuffer,
    pos: usize,
    /// One past the furthest byte ever written (logical end of data).
    high_water: usize,
    robust: bool,
}

impl MemFileStore {
    pub fn new(buf: MemBuffer, robust: bool, init: MemInit) -> Self {
        let mut store = MemFileStore {
            buf,
            pos: 0,
            high_water: 0,
            robust,
        };
        store.reinit(robust, init);
        store
    }

    /// Re-bind the same region under a new mode, as reopen does.
    pub fn reinit(&mut self, robust: bool, init: MemInit) {
        let mut region = self.buf.lock();
        let cap = region.len();
        self.robust = robust;
        self.pos = 0;
        self.high_water = match init {
            MemInit::Truncate => {
                if cap > 0 {
                    region[0] = 0;
                }
                0
            }
            MemInit::Full => cap,
            MemInit::Append => region.iter().position(|&b| b == 0).unwrap_or(cap),
        };
        if init == MemInit::Append {
            self.pos = self.high_water;
        }
    }

    pub fn handle(&self) -> MemBuffer {
        Arc::clone(&self.buf)
    }

    pub fn capacity(&self) -> usize {
        self.buf.lock().len()
    }
}

impl StoreOps for MemFileStore {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let region = self.buf.lock();
        let avail = region.len().saturating_sub(self.pos);
        let n = avail.min(buf.len());
        buf[..n].copy_from_slice(&region[self.pos..self.pos + n]);
        if self.robust {
            buf[n..].fill(0);
            self.pos += buf.len();
            return Ok(buf.len());
        }
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut region = self.buf.lock();
        let cap = region.len();
        let room = cap.saturating_sub(self.pos);
        let stored = room.min(data.len());
        region[self.pos..self.pos + stored].copy_from_slice(&data[..stored]);
        self.pos += stored;
        self.high_water = self.high_water.max(self.pos);
        if self.high_water < cap {
            region[self.high_water] = 0;
        }
        if self.robust {
            self.pos += data.len() - stored;
            return Ok(data.len());
        }
        Ok(stored)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.pos as i64,
            Whence::End => self.high_water as i64,
        };
        let target = base + offset;
        if target < 0 {
            return Err(Error::io(libc::EINVAL));
        }
        if !self.robust && target as usize > self.capacity() {
            return Err(Error::io(libc::EINVAL));
        }
        self.pos = target as usize;
        Ok(target)
    }

    fn close(&mut self) -> Result<i32> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(bytes: &[u8]) -> MemBuffer {
        Arc::new(Mutex::new(bytes.to_vec()))
    }

    #[test]
    fn test_truncating_write_reports_stored_bytes() {
        let buf = region(&[0; 5]);
        let mut s = MemFileStore::new(Arc::clone(&buf), false, MemInit::Truncate);
        assert_eq!(s.write(b"Mello, Nerds!").unwrap(), 5);
        assert_eq!(s.write(b"more").unwrap(), 0);
        assert_eq!(&*buf.lock(), b"Mello");
    }

    #[test]
    fn test_robust_write_discards_excess_but_reports_all() {
        let buf = region(&[0; 5]);
        let mut s = MemFileStore::new(Arc::clone(&buf), true, MemInit::Truncate);
        assert_eq!(s.write(b"Mello, Nerds!").unwrap(), 13);
        assert_eq!(&*buf.lock(), b"Mello");
    }

    #[test]
    fn test_robust_read_zero_fills() {
        let buf = region(b"ab");
        let mut s = MemFileStore::new(buf, true, MemInit::Full);
        let mut out = [0xffu8; 6];
        assert_eq!(s.read(&mut out).unwrap(), 6);
        assert_eq!(&out, b"ab\0\0\0\0");
    }

    #[test]
    fn test_append_finds_first_nul() {
        let mut bytes = b"log:".to_vec();
        bytes.resize(16, 0);
        let buf = region(&bytes);
        let mut s = MemFileStore::new(Arc::clone(&buf), false, MemInit::Append);
        assert_eq!(s.seek(0, Whence::Cur).unwrap(), 4);
        s.write(b"ok").unwrap();
        assert!(buf.lock().starts_with(b"log:ok\0"));
    }

    #[test]
    fn test_seek_bounds() {
        let buf = region(&[0; 8]);
        let mut s = MemFileStore::new(buf, false, MemInit::Truncate);
        assert!(s.seek(-1, Whence::Set).is_err());
        assert!(s.seek(9, Whence::Set).is_err());
        assert_eq!(s.seek(8, Whence::Set).unwrap(), 8);
    }
}
