//! Growable memory store.
//!
//! The backing vector doubles whenever a write outgrows it, a NUL byte is
//! maintained one past the logical length, reads stop at the logical
//! length, and a forward seek past the high-water mark zero-fills the gap.
//! The opener keeps a [`MemStreamHandle`] to observe the accumulated bytes
//! at any point.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::store::{StoreOps, Whence};

#[derive(Debug)]
struct MemStreamShared {
    /// Physical storage; always at least `len + 1` bytes, NUL at `len`.
    data: Vec<u8>,
    /// Logical length (high-water mark).
    len: usize,
}

impl MemStreamShared {
    /// Grow geometrically until at least `needed` physical bytes exist.
    fn reserve_to(&mut self, needed: usize) {
        if self.data.len() >= needed {
            return;
        }
        let target = needed.max(self.data.len() * 2);
        self.data.resize(target, 0);
    }
}

#[derive(Debug, Clone)]
pub struct MemStreamHandle {
    inner: Arc<Mutex<MemStreamShared>>,
}

impl MemStreamHandle {
    /// Snapshot of the bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        let shared = self.inner.lock();
        shared.data[..shared.len].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct MemStreamStore {
    inner: Arc<Mutex<MemStreamShared>>,
    pos: usize,
}

impl MemStreamStore {
    pub fn new() -> (Self, MemStreamHandle) {
        let inner = Arc::new(Mutex::new(MemStreamShared {
            data: vec![0],
            len: 0,
        }));
        let handle = MemStreamHandle {
            inner: Arc::clone(&inner),
        };
        (MemStreamStore { inner, pos: 0 }, handle)
    }
}

impl StoreOps for MemStreamStore {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let shared = self.inner.lock();
        if self.pos >= shared.len {
            return Ok(0);
        }
        let n = (shared.len - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&shared.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut shared = self.inner.lock();
        shared.reserve_to(self.pos + data.len() + 1);
        let pos = self.pos;
        shared.data[pos..pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        if self.pos > shared.len {
            shared.len = self.pos;
        }
        let len = shared.len;
        shared.data[len] = 0;
        Ok(data.len())
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        let shared_len = self.inner.lock().len;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.pos as i64,
            Whence::End => shared_len as i64,
        };
        let target = base + offset;
        if target < 0 {
            return Err(Error::io(libc::EINVAL));
        }
        let target = target as usize;
        if target > shared_len {
            let mut shared = self.inner.lock();
            shared.reserve_to(target + 1);
            let len = shared.len;
            shared.data[len..target].fill(0);
            shared.len = target;
            shared.data[target] = 0;
        }
        self.pos = target;
        Ok(target as i64)
    }

    fn close(&mut self) -> Result<i32> {
        Ok(0)
    }
}
