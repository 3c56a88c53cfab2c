//! Caller-supplied callback store.
//!
//! Any of the four hooks may be absent. Absence is not an error at open
//! time; it shapes behavior instead: a missing read hook yields immediate
//! end-of-data, a missing write hook silently absorbs bytes, a missing
//! seek hook makes the store unseekable, a missing close hook makes close
//! a no-op.

use std::fmt;

use crate::error::{Error, Result};
use crate::store::{StoreOps, Whence};

pub type ReadHook = Box<dyn FnMut(&mut [u8]) -> Result<usize> + Send>;
pub type WriteHook = Box<dyn FnMut(&[u8]) -> Result<usize> + Send>;
pub type SeekHook = Box<dyn FnMut(i64, Whence) -> Result<i64> + Send>;
pub type CloseHook = Box<dyn FnMut() -> Result<i32> + Send>;

#[derive(Default)]
pub struct CookieIo {
    pub read: Option<ReadHook>,
    pub write: Option<WriteHook>,
    pub seek: Option<SeekHook>,
    pub close: Option<CloseHook>,
}

pub struct CookieStore {
    io: CookieIo,
}

impl CookieStore {
    pub fn new(io: CookieIo) -> Self {
        CookieStore { io }
    }
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore")
            .field("read", &self.io.read.is_some())
            .field("write", &self.io.write.is_some())
            .field("seek", &self.io.seek.is_some())
            .field("close", &self.io.close.is_some())
            .finish()
    }
}

impl StoreOps for CookieStore {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.io.read.as_mut() {
            Some(hook) => hook(buf),
            None => Ok(0),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self.io.write.as_mut() {
            Some(hook) => hook(data),
            None => Ok(data.len()),
        }
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        match self.io.seek.as_mut() {
            Some(hook) => hook(offset, whence),
            None => Err(Error::Unseekable),
        }
    }

    fn close(&mut self) -> Result<i32> {
        match self.io.close.as_mut() {
            Some(hook) => hook(),
            None => Ok(0),
        }
    }
}
