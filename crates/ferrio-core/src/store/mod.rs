//! Backing stores: the byte sources and sinks a stream can sit on.
//!
//! Each variant implements the small [`StoreOps`] capability surface. A
//! store never buffers; short reads and writes are honest reports of what
//! the medium did, and the stream layer above owns all staging.

pub mod cookie;
pub mod fd;
pub mod memfile;
pub mod memstream;
pub mod process;
pub mod strfile;

pub use cookie::{CookieIo, CookieStore};
pub use fd::FdStore;
pub use memfile::{MemBuffer, MemFileStore};
pub use memstream::{MemStreamHandle, MemStreamStore};
pub use process::ProcessStore;
pub use strfile::StrFileStore;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

pub trait StoreOps {
    /// Read up to `buf.len()` bytes. `Ok(0)` signals end of data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write bytes from `data`, returning how many the store accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Reposition the store cursor; returns the new absolute position.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64>;

    /// Release the store. Returns the child exit status for process
    /// stores, zero otherwise.
    fn close(&mut self) -> Result<i32>;
}

#[derive(Debug)]
pub enum Store {
    Fd(FdStore),
    Cookie(CookieStore),
    MemFile(MemFileStore),
    MemStream(MemStreamStore),
    StrFile(StrFileStore),
    Process(ProcessStore),
}

impl Store {
    fn ops(&mut self) -> &mut dyn StoreOps {
        match self {
            Store::Fd(s) => s,
            Store::Cookie(s) => s,
            Store::MemFile(s) => s,
            Store::MemStream(s) => s,
            Store::StrFile(s) => s,
            Store::Process(s) => s,
        }
    }
}

impl StoreOps for Store {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ops().read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.ops().write(data)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        self.ops().seek(offset, whence)
    }

    fn close(&mut self) -> Result<i32> {
        self.ops().close()
    }
}
