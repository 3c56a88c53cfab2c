//! File-descriptor store.

use crate::error::Result;
use crate::store::{StoreOps, Whence};
use crate::sys;

fn whence_raw(whence: Whence) -> i32 {
    match whence {
        Whence::Set => libc::SEEK_SET,
        Whence::Cur => libc::SEEK_CUR,
        Whence::End => libc::SEEK_END,
    }
}

#[derive(Debug)]
pub struct FdStore {
    fd: i32,
}

impl FdStore {
    pub fn new(fd: i32) -> Self {
        FdStore { fd }
    }

    pub fn raw_fd(&self) -> i32 {
        self.fd
    }
}

impl StoreOps for FdStore {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        sys::read(self.fd, buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        // Transient failures and short writes are absorbed here so the
        // flush path sees all-or-error.
        sys::write_all(self.fd, data)?;
        Ok(data.len())
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        sys::lseek(self.fd, offset, whence_raw(whence))
    }

    fn close(&mut self) -> Result<i32> {
        sys::close(self.fd)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fd_store_roundtrip() {
        let fd = sys::open_tmpfile().unwrap();
        let mut s = FdStore::new(fd);
        assert_eq!(s.write(b"ferrio").unwrap(), 6);
        assert_eq!(s.seek(0, Whence::Set).unwrap(), 0);
        let mut buf = [0u8; 16];
        let n = s.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ferrio");
        assert_eq!(s.seek(0, Whence::End).unwrap(), 6);
        s.close().unwrap();
    }
}
