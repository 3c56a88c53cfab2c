//! Paged in-memory store.
//!
//! Content lives in a list of fixed 4 KiB pages allocated lazily, exactly
//! when the cursor first crosses into a page. Growth never moves existing
//! bytes, so large accumulations avoid the copy storms of a reallocating
//! vector. Pages arrive zero-initialized. Seeks clamp to `[0, len]`.

use crate::error::Result;
use crate::store::{StoreOps, Whence};

const PAGE_SIZE: usize = 4096;

#[derive(Debug, Default)]
pub struct StrFileStore {
    pages: Vec<Box<[u8; PAGE_SIZE]>>,
    len: usize,
    pos: usize,
}

impl StrFileStore {
    pub fn new() -> Self {
        StrFileStore::default()
    }

    fn ensure_page(&mut self, index: usize) {
        while self.pages.len() <= index {
            self.pages.push(Box::new([0; PAGE_SIZE]));
        }
    }
}

impl StoreOps for StrFileStore {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let avail = self.len.saturating_sub(self.pos);
        let want = avail.min(buf.len());
        let mut copied = 0;
        while copied < want {
            let page = self.pos / PAGE_SIZE;
            let off = self.pos % PAGE_SIZE;
            let n = (PAGE_SIZE - off).min(want - copied);
            buf[copied..copied + n].copy_from_slice(&self.pages[page][off..off + n]);
            self.pos += n;
            copied += n;
        }
        Ok(copied)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        while written < data.len() {
            let page = self.pos / PAGE_SIZE;
            let off = self.pos % PAGE_SIZE;
            self.ensure_page(page);
            let n = (PAGE_SIZE - off).min(data.len() - written);
            self.pages[page][off..off + n].copy_from_slice(&data[written..written + n]);
            self.pos += n;
            written += n;
        }
        self.len = self.len.max(self.pos);
        Ok(written)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.pos as i64,
            Whence::End => self.len as i64,
        };
        let target = (base + offset).clamp(0, self.len as i64);
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

    #[test]
    fn test_roundtrip_within_one_page() {
        let mut s = StrFileStore::new();
        s.write(b"paged").unwrap();
        s.seek(0, Whence::Set).unwrap();
        let mut buf = [0u8; 8];
        let n = s.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"paged");
    }

    #[test]
    fn test_write_spanning_page_boundary() {
        let mut s = StrFileStore::new();
        s.seek(0, Whence::Set).unwrap();
        let block = vec![b'x'; PAGE_SIZE - 3];
        s.write(&block).unwrap();
        s.write(b"ABCDEF").unwrap();
        assert_eq!(s.len, PAGE_SIZE + 3);
        assert_eq!(s.pages.len(), 2);
        s.seek(-(6_i64), Whence::End).unwrap();
        let mut buf = [0u8; 6];
        s.read(&mut buf).unwrap();
        assert_eq!(&buf, b"ABCDEF");
    }

    #[test]
    fn test_seek_clamps_to_content() {
        let mut s = StrFileStore::new();
        s.write(b"abc").unwrap();
        assert_eq!(s.seek(100, Whence::Set).unwrap(), 3);
        assert_eq!(s.seek(-100, Whence::Cur).unwrap(), 0);
    }

    #[test]
    fn test_read_past_len_is_eof() {
        let mut s = StrFileStore::new();
        s.write(b"ab").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(s.read(&mut buf).unwrap(), 0);
        s.seek(0, Whence::Set).unwrap();
        assert_eq!(s.read(&mut buf).unwrap(), 2);
        assert_eq!(s.read(&mut buf).unwrap(), 0);
    }
}
