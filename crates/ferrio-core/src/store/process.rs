//! Child-process pipe store.
//!
//! The command runs under `sh -c`; one end of the pipe becomes a plain fd
//! store. Closing reaps the child and surfaces its exit status.

use std::os::fd::IntoRawFd;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, Stdio};

use crate::error::{Error, Result};
use crate::store::{FdStore, StoreOps, Whence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// Read the child's stdout.
    Read,
    /// Write to the child's stdin.
    Write,
}

#[derive(Debug)]
pub struct ProcessStore {
    io: FdStore,
    child: Option<Child>,
}

impl ProcessStore {
    pub fn spawn(command: &str, mode: ProcessMode) -> Result<Self> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        match mode {
            ProcessMode::Read => cmd.stdout(Stdio::piped()),
            ProcessMode::Write => cmd.stdin(Stdio::piped()),
        };
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::io(e.raw_os_error().unwrap_or(libc::EIO)))?;
        let fd = match mode {
            ProcessMode::Read => child
                .stdout
                .take()
                .map(IntoRawFd::into_raw_fd),
            ProcessMode::Write => child
                .stdin
                .take()
                .map(IntoRawFd::into_raw_fd),
        };
        let fd = fd.ok_or_else(|| Error::io(libc::EIO))?;
        Ok(ProcessStore {
            io: FdStore::new(fd),
            child: Some(child),
        })
    }
}

impl StoreOps for ProcessStore {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.io.read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.io.write(data)
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> Result<i64> {
        Err(Error::Unseekable)
    }

    fn close(&mut self) -> Result<i32> {
        // Close our pipe end first so a reading child sees EOF on stdin.
        let _ = self.io.close();
        match self.child.take() {
            Some(mut child) => {
                let status = child
                    .wait()
                    .map_err(|e| Error::io(e.raw_os_error().unwrap_or(libc::ECHILD)))?;
                match status.code() {
                    Some(code) => Ok(code),
                    None => Ok(128 + status.signal().unwrap_or(0)),
                }
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_child_stdout() {
        let mut s = ProcessStore::spawn("printf 'from child'", ProcessMode::Read).unwrap();
        let mut buf = [0u8; 32];
        let mut got = Vec::new();
        loop {
            let n = s.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"from child");
        assert_eq!(s.close().unwrap(), 0);
    }

    #[test]
    fn test_close_surfaces_exit_status() {
        let mut s = ProcessStore::spawn("exit 7", ProcessMode::Read).unwrap();
        assert_eq!(s.close().unwrap(), 7);
    }

    #[test]
    fn test_pipes_are_not_seekable() {
        let mut s = ProcessStore::spawn("true", ProcessMode::Read).unwrap();
        assert!(matches!(s.seek(0, Whence::Set), Err(Error::Unseekable)));
        s.close().unwrap();
    }
}
