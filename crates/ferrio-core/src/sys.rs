//! Raw OS veneer. All libc calls in the crate live here.
//!
//! Reference: POSIX read(2), write(2), lseek(2), open(2), close(2).
//!
//! The wrappers translate the C convention (negative return + errno) into
//! `Result`, and hide the retry loop for transient failures so the store
//! layer never sees EINTR.

use std::ffi::{CStr, CString};

use crate::error::{Error, Result};

pub fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Human-readable description for an errno, as used by `%m`.
pub fn errno_message(errno: i32) -> String {
    // strerror returns a pointer into static storage; copy it out
    // immediately.
    let ptr = unsafe { libc::strerror(errno) };
    if ptr.is_null() {
        return format!("unknown error {errno}");
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn transient(errno: i32) -> bool {
    errno == libc::EINTR || errno == libc::EAGAIN || errno == libc::EWOULDBLOCK
}

/// Read up to `buf.len()` bytes; `Ok(0)` means end of input.
pub fn read(fd: i32, buf: &mut [u8]) -> Result<usize> {
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let e = last_errno();
        if !transient(e) {
            return Err(Error::io(e));
        }
    }
}

/// Write the whole of `data`, retrying short and transient writes.
pub fn write_all(fd: i32, data: &[u8]) -> Result<()> {
    let mut off = 0;
    while off < data.len() {
        let rest = &data[off..];
        let n = unsafe { libc::write(fd, rest.as_ptr().cast(), rest.len()) };
        if n >= 0 {
            off += n as usize;
            continue;
        }
        let e = last_errno();
        if !transient(e) {
            return Err(Error::io(e));
        }
    }
    Ok(())
}

pub fn lseek(fd: i32, offset: i64, whence: i32) -> Result<i64> {
    let pos = unsafe { libc::lseek(fd, offset, whence) };
    if pos < 0 {
        let e = last_errno();
        if e == libc::ESPIPE {
            return Err(Error::Unseekable);
        }
        return Err(Error::io(e));
    }
    Ok(pos)
}

pub fn close(fd: i32) -> Result<()> {
    let r = unsafe { libc::close(fd) };
    if r < 0 {
        return Err(Error::last_os());
    }
    Ok(())
}

pub fn open_path(path: &str, oflags: i32) -> Result<i32> {
    let c = CString::new(path).map_err(|_| Error::io(libc::EINVAL))?;
    let fd = unsafe { libc::open(c.as_ptr(), oflags, 0o666 as libc::c_uint) };
    if fd < 0 {
        return Err(Error::last_os());
    }
    Ok(fd)
}

/// Anonymous read/write temporary file, unlinked from birth.
pub fn open_tmpfile() -> Result<i32> {
    let fd = unsafe {
        libc::open(
            c"/tmp".as_ptr(),
            libc::O_TMPFILE | libc::O_RDWR,
            0o600 as libc::c_uint,
        )
    };
    if fd < 0 {
        return Err(Error::last_os());
    }
    Ok(fd)
}

pub fn register_atexit(hook: extern "C" fn()) {
    unsafe {
        libc::atexit(hook);
    }
}
