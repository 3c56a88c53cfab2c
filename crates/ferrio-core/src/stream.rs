//! Buffered stream over a pluggable backing store.
//!
//! Design:
//! - `Stream` is a cheap clonable handle (`Arc`) around a re-entrant lock
//!   guarding the whole mutable state. Public methods lock and delegate to
//!   `*_unlocked` workers; the formatting engines take the lock once for a
//!   whole template via [`Stream::lock`] and then call the same public
//!   methods re-entrantly.
//! - The staging buffer is one-directional at a time: writes flush or
//!   discard any pending read window first, reads flush any dirty bytes
//!   first. The logical cursor is always
//!   `store_pos - read_pending - pending_ungets + dirty_len`.

use std::cell::RefCell;
use std::sync::{Arc, OnceLock};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::buffer::{BufMode, StreamBuffer, BUFSIZ};
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::store::memfile::MemInit;
use crate::store::{
    CookieIo, CookieStore, FdStore, MemBuffer, MemFileStore, MemStreamHandle, MemStreamStore,
    ProcessStore, Store, StoreOps, StrFileStore, Whence,
};
use crate::sys;

pub use crate::store::process::ProcessMode;

const STREAM_CANARY: u32 = 0x0DF1_1E83;

// ----------------------------------------------------------------------
// Open modes
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    /// `0` marker: fixed-memory stores absorb out-of-range traffic
    /// instead of failing.
    pub robust: bool,
}

impl OpenMode {
    pub fn parse(mode: &str) -> Result<OpenMode> {
        let mut bytes = mode.bytes();
        let mut m = match bytes.next() {
            Some(b'r') => OpenMode {
                read: true,
                write: false,
                append: false,
                truncate: false,
                robust: false,
            },
            Some(b'w') => OpenMode {
                read: false,
                write: true,
                append: false,
                truncate: true,
                robust: false,
            },
            Some(b'a') => OpenMode {
                read: false,
                write: true,
                append: true,
                truncate: false,
                robust: false,
            },
            _ => return Err(Error::InvalidMode(mode.to_string())),
        };
        for c in bytes {
            match c {
                b'+' => {
                    m.read = true;
                    m.write = true;
                }
                // Binary marker accepted for compatibility; all streams
                // are binary here.
                b'b' => {}
                b'0' => m.robust = true,
                _ => return Err(Error::InvalidMode(mode.to_string())),
            }
        }
        Ok(m)
    }

    fn oflags(&self) -> i32 {
        let access = match (self.read, self.write) {
            (true, true) => libc::O_RDWR,
            (_, true) => libc::O_WRONLY,
            _ => libc::O_RDONLY,
        };
        let mut flags = access;
        if self.truncate {
            flags |= libc::O_CREAT | libc::O_TRUNC;
        }
        if self.append {
            flags |= libc::O_CREAT | libc::O_APPEND;
        }
        flags
    }

    fn mem_init(&self) -> MemInit {
        if self.truncate {
            MemInit::Truncate
        } else if self.append {
            MemInit::Append
        } else {
            MemInit::Full
        }
    }
}

// ----------------------------------------------------------------------
// State and handle
// ----------------------------------------------------------------------

struct StreamState {
    store: Store,
    buffer: StreamBuffer,
    readable: bool,
    writable: bool,
    append: bool,
    eof: bool,
    error: bool,
    closed: bool,
}

pub(crate) struct StreamInner {
    canary: u32,
    permanent: bool,
    registry: Arc<Registry>,
    state: ReentrantMutex<RefCell<StreamState>>,
}

impl StreamInner {
    pub(crate) fn id(&self) -> usize {
        self as *const StreamInner as usize
    }

    /// Flush if writable and open; used by the registry, which must never
    /// block on (or re-enter) a stream another caller is using.
    pub(crate) fn flush_best_effort(&self, blocking: bool) {
        let guard = if blocking {
            self.state.lock()
        } else {
            match self.state.try_lock() {
                Some(g) => g,
                None => return,
            }
        };
        if let Ok(mut st) = guard.try_borrow_mut() {
            if !st.closed && st.writable {
                let _ = flush_unlocked(&mut st);
            }
        }
    }
}

impl Drop for StreamInner {
    fn drop(&mut self) {
        let st = self.state.get_mut().get_mut();
        if !st.closed {
            let _ = flush_unlocked(st);
            let _ = st.store.close();
            st.closed = true;
        }
        // A stream dropped without close() must still leave its chain, or
        // the registry accumulates dead entries until process exit.
        self.registry.remove(self.id());
    }
}

/// A buffered, internally synchronized stream handle.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<StreamInner>,
}

/// Holds a stream's lock across several operations (the flockfile
/// pattern). The owning thread may keep calling stream methods; other
/// threads wait.
pub struct StreamLock<'a> {
    _guard: ReentrantMutexGuard<'a, RefCell<StreamState>>,
}

// ----------------------------------------------------------------------
// Unlocked workers
// ----------------------------------------------------------------------

fn line_writer(st: &StreamState) -> bool {
    st.writable && st.buffer.mode() == BufMode::Line
}

fn check_open(st: &StreamState) -> Result<()> {
    if st.closed {
        return Err(Error::Closed);
    }
    Ok(())
}

/// Push the first `n` dirty bytes to the store. Returns how many bytes
/// the store refused (fixed-capacity stores at their limit); refused
/// bytes are discarded. Re-aligns the store cursor over any stale read
/// window first.
fn flush_range_unlocked(st: &mut StreamState, n: usize) -> Result<usize> {
    if st.buffer.read_pending() > 0 {
        let back = st.buffer.read_pending() as i64;
        st.buffer.discard_read();
        if let Err(e) = st.store.seek(-back, Whence::Cur) {
            st.error = true;
            return Err(e);
        }
    }
    let mut off = 0;
    let mut refused = 0;
    while off < n {
        let res = {
            let StreamState { store, buffer, .. } = &mut *st;
            store.write(&buffer.dirty_bytes()[off..n])
        };
        match res {
            Ok(0) => {
                refused = n - off;
                break;
            }
            Ok(k) => off += k,
            Err(e) => {
                st.error = true;
                st.buffer.consume_dirty(off);
                return Err(e);
            }
        }
    }
    st.buffer.consume_dirty(n);
    Ok(refused)
}

/// Flush dirty bytes, then rewind the store over any pushback so the
/// physical cursor matches the logical one. Idempotent.
fn flush_unlocked(st: &mut StreamState) -> Result<usize> {
    let mut refused = 0;
    let dirty = st.buffer.dirty_len();
    if dirty > 0 {
        refused = flush_range_unlocked(st, dirty)?;
    }
    if st.buffer.pending_ungets() > 0 {
        let back = (st.buffer.pending_ungets() + st.buffer.read_pending()) as i64;
        st.buffer.clear_ungets();
        st.buffer.discard_read();
        if let Err(e) = st.store.seek(-back, Whence::Cur) {
            st.error = true;
            return Err(e);
        }
    }
    Ok(refused)
}

fn write_unlocked(st: &mut StreamState, data: &[u8]) -> Result<usize> {
    if !st.writable {
        st.error = true;
        return Err(Error::NotWritable);
    }
    if st.buffer.pending_ungets() > 0 {
        flush_unlocked(st)?;
    }
    if st.buffer.read_pending() > 0 {
        let back = st.buffer.read_pending() as i64;
        st.buffer.discard_read();
        if let Err(e) = st.store.seek(-back, Whence::Cur) {
            st.error = true;
            return Err(e);
        }
    }
    if st.append {
        match st.store.seek(0, Whence::End) {
            Ok(_) | Err(Error::Unseekable) => {}
            Err(e) => {
                st.error = true;
                return Err(e);
            }
        }
    }
    let mut staged = 0;
    let mut lost = 0;
    let mut rest = data;
    while !rest.is_empty() {
        if st.buffer.dirty_len() == st.buffer.capacity() {
            lost += flush_range_unlocked(st, st.buffer.dirty_len())?;
        }
        let n = st.buffer.stage_write(rest);
        staged += n;
        rest = &rest[n..];
    }
    match st.buffer.mode() {
        BufMode::None => {
            let dirty = st.buffer.dirty_len();
            if dirty > 0 {
                lost += flush_range_unlocked(st, dirty)?;
            }
        }
        BufMode::Line => {
            if let Some(upto) = st.buffer.line_flush_len() {
                lost += flush_range_unlocked(st, upto)?;
            }
        }
        BufMode::Full => {}
    }
    Ok(staged - lost.min(staged))
}

/// One store fill. Every refill first flushes the registry's
/// line-buffered writers, so an interactive prompt lands before the
/// blocking read it solicits.
fn refill_unlocked(inner: &StreamInner, st: &mut StreamState) -> Result<usize> {
    if st.buffer.dirty_len() > 0 {
        flush_unlocked(st)?;
    }
    inner.registry.flush_line_buffered(inner.id());
    let res = {
        let StreamState { store, buffer, .. } = &mut *st;
        store.read(buffer.fill_target())
    };
    match res {
        Ok(n) => {
            st.buffer.commit_fill(n);
            Ok(n)
        }
        Err(e) => Err(e),
    }
}

fn read_unlocked(inner: &StreamInner, st: &mut StreamState, dst: &mut [u8]) -> Result<usize> {
    if !st.readable {
        st.error = true;
        return Err(Error::NotReadable);
    }
    let mut nread = 0;
    while nread < dst.len() {
        match st.buffer.take_unget() {
            Some(b) => {
                dst[nread] = b;
                nread += 1;
            }
            None => break,
        }
    }
    if nread == dst.len() {
        return Ok(nread);
    }
    if st.buffer.dirty_len() > 0 {
        flush_unlocked(st)?;
    }
    loop {
        nread += st.buffer.drain_read(&mut dst[nread..]);
        if nread == dst.len() {
            break;
        }
        match refill_unlocked(inner, st) {
            Ok(0) => {
                st.eof = true;
                break;
            }
            Ok(_) => {}
            Err(_) => {
                st.error = true;
                break;
            }
        }
    }
    Ok(nread)
}

fn read_line_unlocked(
    inner: &StreamInner,
    st: &mut StreamState,
    cap: usize,
) -> Result<Option<Vec<u8>>> {
    if !st.readable {
        st.error = true;
        return Err(Error::NotReadable);
    }
    if cap <= 1 {
        return Ok(Some(Vec::new()));
    }
    let max = cap - 1;
    let mut out = Vec::new();
    while out.len() < max {
        match st.buffer.take_unget() {
            Some(b) => {
                out.push(b);
                if b == b'\n' {
                    return Ok(Some(out));
                }
            }
            None => break,
        }
    }
    if st.buffer.dirty_len() > 0 {
        flush_unlocked(st)?;
    }
    let mut failed = false;
    'fill: while out.len() < max {
        let want = max - out.len();
        let avail = st.buffer.peek_read();
        if !avail.is_empty() {
            let upto = avail.len().min(want);
            let stop = avail[..upto].iter().position(|&b| b == b'\n');
            let take = match stop {
                Some(i) => i + 1,
                None => upto,
            };
            out.extend_from_slice(&st.buffer.peek_read()[..take]);
            st.buffer.consume_read(take);
            if stop.is_some() {
                return Ok(Some(out));
            }
            continue 'fill;
        }
        match refill_unlocked(inner, st) {
            Ok(0) => {
                st.eof = true;
                break;
            }
            Ok(_) => {}
            Err(_) => {
                st.error = true;
                failed = true;
                break;
            }
        }
    }
    if out.is_empty() && (st.eof || failed) {
        return Ok(None);
    }
    Ok(Some(out))
}

fn seek_unlocked(st: &mut StreamState, offset: i64, whence: Whence) -> Result<()> {
    flush_unlocked(st)?;
    let res = match whence {
        Whence::Cur => {
            // The store cursor sits past the unread window.
            let adj = offset - st.buffer.read_pending() as i64;
            st.buffer.discard_read();
            st.store.seek(adj, Whence::Cur)
        }
        w => {
            st.buffer.discard_read();
            st.store.seek(offset, w)
        }
    };
    match res {
        Ok(_) => Ok(()),
        Err(e) => {
            st.error = true;
            Err(e)
        }
    }
}

fn tell_unlocked(st: &mut StreamState) -> Result<i64> {
    let pos = st.store.seek(0, Whence::Cur)?;
    Ok(pos - st.buffer.read_pending() as i64 - st.buffer.pending_ungets() as i64
        + st.buffer.dirty_len() as i64)
}

fn close_unlocked(st: &mut StreamState) -> Result<i32> {
    let flush_res = flush_unlocked(st);
    let close_res = st.store.close();
    st.closed = true;
    let status = close_res?;
    flush_res?;
    Ok(status)
}

// ----------------------------------------------------------------------
// Public surface
// ----------------------------------------------------------------------

impl Stream {
    fn from_parts(
        store: Store,
        mode: &OpenMode,
        buf_mode: BufMode,
        registry: Arc<Registry>,
        permanent: bool,
    ) -> Stream {
        let state = StreamState {
            store,
            buffer: StreamBuffer::new(buf_mode, BUFSIZ),
            readable: mode.read,
            writable: mode.write,
            append: mode.append,
            eof: false,
            error: false,
            closed: false,
        };
        let line = mode.write && buf_mode == BufMode::Line;
        let inner = Arc::new(StreamInner {
            canary: STREAM_CANARY,
            permanent,
            registry: Arc::clone(&registry),
            state: ReentrantMutex::new(RefCell::new(state)),
        });
        registry.insert(Arc::downgrade(&inner), line);
        Stream { inner }
    }

    // -- constructors --------------------------------------------------

    pub fn open_path(path: &str, mode: &str) -> Result<Stream> {
        let m = OpenMode::parse(mode)?;
        let fd = sys::open_path(path, m.oflags())?;
        Ok(Stream::from_parts(
            Store::Fd(FdStore::new(fd)),
            &m,
            BufMode::Full,
            Arc::clone(Registry::global()),
            false,
        ))
    }

    /// Adopt an already-open descriptor. The mode must describe what the
    /// descriptor can actually do; the stream takes ownership.
    pub fn open_fd(fd: i32, mode: &str) -> Result<Stream> {
        let m = OpenMode::parse(mode)?;
        Ok(Stream::from_parts(
            Store::Fd(FdStore::new(fd)),
            &m,
            BufMode::Full,
            Arc::clone(Registry::global()),
            false,
        ))
    }

    /// Anonymous read/write scratch file, gone when the stream closes.
    pub fn open_tmpfile() -> Result<Stream> {
        let fd = sys::open_tmpfile()?;
        let m = OpenMode::parse("r+")?;
        Ok(Stream::from_parts(
            Store::Fd(FdStore::new(fd)),
            &m,
            BufMode::Full,
            Arc::clone(Registry::global()),
            false,
        ))
    }

    pub fn open_cookie(io: CookieIo, mode: &str) -> Result<Stream> {
        let m = OpenMode::parse(mode)?;
        Ok(Stream::from_parts(
            Store::Cookie(CookieStore::new(io)),
            &m,
            BufMode::Full,
            Arc::clone(Registry::global()),
            false,
        ))
    }

    /// Fixed-capacity memory stream over a fresh region. Returns the
    /// shared handle alongside, so the caller can inspect the bytes.
    /// Unbuffered, so write return counts reflect the store directly.
    pub fn open_memfile(capacity: usize, mode: &str) -> Result<(Stream, MemBuffer)> {
        let buf: MemBuffer = Arc::new(parking_lot::Mutex::new(vec![0; capacity]));
        let stream = Stream::open_memfile_shared(Arc::clone(&buf), mode)?;
        Ok((stream, buf))
    }

    /// Fixed-capacity memory stream over a caller-provided region.
    pub fn open_memfile_shared(buf: MemBuffer, mode: &str) -> Result<Stream> {
        let m = OpenMode::parse(mode)?;
        let store = MemFileStore::new(buf, m.robust, m.mem_init());
        Ok(Stream::from_parts(
            Store::MemFile(store),
            &m,
            BufMode::None,
            Arc::clone(Registry::global()),
            false,
        ))
    }

    /// Growable read/write memory stream; the handle observes the bytes
    /// as they accumulate.
    pub fn open_memstream() -> Result<(Stream, MemStreamHandle)> {
        let (store, handle) = MemStreamStore::new();
        let m = OpenMode::parse("w+")?;
        let stream = Stream::from_parts(
            Store::MemStream(store),
            &m,
            BufMode::None,
            Arc::clone(Registry::global()),
            false,
        );
        Ok((stream, handle))
    }

    /// Paged read/write in-memory scratch stream.
    pub fn open_strfile() -> Stream {
        let m = OpenMode {
            read: true,
            write: true,
            append: false,
            truncate: false,
            robust: false,
        };
        Stream::from_parts(
            Store::StrFile(StrFileStore::new()),
            &m,
            BufMode::Full,
            Arc::clone(Registry::global()),
            false,
        )
    }

    /// Pipe to or from `sh -c command`. Closing waits for the child and
    /// returns its exit status.
    pub fn open_process(command: &str, mode: ProcessMode) -> Result<Stream> {
        let store = ProcessStore::spawn(command, mode)?;
        let m = match mode {
            ProcessMode::Read => OpenMode::parse("r")?,
            ProcessMode::Write => OpenMode::parse("w")?,
        };
        // A pipe is never append/truncate whatever the mode string says.
        let m = OpenMode {
            truncate: false,
            append: false,
            ..m
        };
        Ok(Stream::from_parts(
            Store::Process(store),
            &m,
            BufMode::Full,
            Arc::clone(Registry::global()),
            false,
        ))
    }

    // -- reopen family -------------------------------------------------

    /// Rebind this handle to a new store, keeping the identity (and any
    /// clones) valid. The previous store is flushed and closed.
    fn rebind(&self, store: Store, m: &OpenMode, buf_mode: BufMode, close_old: bool) {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        if !st.closed {
            let _ = flush_unlocked(&mut st);
            if close_old {
                let _ = st.store.close();
            }
        }
        st.store = store;
        st.buffer = StreamBuffer::new(buf_mode, BUFSIZ);
        st.readable = m.read;
        st.writable = m.write;
        st.append = m.append;
        st.eof = false;
        st.error = false;
        st.closed = false;
        let line = line_writer(&st);
        drop(st);
        drop(guard);
        self.inner.registry.reseat(&self.inner, line);
    }

    pub fn reopen_path(&self, path: &str, mode: &str) -> Result<()> {
        let m = OpenMode::parse(mode)?;
        let fd = sys::open_path(path, m.oflags())?;
        self.rebind(Store::Fd(FdStore::new(fd)), &m, BufMode::Full, true);
        Ok(())
    }

    pub fn reopen_fd(&self, fd: i32, mode: &str) -> Result<()> {
        let m = OpenMode::parse(mode)?;
        self.rebind(Store::Fd(FdStore::new(fd)), &m, BufMode::Full, true);
        Ok(())
    }

    pub fn reopen_tmpfile(&self) -> Result<()> {
        let fd = sys::open_tmpfile()?;
        let m = OpenMode::parse("r+")?;
        self.rebind(Store::Fd(FdStore::new(fd)), &m, BufMode::Full, true);
        Ok(())
    }

    pub fn reopen_cookie(&self, io: CookieIo, mode: &str) -> Result<()> {
        let m = OpenMode::parse(mode)?;
        self.rebind(Store::Cookie(CookieStore::new(io)), &m, BufMode::Full, true);
        Ok(())
    }

    pub fn reopen_strfile(&self) -> Result<()> {
        let m = OpenMode {
            read: true,
            write: true,
            append: false,
            truncate: false,
            robust: false,
        };
        self.rebind(Store::StrFile(StrFileStore::new()), &m, BufMode::Full, true);
        Ok(())
    }

    pub fn reopen_memstream(&self) -> Result<MemStreamHandle> {
        let (store, handle) = MemStreamStore::new();
        let m = OpenMode::parse("w+")?;
        self.rebind(Store::MemStream(store), &m, BufMode::None, true);
        Ok(handle)
    }

    pub fn reopen_memfile(&self, capacity: usize, mode: &str) -> Result<MemBuffer> {
        let buf: MemBuffer = Arc::new(parking_lot::Mutex::new(vec![0; capacity]));
        self.reopen_memfile_shared(Arc::clone(&buf), mode)?;
        Ok(buf)
    }

    pub fn reopen_memfile_shared(&self, buf: MemBuffer, mode: &str) -> Result<()> {
        let m = OpenMode::parse(mode)?;
        let store = MemFileStore::new(buf, m.robust, m.mem_init());
        // Fast path: a stream already on a fixed-memory store has no
        // resource behind it to close, only a binding to replace.
        let already_memfile = {
            let guard = self.inner.state.lock();
            let st = guard.borrow();
            matches!(st.store, Store::MemFile(_))
        };
        self.rebind(Store::MemFile(store), &m, BufMode::None, !already_memfile);
        Ok(())
    }

    pub fn reopen_process(&self, command: &str, mode: ProcessMode) -> Result<()> {
        let store = ProcessStore::spawn(command, mode)?;
        let m = match mode {
            ProcessMode::Read => OpenMode::parse("r")?,
            ProcessMode::Write => OpenMode::parse("w")?,
        };
        self.rebind(Store::Process(store), &m, BufMode::Full, true);
        Ok(())
    }

    // -- core operations -----------------------------------------------

    /// Hold the stream lock across several calls (flockfile pattern).
    pub fn lock(&self) -> StreamLock<'_> {
        debug_assert_eq!(self.inner.canary, STREAM_CANARY);
        StreamLock {
            _guard: self.inner.state.lock(),
        }
    }

    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        write_unlocked(&mut st, data)
    }

    pub fn read(&self, dst: &mut [u8]) -> Result<usize> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        read_unlocked(&self.inner, &mut st, dst)
    }

    /// Read up to a newline (kept) or `cap - 1` bytes, whichever comes
    /// first. Returns `None` only when nothing at all was produced.
    pub fn read_line(&self, cap: usize) -> Result<Option<Vec<u8>>> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        read_line_unlocked(&self.inner, &mut st, cap)
    }

    pub fn getc(&self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        let n = self.read(&mut b)?;
        Ok(if n == 1 { Some(b[0]) } else { None })
    }

    pub fn putc(&self, byte: u8) -> Result<()> {
        self.write(&[byte])?;
        Ok(())
    }

    pub fn puts(&self, text: &[u8]) -> Result<usize> {
        self.write(text)
    }

    /// Push a byte back; it is the next byte read. Two deep. Clears the
    /// end-of-data flag.
    pub fn unget(&self, byte: u8) -> Result<()> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        if !st.buffer.unget(byte) {
            return Err(Error::PushbackFull);
        }
        st.eof = false;
        Ok(())
    }

    pub fn seek(&self, offset: i64, whence: Whence) -> Result<()> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        seek_unlocked(&mut st, offset, whence)
    }

    /// Seek to the start and clear both status flags.
    pub fn rewind(&self) -> Result<()> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        seek_unlocked(&mut st, 0, Whence::Set)?;
        st.eof = false;
        st.error = false;
        Ok(())
    }

    /// Logical cursor position, accounting for staged and pushed-back
    /// bytes.
    pub fn tell(&self) -> Result<i64> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        tell_unlocked(&mut st)
    }

    /// Snapshot of the logical cursor, for later restoration.
    pub fn position(&self) -> Result<i64> {
        self.tell()
    }

    /// Restore a cursor captured with [`Stream::position`].
    pub fn set_position(&self, pos: i64) -> Result<()> {
        self.seek(pos, Whence::Set)
    }

    pub fn flush(&self) -> Result<()> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        flush_unlocked(&mut st)?;
        Ok(())
    }

    /// Replace the staging buffer and buffering policy. Flushes first.
    pub fn set_buffer(&self, region: Option<Vec<u8>>, mode: BufMode, size: usize) -> Result<()> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        check_open(&st)?;
        flush_unlocked(&mut st)?;
        st.buffer.reconfigure(region, mode, size);
        let line = line_writer(&st);
        drop(st);
        drop(guard);
        self.inner.registry.reseat(&self.inner, line);
        Ok(())
    }

    pub fn set_line_buffered(&self) -> Result<()> {
        self.set_buffer(None, BufMode::Line, BUFSIZ)
    }

    pub fn is_eof(&self) -> bool {
        let guard = self.inner.state.lock();
        let st = guard.borrow();
        st.eof
    }

    pub fn has_error(&self) -> bool {
        let guard = self.inner.state.lock();
        let st = guard.borrow();
        st.error
    }

    pub fn clear_error(&self) {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        st.eof = false;
        st.error = false;
    }

    /// Flush, release the store, deregister. Idempotent; for process
    /// streams the child's exit status comes back.
    pub fn close(&self) -> Result<i32> {
        let guard = self.inner.state.lock();
        let mut st = guard.borrow_mut();
        if st.closed {
            return Ok(0);
        }
        let res = close_unlocked(&mut st);
        drop(st);
        drop(guard);
        if !self.inner.permanent {
            self.inner.registry.remove(self.inner.id());
        }
        res
    }
}

// ----------------------------------------------------------------------
// Standard streams
// ----------------------------------------------------------------------

fn std_stream(fd: i32, mode: &str, buf_mode: BufMode) -> Stream {
    let m = OpenMode::parse(mode).unwrap_or(OpenMode {
        read: false,
        write: true,
        append: false,
        truncate: false,
        robust: false,
    });
    Stream::from_parts(
        Store::Fd(FdStore::new(fd)),
        &m,
        buf_mode,
        Arc::clone(Registry::global()),
        true,
    )
}

/// Process standard input; line-buffered, permanent.
pub fn stdin() -> Stream {
    static STDIN: OnceLock<Stream> = OnceLock::new();
    STDIN
        .get_or_init(|| std_stream(0, "r", BufMode::Line))
        .clone()
}

/// Process standard output; line-buffered, permanent, flushed at exit.
pub fn stdout() -> Stream {
    static STDOUT: OnceLock<Stream> = OnceLock::new();
    STDOUT
        .get_or_init(|| std_stream(1, "w", BufMode::Line))
        .clone()
}

/// Process standard error; unbuffered, permanent.
pub fn stderr() -> Stream {
    static STDERR: OnceLock<Stream> = OnceLock::new();
    STDERR
        .get_or_init(|| std_stream(2, "w", BufMode::None))
        .clone()
}
