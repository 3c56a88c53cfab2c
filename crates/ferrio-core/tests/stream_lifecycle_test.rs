//! Integration test: stream lifecycle
//!
//! Exercises the buffered stream layer across its backing stores: disk
//! files, fixed and growable memory, cookies, and child processes.
//! Covers buffering modes, pushback, position reporting, rebinding, and
//! the line-buffer coordination between streams.
//!
//! Run: cargo test -p ferrio-core --test stream_lifecycle_test

use std::sync::Arc;

use parking_lot::Mutex;

use ferrio_core::{
    flush_open_streams, BufMode, CookieIo, MemBuffer, ProcessMode, Stream, Whence,
};

// ---------------------------------------------------------------------------
// 1. Disk-backed round trips
// ---------------------------------------------------------------------------

#[test]
fn tmpfile_write_seek_read() {
    let f = Stream::open_tmpfile().expect("tmpfile");
    assert_eq!(f.write(b"hello tmpfile").expect("write"), 13);
    f.seek(0, Whence::Set).expect("seek");
    let mut buf = [0u8; 32];
    let n = f.read(&mut buf).expect("read");
    assert_eq!(&buf[..n], b"hello tmpfile");
    assert!(f.is_eof() || f.read(&mut buf).expect("read at end") == 0);
    assert_eq!(f.close().expect("close"), 0);
}

#[test]
fn path_append_lands_at_end() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("ferrio-append-{}", std::process::id()));
    let path = path.to_str().expect("utf8 temp path");

    let f = Stream::open_path(path, "w").expect("create");
    f.write(b"base,").expect("write");
    f.close().expect("close");

    let f = Stream::open_path(path, "a").expect("append");
    f.seek(0, Whence::Set).expect("seek");
    f.write(b"tail").expect("write");
    f.close().expect("close");

    let f = Stream::open_path(path, "r").expect("read back");
    let mut buf = [0u8; 16];
    let n = f.read(&mut buf).expect("read");
    assert_eq!(&buf[..n], b"base,tail");
    f.close().expect("close");
    let _ = std::fs::remove_file(path);
}

// ---------------------------------------------------------------------------
// 2. Pushback and position
// ---------------------------------------------------------------------------

#[test]
fn pushback_is_lifo_and_tell_accounts_for_it() {
    let region: MemBuffer = Arc::new(Mutex::new(b"abcdef".to_vec()));
    let f = Stream::open_memfile_shared(region, "r").expect("open");
    assert_eq!(f.getc().expect("getc"), Some(b'a'));
    assert_eq!(f.getc().expect("getc"), Some(b'b'));
    assert_eq!(f.tell().expect("tell"), 2);

    f.unget(b'B').expect("unget");
    f.unget(b'A').expect("unget");
    assert_eq!(f.tell().expect("tell"), 0);
    assert!(f.unget(b'x').is_err());

    assert_eq!(f.getc().expect("getc"), Some(b'A'));
    assert_eq!(f.getc().expect("getc"), Some(b'B'));
    assert_eq!(f.getc().expect("getc"), Some(b'c'));
}

#[test]
fn unget_clears_end_of_file() {
    let region: MemBuffer = Arc::new(Mutex::new(b"x".to_vec()));
    let f = Stream::open_memfile_shared(region, "r").expect("open");
    assert_eq!(f.getc().expect("getc"), Some(b'x'));
    assert_eq!(f.getc().expect("getc"), None);
    assert!(f.is_eof());
    f.unget(b'y').expect("unget");
    assert!(!f.is_eof());
    assert_eq!(f.getc().expect("getc"), Some(b'y'));
}

// ---------------------------------------------------------------------------
// 3. Memory stores
// ---------------------------------------------------------------------------

#[test]
fn robust_memfile_absorbs_overflow() {
    let (f, region) = Stream::open_memfile(8, "w0").expect("open");
    assert_eq!(f.write(b"Mello, Nerds!").expect("write"), 13);
    f.flush().expect("flush");
    assert_eq!(&region.lock()[..8], b"Mello, N");
    f.close().expect("close");
}

#[test]
fn plain_memfile_reports_truncation() {
    let (f, _region) = Stream::open_memfile(8, "w").expect("open");
    let n = f.write(b"Mello, Nerds!").expect("write");
    assert!(n < 13);
    f.close().expect("close");
}

#[test]
fn memstream_grows_and_tracks_contents() {
    let (f, handle) = Stream::open_memstream().expect("open");
    for chunk in [&b"alpha "[..], b"beta ", b"gamma"] {
        f.write(chunk).expect("write");
    }
    f.flush().expect("flush");
    assert_eq!(handle.contents(), b"alpha beta gamma");
    assert_eq!(handle.len(), 16);
    f.close().expect("close");
}

#[test]
fn memstream_round_trips_after_seek() {
    let (f, _handle) = Stream::open_memstream().expect("open");
    f.write(b"alpha beta").expect("write");
    f.seek(0, Whence::Set).expect("seek");
    let mut buf = [0u8; 16];
    let n = f.read(&mut buf).expect("read");
    assert_eq!(&buf[..n], b"alpha beta");
    f.close().expect("close");
}

#[test]
fn strfile_seek_is_clamped_to_written_extent() {
    let f = Stream::open_strfile();
    f.write(b"0123456789").expect("write");
    f.flush().expect("flush");
    f.seek(100, Whence::Set).expect("seek clamps");
    assert_eq!(f.tell().expect("tell"), 10);
    f.seek(4, Whence::Set).expect("seek");
    let mut buf = [0u8; 4];
    assert_eq!(f.read(&mut buf).expect("read"), 4);
    assert_eq!(&buf, b"4567");
}

// ---------------------------------------------------------------------------
// 4. Cookie streams
// ---------------------------------------------------------------------------

#[test]
fn cookie_stream_drives_custom_hooks() {
    let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let tap = Arc::clone(&sink);
    let io = CookieIo {
        write: Some(Box::new(move |data: &[u8]| {
            tap.lock().extend_from_slice(data);
            Ok(data.len())
        })),
        ..CookieIo::default()
    };
    let f = Stream::open_cookie(io, "w").expect("open");
    f.write(b"through the hook").expect("write");
    f.flush().expect("flush");
    assert_eq!(&*sink.lock(), b"through the hook");
    f.close().expect("close");
}

// ---------------------------------------------------------------------------
// 5. Buffering modes and cross-stream coordination
// ---------------------------------------------------------------------------

#[test]
fn line_buffering_flushes_through_newline() {
    let (f, handle) = Stream::open_memstream().expect("open");
    f.set_buffer(None, BufMode::Line, 4096).expect("set_buffer");
    f.write(b"partial").expect("write");
    assert_eq!(handle.contents(), b"");
    f.write(b" line\nheld").expect("write");
    assert_eq!(handle.contents(), b"partial line\n");
    f.flush().expect("flush");
    assert_eq!(handle.contents(), b"partial line\nheld");
}

#[test]
fn reading_flushes_other_line_buffered_writers() {
    let (out, handle) = Stream::open_memstream().expect("writer");
    out.set_buffer(None, BufMode::Line, 4096).expect("set_buffer");
    out.write(b"prompt: ").expect("write");
    assert_eq!(handle.contents(), b"");

    let region: MemBuffer = Arc::new(Mutex::new(b"reply".to_vec()));
    let input = Stream::open_memfile_shared(region, "r").expect("reader");
    input.set_buffer(None, BufMode::Full, 4096).expect("set_buffer");
    assert_eq!(input.getc().expect("getc"), Some(b'r'));

    // The pending prompt went out when the reader refilled.
    assert_eq!(handle.contents(), b"prompt: ");
    out.close().expect("close");
}

#[test]
fn flush_open_streams_drains_everything() {
    let (a, ha) = Stream::open_memstream().expect("a");
    a.set_buffer(None, BufMode::Full, 4096).expect("set_buffer");
    let (b, hb) = Stream::open_memstream().expect("b");
    b.set_buffer(None, BufMode::Line, 4096).expect("set_buffer");
    a.write(b"one").expect("write");
    b.write(b"two").expect("write");
    flush_open_streams();
    assert_eq!(ha.contents(), b"one");
    assert_eq!(hb.contents(), b"two");
}

// ---------------------------------------------------------------------------
// 6. Rebinding
// ---------------------------------------------------------------------------

#[test]
fn rebind_keeps_handles_valid() {
    let f = Stream::open_tmpfile().expect("tmpfile");
    let alias = f.clone();
    f.write(b"first life").expect("write");

    let handle = f.reopen_memstream().expect("rebind");
    alias.write(b"second life").expect("write through alias");
    alias.flush().expect("flush");
    assert_eq!(handle.contents(), b"second life");
    f.close().expect("close");
}

// ---------------------------------------------------------------------------
// 7. Child processes
// ---------------------------------------------------------------------------

#[test]
fn process_read_captures_command_output() {
    let f = Stream::open_process("printf 'from child'", ProcessMode::Read).expect("spawn");
    let mut buf = [0u8; 64];
    let n = f.read(&mut buf).expect("read");
    assert_eq!(&buf[..n], b"from child");
    assert_eq!(f.close().expect("close"), 0);
}

#[test]
fn process_close_reports_exit_status() {
    let f = Stream::open_process("exit 3", ProcessMode::Read).expect("spawn");
    let mut buf = [0u8; 8];
    let _ = f.read(&mut buf).expect("read");
    assert_eq!(f.close().expect("close"), 3);
}

// ---------------------------------------------------------------------------
// 8. Error and end-of-file state
// ---------------------------------------------------------------------------

#[test]
fn flags_track_state_and_clear() {
    let region: MemBuffer = Arc::new(Mutex::new(b"ab".to_vec()));
    let f = Stream::open_memfile_shared(region, "r").expect("open");
    assert!(f.write(b"nope").is_err());
    assert!(f.has_error());
    f.clear_error();
    assert!(!f.has_error());

    let mut buf = [0u8; 8];
    let _ = f.read(&mut buf).expect("read");
    let _ = f.read(&mut buf).expect("read");
    assert!(f.is_eof());
    f.rewind().expect("rewind");
    assert!(!f.is_eof());
}
