//! ferrio-core: a self-contained buffered stream runtime.
//!
//! The crate provides the classic stdio trio as an ordinary Rust library:
//! a buffered [`Stream`] over pluggable backing stores (file descriptors,
//! caller callbacks, fixed and growable memory buffers, paged string
//! buffers, child-process pipes), a process-wide registry that coordinates
//! line-buffered flushing and shutdown, and printf/scanf-style formatting
//! engines driven by typed argument lists instead of variadics.
//!
//! Design:
//! - Every public stream operation acquires the stream's re-entrant lock
//!   and delegates to an `*_unlocked` worker, so the formatting engines can
//!   hold the lock across a whole template expansion.
//! - Raw OS access is confined to the `sys` module; everything else is
//!   `#![deny(unsafe_code)]` clean.

pub mod buffer;
pub mod error;
pub mod fmt;
pub mod registry;
pub mod store;
pub mod stream;
#[allow(unsafe_code)]
pub(crate) mod sys;

pub use buffer::BufMode;
pub use error::{Error, Result};
pub use fmt::printf::{format_to_vec, fprintf, printf, snprintf, Value};
pub use fmt::scanf::{fscanf, scanf, sscanf, Dest};
pub use registry::flush_open_streams;
pub use store::{CookieIo, MemBuffer, MemStreamHandle, Whence};
pub use stream::{stderr, stdin, stdout, ProcessMode, Stream};
