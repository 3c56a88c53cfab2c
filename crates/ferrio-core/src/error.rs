//! Error taxonomy shared by the stream and formatting layers.
//!
//! Configuration mistakes (bad mode strings, malformed templates, argument
//! lists that do not match the template) are surfaced as dedicated variants
//! rather than the undefined behavior the classic C surface allowed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Mode string was not one of the recognized r/w/a forms.
    #[error("unsupported open mode `{0}`")]
    InvalidMode(String),

    /// Unknown conversion letter in a format template. The formatted call
    /// aborts at the point of the error; bytes already emitted stay emitted.
    #[error("unsupported conversion specifier `%{0}`")]
    BadConversion(char),

    /// The typed argument list does not line up with the template.
    #[error("format argument {index} does not match its specifier")]
    ArgumentMismatch { index: usize },

    #[error("stream is not open for reading")]
    NotReadable,

    #[error("stream is not open for writing")]
    NotWritable,

    /// The backing store cannot honor a reposition request.
    #[error("backing store is not seekable")]
    Unseekable,

    /// The two-slot pushback queue is already full.
    #[error("pushback queue is full")]
    PushbackFull,

    /// Operation attempted on a stream that was already closed.
    #[error("stream is closed")]
    Closed,

    /// The input was exhausted before the first field could match.
    #[error("input exhausted before any field matched")]
    ScanFailure,

    #[error("{message} (errno {errno})")]
    Io { errno: i32, message: String },
}

impl Error {
    /// Wrap a raw errno, capturing its description eagerly.
    pub(crate) fn io(errno: i32) -> Self {
        Error::Io {
            errno,
            message: crate::sys::errno_message(errno),
        }
    }

    pub(crate) fn last_os() -> Self {
        Error::io(crate::sys::last_errno())
    }
}
