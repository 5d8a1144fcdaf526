//! Error types for the 9P2000 session engine.

use std::io;

/// The wire-visible `Rerror` strings this server produces.
///
/// Collected in one place so the session engine and its tests can never
/// drift apart on the exact bytes a client sees.
pub mod estr {
    pub const NEED_NOTAG: &str = "NOTAG(0xFFFF) Required for Tversion.";
    pub const NEED_9P2000: &str = "We only talk 9P2000 Here.";
    pub const NO_AUTH: &str = "No authentication required.";
    pub const NEED_NOFID: &str = "No Authentication FID required.";
    pub const NO_ALT_ROOT: &str = "Alternate root requested unavailable.";
    pub const INVALID_FID: &str = "Supplied FID invalid.";
    pub const DUPLICATE_FID: &str = "Supplied FID exists.";
    pub const NOT_DIR: &str = "Not a directory.";
    pub const ALREADY_OPEN: &str = "File already open.";
    pub const NOT_FOUND: &str = "Not found.";
    pub const NOT_OPEN: &str = "File not opened.";
}

/// Reasons a session must be torn down rather than merely replied to.
#[derive(Debug, thiserror::Error)]
pub enum FatalKind {
    #[error("message size {size} exceeds negotiated msize {msize}")]
    Oversized { size: u32, msize: u32 },

    #[error("unknown or illegal verb #{0}")]
    IllegalVerb(u8),

    #[error("received a message with the wrong role parity")]
    RoleMismatch,

    #[error("malformed frame")]
    Frame(#[from] io::Error),

    #[error("invalid UTF-8 in a string field")]
    BadUtf8,

    #[error("string field exceeds remaining buffer")]
    BadString,

    #[error("short buffer while decoding a wire value")]
    ShortBuffer,

    #[error("client rejected version negotiation: {0}")]
    VersionRejected(&'static str),
}

/// Top level error for everything that can go wrong servicing one session.
///
/// `Protocol` is client-correctable: the caller replies `Rerror` and keeps
/// reading. `Fatal` means the session cannot continue and the transport
/// should be closed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Protocol(&'static str),

    #[error(transparent)]
    Fatal(#[from] FatalKind),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error surface a [`crate::driver::Driver`] reports back to the session engine.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Error {
        match e {
            DriverError::NotFound => Error::Protocol(estr::NOT_FOUND),
            DriverError::Io(io) => Error::Fatal(FatalKind::Frame(io)),
        }
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;
