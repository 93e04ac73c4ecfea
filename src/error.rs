//! Error types for ferrofp

use std::path::PathBuf;

use thiserror::Error;

/// Result type for shared-file-pointer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for shared-file-pointer operations
#[derive(Error, Debug)]
pub enum Error {
    /// The back-end failed to open the shared file. Open errors are
    /// configuration errors and are never retried.
    #[error("failed to open shared file {path:?}: {source}")]
    Open {
        /// Path that was being opened
        path: PathBuf,
        /// Underlying I/O error from the back-end
        source: std::io::Error,
    },

    /// The requested access mode is malformed (e.g. no read/write bits set,
    /// or `READ_ONLY` combined with `WRITE_ONLY`).
    #[error("invalid access mode: {0}")]
    InvalidAccessMode(String),

    /// A coordinator-side buffer could not be acquired. No allocator request
    /// has been issued when this is returned.
    #[error("out of resources: {0}")]
    OutOfResource(&'static str),

    /// The shared-cursor service rejected a request or is unreachable.
    #[error("shared cursor failure: {0}")]
    Allocator(String),

    /// Granting the request would wrap the shared cursor past `u64::MAX`.
    /// The cursor is left unchanged.
    #[error("shared cursor overflow: position {position} + requested {requested} exceeds u64::MAX")]
    CounterOverflow {
        /// Cursor position at the time of the request
        position: u64,
        /// Number of bytes that were requested
        requested: u64,
    },

    /// A group collective (gather, scatter, barrier) failed. The transport
    /// contract makes such failures visible to every member of the group.
    #[error("collective {op} failed: {reason}")]
    Collective {
        /// Name of the collective primitive that failed
        op: &'static str,
        /// Transport-provided description of the failure
        reason: String,
    },

    /// The coordinating rank aborted an ordered operation after the size
    /// gather. Ranks receiving this have not touched the file.
    #[error("ordered operation aborted by the coordinating rank")]
    OrderedAbort,

    /// A rank argument is outside the group.
    #[error("invalid rank: {0}")]
    InvalidRank(i32),

    /// Physical I/O against the shared file failed. The byte range reserved
    /// for this operation stays consumed (a hole in the file, never reused).
    #[error("I/O error at offset {offset}: {source}")]
    Io {
        /// Absolute file offset of the failed transfer
        offset: u64,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Back-end specific failure that fits no other category.
    #[error("back-end error: {0}")]
    Backend(String),
}

impl Error {
    /// Build a [`Error::Collective`] for the named primitive.
    pub fn collective(op: &'static str, reason: impl Into<String>) -> Self {
        Error::Collective {
            op,
            reason: reason.into(),
        }
    }

    /// Build a [`Error::Open`] for the given path.
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Open {
            path: path.into(),
            source,
        }
    }
}
