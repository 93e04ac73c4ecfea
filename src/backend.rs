//! Pluggable file back-ends.
//!
//! The core never performs physical I/O itself; it depends on the
//! capability set `{open, write_at, write_at_all}` behind [`FileBackend`]
//! and [`SharedFile`], with the concrete variant selected at session
//! creation. The crate ships two variants:
//!
//! - [`MemoryBackend`](crate::MemoryBackend): named in-memory files
//!   (testing, single-process tools);
//! - [`UnixBackend`](crate::UnixBackend): positional I/O on real files.
//!
//! A binding to a parallel file-I/O engine implements the same two traits
//! and plugs in without touching the write paths.

use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;

use crate::allocator::SharedCursor;
use crate::error::{Error, Result};
use crate::group::ProcessGroup;
use crate::info::Info;

bitflags! {
    /// How a shared file is opened.
    ///
    /// Exactly one of `READ_ONLY`, `WRITE_ONLY`, `READ_WRITE` must be set;
    /// `CREATE` may be added to any of them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessMode: u32 {
        /// Open for reading only.
        const READ_ONLY = 1 << 0;
        /// Open for writing only.
        const WRITE_ONLY = 1 << 1;
        /// Open for both reading and writing.
        const READ_WRITE = 1 << 2;
        /// Create the file if it does not exist.
        const CREATE = 1 << 3;
    }
}

impl AccessMode {
    /// Check that exactly one of the read/write selectors is present.
    pub fn validate(self) -> Result<()> {
        let selectors = [Self::READ_ONLY, Self::WRITE_ONLY, Self::READ_WRITE]
            .iter()
            .filter(|s| self.contains(**s))
            .count();
        if selectors != 1 {
            return Err(Error::InvalidAccessMode(format!(
                "exactly one of READ_ONLY, WRITE_ONLY, READ_WRITE required, got {self:?}"
            )));
        }
        Ok(())
    }

    /// Whether this mode permits reading.
    pub fn readable(self) -> bool {
        self.intersects(Self::READ_ONLY | Self::READ_WRITE)
    }

    /// Whether this mode permits writing.
    pub fn writable(self) -> bool {
        self.intersects(Self::WRITE_ONLY | Self::READ_WRITE)
    }
}

/// An open shared file plus the cursor governing its shared pointer.
///
/// Returned by [`FileBackend::open`]; both parts are shared by every rank
/// that opens the same file identity through the same back-end.
pub struct OpenedShared {
    /// The file object physical transfers go through.
    pub file: Arc<dyn SharedFile>,
    /// The cursor serializing offset grants for this file.
    pub cursor: Arc<dyn SharedCursor>,
}

impl std::fmt::Debug for OpenedShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedShared").finish_non_exhaustive()
    }
}

/// A back-end module capable of opening shared files.
pub trait FileBackend: Send + Sync {
    /// The name of this back-end (e.g. `"memory"`, `"unix"`).
    fn name(&self) -> &'static str;

    /// Open `path` for the given group.
    ///
    /// Open is collective-capable: any subset of the group's ranks may call
    /// it concurrently for the same path and every caller receives handles
    /// onto the same file identity and the same cursor.
    ///
    /// # Errors
    ///
    /// Open failures are configuration errors (bad path, permissions,
    /// malformed access mode) and are surfaced verbatim, never retried.
    fn open(
        &self,
        group: &dyn ProcessGroup,
        path: &Path,
        amode: AccessMode,
        info: &Info,
    ) -> Result<OpenedShared>;
}

/// An open file accepting positional transfers.
///
/// Offsets are absolute byte positions handed out by the shared cursor;
/// implementations never maintain a seek position of their own.
pub trait SharedFile: Send + Sync {
    /// Write `buf` at absolute `offset`. Returns the number of bytes
    /// written, which is `buf.len()` unless the back-end reports an error.
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize>;

    /// Read into `buf` from absolute `offset`. Short reads past end of data
    /// are zero-filled; the return value is the number of bytes actually
    /// read from the file.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Current physical size of the file in bytes.
    fn file_size(&self) -> Result<u64>;

    /// Collective write: one call per group member, each with its own
    /// offset and buffer, jointly landing the whole group's data.
    ///
    /// The default realization is a positional write followed by a group
    /// barrier, so that when the call returns every rank's bytes have been
    /// accepted by the file layer. Engines with a native collective write
    /// override this.
    fn write_at_all(
        &self,
        group: &dyn ProcessGroup,
        offset: u64,
        buf: &[u8],
    ) -> Result<usize> {
        let written = self.write_at(offset, buf)?;
        group.barrier()?;
        Ok(written)
    }

    /// Collective read, the mirror of [`write_at_all`](Self::write_at_all).
    fn read_at_all(
        &self,
        group: &dyn ProcessGroup,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize> {
        let read = self.read_at(offset, buf)?;
        group.barrier()?;
        Ok(read)
    }
}
