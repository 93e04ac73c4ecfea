//! Independent write and read paths.
//!
//! A single rank appends through the shared pointer without coordinating
//! with the rest of the group: compute the request size, ask the cursor for
//! a range once, transfer at the returned offset. Concurrent independent
//! callers (and concurrent ordered calls, which route through the same
//! cursor) never receive overlapping ranges; no ordering is promised
//! between their completions, only between their reserved ranges.

use tracing::debug;

use crate::allocator::SharedCursor;
use crate::backend::SharedFile;
use crate::datatype::{self, Datatype};
use crate::error::Result;
use crate::session::SharedFileHandle;

/// Where an operation landed in the shared file.
///
/// Returned by every write and read path so callers can observe placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// First byte of the range reserved for this operation.
    pub offset: u64,
    /// Bytes actually transferred.
    pub bytes: u64,
}

impl Receipt {
    /// End of the reserved range (exclusive).
    pub fn end(&self) -> u64 {
        self.offset + self.bytes
    }
}

impl SharedFileHandle {
    /// Append `buf` at the shared pointer, independent of other ranks.
    ///
    /// Opens the file lazily on first use. One cursor request reserves
    /// `buf.len() * T::SIZE` bytes; the physical write then lands at the
    /// returned offset. An empty buffer still issues the (zero-byte)
    /// cursor request.
    ///
    /// # Errors
    ///
    /// If the cursor request fails the write is not attempted and the
    /// cursor error is returned. If the physical write fails afterwards,
    /// that error is returned as-is and the reserved range stays consumed:
    /// a hole in the file, never reused.
    pub fn write<T: Datatype>(&mut self, buf: &[T]) -> Result<Receipt> {
        let session = self.ensure_open()?;
        let data = datatype::as_bytes(buf);
        let requested = data.len() as u64;
        debug!(bytes = requested, "requesting shared offset");

        let offset = session.cursor.request_position(requested)?;
        debug!(offset, "shared offset granted");

        let written = session.file.write_at(offset, data)?;
        Ok(Receipt {
            offset,
            bytes: written as u64,
        })
    }

    /// Read from the shared pointer, independent of other ranks.
    ///
    /// The mirror of [`write`](Self::write): advances the shared pointer by
    /// `buf.len() * T::SIZE` bytes and reads that range, so cooperating
    /// readers consume disjoint slices of the file. Bytes past end of data
    /// are zero-filled; the receipt reports how many bytes the file
    /// actually held.
    pub fn read<T: Datatype>(&mut self, buf: &mut [T]) -> Result<Receipt> {
        let session = self.ensure_open()?;
        let data = datatype::as_bytes_mut(buf);
        let requested = data.len() as u64;
        debug!(bytes = requested, "requesting shared offset for read");

        let offset = session.cursor.request_position(requested)?;
        let read = session.file.read_at(offset, data)?;
        Ok(Receipt {
            offset,
            bytes: read as u64,
        })
    }
}
