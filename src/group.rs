//! Process-group abstraction over the collective transport.
//!
//! The shared-file-pointer core never talks to a transport directly; it sees
//! a group of cooperating processes only through [`ProcessGroup`]. Any
//! substrate that provides rank numbering and the three collectives below
//! can drive the ordered write path: an MPI communicator binding, a socket
//! mesh, or the in-process [`LocalGroup`](crate::LocalGroup) shipped with
//! this crate.
//!
//! Collectives are all-or-nothing group operations: every member of the
//! group must issue the call, and members must issue their collectives in
//! the same order. A call not issued by every member is undefined behavior
//! upstream of this crate.

use crate::error::Result;

/// A fixed, ordered set of cooperating processes.
///
/// Defines rank numbering and collective-operation membership for one
/// shared-file session. The group is fixed at session creation; `rank` and
/// `size` never change over the life of an instance.
///
/// The value collectives move one `u64` per rank, which is all the ordered
/// protocol needs: contribution sizes travel up to the coordinating rank
/// and absolute sub-offsets travel back down.
pub trait ProcessGroup: Send + Sync {
    /// This process's zero-based index within the group.
    fn rank(&self) -> i32;

    /// Number of processes in the group.
    fn size(&self) -> i32;

    /// Block until every member of the group has entered the barrier.
    fn barrier(&self) -> Result<()>;

    /// Gather one `u64` from every rank to `root`.
    ///
    /// `recv` is only significant at the root, where it must hold exactly
    /// `size()` elements; other ranks may pass an empty slice. On success
    /// the root's `recv[r]` holds the value sent by rank `r`.
    fn gather_u64(&self, send: u64, recv: &mut [u64], root: i32) -> Result<()>;

    /// Scatter one `u64` to every rank from `root`.
    ///
    /// `send` is only significant at the root, where it must hold exactly
    /// `size()` elements; other ranks may pass an empty slice. Every rank
    /// (the root included) receives `send[rank]`.
    fn scatter_u64(&self, send: &[u64], root: i32) -> Result<u64>;
}
