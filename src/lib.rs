//! # ferrofp
//!
//! Group-shared file pointers: a group of cooperating processes appends to
//! one file as if it had a single global write cursor, without any process
//! knowing the others' write sizes in advance.
//!
//! The crate provides:
//! - A **shared cursor** ([`SharedCursor`] / [`AtomicCursor`]): a
//!   linearizable, monotonic offset allocator that hands out
//!   non-overlapping byte ranges to any requester.
//! - An **independent write path** ([`SharedFileHandle::write`]): one rank
//!   reserves a range and writes, unordered relative to other ranks.
//! - An **ordered collective write path**
//!   ([`SharedFileHandle::write_ordered`]): the whole group's buffers land
//!   in ascending rank order within one reserved region, regardless of
//!   arrival timing.
//! - Read mirrors of both paths, and pluggable back-ends
//!   ([`MemoryBackend`], [`UnixBackend`]) behind the [`FileBackend`] /
//!   [`SharedFile`] traits.
//!
//! The collective transport is abstracted behind [`ProcessGroup`];
//! [`LocalGroup`] ships as the in-process realization (one thread per
//! rank). A binding to a real transport implements the same trait.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use ferrofp::{
//!     AccessMode, Info, LocalGroup, MemoryBackend, ProcessGroup, SharedFileHandle,
//! };
//!
//! let backend = Arc::new(MemoryBackend::new());
//!
//! let joins: Vec<_> = LocalGroup::split(2)
//!     .into_iter()
//!     .map(|group| {
//!         let backend = Arc::clone(&backend);
//!         thread::spawn(move || {
//!             let rank = group.rank();
//!             let mut fh = SharedFileHandle::new(
//!                 backend,
//!                 Arc::new(group),
//!                 "/scratch/log.bin",
//!                 AccessMode::READ_WRITE | AccessMode::CREATE,
//!                 Info::new(),
//!             );
//!             // Rank 0 writes one byte, rank 1 two bytes; placement is
//!             // by rank order no matter which thread runs first.
//!             let payload = vec![rank as u8; rank as usize + 1];
//!             fh.write_ordered(&payload).unwrap();
//!         })
//!     })
//!     .collect();
//! for j in joins {
//!     j.join().unwrap();
//! }
//!
//! assert_eq!(backend.contents("/scratch/log.bin"), Some(vec![0, 1, 1]));
//! ```
//!
//! ## Guarantees
//!
//! - Ranges granted by one cursor are pairwise disjoint and tile the file
//!   contiguously, across both write paths and any interleaving.
//! - The ordered path is byte-for-byte equivalent to sequential writes in
//!   ascending rank order; a rank contributing zero bytes still completes
//!   the collective and claims an empty range.
//! - A range, once granted, is consumed forever: a failed physical write
//!   leaves a hole in the file rather than re-coordinating.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow certain pedantic lints for existing code
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod allocator;
mod backend;
mod datatype;
mod error;
mod group;
mod info;
mod local;
mod memory;
mod ordered;
mod session;
#[cfg(unix)]
mod unix;
mod write;

pub use allocator::{AtomicCursor, SharedCursor};
pub use backend::{AccessMode, FileBackend, OpenedShared, SharedFile};
pub use datatype::Datatype;
pub use error::{Error, Result};
pub use group::ProcessGroup;
pub use info::Info;
pub use local::LocalGroup;
pub use memory::{MemoryBackend, MemoryFile};
pub use ordered::{rank_partition, COORDINATOR};
pub use session::{SharedFileHandle, SharedSession};
#[cfg(unix)]
pub use unix::{UnixBackend, UnixFile};
pub use write::Receipt;
