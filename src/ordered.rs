//! Ordered collective write and read paths.
//!
//! Every rank of the group calls [`SharedFileHandle::write_ordered`] (or
//! its read mirror) with its own element count. The group's contributions
//! land in one contiguous region of the file, partitioned in ascending rank
//! order regardless of arrival timing: the coordinating rank gathers all
//! sizes, reserves the aggregate with a single cursor request, forms each
//! rank's absolute sub-offset by prefix sum, and scatters the sub-offsets
//! back before the group performs one collective transfer.
//!
//! The coordinator role is explicit: [`COORDINATOR`] is rank 0 of the
//! group, and the aggregation arithmetic lives in [`rank_partition`], a
//! pure function independent of any transport.
//!
//! If the coordinator fails after a successful gather (cursor unreachable,
//! aggregate overflow) it still completes the scatter, distributing
//! [`OFFSET_ABORT`] so every rank exits the collective consistently instead
//! of writing at a stale offset.

use tracing::{debug, warn};

use crate::allocator::SharedCursor;
use crate::backend::SharedFile;
use crate::datatype::{self, Datatype};
use crate::error::{Error, Result};
use crate::group::ProcessGroup;
use crate::session::{SharedFileHandle, SharedSession};
use crate::write::Receipt;

/// Rank that aggregates sizes and requests the group's offset.
pub const COORDINATOR: i32 = 0;

/// Sub-offset value scattered when the coordinator aborts the protocol.
///
/// `u64::MAX` can never be a real sub-offset: the cursor would have refused
/// any request whose range reached it.
const OFFSET_ABORT: u64 = u64::MAX;

/// Partition `[base, base + Σ sizes)` across ranks in rank order.
///
/// Returns each rank's absolute starting sub-offset: rank 0 gets `base`,
/// rank `r > 0` gets `base` plus the sizes of all lower ranks. A rank with
/// size 0 is assigned the empty range at its rank-order position.
///
/// # Example
///
/// ```
/// use ferrofp::rank_partition;
///
/// assert_eq!(rank_partition(100, &[0, 10, 0, 5]), vec![100, 100, 110, 110]);
/// ```
pub fn rank_partition(base: u64, sizes: &[u64]) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(sizes.len());
    let mut next = base;
    for &size in sizes {
        offsets.push(next);
        next += size;
    }
    offsets
}

/// Coordinator-side aggregation: one cursor request for the group total,
/// then the rank-order partition of the granted range.
fn coordinate(cursor: &dyn SharedCursor, sizes: &[u64]) -> Result<Vec<u64>> {
    let mut total: u64 = 0;
    for &size in sizes {
        total = total.checked_add(size).ok_or_else(|| {
            Error::Allocator("aggregate request overflows the shared cursor".into())
        })?;
    }
    debug!(total, "requesting aggregate shared offset");
    let base = cursor.request_position(total)?;
    debug!(base, "aggregate shared offset granted");
    Ok(rank_partition(base, sizes))
}

/// Run the ordered offset protocol and return this rank's sub-offset.
fn ordered_offset(session: &SharedSession, local_bytes: u64) -> Result<u64> {
    let group = session.group.as_ref();
    let rank = group.rank();
    let size = group.size() as usize;

    // Only the coordinator carries the aggregation buffer. Acquisition
    // failure is surfaced before any collective or cursor traffic; release
    // on every exit path is by ownership.
    let mut sizes: Vec<u64> = Vec::new();
    if rank == COORDINATOR {
        sizes
            .try_reserve_exact(size)
            .map_err(|_| Error::OutOfResource("ordered aggregation buffer"))?;
        sizes.resize(size, 0);
    }

    group.gather_u64(local_bytes, &mut sizes, COORDINATOR)?;

    let assigned = if rank == COORDINATOR {
        match coordinate(session.cursor.as_ref(), &sizes) {
            Ok(offsets) => group.scatter_u64(&offsets, COORDINATOR)?,
            Err(err) => {
                // The group is already past the gather; the scatter must
                // still run so no rank is left waiting or writes at a
                // stale offset.
                warn!(error = %err, "ordered protocol aborted on coordinator");
                let poison = vec![OFFSET_ABORT; size];
                group.scatter_u64(&poison, COORDINATOR)?;
                return Err(err);
            }
        }
    } else {
        group.scatter_u64(&[], COORDINATOR)?
    };

    if assigned == OFFSET_ABORT {
        return Err(Error::OrderedAbort);
    }
    Ok(assigned)
}

impl SharedFileHandle {
    /// Append the group's buffers in rank order, collectively.
    ///
    /// Every member of the group must call this, each with its own buffer
    /// and element count; the call itself is synchronized across ranks, the
    /// sizes need not be. The file afterwards is byte-for-byte what
    /// sequential writes in ascending rank order would have produced. A
    /// rank with an empty buffer still participates in the collective and
    /// claims an empty sub-range.
    ///
    /// # Errors
    ///
    /// A gather or scatter failure is surfaced verbatim. A coordinator-side
    /// failure between gather and scatter reaches the other ranks as
    /// [`Error::OrderedAbort`]; no rank writes in that case. If the cursor
    /// request succeeded, the aggregate range stays consumed even when the
    /// collective write afterwards fails.
    pub fn write_ordered<T: Datatype>(&mut self, buf: &[T]) -> Result<Receipt> {
        let session = self.ensure_open()?;
        let data = datatype::as_bytes(buf);

        let offset = ordered_offset(&session, data.len() as u64)?;
        debug!(offset, bytes = data.len(), "ordered sub-offset assigned");

        let written = session
            .file
            .write_at_all(session.group.as_ref(), offset, data)?;
        Ok(Receipt {
            offset,
            bytes: written as u64,
        })
    }

    /// Read the group's buffers in rank order, collectively.
    ///
    /// The mirror of [`write_ordered`](Self::write_ordered): the group
    /// advances the shared pointer by its aggregate request and each rank
    /// reads the sub-range at its rank-order position. Bytes past end of
    /// data are zero-filled.
    pub fn read_ordered<T: Datatype>(&mut self, buf: &mut [T]) -> Result<Receipt> {
        let session = self.ensure_open()?;
        let data = datatype::as_bytes_mut(buf);

        let offset = ordered_offset(&session, data.len() as u64)?;
        debug!(offset, bytes = data.len(), "ordered sub-offset assigned");

        let read = session
            .file
            .read_at_all(session.group.as_ref(), offset, data)?;
        Ok(Receipt {
            offset,
            bytes: read as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::backend::{AccessMode, FileBackend, OpenedShared};
    use crate::error::Error;
    use crate::info::Info;
    use crate::local::LocalGroup;
    use crate::memory::MemoryBackend;

    #[test]
    fn partition_with_empty_contributions() {
        // Sizes [0, 10, 0, 5]: ranks 0 and 1 start at base, ranks 2 and 3
        // after rank 1's ten bytes.
        assert_eq!(rank_partition(0, &[0, 10, 0, 5]), vec![0, 0, 10, 10]);
        assert_eq!(
            rank_partition(1000, &[0, 10, 0, 5]),
            vec![1000, 1000, 1010, 1010]
        );
    }

    #[test]
    fn partition_is_exclusive_prefix_sum() {
        assert_eq!(rank_partition(7, &[1, 2, 3]), vec![7, 8, 10]);
        assert_eq!(rank_partition(0, &[]), Vec::<u64>::new());
        assert_eq!(rank_partition(5, &[0]), vec![5]);
    }

    fn run_ordered(sizes: &'static [usize]) -> (MemoryBackend, Vec<Receipt>) {
        let backend = MemoryBackend::new();
        let joins: Vec<_> = LocalGroup::split(sizes.len() as i32)
            .into_iter()
            .map(|group| {
                let backend = Arc::new(backend.clone());
                thread::spawn(move || {
                    let rank = group.rank();
                    let mut fh = SharedFileHandle::new(
                        backend,
                        Arc::new(group),
                        "/o/ordered.bin",
                        AccessMode::READ_WRITE | AccessMode::CREATE,
                        Info::new(),
                    );
                    let payload = vec![rank as u8 + 1; sizes[rank as usize]];
                    fh.write_ordered(&payload).unwrap()
                })
            })
            .collect();
        let receipts = joins.into_iter().map(|j| j.join().unwrap()).collect();
        (backend, receipts)
    }

    #[test]
    fn placement_follows_rank_order() {
        let (backend, receipts) = run_ordered(&[0, 10, 0, 5]);
        assert_eq!(receipts[0], Receipt { offset: 0, bytes: 0 });
        assert_eq!(receipts[1], Receipt { offset: 0, bytes: 10 });
        assert_eq!(receipts[2], Receipt { offset: 10, bytes: 0 });
        assert_eq!(receipts[3], Receipt { offset: 10, bytes: 5 });

        let mut expected = vec![2u8; 10];
        expected.extend_from_slice(&[4; 5]);
        assert_eq!(backend.contents("/o/ordered.bin"), Some(expected));
    }

    #[test]
    fn identical_sizes_always_produce_identical_placement() {
        // Partitioning depends on rank order, not call-arrival order: any
        // scheduling of the threads yields the same assignment.
        for _ in 0..20 {
            let (_, receipts) = run_ordered(&[3, 3, 3]);
            assert_eq!(receipts[0], Receipt { offset: 0, bytes: 3 });
            assert_eq!(receipts[1], Receipt { offset: 3, bytes: 3 });
            assert_eq!(receipts[2], Receipt { offset: 6, bytes: 3 });
        }
    }

    #[test]
    fn all_empty_ranks_complete_the_collective() {
        let (backend, receipts) = run_ordered(&[0, 0, 0]);
        for r in receipts {
            assert_eq!(r.bytes, 0);
            assert_eq!(r.offset, 0);
        }
        assert_eq!(backend.contents("/o/ordered.bin"), Some(Vec::new()));
    }

    #[test]
    fn successive_ordered_calls_stack() {
        let backend = MemoryBackend::new();
        let joins: Vec<_> = LocalGroup::split(2)
            .into_iter()
            .map(|group| {
                let backend = Arc::new(backend.clone());
                thread::spawn(move || {
                    let rank = group.rank();
                    let mut fh = SharedFileHandle::new(
                        backend,
                        Arc::new(group),
                        "/o/stack.bin",
                        AccessMode::READ_WRITE | AccessMode::CREATE,
                        Info::new(),
                    );
                    let first = fh.write_ordered(&[rank as u8; 2]).unwrap();
                    let second = fh.write_ordered(&[rank as u8 + 10; 1]).unwrap();
                    (first, second)
                })
            })
            .collect();
        let receipts: Vec<_> = joins.into_iter().map(|j| j.join().unwrap()).collect();

        // First call tiles [0, 4), second [4, 6); later calls get strictly
        // higher ranges.
        assert_eq!(receipts[0].0.offset, 0);
        assert_eq!(receipts[1].0.offset, 2);
        assert_eq!(receipts[0].1.offset, 4);
        assert_eq!(receipts[1].1.offset, 5);
        assert_eq!(
            backend.contents("/o/stack.bin"),
            Some(vec![0, 0, 1, 1, 10, 11])
        );
    }

    #[test]
    fn ordered_read_mirrors_rank_order() {
        let backend = MemoryBackend::new();
        // Seed the file without moving the shared pointer.
        {
            let opened = backend
                .open(
                    &LocalGroup::split(1).remove(0),
                    std::path::Path::new("/o/read.bin"),
                    AccessMode::READ_WRITE | AccessMode::CREATE,
                    &Info::new(),
                )
                .unwrap();
            opened.file.write_at(0, &[1, 2, 3, 4, 5, 6]).unwrap();
        }

        let joins: Vec<_> = LocalGroup::split(2)
            .into_iter()
            .map(|group| {
                let backend = Arc::new(backend.clone());
                thread::spawn(move || {
                    let rank = group.rank();
                    let mut fh = SharedFileHandle::new(
                        backend,
                        Arc::new(group),
                        "/o/read.bin",
                        AccessMode::READ_ONLY,
                        Info::new(),
                    );
                    let mut buf = vec![0u8; 2 + rank as usize * 2];
                    let receipt = fh.read_ordered(&mut buf).unwrap();
                    (receipt, buf)
                })
            })
            .collect();
        let results: Vec<_> = joins.into_iter().map(|j| j.join().unwrap()).collect();

        assert_eq!(results[0].0, Receipt { offset: 0, bytes: 2 });
        assert_eq!(results[0].1, vec![1, 2]);
        assert_eq!(results[1].0, Receipt { offset: 2, bytes: 4 });
        assert_eq!(results[1].1, vec![3, 4, 5, 6]);
    }

    /// Cursor stub that always fails, for abort-path coverage.
    struct UnreachableCursor;

    impl SharedCursor for UnreachableCursor {
        fn request_position(&self, _bytes: u64) -> Result<u64> {
            Err(Error::Allocator("counter service unreachable".into()))
        }

        fn position(&self) -> Result<u64> {
            Err(Error::Allocator("counter service unreachable".into()))
        }
    }

    struct UnreachableCursorBackend {
        inner: MemoryBackend,
    }

    impl FileBackend for UnreachableCursorBackend {
        fn name(&self) -> &'static str {
            "unreachable-cursor"
        }

        fn open(
            &self,
            group: &dyn ProcessGroup,
            path: &std::path::Path,
            amode: AccessMode,
            info: &Info,
        ) -> Result<OpenedShared> {
            let opened = self.inner.open(group, path, amode, info)?;
            Ok(OpenedShared {
                file: opened.file,
                cursor: Arc::new(UnreachableCursor),
            })
        }
    }

    #[test]
    fn coordinator_failure_reaches_every_rank_and_nobody_writes() {
        let inner = MemoryBackend::new();
        let backend = Arc::new(UnreachableCursorBackend {
            inner: inner.clone(),
        });

        let joins: Vec<_> = LocalGroup::split(3)
            .into_iter()
            .map(|group| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    let rank = group.rank();
                    let mut fh = SharedFileHandle::new(
                        backend,
                        Arc::new(group),
                        "/o/abort.bin",
                        AccessMode::READ_WRITE | AccessMode::CREATE,
                        Info::new(),
                    );
                    (rank, fh.write_ordered(&[9u8; 4]).unwrap_err())
                })
            })
            .collect();

        for j in joins {
            let (rank, err) = j.join().unwrap();
            if rank == COORDINATOR {
                assert!(matches!(err, Error::Allocator(_)), "rank {rank}: {err}");
            } else {
                assert!(matches!(err, Error::OrderedAbort), "rank {rank}: {err}");
            }
        }
        // No rank touched the file.
        assert_eq!(inner.contents("/o/abort.bin"), Some(Vec::new()));
    }
}
