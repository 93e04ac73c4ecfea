//! In-process realization of [`ProcessGroup`].
//!
//! [`LocalGroup`] gives every rank of a group its own handle backed by one
//! OS thread, with the collectives meeting in a shared rendezvous. It exists
//! so the ordered protocol can run and be tested without a real transport,
//! and it is the crate's single-node story: a tool that wants N workers
//! appending to one file spawns N threads, hands each a member from
//! [`LocalGroup::split`], and uses the same API a distributed binding would.
//!
//! Members must issue their collective calls in the same order, as with any
//! group transport. Each collective consumes one slot of an internal
//! per-member sequence counter; ranks that diverge in call order will pair
//! up wrong rounds and hang, exactly like mismatched collectives on a real
//! transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::group::ProcessGroup;

/// One member of an in-process group.
///
/// Obtained from [`LocalGroup::split`]; each returned member is intended to
/// be moved onto its own thread.
///
/// # Example
///
/// ```
/// use std::thread;
/// use ferrofp::{LocalGroup, ProcessGroup};
///
/// let members = LocalGroup::split(3);
/// let joins: Vec<_> = members
///     .into_iter()
///     .map(|group| {
///         thread::spawn(move || {
///             let mut sizes = if group.rank() == 0 {
///                 vec![0u64; group.size() as usize]
///             } else {
///                 Vec::new()
///             };
///             group.gather_u64(group.rank() as u64, &mut sizes, 0).unwrap();
///             if group.rank() == 0 {
///                 assert_eq!(sizes, vec![0, 1, 2]);
///             }
///         })
///     })
///     .collect();
/// for j in joins {
///     j.join().unwrap();
/// }
/// ```
pub struct LocalGroup {
    rank: i32,
    size: i32,
    /// Sequence number of this member's next collective call.
    seq: AtomicU64,
    shared: Arc<Rendezvous>,
}

/// Meeting point for one group's collectives, keyed by call sequence.
struct Rendezvous {
    size: usize,
    rounds: Mutex<HashMap<u64, Round>>,
    cond: Condvar,
}

/// State of one in-flight collective round.
struct Round {
    /// Per-rank gathered values.
    slots: Vec<Option<u64>>,
    deposited: usize,
    /// Root's scatter payload, one value per rank.
    payload: Option<Vec<u64>>,
    taken: usize,
}

impl Round {
    fn sized(size: usize) -> Self {
        Round {
            slots: vec![None; size],
            deposited: 0,
            payload: None,
            taken: 0,
        }
    }
}

impl LocalGroup {
    /// Create a group of `size` members sharing one rendezvous.
    ///
    /// The returned vector holds the members in rank order. `size` must be
    /// at least 1.
    pub fn split(size: i32) -> Vec<LocalGroup> {
        assert!(size >= 1, "a group needs at least one member");
        let shared = Arc::new(Rendezvous {
            size: size as usize,
            rounds: Mutex::new(HashMap::new()),
            cond: Condvar::new(),
        });
        (0..size)
            .map(|rank| LocalGroup {
                rank,
                size,
                seq: AtomicU64::new(0),
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    fn check_root(&self, root: i32) -> Result<()> {
        if root < 0 || root >= self.size {
            return Err(Error::InvalidRank(root));
        }
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl ProcessGroup for LocalGroup {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn size(&self) -> i32 {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        // A gather followed by a scatter through rank 0 is a full barrier:
        // no member passes the scatter before every member has deposited.
        let root = 0;
        let mut recv = if self.rank == root {
            vec![0u64; self.shared.size]
        } else {
            Vec::new()
        };
        self.gather_u64(0, &mut recv, root)?;
        let send = if self.rank == root { recv } else { Vec::new() };
        self.scatter_u64(&send, root)?;
        Ok(())
    }

    fn gather_u64(&self, send: u64, recv: &mut [u64], root: i32) -> Result<()> {
        self.check_root(root)?;
        if self.rank == root && recv.len() != self.shared.size {
            return Err(Error::collective(
                "gather",
                format!(
                    "root receive buffer holds {} values, group size is {}",
                    recv.len(),
                    self.shared.size
                ),
            ));
        }

        let seq = self.next_seq();
        let me = self.rank as usize;
        let shared = self.shared.as_ref();

        let mut rounds = shared.rounds.lock();
        let round = rounds
            .entry(seq)
            .or_insert_with(|| Round::sized(shared.size));
        round.slots[me] = Some(send);
        round.deposited += 1;
        if round.deposited == shared.size {
            shared.cond.notify_all();
        }

        if self.rank == root {
            while rounds.get(&seq).is_some_and(|r| r.deposited < shared.size) {
                shared.cond.wait(&mut rounds);
            }
            let round = rounds.remove(&seq).ok_or_else(|| {
                Error::collective("gather", "round consumed before the root collected it")
            })?;
            for (slot, out) in round.slots.iter().zip(recv.iter_mut()) {
                *out = slot
                    .ok_or_else(|| Error::collective("gather", "missing rank contribution"))?;
            }
        }
        Ok(())
    }

    fn scatter_u64(&self, send: &[u64], root: i32) -> Result<u64> {
        self.check_root(root)?;
        if self.rank == root && send.len() != self.shared.size {
            return Err(Error::collective(
                "scatter",
                format!(
                    "root send buffer holds {} values, group size is {}",
                    send.len(),
                    self.shared.size
                ),
            ));
        }

        let seq = self.next_seq();
        let me = self.rank as usize;
        let shared = self.shared.as_ref();

        let mut rounds = shared.rounds.lock();
        let round = rounds
            .entry(seq)
            .or_insert_with(|| Round::sized(shared.size));
        if self.rank == root {
            round.payload = Some(send.to_vec());
            shared.cond.notify_all();
        }

        loop {
            match rounds.get_mut(&seq) {
                Some(round) => {
                    if let Some(payload) = &round.payload {
                        let value = payload[me];
                        round.taken += 1;
                        if round.taken == shared.size {
                            rounds.remove(&seq);
                        }
                        return Ok(value);
                    }
                    shared.cond.wait(&mut rounds);
                }
                None => {
                    return Err(Error::collective(
                        "scatter",
                        "round consumed before this rank took its value",
                    ))
                }
            }
        }
    }
}
