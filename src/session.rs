//! Shared-file handles and lazily created sessions.
//!
//! A [`SharedFileHandle`] is each rank's view of one shared file: the
//! back-end to open through, the owning group, the path, and, once any
//! write or read path has run, the [`SharedSession`] binding the open file
//! object to the cursor that serializes its shared pointer. The session is
//! created at most once per handle; a second call against an initialized
//! handle reuses it untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::allocator::SharedCursor;
use crate::backend::{AccessMode, FileBackend, SharedFile};
use crate::error::Result;
use crate::group::ProcessGroup;
use crate::info::Info;

/// Per-file-handle session state, lazily created on first use.
///
/// Read-mostly after creation: the group, file object, and cursor reference
/// are fixed at open. The only mutable state behind a session, the
/// end-of-data marker, lives inside the cursor's domain, never in the
/// session itself, so cross-process mutual exclusion is the cursor's
/// business and not the caller's.
#[derive(Clone)]
pub struct SharedSession {
    /// The group over which the shared pointer is meaningful.
    pub(crate) group: Arc<dyn ProcessGroup>,
    /// The open file object physical transfers go through.
    pub(crate) file: Arc<dyn SharedFile>,
    /// The cursor addressing this file's offset allocator.
    pub(crate) cursor: Arc<dyn SharedCursor>,
}

/// One rank's handle onto a shared file.
///
/// Construction is cheap and does not touch the file; the back-end open
/// runs lazily on the first operation that needs a session. Every rank of
/// the group builds its own handle against the same back-end instance and
/// path.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ferrofp::{AccessMode, Info, LocalGroup, MemoryBackend, SharedFileHandle};
///
/// let backend = Arc::new(MemoryBackend::new());
/// let group = Arc::new(LocalGroup::split(1).remove(0));
/// let mut fh = SharedFileHandle::new(
///     backend,
///     group,
///     "/scratch/events.bin",
///     AccessMode::READ_WRITE | AccessMode::CREATE,
///     Info::new(),
/// );
/// assert!(!fh.is_open());
/// fh.write(&[1u8, 2, 3]).unwrap();
/// assert!(fh.is_open());
/// assert_eq!(fh.position().unwrap(), 3);
/// ```
pub struct SharedFileHandle {
    backend: Arc<dyn FileBackend>,
    group: Arc<dyn ProcessGroup>,
    path: PathBuf,
    amode: AccessMode,
    info: Info,
    session: Option<SharedSession>,
}

impl SharedFileHandle {
    /// Build a handle for `path` over `group`, opening through `backend`.
    pub fn new(
        backend: Arc<dyn FileBackend>,
        group: Arc<dyn ProcessGroup>,
        path: impl AsRef<Path>,
        amode: AccessMode,
        info: Info,
    ) -> Self {
        SharedFileHandle {
            backend,
            group,
            path: path.as_ref().to_path_buf(),
            amode,
            info,
            session: None,
        }
    }

    /// Whether this handle already carries a session.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// The path this handle refers to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The group this handle's shared pointer spans.
    pub fn group(&self) -> &Arc<dyn ProcessGroup> {
        &self.group
    }

    /// Return the session, opening the file on first use.
    ///
    /// Idempotent: once a session exists it is returned unchanged. On open
    /// failure the back-end's error is propagated verbatim, no retry is
    /// made, and the handle is left without a session; configuration
    /// errors do not heal by calling again with the same arguments.
    pub(crate) fn ensure_open(&mut self) -> Result<SharedSession> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        debug!(
            path = %self.path.display(),
            backend = self.backend.name(),
            "opening shared file pointer"
        );
        let opened =
            self.backend
                .open(self.group.as_ref(), &self.path, self.amode, &self.info)?;
        let session = SharedSession {
            group: Arc::clone(&self.group),
            file: opened.file,
            cursor: opened.cursor,
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Current end-of-data marker of the shared pointer.
    ///
    /// Opens the file lazily like the write paths. The value is a snapshot:
    /// other ranks may advance the marker at any time.
    pub fn position(&mut self) -> Result<u64> {
        let session = self.ensure_open()?;
        session.cursor.position()
    }
}
