//! Unix file back-end.
//!
//! Positional I/O on real files through `std::os::unix::fs::FileExt`, with
//! one cursor per canonical path shared by every rank that opens through
//! the same [`UnixBackend`] instance. The cursor of a file that already
//! carries data starts at its current size, so the shared pointer appends
//! rather than overwrites.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::allocator::AtomicCursor;
use crate::backend::{AccessMode, FileBackend, OpenedShared, SharedFile};
use crate::error::{Error, Result};
use crate::group::ProcessGroup;
use crate::info::Info;

/// A back-end for real files on a local or shared filesystem.
///
/// Ranks of an in-process group must share the same `UnixBackend` instance
/// to share one cursor per file. For groups spanning OS processes the
/// cursor registry of this back-end is not enough; plug a [`SharedCursor`]
/// realization that reaches across processes instead.
///
/// Honors the `preallocate` open hint: a byte count to `set_len` the file
/// to at open time (writable modes only).
///
/// [`SharedCursor`]: crate::SharedCursor
#[derive(Clone, Default)]
pub struct UnixBackend {
    cursors: Arc<Mutex<HashMap<PathBuf, Arc<AtomicCursor>>>>,
}

impl UnixBackend {
    /// Create a back-end with an empty cursor registry.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileBackend for UnixBackend {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn open(
        &self,
        _group: &dyn ProcessGroup,
        path: &Path,
        amode: AccessMode,
        info: &Info,
    ) -> Result<OpenedShared> {
        amode.validate()?;

        let file = OpenOptions::new()
            .read(amode.readable())
            .write(amode.writable())
            .create(amode.contains(AccessMode::CREATE) && amode.writable())
            .open(path)
            .map_err(|e| Error::open(path, e))?;

        // The shared pointer starts at the data already present, which is
        // measured before any preallocation grows the file.
        let size = file.metadata().map_err(|e| Error::open(path, e))?.len();

        if let Some(hint) = info.get("preallocate") {
            let bytes: u64 = hint.parse().map_err(|_| {
                Error::Backend(format!("preallocate hint is not a byte count: {hint:?}"))
            })?;
            if amode.writable() && size < bytes {
                debug!(path = %path.display(), bytes, "preallocating shared file");
                file.set_len(bytes).map_err(|e| Error::open(path, e))?;
            }
        }
        let canonical = path.canonicalize().map_err(|e| Error::open(path, e))?;
        let cursor = {
            let mut cursors = self.cursors.lock();
            Arc::clone(
                cursors
                    .entry(canonical)
                    .or_insert_with(|| Arc::new(AtomicCursor::starting_at(size))),
            )
        };

        Ok(OpenedShared {
            file: Arc::new(UnixFile { file }),
            cursor,
        })
    }
}

/// One opened handle onto a real file.
pub struct UnixFile {
    file: File,
}

impl SharedFile for UnixFile {
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut total = 0usize;
        while total < buf.len() {
            let off = offset + total as u64;
            let n = self
                .file
                .write_at(&buf[total..], off)
                .map_err(|e| Error::Io {
                    offset: off,
                    source: e,
                })?;
            if n == 0 {
                return Err(Error::Io {
                    offset: off,
                    source: io::Error::new(io::ErrorKind::WriteZero, "write_at returned 0"),
                });
            }
            total += n;
        }
        Ok(total)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0usize;
        while total < buf.len() {
            let off = offset + total as u64;
            let n = self
                .file
                .read_at(&mut buf[total..], off)
                .map_err(|e| Error::Io {
                    offset: off,
                    source: e,
                })?;
            if n == 0 {
                break; // EOF
            }
            total += n;
        }
        // Zero-fill short reads past end of data.
        buf[total..].fill(0);
        Ok(total)
    }

    fn file_size(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| Error::Backend(format!("file metadata unavailable: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalGroup;

    fn solo() -> LocalGroup {
        LocalGroup::split(1).remove(0)
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.bin");
        let backend = UnixBackend::new();
        let opened = backend
            .open(
                &solo(),
                &path,
                AccessMode::READ_WRITE | AccessMode::CREATE,
                &Info::new(),
            )
            .unwrap();

        assert_eq!(opened.file.write_at(2, b"data").unwrap(), 4);
        assert_eq!(opened.file.file_size().unwrap(), 6);

        let mut buf = [7u8; 8];
        assert_eq!(opened.file.read_at(0, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], &[0, 0, b'd', b'a', b't', b'a']);
        // Bytes past end of data are zeroed, not left stale.
        assert_eq!(&buf[6..], &[0, 0]);
    }

    #[test]
    fn open_missing_without_create_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = UnixBackend::new();
        let err = backend
            .open(
                &solo(),
                &dir.path().join("missing.bin"),
                AccessMode::READ_WRITE,
                &Info::new(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
    }

    #[test]
    fn cursor_is_shared_per_canonical_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.bin");
        let backend = UnixBackend::new();
        let amode = AccessMode::READ_WRITE | AccessMode::CREATE;

        let a = backend.open(&solo(), &path, amode, &Info::new()).unwrap();
        let b = backend.open(&solo(), &path, amode, &Info::new()).unwrap();

        use crate::allocator::SharedCursor;
        assert_eq!(a.cursor.request_position(5).unwrap(), 0);
        assert_eq!(b.cursor.request_position(1).unwrap(), 5);
    }

    #[test]
    fn cursor_starts_at_existing_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.bin");
        std::fs::write(&path, b"12345678").unwrap();

        let backend = UnixBackend::new();
        let opened = backend
            .open(&solo(), &path, AccessMode::READ_WRITE, &Info::new())
            .unwrap();
        use crate::allocator::SharedCursor;
        assert_eq!(opened.cursor.position().unwrap(), 8);
    }

    #[test]
    fn preallocate_hint_sets_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prealloc.bin");
        let backend = UnixBackend::new();
        let mut info = Info::new();
        info.set("preallocate", "4096");

        let opened = backend
            .open(
                &solo(),
                &path,
                AccessMode::WRITE_ONLY | AccessMode::CREATE,
                &info,
            )
            .unwrap();
        assert_eq!(opened.file.file_size().unwrap(), 4096);
    }

    #[test]
    fn malformed_preallocate_hint_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        let backend = UnixBackend::new();
        let mut info = Info::new();
        info.set("preallocate", "lots");

        let err = backend
            .open(
                &solo(),
                &path,
                AccessMode::WRITE_ONLY | AccessMode::CREATE,
                &info,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
    }
}
