//! In-memory file back-end.
//!
//! All files are stored as named byte vectors in a registry shared by every
//! rank that opens through the same [`MemoryBackend`] instance, so a group
//! of in-process ranks opening one path sees one file and one shared
//! pointer. Nothing is persisted.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::allocator::{AtomicCursor, SharedCursor};
use crate::backend::{AccessMode, FileBackend, OpenedShared, SharedFile};
use crate::error::{Error, Result};
use crate::group::ProcessGroup;
use crate::info::Info;

/// Byte storage of one named file.
#[derive(Default)]
struct Storage {
    data: Mutex<Vec<u8>>,
}

/// Registry entry: the file's bytes plus the cursor all openers share.
struct Entry {
    storage: Arc<Storage>,
    cursor: Arc<AtomicCursor>,
}

/// An in-memory back-end for testing and single-process tools.
///
/// Ranks must share the same `MemoryBackend` instance (clone it, or wrap it
/// in an `Arc`) to see the same files.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use ferrofp::{AccessMode, Info, LocalGroup, MemoryBackend};
/// use ferrofp::{FileBackend, SharedFile};
///
/// let backend = MemoryBackend::new();
/// let group = LocalGroup::split(1).remove(0);
/// let opened = backend
///     .open(
///         &group,
///         Path::new("/scratch/a.bin"),
///         AccessMode::READ_WRITE | AccessMode::CREATE,
///         &Info::new(),
///     )
///     .unwrap();
/// opened.file.write_at(0, b"hi").unwrap();
/// assert_eq!(backend.contents("/scratch/a.bin"), Some(b"hi".to_vec()));
/// ```
#[derive(Clone, Default)]
pub struct MemoryBackend {
    files: Arc<Mutex<HashMap<PathBuf, Entry>>>,
}

impl MemoryBackend {
    /// Create an empty back-end.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the bytes of a file, or `None` if it was never created.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let files = self.files.lock();
        files
            .get(path.as_ref())
            .map(|entry| entry.storage.data.lock().clone())
    }
}

impl FileBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(
        &self,
        _group: &dyn ProcessGroup,
        path: &Path,
        amode: AccessMode,
        _info: &Info,
    ) -> Result<OpenedShared> {
        amode.validate()?;

        let mut files = self.files.lock();
        if !files.contains_key(path) {
            if !amode.contains(AccessMode::CREATE) {
                return Err(Error::open(path, io::Error::from(io::ErrorKind::NotFound)));
            }
            files.insert(
                path.to_path_buf(),
                Entry {
                    storage: Arc::new(Storage::default()),
                    cursor: Arc::new(AtomicCursor::new()),
                },
            );
        }
        let entry = files
            .get(path)
            .ok_or_else(|| Error::Backend("registry entry vanished during open".into()))?;

        Ok(OpenedShared {
            file: Arc::new(MemoryFile {
                storage: Arc::clone(&entry.storage),
                amode,
            }),
            cursor: Arc::clone(&entry.cursor) as Arc<dyn SharedCursor>,
        })
    }
}

/// One opened handle onto an in-memory file.
pub struct MemoryFile {
    storage: Arc<Storage>,
    amode: AccessMode,
}

impl MemoryFile {
    fn offset_to_index(offset: u64) -> Result<usize> {
        usize::try_from(offset).map_err(|_| Error::Io {
            offset,
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "offset exceeds addressable memory",
            ),
        })
    }
}

impl SharedFile for MemoryFile {
    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        if !self.amode.writable() {
            return Err(Error::Io {
                offset,
                source: io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "file is not open for writing",
                ),
            });
        }
        let start = Self::offset_to_index(offset)?;
        let mut data = self.storage.data.lock();
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if !self.amode.readable() {
            return Err(Error::Io {
                offset,
                source: io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "file is not open for reading",
                ),
            });
        }
        let start = Self::offset_to_index(offset)?;
        let data = self.storage.data.lock();
        let available = data.len().saturating_sub(start).min(buf.len());
        if available > 0 {
            buf[..available].copy_from_slice(&data[start..start + available]);
        }
        // Zero-fill short reads past end of data.
        buf[available..].fill(0);
        Ok(available)
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.storage.data.lock().len() as u64)
    }
}
