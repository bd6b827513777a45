use super::binning;
use super::index::TabixIndex;
use super::query::{Columns, TabixQuery};
use crate::error::HandleClosed;
use crate::{Error, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Appended to the data file path to locate its index.
pub const INDEX_SUFFIX: &str = ".tbi";

type Handle = Arc<Mutex<Option<File>>>;

/// A BGZF data file opened together with its tabix index.
///
/// The index is parsed once and shared read-only by every query. All
/// queries share one descriptor; each keeps its own cursor and performs its
/// seek+read pairs under the descriptor's lock, so concurrent queries never
/// observe each other's positions.
pub struct TabixFile {
    path: PathBuf,
    index: Arc<TabixIndex>,
    columns: Columns,
    handle: Handle,
}

impl TabixFile {
    /// Opens `path` and its index at `path` + `.tbi`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let index_path = index_path(path);
        Self::open_with_index(path, index_path)
    }

    /// Opens `path` with an index stored elsewhere.
    pub fn open_with_index<P, Q>(path: P, index_path: Q) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let path = path.as_ref();
        let index = TabixIndex::read(index_path.as_ref())?;
        let file = File::open(path)?;

        debug!(path = %path.display(), "opened tabix file");

        Ok(Self {
            path: path.to_path_buf(),
            columns: Columns::from(index.header()),
            index: Arc::new(index),
            handle: Arc::new(Mutex::new(Some(file))),
        })
    }

    /// Overrides the record columns taken from the index header.
    pub fn with_columns(mut self, columns: Columns) -> Self {
        self.columns = columns;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &TabixIndex {
        &self.index
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Sequence names in index order.
    pub fn sequence_names(&self) -> &[String] {
        self.index.names()
    }

    /// Lines overlapping the 0-based half-open interval `[start, end)` on
    /// `reference`.
    ///
    /// An unknown reference or empty interval yields an empty query.
    pub fn query(&self, reference: &str, start: u64, end: u64) -> Result<TabixQuery<SharedReader>> {
        if self.is_closed() {
            return Err(Error::FileClosed(self.path.clone()));
        }

        let plan = binning::plan(&self.index, reference, start, end);
        let reader = SharedReader {
            path: self.path.clone(),
            handle: Arc::clone(&self.handle),
            position: 0,
        };

        Ok(TabixQuery::new(reader, reference, plan, self.columns.clone()))
    }

    /// Releases the descriptor. Closing twice is a no-op.
    ///
    /// Queries still in flight fail with [`Error::FileClosed`] on their next
    /// read.
    pub fn close(&self) {
        if lock(&self.handle).take().is_some() {
            debug!(path = %self.path.display(), "closed tabix file");
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.handle).is_none()
    }
}

impl std::fmt::Debug for TabixFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabixFile")
            .field("path", &self.path)
            .field("references", &self.index.names().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub(crate) fn index_path(path: &Path) -> PathBuf {
    let mut index = path.as_os_str().to_owned();
    index.push(INDEX_SUFFIX);
    PathBuf::from(index)
}

fn lock(handle: &Handle) -> MutexGuard<'_, Option<File>> {
    // every read re-seeks, so a poisoned descriptor is still usable
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A per-query cursor over a [`TabixFile`]'s shared descriptor.
pub struct SharedReader {
    path: PathBuf,
    handle: Handle,
    position: u64,
}

impl Read for SharedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = lock(&self.handle);
        let file = guard
            .as_mut()
            .ok_or_else(|| io::Error::other(HandleClosed(self.path.clone())))?;

        file.seek(SeekFrom::Start(self.position))?;
        let n = file.read(buf)?;
        self.position += n as u64;

        Ok(n)
    }
}

impl Seek for SharedReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let guard = lock(&self.handle);
                let file = guard
                    .as_ref()
                    .ok_or_else(|| io::Error::other(HandleClosed(self.path.clone())))?;
                file.metadata()?.len().checked_add_signed(delta)
            }
        };

        self.position = position.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;

        Ok(self.position)
    }
}
