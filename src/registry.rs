//! Shared cache of open [`TabixFile`]s.
//!
//! A [`Registry`] is created by the top-level invocation and handed to every
//! consumer that reads indexed files. Consumers asking for the same file
//! (by canonical path) share one parsed index and one descriptor. Each
//! [`acquire`](Registry::acquire) must be paired with a
//! [`release`](Registry::release); the last release closes the file.

use crate::tabix::TabixFile;
use crate::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

struct Entry {
    file: Arc<TabixFile>,
    refs: usize,
}

#[derive(Default)]
struct Files {
    entries: HashMap<PathBuf, Entry>,
    /// Every path a caller acquired with, mapped to its canonical key, so a
    /// file renamed or deleted after opening can still be released.
    aliases: HashMap<PathBuf, PathBuf>,
}

impl Files {
    fn key(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(key) = std::fs::canonicalize(path) {
            if self.entries.contains_key(&key) {
                return Some(key);
            }
        }
        self.aliases
            .get(path)
            .filter(|key| self.entries.contains_key(*key))
            .cloned()
    }

    fn remove(&mut self, key: &Path) -> Option<Entry> {
        self.aliases.retain(|_, k| k != key);
        self.entries.remove(key)
    }
}

#[derive(Default)]
pub struct Registry {
    files: Mutex<Files>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the open file for `path`, opening it on first use.
    ///
    /// The file is opened without holding the registry lock; if another
    /// caller opened the same file meanwhile, theirs is kept.
    pub fn acquire<P: AsRef<Path>>(&self, path: P) -> Result<Arc<TabixFile>> {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path)?;

        if let Some(file) = self.share(path, &key) {
            return Ok(file);
        }

        let opened = Arc::new(TabixFile::open(&key)?);

        let mut files = self.lock();
        files.aliases.insert(path.to_path_buf(), key.clone());
        if let Some(entry) = files.entries.get_mut(&key) {
            entry.refs += 1;
            opened.close();
            return Ok(Arc::clone(&entry.file));
        }

        info!(path = %key.display(), "opened indexed file");
        files.entries.insert(
            key,
            Entry {
                file: Arc::clone(&opened),
                refs: 1,
            },
        );

        Ok(opened)
    }

    /// The open file for `path`, if cached, without taking a reference.
    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<Arc<TabixFile>> {
        let files = self.lock();
        let key = files.key(path.as_ref())?;
        files.entries.get(&key).map(|entry| Arc::clone(&entry.file))
    }

    fn share(&self, path: &Path, key: &Path) -> Option<Arc<TabixFile>> {
        let mut files = self.lock();
        let entry = files.entries.get_mut(key)?;
        entry.refs += 1;
        let file = Arc::clone(&entry.file);
        files.aliases.insert(path.to_path_buf(), key.to_path_buf());
        Some(file)
    }

    /// Drops one reference to `path`, closing the file when none remain.
    ///
    /// Returns whether the file was closed. Releasing an unknown path is a
    /// no-op.
    pub fn release<P: AsRef<Path>>(&self, path: P) -> bool {
        let mut files = self.lock();
        let Some(key) = files.key(path.as_ref()) else {
            return false;
        };

        let Some(entry) = files.entries.get_mut(&key) else {
            return false;
        };

        entry.refs -= 1;
        if entry.refs > 0 {
            return false;
        }

        if let Some(entry) = files.remove(&key) {
            entry.file.close();
            info!(path = %key.display(), "closed indexed file");
        }
        true
    }

    /// Closes and forgets `path` regardless of outstanding references.
    pub fn evict<P: AsRef<Path>>(&self, path: P) -> bool {
        let mut files = self.lock();
        let Some(key) = files.key(path.as_ref()) else {
            return false;
        };

        match files.remove(&key) {
            Some(entry) => {
                entry.file.close();
                info!(path = %key.display(), refs = entry.refs, "evicted indexed file");
                true
            }
            None => false,
        }
    }

    /// Closes every cached file.
    pub fn close_all(&self) {
        let mut files = self.lock();
        files.aliases.clear();
        for (path, entry) in files.entries.drain() {
            entry.file.close();
            info!(path = %path.display(), "closed indexed file");
        }
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.lock().key(path.as_ref()).is_some()
    }

    /// Outstanding references to `path`.
    pub fn ref_count<P: AsRef<Path>>(&self, path: P) -> usize {
        let files = self.lock();
        files
            .key(path.as_ref())
            .and_then(|key| files.entries.get(&key).map(|entry| entry.refs))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Files> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.close_all();
    }
}
