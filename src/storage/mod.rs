//! Storage backend abstraction for indexed data files.
//!
//! The HTTP surface names files by id. A [`Storage`] maps those ids to paths
//! that can be handed to the [`Registry`](crate::registry::Registry).
//!
//! # Implementations
//!
//! - [`LocalStorage`] - Local filesystem storage
//!
//! # Example
//!
//! ```no_run
//! use tabixr::storage::{LocalStorage, Storage};
//! use std::path::PathBuf;
//!
//! let storage = LocalStorage::new(PathBuf::from("./data"));
//! let path = storage.resolve("peaks.bed.gz").unwrap();
//! ```

mod local;

pub use local::LocalStorage;

use crate::Result;
use std::path::PathBuf;

/// Storage backend trait for locating indexed data files
pub trait Storage: Send + Sync {
    /// Path of the data file named `id`. The file must exist and carry an index.
    fn resolve(&self, id: &str) -> Result<PathBuf>;

    /// Ids of every indexed data file, sorted.
    fn list(&self) -> Result<Vec<String>>;
}
