//! Tabix-indexed random access.
//!
//! Opening a [`TabixFile`] parses its `.tbi` index once. Each query is then
//! planned against the binning and linear indexes ([`binning::plan`]) and
//! streamed by a [`TabixQuery`], which decodes only the BGZF blocks the plan
//! names and yields the lines that truly overlap the requested interval.
//!
//! # Example
//!
//! ```no_run
//! use tabixr::tabix::TabixFile;
//!
//! # fn main() -> tabixr::Result<()> {
//! let file = TabixFile::open("peaks.bed.gz")?;
//! for line in file.query("chr1", 10_000, 20_000)? {
//!     println!("{}", line?);
//! }
//! file.close();
//! # Ok(())
//! # }
//! ```

pub mod binning;
mod file;
mod index;
mod query;

pub use binning::QueryPlan;
pub use file::{INDEX_SUFFIX, SharedReader, TabixFile};
pub use index::{Format, Header, ReferenceIndex, ReferenceMetadata, TabixIndex};
pub use query::{Columns, Interval, QueryState, TabixQuery};

use crate::bgzf::VirtualOffset;

/// A contiguous range of the BGZF stream, `[begin, end)` in virtual offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    begin: VirtualOffset,
    end: VirtualOffset,
}

impl Chunk {
    pub fn new(begin: VirtualOffset, end: VirtualOffset) -> Self {
        Self { begin, end }
    }

    pub fn begin(&self) -> VirtualOffset {
        self.begin
    }

    pub fn end(&self) -> VirtualOffset {
        self.end
    }
}
