//! Annotators map a queried interval to a derived value.
//!
//! Commands that decorate rows of one file with information from another
//! go through the [`Annotator`] trait. [`TabixAnnotator`] is the indexed-file
//! implementation: it queries a [`TabixFile`] obtained from a shared
//! [`Registry`] and summarises the overlapping records.

use crate::registry::Registry;
use crate::tabix::TabixFile;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait Annotator: Send {
    /// Column header for the values this annotator produces.
    fn name(&self) -> &str;

    /// Value for the 0-based half-open interval `[start, end)` on `chrom`.
    ///
    /// `row` holds the columns of the row being annotated.
    fn value_for(&mut self, chrom: &str, start: u64, end: u64, row: &[&str]) -> Result<String>;

    /// Releases any resources. Further calls to `value_for` fail.
    fn close(&mut self) -> Result<()>;
}

/// How overlapping records are reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Summary {
    /// Number of overlapping records.
    Count,
    /// Comma-joined values of one 1-based column of each overlapping record.
    Column(usize),
}

pub struct TabixAnnotator {
    name: String,
    path: PathBuf,
    registry: Arc<Registry>,
    file: Option<Arc<TabixFile>>,
    summary: Summary,
    missing: String,
    chrom_aliasing: bool,
}

impl TabixAnnotator {
    pub fn new<P: AsRef<Path>>(
        registry: Arc<Registry>,
        path: P,
        name: impl Into<String>,
        summary: Summary,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = registry.acquire(&path)?;

        Ok(Self {
            name: name.into(),
            path,
            registry,
            file: Some(file),
            summary,
            missing: ".".to_string(),
            chrom_aliasing: false,
        })
    }

    /// Value returned when nothing overlaps. Defaults to `.`.
    pub fn with_missing(mut self, missing: impl Into<String>) -> Self {
        self.missing = missing.into();
        self
    }

    /// Tolerates a `chr` prefix mismatch between the caller's sequence names
    /// and the file's, e.g. `chr1` against `1`.
    pub fn with_chrom_aliasing(mut self, enabled: bool) -> Self {
        self.chrom_aliasing = enabled;
        self
    }

    fn resolve<'a>(&self, file: &TabixFile, chrom: &'a str) -> Option<std::borrow::Cow<'a, str>> {
        let index = file.index();
        if index.reference_id(chrom).is_some() {
            return Some(chrom.into());
        }

        if !self.chrom_aliasing {
            return None;
        }

        let alias = match chrom.strip_prefix("chr") {
            Some(stripped) => stripped.to_string(),
            None => format!("chr{chrom}"),
        };

        index.reference_id(&alias).map(|_| alias.into())
    }
}

impl Annotator for TabixAnnotator {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_for(&mut self, chrom: &str, start: u64, end: u64, _row: &[&str]) -> Result<String> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| Error::FileClosed(self.path.clone()))?;

        let Some(reference) = self.resolve(file, chrom) else {
            return Ok(self.missing.clone());
        };

        let mut count = 0usize;
        let mut values = Vec::new();

        for line in file.query(&reference, start, end)? {
            let line = line?;
            count += 1;

            if let Summary::Column(column) = self.summary {
                let value = line.split('\t').nth(column.saturating_sub(1)).ok_or_else(|| {
                    Error::InvalidRecord(format!("missing column {column} in line {line:?}"))
                })?;
                values.push(value.to_string());
            }
        }

        if count == 0 {
            return Ok(self.missing.clone());
        }

        Ok(match self.summary {
            Summary::Count => count.to_string(),
            Summary::Column(_) => values.join(","),
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            self.registry.release(&self.path);
        }
        Ok(())
    }
}

impl Drop for TabixAnnotator {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
