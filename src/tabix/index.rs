//! Tabix index (`.tbi`) decoding.
//!
//! Layout (little-endian), after BGZF decompression:
//!
//! - magic `TBI\1`
//! - `n_ref`, `format`, `col_seq`, `col_beg`, `col_end`, `meta`, `skip`, `l_nm` (i32)
//! - `l_nm` bytes of NUL-terminated sequence names
//! - per sequence: `n_bin`, then `n_bin` × (`bin` u32, `n_chunk` i32,
//!   `n_chunk` × (begin u64, end u64)), then `n_intv` i32 and `n_intv` u64
//!   linear-index offsets
//! - optional trailing `n_no_coor` u64

use super::binning::{MAX_BIN, METADATA_BIN};
use super::Chunk;
use crate::bgzf::{self, VirtualOffset};
use crate::{Error, Result};
use bytes::Buf;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const MAGIC: &[u8; 4] = b"TBI\x01";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Set in the `format` field when coordinates are 0-based half-open (BED).
const FLAG_ZERO_BASED: i32 = 0x10000;

/// Record layout the index was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Generic,
    Sam,
    Vcf,
}

impl Format {
    fn from_code(code: i32) -> Result<Self> {
        match code & 0xffff {
            0 => Ok(Format::Generic),
            1 => Ok(Format::Sam),
            2 => Ok(Format::Vcf),
            other => Err(Error::CorruptIndex(format!("unknown format code {other}"))),
        }
    }
}

/// Header fields describing how records map to intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format: Format,
    pub zero_based: bool,
    /// 1-based column holding the sequence name.
    pub col_seq: usize,
    /// 1-based column holding the start position.
    pub col_beg: usize,
    /// 1-based column holding the end position, if any.
    pub col_end: Option<usize>,
    pub meta: u8,
    pub skip: u32,
}

/// Contents of the pseudo-bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceMetadata {
    pub start: VirtualOffset,
    pub end: VirtualOffset,
    pub mapped: u64,
    pub unmapped: u64,
}

/// Binning and linear index for one sequence.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    bins: HashMap<u32, Vec<Chunk>>,
    linear: Vec<VirtualOffset>,
    metadata: Option<ReferenceMetadata>,
}

impl ReferenceIndex {
    pub fn new(bins: HashMap<u32, Vec<Chunk>>, linear: Vec<VirtualOffset>) -> Self {
        Self {
            bins,
            linear,
            metadata: None,
        }
    }

    pub fn bins(&self) -> &HashMap<u32, Vec<Chunk>> {
        &self.bins
    }

    pub fn chunks(&self, bin: u32) -> &[Chunk] {
        self.bins.get(&bin).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn linear_index(&self) -> &[VirtualOffset] {
        &self.linear
    }

    pub fn metadata(&self) -> Option<&ReferenceMetadata> {
        self.metadata.as_ref()
    }
}

/// A parsed tabix index. Immutable once built.
#[derive(Debug, Clone)]
pub struct TabixIndex {
    header: Header,
    names: Vec<String>,
    ids: HashMap<String, usize>,
    references: Vec<ReferenceIndex>,
    unplaced: Option<u64>,
}

impl TabixIndex {
    /// Reads an index file, decompressing it first if it is BGZF.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::IndexNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = if raw.starts_with(&GZIP_MAGIC) {
            bgzf::decompress(&raw).map_err(|e| match e {
                Error::CorruptBgzf(msg) => Error::CorruptIndex(msg),
                other => other,
            })?
        } else {
            raw
        };

        let index = Self::parse(&bytes)?;
        debug!(
            path = %path.display(),
            references = index.names.len(),
            "loaded tabix index"
        );
        Ok(index)
    }

    /// Decodes an uncompressed index.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut buf = IndexBuf { buf: bytes };

        if buf.take(4, "magic")? != MAGIC {
            return Err(Error::CorruptIndex("invalid tabix magic".to_string()));
        }

        let n_ref = buf.count("n_ref")?;
        let format_code = buf.i32("format")?;
        let col_seq = buf.i32("col_seq")?;
        let col_beg = buf.i32("col_beg")?;
        let col_end = buf.i32("col_end")?;
        let meta = buf.i32("meta")?;
        let skip = buf.i32("skip")?;

        if col_seq < 1 || col_beg < 1 || col_end < 0 || skip < 0 {
            return Err(Error::CorruptIndex(format!(
                "invalid column layout: seq={col_seq} beg={col_beg} end={col_end} skip={skip}"
            )));
        }

        let header = Header {
            format: Format::from_code(format_code)?,
            zero_based: format_code & FLAG_ZERO_BASED != 0,
            col_seq: col_seq as usize,
            col_beg: col_beg as usize,
            col_end: (col_end > 0).then_some(col_end as usize),
            meta: meta as u8,
            skip: skip as u32,
        };

        let l_nm = buf.count("l_nm")?;
        let names = parse_names(buf.take(l_nm, "sequence names")?)?;
        if names.len() != n_ref {
            return Err(Error::CorruptIndex(format!(
                "header declares {n_ref} sequences but names {}",
                names.len()
            )));
        }

        let mut ids = HashMap::with_capacity(n_ref);
        for (id, name) in names.iter().enumerate() {
            if ids.insert(name.clone(), id).is_some() {
                return Err(Error::CorruptIndex(format!("duplicate sequence name {name}")));
            }
        }

        let references = names
            .iter()
            .map(|name| parse_reference(&mut buf, name))
            .collect::<Result<Vec<_>>>()?;

        let unplaced = (buf.buf.remaining() >= 8).then(|| buf.buf.get_u64_le());

        Ok(Self {
            header,
            names,
            ids,
            references,
            unplaced,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Sequence names in index order; the position is the sequence id.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Exact-match lookup of a sequence id.
    pub fn reference_id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn reference(&self, id: usize) -> Option<&ReferenceIndex> {
        self.references.get(id)
    }

    pub fn references(&self) -> &[ReferenceIndex] {
        &self.references
    }

    /// Number of records without coordinates, when the index records it.
    pub fn unplaced_unmapped_count(&self) -> Option<u64> {
        self.unplaced
    }
}

fn parse_reference(buf: &mut IndexBuf<'_>, name: &str) -> Result<ReferenceIndex> {
    let n_bin = buf.count("n_bin")?;
    let mut reference = ReferenceIndex::default();

    for _ in 0..n_bin {
        let bin = buf.u32("bin")?;
        let n_chunk = buf.count("n_chunk")?;
        buf.need(n_chunk.saturating_mul(16), "chunks")?;

        let chunks = (0..n_chunk)
            .map(|_| {
                let begin = VirtualOffset::from(buf.buf.get_u64_le());
                let end = VirtualOffset::from(buf.buf.get_u64_le());
                (begin, end)
            })
            .collect::<Vec<_>>();

        if bin == METADATA_BIN {
            reference.metadata = Some(parse_metadata(name, &chunks)?);
            continue;
        }

        if bin > MAX_BIN {
            return Err(Error::CorruptIndex(format!(
                "bin {bin} of {name} is outside 0..={MAX_BIN}"
            )));
        }

        let chunks = chunks
            .into_iter()
            .map(|(begin, end)| {
                if begin > end {
                    return Err(Error::CorruptIndex(format!(
                        "chunk {begin}-{end} in bin {bin} of {name} ends before it begins"
                    )));
                }
                Ok(Chunk::new(begin, end))
            })
            .collect::<Result<Vec<_>>>()?;

        if reference.bins.insert(bin, chunks).is_some() {
            return Err(Error::CorruptIndex(format!("bin {bin} of {name} appears twice")));
        }
    }

    let n_intv = buf.count("n_intv")?;
    buf.need(n_intv.saturating_mul(8), "linear index")?;
    reference.linear = (0..n_intv)
        .map(|_| VirtualOffset::from(buf.buf.get_u64_le()))
        .collect();

    Ok(reference)
}

fn parse_metadata(name: &str, chunks: &[(VirtualOffset, VirtualOffset)]) -> Result<ReferenceMetadata> {
    match chunks {
        [(start, end), (mapped, unmapped)] => Ok(ReferenceMetadata {
            start: *start,
            end: *end,
            mapped: mapped.as_raw(),
            unmapped: unmapped.as_raw(),
        }),
        _ => Err(Error::CorruptIndex(format!(
            "pseudo-bin of {name} has {} chunks, expected 2",
            chunks.len()
        ))),
    }
}

/// Splits the NUL-terminated name block.
fn parse_names(block: &[u8]) -> Result<Vec<String>> {
    if block.is_empty() {
        return Ok(Vec::new());
    }

    let Some(block) = block.strip_suffix(&[0]) else {
        return Err(Error::CorruptIndex(
            "sequence names are not NUL-terminated".to_string(),
        ));
    };

    block
        .split(|&b| b == 0)
        .map(|name| {
            std::str::from_utf8(name)
                .map(str::to_string)
                .map_err(|e| Error::CorruptIndex(format!("invalid sequence name: {e}")))
        })
        .collect()
}

/// Bounds-checked little-endian cursor.
struct IndexBuf<'a> {
    buf: &'a [u8],
}

impl<'a> IndexBuf<'a> {
    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(Error::CorruptIndex(format!(
                "truncated index reading {what}: need {n} bytes, {} left",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        self.need(n, what)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn i32(&mut self, what: &str) -> Result<i32> {
        self.need(4, what)?;
        Ok(self.buf.get_i32_le())
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        self.need(4, what)?;
        Ok(self.buf.get_u32_le())
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let n = self.i32(what)?;
        usize::try_from(n).map_err(|_| Error::CorruptIndex(format!("negative {what}: {n}")))
    }
}
