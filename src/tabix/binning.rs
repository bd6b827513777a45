//! UCSC hierarchical binning and chunk planning.
//!
//! Six levels of bins cover 512 Mbp: one bin at the top, then 8, 64, 512,
//! 4096 and 32768 bins spanning 64 Mbp, 8 Mbp, 1 Mbp, 128 kbp and 16 kbp.
//! A record lives in the smallest bin that fully contains it, so the bins a
//! query must visit are every bin at every level that touches the query.
//! That set over-approximates; the query iterator filters exactly.

use super::index::{ReferenceIndex, TabixIndex};
use super::Chunk;
use crate::bgzf::VirtualOffset;
use tracing::debug;

/// Coordinates addressable by the binning scheme.
pub const MAX_COORDINATE: u64 = 1 << 29;

/// Largest real bin id.
pub const MAX_BIN: u32 = 37_448;

/// Pseudo-bin carrying per-sequence metadata.
pub const METADATA_BIN: u32 = 37_450;

/// Shift of the linear index: one entry per 16 kbp window.
pub const LINEAR_SHIFT: u32 = 14;

/// (first bin id, shift) for levels 1 through 5.
const LEVELS: [(u32, u32); 5] = [(1, 26), (9, 23), (73, 20), (585, 17), (4681, 14)];

/// Smallest bin containing `[start, end)`.
pub fn reg2bin(start: u64, end: u64) -> u32 {
    let (start, end) = clamp(start, end);
    let end = end - 1;

    for &(offset, shift) in LEVELS.iter().rev() {
        if start >> shift == end >> shift {
            return offset + (start >> shift);
        }
    }

    0
}

/// All bins that may hold records overlapping `[start, end)`, ascending.
pub fn reg2bins(start: u64, end: u64) -> Vec<u32> {
    if start >= end || start >= MAX_COORDINATE {
        return Vec::new();
    }

    let (start, end) = clamp(start, end);
    let end = end - 1;

    let mut bins = vec![0];
    for &(offset, shift) in &LEVELS {
        bins.extend(offset + (start >> shift)..=offset + (end >> shift));
    }

    bins
}

fn clamp(start: u64, end: u64) -> (u32, u32) {
    let start = start.min(MAX_COORDINATE - 1);
    let end = end.clamp(start + 1, MAX_COORDINATE);
    (start as u32, end as u32)
}

/// Lowest offset a record overlapping a query starting at `start` can have.
///
/// Uses the entry for `start`'s 16 kbp window, or the nearest populated
/// entry before it when the array is shorter or the entry is empty.
pub fn linear_floor(linear: &[VirtualOffset], start: u64) -> VirtualOffset {
    if linear.is_empty() {
        return VirtualOffset::MIN;
    }

    let window = usize::try_from(start >> LINEAR_SHIFT).unwrap_or(usize::MAX);
    let window = window.min(linear.len() - 1);

    linear[..=window]
        .iter()
        .rev()
        .find(|offset| offset.as_raw() != 0)
        .copied()
        .unwrap_or(VirtualOffset::MIN)
}

/// Sorts chunks by begin and merges those whose compressed ranges overlap or
/// share a block.
pub fn merge_chunks(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks.sort_by_key(|c| c.begin());

    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(last) if chunk.begin().compressed() <= last.end().compressed() => {
                if chunk.end() > last.end() {
                    *last = Chunk::new(last.begin(), chunk.end());
                }
            }
            _ => merged.push(chunk),
        }
    }

    merged
}

/// The chunks to scan for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub reference_id: Option<usize>,
    pub start: u64,
    pub end: u64,
    pub min_offset: VirtualOffset,
    pub chunks: Vec<Chunk>,
}

impl QueryPlan {
    pub fn empty(start: u64, end: u64) -> Self {
        Self {
            reference_id: None,
            start,
            end,
            min_offset: VirtualOffset::MIN,
            chunks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Plans the scan of `[start, end)` on `reference`.
///
/// An unknown reference or an empty interval yields an empty plan.
pub fn plan(index: &TabixIndex, reference: &str, start: u64, end: u64) -> QueryPlan {
    let Some(id) = index.reference_id(reference) else {
        debug!(reference, "reference not in index");
        return QueryPlan::empty(start, end);
    };

    let Some(reference_index) = index.reference(id) else {
        return QueryPlan::empty(start, end);
    };

    let mut plan = plan_reference(reference_index, start, end);
    plan.reference_id = Some(id);

    debug!(
        reference,
        start,
        end,
        min_offset = %plan.min_offset,
        chunks = plan.chunks.len(),
        "planned tabix query"
    );

    plan
}

fn plan_reference(reference: &ReferenceIndex, start: u64, end: u64) -> QueryPlan {
    let bins = reg2bins(start, end);
    if bins.is_empty() {
        return QueryPlan::empty(start, end);
    }

    let min_offset = linear_floor(reference.linear_index(), start);

    let candidates = bins
        .iter()
        .flat_map(|&bin| reference.chunks(bin))
        .filter(|chunk| chunk.end() > min_offset)
        .copied()
        .collect::<Vec<_>>();

    QueryPlan {
        reference_id: None,
        start,
        end,
        min_offset,
        chunks: merge_chunks(candidates),
    }
}
