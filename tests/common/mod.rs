//! Shared fixtures: sorted text files compressed to BGZF with small blocks,
//! indexed by a minimal tabix indexer that lives only in the tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tabixr::bgzf::Writer;
use tabixr::tabix::binning::{LINEAR_SHIFT, METADATA_BIN, reg2bin};
use tabixr::tabix::{Columns, Format};

/// BED layout: sequence, 0-based start, end.
pub fn bed_columns() -> Columns {
    Columns {
        seq: 1,
        begin: 2,
        end: Some(3),
        zero_based: true,
        meta: b'#',
        format: Format::Generic,
    }
}

/// VCF layout: 1-based POS, extent taken from REF.
pub fn vcf_columns() -> Columns {
    Columns {
        seq: 1,
        begin: 2,
        end: None,
        zero_based: false,
        meta: b'#',
        format: Format::Vcf,
    }
}

#[derive(Default)]
struct Reference {
    bins: BTreeMap<u32, Vec<(u64, u64)>>,
    linear: Vec<Option<u64>>,
    first: Option<u64>,
    last: u64,
    records: u64,
}

/// Compresses `lines` into `dir/name` with `block_size`-byte blocks and
/// writes a BGZF-compressed tabix index next to it.
///
/// `lines` must be sorted by sequence then start; lines starting with the
/// meta character are written but not indexed.
pub fn write_indexed(
    dir: &Path,
    name: &str,
    lines: &[String],
    columns: &Columns,
    block_size: usize,
) -> PathBuf {
    let path = dir.join(name);
    let mut writer = Writer::new(std::fs::File::create(&path).unwrap()).with_block_size(block_size);

    let mut names: Vec<String> = Vec::new();
    let mut references: Vec<Reference> = Vec::new();

    for line in lines {
        let begin = writer.virtual_offset().as_raw();
        writer.write_all(line.as_bytes()).unwrap();
        writer.write_all(b"\n").unwrap();
        let end = writer.virtual_offset().as_raw();

        if line.as_bytes().first() == Some(&columns.meta) {
            continue;
        }

        let interval = columns.interval(line).unwrap();
        if names.last().map(String::as_str) != Some(interval.reference) {
            assert!(
                !names.iter().any(|n| n == interval.reference),
                "fixture lines must be grouped by sequence"
            );
            names.push(interval.reference.to_string());
            references.push(Reference::default());
        }
        let reference = references.last_mut().unwrap();

        let chunks = reference
            .bins
            .entry(reg2bin(interval.start, interval.end))
            .or_default();
        match chunks.last_mut() {
            Some(last) if last.1 == begin => last.1 = end,
            _ => chunks.push((begin, end)),
        }

        let first_window = (interval.start >> LINEAR_SHIFT) as usize;
        let last_window = ((interval.end - 1) >> LINEAR_SHIFT) as usize;
        if reference.linear.len() <= last_window {
            reference.linear.resize(last_window + 1, None);
        }
        for slot in &mut reference.linear[first_window..=last_window] {
            slot.get_or_insert(begin);
        }

        reference.first.get_or_insert(begin);
        reference.last = end;
        reference.records += 1;
    }

    writer.finish().unwrap();

    let index = encode_index(columns, &names, &references);
    let mut tbi = Writer::new(std::fs::File::create(index_path(&path)).unwrap());
    tbi.write_all(&index).unwrap();
    tbi.finish().unwrap();

    path
}

pub fn index_path(path: &Path) -> PathBuf {
    let mut index = path.as_os_str().to_owned();
    index.push(".tbi");
    PathBuf::from(index)
}

fn encode_index(columns: &Columns, names: &[String], references: &[Reference]) -> Vec<u8> {
    let mut out = Vec::new();
    let i32s = |out: &mut Vec<u8>, values: &[i32]| {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    };

    let format = match columns.format {
        Format::Generic => 0,
        Format::Sam => 1,
        Format::Vcf => 2,
    } | if columns.zero_based { 0x10000 } else { 0 };

    let mut name_block = Vec::new();
    for name in names {
        name_block.extend_from_slice(name.as_bytes());
        name_block.push(0);
    }

    out.extend_from_slice(b"TBI\x01");
    i32s(
        &mut out,
        &[
            names.len() as i32,
            format,
            columns.seq as i32,
            columns.begin as i32,
            columns.end.unwrap_or(0) as i32,
            i32::from(columns.meta),
            0,
            name_block.len() as i32,
        ],
    );
    out.extend_from_slice(&name_block);

    for reference in references {
        i32s(&mut out, &[reference.bins.len() as i32 + 1]);
        for (bin, chunks) in &reference.bins {
            out.extend_from_slice(&bin.to_le_bytes());
            i32s(&mut out, &[chunks.len() as i32]);
            for (begin, end) in chunks {
                out.extend_from_slice(&begin.to_le_bytes());
                out.extend_from_slice(&end.to_le_bytes());
            }
        }

        out.extend_from_slice(&METADATA_BIN.to_le_bytes());
        i32s(&mut out, &[2]);
        for v in [
            reference.first.unwrap_or(0),
            reference.last,
            reference.records,
            0,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }

        i32s(&mut out, &[reference.linear.len() as i32]);
        for offset in &reference.linear {
            out.extend_from_slice(&offset.unwrap_or(0).to_le_bytes());
        }
    }

    out.extend_from_slice(&0u64.to_le_bytes());
    out
}

/// Lines of `lines` overlapping `[start, end)` on `reference`, by linear scan.
/// An empty or inverted range overlaps nothing.
pub fn overlapping(
    lines: &[String],
    columns: &Columns,
    reference: &str,
    start: u64,
    end: u64,
) -> Vec<String> {
    if start >= end {
        return Vec::new();
    }

    lines
        .iter()
        .filter(|line| line.as_bytes().first() != Some(&columns.meta))
        .filter(|line| {
            let interval = columns.interval(line).unwrap();
            interval.reference == reference && interval.start < end && interval.end > start
        })
        .cloned()
        .collect()
}

/// Deterministic pseudo-random generator for fixture data.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// Sorted BED records over three sequences, mostly short with occasional
/// long features that land in low-level bins.
pub fn random_bed(seed: u64, per_sequence: usize) -> Vec<String> {
    let mut rng = Lcg::new(seed);
    let mut lines = vec!["#chrom\tstart\tend\tname".to_string()];

    for chrom in ["chr1", "chr2", "chrX"] {
        let mut pos = 0u64;
        for i in 0..per_sequence {
            pos += rng.below(20_000);
            let len = match rng.below(20) {
                0 => 50_000 + rng.below(2_000_000),
                1 => 0,
                _ => 1 + rng.below(500),
            };
            lines.push(format!("{chrom}\t{pos}\t{}\t{chrom}_{i}", pos + len));
        }
    }

    lines
}

/// The fixed file used by the concrete query scenarios.
pub fn small_bed() -> Vec<String> {
    [
        "chr1\t100\t200\ta",
        "chr1\t150\t250\tb",
        "chr1\t300\t400\tc",
        "chr2\t50\t60\td",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn to_strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}
