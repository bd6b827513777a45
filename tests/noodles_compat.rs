//! Cross-checks the BGZF codec and the index reader against noodles.

mod common;

use noodles::bgzf;
use noodles::core::Position;
use noodles::csi::binning_index::index::header::Builder as IndexHeaderBuilder;
use noodles::csi::binning_index::index::reference_sequence::bin::Chunk;
use noodles::tabix;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};
use tabixr::bgzf::{BlockReader, VirtualOffset, Writer, decompress};
use tabixr::tabix::TabixFile;

fn sample_text() -> Vec<u8> {
    common::random_bed(3, 300).join("\n").into_bytes()
}

#[test]
fn test_noodles_reads_our_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ours.gz");
    let text = sample_text();

    let mut writer = Writer::new(std::fs::File::create(&path).unwrap()).with_block_size(1000);
    writer.write_all(&text).unwrap();
    writer.finish().unwrap();

    let mut reader = bgzf::io::Reader::new(std::fs::File::open(&path).unwrap());
    let mut decoded = Vec::new();
    reader.read_to_end(&mut decoded).unwrap();

    assert_eq!(decoded, text);
}

#[test]
fn test_we_read_noodles_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("theirs.gz");
    let text = sample_text();

    let mut writer = bgzf::io::Writer::new(std::fs::File::create(&path).unwrap());
    writer.write_all(&text).unwrap();
    drop(writer);

    let data = std::fs::read(&path).unwrap();
    assert_eq!(decompress(&data).unwrap(), text);

    let mut reader = BlockReader::new(std::fs::File::open(&path).unwrap());
    let mut total = 0;
    while let Some(block) = reader.next_block().unwrap() {
        total += block.len();
    }
    assert_eq!(total, text.len());
    assert!(reader.saw_eof_marker());
}

#[test]
fn test_virtual_offsets_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ours.gz");
    let lines = common::random_bed(5, 100);

    let mut writer = Writer::new(std::fs::File::create(&path).unwrap()).with_block_size(300);
    let mut starts = Vec::new();
    for line in &lines {
        starts.push(writer.virtual_offset());
        writer.write_all(line.as_bytes()).unwrap();
        writer.write_all(b"\n").unwrap();
    }
    writer.finish().unwrap();

    let mut reader = bgzf::io::Reader::new(std::fs::File::open(&path).unwrap());
    let mut buf = Vec::new();

    // visit in reverse so every read needs a real seek
    for (line, offset) in lines.iter().zip(&starts).rev() {
        let position = bgzf::VirtualPosition::from(offset.as_raw());
        assert_eq!(position.compressed(), offset.compressed());
        assert_eq!(position.uncompressed(), offset.uncompressed());
        assert_eq!(VirtualOffset::from(u64::from(position)), *offset);

        reader.seek(position).unwrap();
        buf.clear();
        reader.read_until(b'\n', &mut buf).unwrap();
        assert_eq!(buf.strip_suffix(b"\n").unwrap(), line.as_bytes());
    }
}

/// (name, 0-based start, end) of a BED line, read without any tabixr code.
fn bed_fields(line: &str) -> (&str, u64, u64) {
    let mut fields = line.split('\t');
    let name = fields.next().unwrap();
    let start: u64 = fields.next().unwrap().parse().unwrap();
    let end: u64 = fields.next().unwrap().parse().unwrap();
    (name, start, end.max(start + 1))
}

/// Compresses `lines` and indexes them with noodles alone.
fn write_noodles_indexed(dir: &Path, lines: &[String]) -> PathBuf {
    let path = dir.join("noodles.bed.gz");
    let mut writer = bgzf::io::Writer::new(std::fs::File::create(&path).unwrap());
    let mut indexer = tabix::index::Indexer::default();
    indexer.set_header(IndexHeaderBuilder::bed().build());

    for line in lines {
        let begin = writer.virtual_position();
        writer.write_all(line.as_bytes()).unwrap();
        writer.write_all(b"\n").unwrap();
        let end = writer.virtual_position();

        if line.starts_with('#') {
            continue;
        }

        let (name, start, stop) = bed_fields(line);
        indexer
            .add_record(
                name,
                Position::try_from(start as usize + 1).unwrap(),
                Position::try_from(stop as usize).unwrap(),
                Chunk::new(begin, end),
            )
            .unwrap();
    }
    drop(writer);

    let index = indexer.build();
    let mut index_path = path.as_os_str().to_owned();
    index_path.push(".tbi");
    let mut index_writer = tabix::io::Writer::new(std::fs::File::create(index_path).unwrap());
    index_writer.write_index(&index).unwrap();
    drop(index_writer);

    path
}

#[test]
fn test_queries_against_noodles_index() {
    let dir = tempfile::tempdir().unwrap();
    let lines = common::random_bed(23, 3000);
    let path = write_noodles_indexed(dir.path(), &lines);

    let file = TabixFile::open(&path).unwrap();
    assert_eq!(file.sequence_names(), ["chr1", "chr2", "chrX"]);
    assert!(file.index().header().zero_based);

    let mut rng = common::Lcg::new(99);
    for _ in 0..200 {
        let reference = ["chr1", "chr2", "chrX"][rng.below(3) as usize];
        let start = rng.below(40_000_000);
        let end = start + 1 + rng.below(2_000_000);

        let got = file
            .query(reference, start, end)
            .unwrap()
            .collect::<tabixr::Result<Vec<_>>>()
            .unwrap();
        let expected = lines
            .iter()
            .filter(|line| !line.starts_with('#'))
            .filter(|line| {
                let (name, s, e) = bed_fields(line);
                name == reference && s < end && e > start
            })
            .cloned()
            .collect::<Vec<_>>();

        assert_eq!(got, expected, "{reference}:{start}-{end}");
    }
}
