//! Blocked GZip Format (BGZF).
//!
//! A BGZF file is a series of gzip members, each holding at most 64 KiB of
//! uncompressed data and carrying its own compressed size in a `BC` extra
//! subfield. Because every block can be inflated on its own, a position in
//! the uncompressed stream can be addressed by a [`VirtualOffset`]: the
//! compressed offset of the block plus an offset inside its payload.
//!
//! - [`BlockReader`] reads and validates one block at a time
//! - [`Writer`] produces BGZF output with a configurable block size

mod block;
mod virtual_offset;
mod writer;

pub use block::{Block, BlockReader, decompress};
pub use virtual_offset::{MAX_COMPRESSED_OFFSET, VirtualOffset, pack, unpack};
pub use writer::Writer;

/// Maximum uncompressed (and compressed) size of one block.
pub const MAX_BLOCK_SIZE: usize = 1 << 16;

/// Uncompressed block size used by bgzip.
pub const DEFAULT_BLOCK_SIZE: usize = 0xff00;

/// Header size of a BGZF block: gzip header plus the 6-byte `BC` subfield.
pub const BGZF_HEADER_SIZE: usize = 18;

/// The empty block that terminates a BGZF stream.
pub const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
