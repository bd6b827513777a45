use super::{EOF_MARKER, MAX_BLOCK_SIZE, VirtualOffset};
use crate::{Error, Result};
use flate2::read::DeflateDecoder;
use std::io::{self, Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// Fixed part of the gzip member header: ID1 ID2 CM FLG MTIME(4) XFL OS XLEN(2)
const FIXED_HEADER_SIZE: usize = 12;
const FOOTER_SIZE: usize = 8;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const CM_DEFLATE: u8 = 8;
const FLG_FEXTRA: u8 = 0x04;

/// One decompressed BGZF block.
#[derive(Debug, Clone)]
pub struct Block {
    coffset: u64,
    csize: u64,
    data: Vec<u8>,
}

impl Block {
    /// Compressed offset of the first byte of this block.
    pub fn coffset(&self) -> u64 {
        self.coffset
    }

    /// Size of the block on disk, header and footer included.
    pub fn csize(&self) -> u64 {
        self.csize
    }

    /// Compressed offset of the block that follows this one.
    pub fn next_coffset(&self) -> u64 {
        self.coffset + self.csize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Virtual offset of byte `pos` of the payload.
    ///
    /// The one-past-the-end position is reported as the start of the next
    /// block, which is how index writers record it.
    pub fn virtual_offset(&self, pos: usize) -> VirtualOffset {
        if pos >= self.data.len() {
            VirtualOffset::new(self.next_coffset(), 0)
        } else {
            VirtualOffset::new(self.coffset, pos as u16)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    coffset: u64,
    xlen: usize,
    bsize: usize,
}

/// Reads and inflates BGZF blocks one at a time.
///
/// The reader tracks the compressed offset of the next block so callers can
/// build virtual offsets for any byte it hands out. It is not safe to share
/// one underlying handle between two readers without serializing their
/// seek+read pairs.
pub struct BlockReader<R> {
    inner: R,
    position: u64,
    pending: Option<BlockHeader>,
    eof_marker: bool,
}

impl<R> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            pending: None,
            eof_marker: false,
        }
    }

    /// Compressed offset of the next block to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the standard empty terminating block has been read.
    pub fn saw_eof_marker(&self) -> bool {
        self.eof_marker
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> BlockReader<R> {
    /// Positions the reader on the block starting at `coffset` and validates
    /// its header.
    ///
    /// Seeking to the exact end of the stream is allowed; the next
    /// [`next_block`](Self::next_block) then reports end of stream.
    pub fn seek(&mut self, coffset: u64) -> Result<()> {
        debug!(coffset, "seeking to BGZF block");
        self.inner.seek(SeekFrom::Start(coffset))?;
        self.position = coffset;
        self.pending = self.read_header()?;
        self.eof_marker = match self.pending {
            Some(_) => false,
            None => self.preceded_by_eof_marker(coffset)?,
        };
        Ok(())
    }

    /// Whether the 28 bytes before `coffset` are the EOF marker block.
    fn preceded_by_eof_marker(&mut self, coffset: u64) -> Result<bool> {
        let len = EOF_MARKER.len() as u64;
        if coffset < len {
            return Ok(false);
        }

        let mut tail = [0u8; EOF_MARKER.len()];
        self.inner.seek(SeekFrom::Start(coffset - len))?;
        let n = read_fully(&mut self.inner, &mut tail)?;
        self.inner.seek(SeekFrom::Start(coffset))?;

        Ok(n == tail.len() && tail == EOF_MARKER)
    }

    /// Opens `inner` positioned on the block starting at `coffset`.
    pub fn open_at(inner: R, coffset: u64) -> Result<Self> {
        let mut reader = Self::new(inner);
        reader.seek(coffset)?;
        Ok(reader)
    }
}

impl<R: Read> BlockReader<R> {
    /// Reads the next non-empty block.
    ///
    /// Returns `Ok(None)` at end of stream. Empty blocks, including the
    /// 28-byte terminator, are consumed and skipped so concatenated streams
    /// read through.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        loop {
            let header = match self.pending.take() {
                Some(header) => header,
                None => match self.read_header()? {
                    Some(header) => header,
                    None => {
                        if !self.eof_marker {
                            warn!(
                                position = self.position,
                                "BGZF stream ended without an EOF marker block"
                            );
                        }
                        return Ok(None);
                    }
                },
            };

            let block = self.read_body(header)?;
            self.position = block.next_coffset();

            if block.is_empty() {
                self.eof_marker = true;
                continue;
            }

            self.eof_marker = false;
            return Ok(Some(block));
        }
    }

    fn read_header(&mut self) -> Result<Option<BlockHeader>> {
        let coffset = self.position;
        let mut fixed = [0u8; FIXED_HEADER_SIZE];

        match read_fully(&mut self.inner, &mut fixed)? {
            0 => return Ok(None),
            n if n < FIXED_HEADER_SIZE => {
                return Err(Error::CorruptBgzf(format!(
                    "truncated block header at offset {coffset} ({n} bytes)"
                )));
            }
            _ => {}
        }

        if fixed[0..2] != GZIP_MAGIC {
            return Err(Error::CorruptBgzf(format!(
                "invalid gzip magic at offset {coffset}: [{:#04x}, {:#04x}]",
                fixed[0], fixed[1]
            )));
        }

        if fixed[2] != CM_DEFLATE {
            return Err(Error::CorruptBgzf(format!(
                "unsupported compression method {} at offset {coffset}",
                fixed[2]
            )));
        }

        if fixed[3] & FLG_FEXTRA == 0 {
            return Err(Error::CorruptBgzf(format!(
                "missing extra field at offset {coffset}; not a BGZF block"
            )));
        }

        let xlen = usize::from(u16::from_le_bytes([fixed[10], fixed[11]]));
        let mut extra = vec![0u8; xlen];
        if read_fully(&mut self.inner, &mut extra)? < xlen {
            return Err(Error::CorruptBgzf(format!(
                "truncated extra field at offset {coffset}"
            )));
        }

        let bsize = find_bsize(&extra).ok_or_else(|| {
            Error::CorruptBgzf(format!("missing BC subfield at offset {coffset}"))
        })?;

        let bsize = usize::from(bsize) + 1;
        if bsize < FIXED_HEADER_SIZE + xlen + FOOTER_SIZE {
            return Err(Error::CorruptBgzf(format!(
                "block size {bsize} at offset {coffset} is smaller than its header"
            )));
        }

        Ok(Some(BlockHeader {
            coffset,
            xlen,
            bsize,
        }))
    }

    fn read_body(&mut self, header: BlockHeader) -> Result<Block> {
        let BlockHeader {
            coffset,
            xlen,
            bsize,
        } = header;

        let mut rest = vec![0u8; bsize - FIXED_HEADER_SIZE - xlen];
        let n = read_fully(&mut self.inner, &mut rest)?;
        if n < rest.len() {
            return Err(Error::CorruptBgzf(format!(
                "truncated block at offset {coffset}: expected {} bytes, got {n}",
                rest.len()
            )));
        }

        let (cdata, footer) = rest.split_at(rest.len() - FOOTER_SIZE);
        let crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let isize = u32::from_le_bytes([footer[4], footer[5], footer[6], footer[7]]) as usize;

        if isize > MAX_BLOCK_SIZE {
            return Err(Error::CorruptBgzf(format!(
                "block at offset {coffset} claims {isize} uncompressed bytes"
            )));
        }

        let mut data = Vec::with_capacity(isize);
        DeflateDecoder::new(cdata)
            .read_to_end(&mut data)
            .map_err(|e| {
                Error::CorruptBgzf(format!("invalid deflate stream at offset {coffset}: {e}"))
            })?;

        if data.len() != isize {
            return Err(Error::CorruptBgzf(format!(
                "size mismatch at offset {coffset}: footer says {isize}, inflated {}",
                data.len()
            )));
        }

        let actual = crc32fast::hash(&data);
        if actual != crc {
            return Err(Error::CorruptBgzf(format!(
                "CRC32 mismatch at offset {coffset}: expected {crc:#010x}, got {actual:#010x}"
            )));
        }

        Ok(Block {
            coffset,
            csize: bsize as u64,
            data,
        })
    }
}

/// Locates the BSIZE value in the `BC` subfield of a gzip extra field.
fn find_bsize(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;

    while pos + 4 <= extra.len() {
        let (si1, si2) = (extra[pos], extra[pos + 1]);
        let slen = usize::from(u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]));

        if si1 == b'B' && si2 == b'C' && slen == 2 {
            return extra
                .get(pos + 4..pos + 6)
                .map(|b| u16::from_le_bytes([b[0], b[1]]));
        }

        pos += 4 + slen;
    }

    None
}

/// Reads until `buf` is full or the source is exhausted, returning the
/// number of bytes read.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

/// Decompresses a complete BGZF stream held in memory.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = BlockReader::new(data);
    let mut out = Vec::new();

    while let Some(block) = reader.next_block()? {
        out.extend_from_slice(block.data());
    }

    Ok(out)
}
