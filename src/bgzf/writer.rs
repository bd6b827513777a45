use super::{BGZF_HEADER_SIZE, DEFAULT_BLOCK_SIZE, EOF_MARKER, MAX_BLOCK_SIZE, VirtualOffset};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::{self, Write};

/// BGZF writer.
///
/// Buffers uncompressed bytes and emits one block each time the buffer
/// reaches the configured block size. [`Writer::finish`] flushes the last
/// partial block and appends the EOF marker.
pub struct Writer<W: Write> {
    inner: Option<W>,
    buf: Vec<u8>,
    block_size: usize,
    level: Compression,
    position: u64,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Some(inner),
            buf: Vec::with_capacity(DEFAULT_BLOCK_SIZE),
            block_size: DEFAULT_BLOCK_SIZE,
            level: Compression::default(),
            position: 0,
        }
    }

    /// Sets the uncompressed block size, clamped to `1..=65536`.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.clamp(1, MAX_BLOCK_SIZE);
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.level = Compression::new(level.min(9));
        self
    }

    /// Virtual offset of the next byte to be written.
    pub fn virtual_offset(&self) -> VirtualOffset {
        VirtualOffset::new(self.position, self.buf.len() as u16)
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Flushes buffered data and writes the EOF marker.
    pub fn finish(mut self) -> io::Result<W> {
        self.try_finish()?;
        self.inner
            .take()
            .ok_or_else(|| io::Error::other("writer already finished"))
    }

    fn try_finish(&mut self) -> io::Result<()> {
        self.flush_block()?;

        if let Some(inner) = self.inner.as_mut() {
            inner.write_all(&EOF_MARKER)?;
            inner.flush()?;
            self.position += EOF_MARKER.len() as u64;
        }

        Ok(())
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let block = compress_block(&self.buf, self.level)?;
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::other("writer already finished"))?;
        inner.write_all(&block)?;

        self.position += block.len() as u64;
        self.buf.clear();

        Ok(())
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = buf.len().min(self.block_size - self.buf.len());
        self.buf.extend_from_slice(&buf[..n]);

        if self.buf.len() >= self.block_size {
            self.flush_block()?;
        }

        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()?;

        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            let _ = self.try_finish();
        }
    }
}

/// Compresses `data` into a single BGZF block.
fn compress_block(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len()), level);
    encoder.write_all(data)?;
    let deflated = encoder.finish()?;

    let bsize = BGZF_HEADER_SIZE + deflated.len() + 8;
    if bsize > MAX_BLOCK_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("compressed block of {bsize} bytes exceeds the BGZF limit"),
        ));
    }

    let mut block = Vec::with_capacity(bsize);
    block.extend_from_slice(&[0x1f, 0x8b, 8, 4, 0, 0, 0, 0, 0, 0xff]);
    block.extend_from_slice(&6u16.to_le_bytes());
    block.extend_from_slice(b"BC");
    block.extend_from_slice(&2u16.to_le_bytes());
    block.extend_from_slice(&((bsize - 1) as u16).to_le_bytes());
    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());

    Ok(block)
}
