use super::binning::QueryPlan;
use super::index::{Format, Header};
use super::Chunk;
use crate::bgzf::{Block, BlockReader, VirtualOffset};
use crate::{Error, Result};
use std::io::{Read, Seek};
use std::iter::FusedIterator;
use tracing::debug;

/// Where the interval of a data line lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    /// 1-based column of the sequence name.
    pub seq: usize,
    /// 1-based column of the start position.
    pub begin: usize,
    /// 1-based column of the end position, if the format has one.
    pub end: Option<usize>,
    /// Whether positions are 0-based half-open (BED) rather than 1-based.
    pub zero_based: bool,
    /// Lines starting with this byte are skipped.
    pub meta: u8,
    pub format: Format,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            seq: 1,
            begin: 2,
            end: None,
            zero_based: true,
            meta: b'#',
            format: Format::Generic,
        }
    }
}

impl From<&Header> for Columns {
    fn from(header: &Header) -> Self {
        Self {
            seq: header.col_seq,
            begin: header.col_beg,
            end: header.col_end,
            zero_based: header.zero_based,
            meta: header.meta,
            format: header.format,
        }
    }
}

/// 0-based half-open interval of one data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval<'a> {
    pub reference: &'a str,
    pub start: u64,
    pub end: u64,
}

impl Columns {
    /// Extracts the interval of `line`.
    ///
    /// Without an end column a record covers one base, except VCF where it
    /// covers the REF allele. Empty intervals are widened to one base.
    pub fn interval<'a>(&self, line: &'a str) -> Result<Interval<'a>> {
        let mut reference = None;
        let mut begin = None;
        let mut end = None;
        let mut ref_allele = None;

        for (i, field) in line.split('\t').enumerate() {
            let column = i + 1;
            if column == self.seq {
                reference = Some(field);
            }
            if column == self.begin {
                begin = Some(field);
            }
            if Some(column) == self.end {
                end = Some(field);
            }
            if column == 4 && self.format == Format::Vcf {
                ref_allele = Some(field);
            }
        }

        let reference = reference.ok_or_else(|| missing_column("sequence", self.seq, line))?;
        let begin = begin.ok_or_else(|| missing_column("start", self.begin, line))?;

        let mut start = parse_position(begin, line)?;
        if !self.zero_based {
            start = start.saturating_sub(1);
        }

        let past_start = |len: u64| {
            start.checked_add(len).ok_or_else(|| {
                Error::InvalidRecord(format!("position out of range in line {line:?}"))
            })
        };

        let end = match (self.end, end, ref_allele) {
            (Some(_), Some(field), _) => parse_position(field, line)?,
            (Some(column), None, _) => return Err(missing_column("end", column, line)),
            (None, _, Some(allele)) => past_start(allele.len() as u64)?,
            (None, _, None) => past_start(1)?,
        };

        Ok(Interval {
            reference,
            start,
            end: end.max(past_start(1)?),
        })
    }
}

fn parse_position(field: &str, line: &str) -> Result<u64> {
    field
        .trim()
        .parse()
        .map_err(|_| Error::InvalidRecord(format!("invalid position {field:?} in line {line:?}")))
}

fn missing_column(what: &str, column: usize, line: &str) -> Error {
    Error::InvalidRecord(format!("missing {what} column {column} in line {line:?}"))
}

/// Observable lifecycle of a [`TabixQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Init,
    Streaming,
    Advancing,
    Done,
    Failed,
}

enum State {
    Init,
    Streaming(Chunk),
    Advancing,
    Done,
    Failed(Error),
}

/// Streams the lines overlapping one query interval.
///
/// Walks the planned chunks in order, decoding blocks through a
/// [`BlockReader`] and reassembling lines that straddle block boundaries.
/// Bin membership is approximate, so every line is tested for exact overlap
/// before it is yielded.
///
/// Errors are terminal: the first one moves the query to
/// [`QueryState::Failed`] and is returned again by every later call to
/// [`next_record`](Self::next_record). As an [`Iterator`] the error is
/// yielded once and iteration then ends.
pub struct TabixQuery<R> {
    reader: Option<BlockReader<R>>,
    chunks: std::vec::IntoIter<Chunk>,
    reference: String,
    start: u64,
    end: u64,
    columns: Columns,
    block: Option<Block>,
    pos: usize,
    line: Vec<u8>,
    state: State,
    reported: bool,
}

impl<R: Read + Seek> TabixQuery<R> {
    pub fn new(reader: R, reference: impl Into<String>, plan: QueryPlan, columns: Columns) -> Self {
        Self {
            reader: Some(BlockReader::new(reader)),
            chunks: plan.chunks.into_iter(),
            reference: reference.into(),
            start: plan.start,
            end: plan.end,
            columns,
            block: None,
            pos: 0,
            line: Vec::new(),
            state: State::Init,
            reported: false,
        }
    }

    pub fn state(&self) -> QueryState {
        match self.state {
            State::Init => QueryState::Init,
            State::Streaming(_) => QueryState::Streaming,
            State::Advancing => QueryState::Advancing,
            State::Done => QueryState::Done,
            State::Failed(_) => QueryState::Failed,
        }
    }

    /// The error that failed this query, if any.
    pub fn error(&self) -> Option<&Error> {
        match &self.state {
            State::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the next overlapping line, `Ok(None)` once exhausted.
    pub fn next_record(&mut self) -> Result<Option<String>> {
        loop {
            match &self.state {
                State::Done => return Ok(None),
                State::Failed(e) => return Err(e.clone()),
                State::Init | State::Advancing => {
                    if let Err(e) = self.advance() {
                        return Err(self.fail(e));
                    }
                }
                State::Streaming(chunk) => {
                    let chunk = *chunk;
                    match self.scan(chunk) {
                        Ok(Some(line)) => return Ok(Some(line)),
                        Ok(None) => self.state = State::Advancing,
                        Err(e) => return Err(self.fail(e)),
                    }
                }
            }
        }
    }

    /// Releases the reader and block buffers. A failed query stays failed.
    pub fn close(&mut self) {
        self.release();
        if !matches!(self.state, State::Failed(_)) {
            self.state = State::Done;
        }
    }

    fn release(&mut self) {
        self.reader = None;
        self.block = None;
        self.line = Vec::new();
    }

    fn fail(&mut self, e: Error) -> Error {
        debug!(reference = %self.reference, error = %e, "tabix query failed");
        self.release();
        self.state = State::Failed(e.clone());
        e
    }

    fn advance(&mut self) -> Result<()> {
        match self.chunks.next() {
            Some(chunk) => {
                debug!(begin = %chunk.begin(), end = %chunk.end(), "scanning chunk");
                self.seek(chunk.begin())?;
                self.state = State::Streaming(chunk);
            }
            None => {
                self.release();
                self.state = State::Done;
            }
        }
        Ok(())
    }

    fn reader(&mut self) -> Result<&mut BlockReader<R>> {
        self.reader
            .as_mut()
            .ok_or_else(|| Error::Internal("query reader already released".to_string()))
    }

    fn seek(&mut self, offset: VirtualOffset) -> Result<()> {
        let loaded = self
            .block
            .as_ref()
            .is_some_and(|block| block.coffset() == offset.compressed());

        if !loaded {
            let reader = self.reader()?;
            reader.seek(offset.compressed())?;
            self.block = reader.next_block()?;
        }

        self.pos = usize::from(offset.uncompressed());
        self.line.clear();

        let valid = match &self.block {
            Some(block) => {
                self.pos <= block.len()
                    && (block.coffset() == offset.compressed() || self.pos == 0)
            }
            None => self.pos == 0,
        };

        if !valid {
            return Err(Error::CorruptIndex(format!(
                "virtual offset {offset} does not address a position in its block"
            )));
        }

        Ok(())
    }

    fn current_offset(&self) -> VirtualOffset {
        match (&self.block, &self.reader) {
            (Some(block), _) => block.virtual_offset(self.pos),
            (None, Some(reader)) => VirtualOffset::new(reader.position(), 0),
            (None, None) => VirtualOffset::MAX,
        }
    }

    fn scan(&mut self, chunk: Chunk) -> Result<Option<String>> {
        loop {
            if self.current_offset() >= chunk.end() {
                return Ok(None);
            }

            let Some(line) = self.read_line()? else {
                return Ok(None);
            };

            if line.is_empty() || line.as_bytes()[0] == self.columns.meta {
                continue;
            }

            let interval = self.columns.interval(&line)?;

            // records are sorted; anything on another sequence or starting at
            // or past the query end closes this chunk
            if interval.reference != self.reference || interval.start >= self.end {
                return Ok(None);
            }

            if interval.end > self.start {
                return Ok(Some(line));
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        self.line.clear();

        while let Some(block) = self.block.as_ref() {
            let data = &block.data()[self.pos..];

            if let Some(i) = data.iter().position(|&b| b == b'\n') {
                self.line.extend_from_slice(&data[..i]);
                self.pos += i + 1;
                return self.take_line().map(Some);
            }

            self.line.extend_from_slice(data);
            self.pos = block.len();

            let next = self.reader()?.next_block()?;
            self.block = next;
            self.pos = 0;
        }

        if self.line.is_empty() {
            Ok(None)
        } else {
            self.take_line().map(Some)
        }
    }

    fn take_line(&mut self) -> Result<String> {
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        String::from_utf8(line)
            .map_err(|e| Error::InvalidRecord(format!("line is not valid UTF-8: {e}")))
    }
}

impl<R: Read + Seek> Iterator for TabixQuery<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reported {
            return None;
        }

        match self.next_record() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(e) => {
                self.reported = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> FusedIterator for TabixQuery<R> {}
