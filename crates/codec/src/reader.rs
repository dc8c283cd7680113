use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::CodecError;

/// Sequential reader over a table data file that yields whole records.
///
/// Generic over any `Read` implementor so tests can feed in-memory buffers
/// (`Cursor<Vec<u8>>`). A record is read atomically: either `record_width`
/// bytes come back, or the stream ends cleanly, or the partial tail is
/// reported as [`CodecError::TruncatedRecord`] so the caller can stop.
pub struct RecordReader<R: Read> {
    rdr: BufReader<R>,
    record_width: usize,
    /// Byte offset of the next record in the underlying stream.
    offset: u64,
    /// Reusable record buffer.
    buf: Vec<u8>,
}

impl RecordReader<File> {
    /// Opens an existing data file for scanning.
    pub fn open<P: AsRef<Path>>(path: P, record_width: usize) -> io::Result<Self> {
        let f = File::open(path)?;
        Ok(Self::from_reader(f, record_width))
    }
}

impl<R: Read> RecordReader<R> {
    pub fn from_reader(reader: R, record_width: usize) -> Self {
        Self {
            rdr: BufReader::new(reader),
            record_width,
            offset: 0,
            buf: vec![0u8; record_width],
        }
    }

    #[must_use]
    pub fn record_width(&self) -> usize {
        self.record_width
    }

    /// Byte offset of the next record to be read.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next record.
    ///
    /// # Termination
    ///
    /// - **Clean EOF** (zero bytes available) -> `Ok(None)`.
    /// - **Truncated tail** (some but not all bytes) -> `Err(TruncatedRecord)`.
    /// - **I/O error** -> `Err(Io)`.
    pub fn next_record(&mut self) -> Result<Option<&[u8]>, CodecError> {
        if self.record_width == 0 {
            return Ok(None);
        }

        let mut filled = 0;
        while filled < self.record_width {
            match self.rdr.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CodecError::Io(e)),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        if filled < self.record_width {
            return Err(CodecError::TruncatedRecord {
                offset: self.offset,
                got: filled,
                expected: self.record_width,
            });
        }

        self.offset += self.record_width as u64;
        Ok(Some(&self.buf))
    }
}

impl<R: Read + Seek> RecordReader<R> {
    /// Positions the reader at record `index` (byte `index * record_width`).
    ///
    /// An index whose byte offset cannot be represented lies past the end of
    /// any file, so the reader is parked at the end and the next read is a
    /// clean EOF.
    pub fn seek_to_record(&mut self, index: u64) -> Result<(), CodecError> {
        let pos = index
            .checked_mul(self.record_width as u64)
            .filter(|&pos| i64::try_from(pos).is_ok());
        self.offset = match pos {
            Some(pos) => self.rdr.seek(SeekFrom::Start(pos))?,
            None => self.rdr.seek(SeekFrom::End(0))?,
        };
        Ok(())
    }
}
