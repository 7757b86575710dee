use crate::codec::reader_for;
use crate::defect::{Defect, DefectKind};
use crate::domain::EntryRecord;
use crate::error::ZpkError;
use flate2::Crc;
use std::io::{self, Read};

/// Decoding reader over one entry. Counts the bytes it hands out and checks
/// them against the declared size and CRC-32 once the stream ends.
pub struct EntryReader<'a> {
    inner: io::Take<Box<dyn Read + Send + 'a>>,
    name: String,
    expected_size: u64,
    expected_crc: u32,
    crc: Crc,
    seen: u64,
    done: bool,
}

impl<'a> EntryReader<'a> {
    /// `data` is the entry's compressed bytes.
    pub fn new(entry: &EntryRecord, data: &'a [u8]) -> Self {
        // One byte past the declared size is enough to detect overlong data.
        let inner = reader_for(entry.method, data).take(entry.uncompressed_size + 1);
        Self {
            inner,
            name: entry.name.clone(),
            expected_size: entry.uncompressed_size,
            expected_crc: entry.crc32,
            crc: Crc::new(),
            seen: 0,
            done: false,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.seen
    }

    fn fail(&self, kind: DefectKind, detail: String) -> io::Error {
        let d = Defect::new(kind, detail).entry(self.name.clone());
        io::Error::new(io::ErrorKind::InvalidData, ZpkError::PackageFormat(d))
    }

    fn finish(&mut self) -> io::Result<()> {
        self.done = true;
        if self.seen != self.expected_size {
            return Err(self.fail(
                DefectKind::SizeMismatch,
                format!("read {} bytes, expected {}", self.seen, self.expected_size),
            ));
        }
        let got = self.crc.sum();
        if got != self.expected_crc {
            return Err(self.fail(
                DefectKind::CrcMismatch,
                format!("crc {got:#010x}, expected {:#010x}", self.expected_crc),
            ));
        }
        Ok(())
    }
}

impl Read for EntryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        let n = match self.inner.read(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(e),
            Err(e) => {
                self.done = true;
                return Err(self.fail(DefectKind::CrcMismatch, format!("corrupt entry data: {e}")));
            }
        };
        if n == 0 {
            self.finish()?;
            return Ok(0);
        }
        self.seen += n as u64;
        if self.seen > self.expected_size {
            self.done = true;
            return Err(self.fail(
                DefectKind::SizeMismatch,
                format!("entry longer than declared {} bytes", self.expected_size),
            ));
        }
        self.crc.update(&buf[..n]);
        Ok(n)
    }
}
