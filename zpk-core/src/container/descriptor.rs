use crate::util::le::LeCursor;
use std::io::Write;

pub const DD_SIG: u32 = 0x08074b50;

/// Trailing record carrying CRC and sizes for entries written in streaming mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// Whether the optional signature was present; record is 16 bytes if so, else 12.
    pub signed: bool,
}

impl DataDescriptor {
    pub fn parse(buf: &[u8], off: usize) -> Option<Self> {
        let mut c = LeCursor::at(buf, off);
        let first = c.u32()?;
        if first == DD_SIG {
            let mut signed = c;
            if let (Some(crc32), Some(cs), Some(us)) = (signed.u32(), signed.u32(), signed.u32()) {
                return Some(Self {
                    crc32,
                    compressed_size: cs,
                    uncompressed_size: us,
                    signed: true,
                });
            }
        }
        let compressed_size = c.u32()?;
        let uncompressed_size = c.u32()?;
        Some(Self {
            crc32: first,
            compressed_size,
            uncompressed_size,
            signed: false,
        })
    }

    pub fn record_len(&self) -> u64 {
        if self.signed { 16 } else { 12 }
    }

    pub fn matches(&self, crc32: u32, compressed: u32, uncompressed: u32) -> bool {
        self.crc32 == crc32
            && self.compressed_size == compressed
            && self.uncompressed_size == uncompressed
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        if self.signed {
            w.write_all(&DD_SIG.to_le_bytes())?;
        }
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&self.compressed_size.to_le_bytes())?;
        w.write_all(&self.uncompressed_size.to_le_bytes())?;
        Ok(())
    }
}
