use crate::util::le::{LeCursor, le32_at};
use std::io::Write;

pub const EOCD_SIG: u32 = 0x06054b50;
pub const EOCD_LEN: usize = 22;
pub const ZIP64_EOCD_SIG: u32 = 0x06064b50;
pub const ZIP64_LOCATOR_SIG: u32 = 0x07064b50;
pub const ZIP64_LOCATOR_LEN: usize = 20;
const MAX_COMMENT: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk: u16,
    pub cd_disk: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    pub fn parse(buf: &[u8], off: usize) -> Option<Self> {
        let mut c = LeCursor::at(buf, off);
        if c.u32()? != EOCD_SIG {
            return None;
        }
        let disk = c.u16()?;
        let cd_disk = c.u16()?;
        let disk_entries = c.u16()?;
        let total_entries = c.u16()?;
        let cd_size = c.u32()?;
        let cd_offset = c.u32()?;
        let comment_len = c.u16()? as usize;
        let comment = c.bytes(comment_len)?.to_vec();
        Some(Self {
            disk,
            cd_disk,
            disk_entries,
            total_entries,
            cd_size,
            cd_offset,
            comment,
        })
    }

    pub fn record_len(&self) -> u64 {
        (EOCD_LEN + self.comment.len()) as u64
    }

    /// Fields holding their all-ones value point at a Zip64 end record.
    pub fn needs_zip64(&self) -> bool {
        self.disk_entries == u16::MAX
            || self.total_entries == u16::MAX
            || self.cd_size == u32::MAX
            || self.cd_offset == u32::MAX
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(&EOCD_SIG.to_le_bytes())?;
        w.write_all(&self.disk.to_le_bytes())?;
        w.write_all(&self.cd_disk.to_le_bytes())?;
        w.write_all(&self.disk_entries.to_le_bytes())?;
        w.write_all(&self.total_entries.to_le_bytes())?;
        w.write_all(&self.cd_size.to_le_bytes())?;
        w.write_all(&self.cd_offset.to_le_bytes())?;
        w.write_all(&(self.comment.len() as u16).to_le_bytes())?;
        w.write_all(&self.comment)?;
        Ok(())
    }
}

/// Locate the end record by scanning back through the comment window. Only a
/// record whose comment ends exactly at end of file is accepted.
pub fn locate(buf: &[u8]) -> Option<(usize, EndOfCentralDirectory)> {
    if buf.len() < EOCD_LEN {
        return None;
    }
    let last = buf.len() - EOCD_LEN;
    let first = last.saturating_sub(MAX_COMMENT);
    for off in (first..=last).rev() {
        if le32_at(buf, off) != Some(EOCD_SIG) {
            continue;
        }
        if let Some(rec) = EndOfCentralDirectory::parse(buf, off) {
            if off as u64 + rec.record_len() == buf.len() as u64 {
                return Some((off, rec));
            }
        }
    }
    None
}

/// True when a Zip64 locator sits directly before the end record, or a Zip64
/// end record signature is found in the locator's slot or where it points.
pub fn has_zip64_trailer(buf: &[u8], eocd_off: usize) -> bool {
    let Some(loc_off) = eocd_off.checked_sub(ZIP64_LOCATOR_LEN) else {
        return false;
    };
    if le32_at(buf, loc_off) == Some(ZIP64_LOCATOR_SIG) {
        return true;
    }
    // Some writers omit the locator but still leave the 56-byte record behind.
    eocd_off
        .checked_sub(56)
        .and_then(|off| le32_at(buf, off))
        .is_some_and(|sig| sig == ZIP64_EOCD_SIG)
}
