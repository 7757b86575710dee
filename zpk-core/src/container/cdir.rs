use crate::util::le::LeCursor;
use std::io::Write;

pub const CDH_SIG: u32 = 0x02014b50;
pub const CDH_LEN: usize = 46;

/// One central directory file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u32,
    pub name: Vec<u8>,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
}

impl CentralDirectoryHeader {
    pub fn parse(buf: &[u8], off: usize) -> Option<Result<Self, u32>> {
        let mut c = LeCursor::at(buf, off);
        let sig = c.u32()?;
        if sig != CDH_SIG {
            return Some(Err(sig));
        }
        let version_made_by = c.u16()?;
        let version_needed = c.u16()?;
        let flags = c.u16()?;
        let method = c.u16()?;
        let mod_time = c.u16()?;
        let mod_date = c.u16()?;
        let crc32 = c.u32()?;
        let compressed_size = c.u32()?;
        let uncompressed_size = c.u32()?;
        let name_len = c.u16()? as usize;
        let extra_len = c.u16()? as usize;
        let comment_len = c.u16()? as usize;
        let disk_start = c.u16()?;
        let internal_attrs = c.u16()?;
        let external_attrs = c.u32()?;
        let lfh_offset = c.u32()?;
        let name = c.bytes(name_len)?.to_vec();
        let extra = c.bytes(extra_len)?.to_vec();
        let comment = c.bytes(comment_len)?.to_vec();
        Some(Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            mod_time,
            mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start,
            internal_attrs,
            external_attrs,
            lfh_offset,
            name,
            extra,
            comment,
        }))
    }

    pub fn record_len(&self) -> u64 {
        (CDH_LEN + self.name.len() + self.extra.len() + self.comment.len()) as u64
    }

    /// Any 32-bit field pinned to its all-ones sentinel defers to a Zip64 extra field.
    pub fn needs_zip64(&self) -> bool {
        self.compressed_size == u32::MAX
            || self.uncompressed_size == u32::MAX
            || self.lfh_offset == u32::MAX
            || self.disk_start == u16::MAX
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(&CDH_SIG.to_le_bytes())?;
        w.write_all(&self.version_made_by.to_le_bytes())?;
        w.write_all(&self.version_needed.to_le_bytes())?;
        w.write_all(&self.flags.to_le_bytes())?;
        w.write_all(&self.method.to_le_bytes())?;
        w.write_all(&self.mod_time.to_le_bytes())?;
        w.write_all(&self.mod_date.to_le_bytes())?;
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&self.compressed_size.to_le_bytes())?;
        w.write_all(&self.uncompressed_size.to_le_bytes())?;
        w.write_all(&(self.name.len() as u16).to_le_bytes())?;
        w.write_all(&(self.extra.len() as u16).to_le_bytes())?;
        w.write_all(&(self.comment.len() as u16).to_le_bytes())?;
        w.write_all(&self.disk_start.to_le_bytes())?;
        w.write_all(&self.internal_attrs.to_le_bytes())?;
        w.write_all(&self.external_attrs.to_le_bytes())?;
        w.write_all(&self.lfh_offset.to_le_bytes())?;
        w.write_all(&self.name)?;
        w.write_all(&self.extra)?;
        w.write_all(&self.comment)?;
        Ok(())
    }
}
