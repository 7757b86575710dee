use crate::util::le::LeCursor;
use std::io::Write;

pub const LFH_SIG: u32 = 0x04034b50;
pub const LFH_LEN: usize = 30;

pub const FLAG_ENCRYPTED: u16 = 0x0001;
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
pub const FLAG_UTF8: u16 = 0x0800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub mod_time: u16,
    pub mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name: Vec<u8>,
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Parse the header starting at `off`. `None` means the record does not
    /// fit in `buf`; `Some(Err(sig))` means the signature was wrong.
    pub fn parse(buf: &[u8], off: usize) -> Option<Result<Self, u32>> {
        let mut c = LeCursor::at(buf, off);
        let sig = c.u32()?;
        if sig != LFH_SIG {
            return Some(Err(sig));
        }
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
        let name = c.bytes(name_len)?.to_vec();
        let extra = c.bytes(extra_len)?.to_vec();
        Some(Ok(Self {
            version_needed,
            flags,
            method,
            mod_time,
            mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra,
        }))
    }

    pub fn record_len(&self) -> u64 {
        (LFH_LEN + self.name.len() + self.extra.len()) as u64
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(&LFH_SIG.to_le_bytes())?;
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
        w.write_all(&self.name)?;
        w.write_all(&self.extra)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LocalFileHeader {
        LocalFileHeader {
            version_needed: 20,
            flags: FLAG_UTF8,
            method: 8,
            mod_time: 0,
            mod_date: 0x21,
            crc32: 0xdeadbeef,
            compressed_size: 5,
            uncompressed_size: 9,
            name: b"content.xml".to_vec(),
            extra: vec![],
        }
    }

    #[test]
    fn written_header_parses_back() {
        let h = sample();
        let mut buf = vec![0xAA; 3];
        h.write_to(&mut buf).unwrap();
        let back = LocalFileHeader::parse(&buf, 3).unwrap().unwrap();
        assert_eq!(back, h);
        assert_eq!(back.record_len(), 41);
    }

    #[test]
    fn short_buffer_is_none_and_wrong_sig_is_err() {
        let mut buf = Vec::new();
        sample().write_to(&mut buf).unwrap();
        assert!(LocalFileHeader::parse(&buf[..20], 0).is_none());
        buf[0] = b'Q';
        assert!(matches!(LocalFileHeader::parse(&buf, 0), Some(Err(_))));
    }
}
