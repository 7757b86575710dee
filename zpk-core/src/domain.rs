use crate::codec::CompressionMethod;

/// One package entry as resolved by the gate or the repair scanner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryRecord {
    pub name: String,
    pub method: CompressionMethod,
    pub flags: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Offset of the local file header.
    pub header_offset: u64,
    /// Offset of the first byte of entry data.
    pub data_offset: u64,
    /// End of the entry's region, including any data descriptor.
    pub region_end: u64,
    pub mod_time: u16,
    pub mod_date: u16,
}

impl EntryRecord {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn data_range(&self) -> std::ops::Range<u64> {
        self.data_offset..self.data_offset + self.compressed_size
    }
}
