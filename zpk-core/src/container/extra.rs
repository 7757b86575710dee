use crate::util::le::LeCursor;

pub const ZIP64_EXTRA_ID: u16 = 0x0001;
pub const UNICODE_PATH_EXTRA_ID: u16 = 0x7075;

/// Iterate `(id, data)` pairs of an extra field block. Stops at the first
/// malformed record.
pub fn fields(extra: &[u8]) -> impl Iterator<Item = (u16, &[u8])> {
    let mut c = LeCursor::new(extra);
    std::iter::from_fn(move || {
        let id = c.u16()?;
        let len = c.u16()? as usize;
        let data = c.bytes(len)?;
        Some((id, data))
    })
}

pub fn has_field(extra: &[u8], id: u16) -> bool {
    fields(extra).any(|(fid, _)| fid == id)
}

/// Info-ZIP Unicode Path extra field: version 1, CRC-32 of the header name,
/// then the UTF-8 name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodePath<'a> {
    pub version: u8,
    pub name_crc32: u32,
    pub name: &'a [u8],
}

pub fn unicode_path(extra: &[u8]) -> Option<UnicodePath<'_>> {
    let (_, data) = fields(extra).find(|(id, _)| *id == UNICODE_PATH_EXTRA_ID)?;
    let mut c = LeCursor::new(data);
    let version = *c.bytes(1)?.first()?;
    let name_crc32 = c.u32()?;
    let name = c.bytes(c.remaining())?;
    Some(UnicodePath {
        version,
        name_crc32,
        name,
    })
}
