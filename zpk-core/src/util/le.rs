/// Bounds-checked little-endian reader over a byte slice.
///
/// Every accessor returns `None` instead of panicking when the slice is too
/// short; callers turn that into a truncation defect.
#[derive(Clone, Copy, Debug)]
pub struct LeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LeCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let out = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    pub fn u16(&mut self) -> Option<u16> {
        let b = self.bytes(2)?;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Option<u32> {
        let b = self.bytes(4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[inline]
pub fn le32_at(buf: &[u8], pos: usize) -> Option<u32> {
    LeCursor::at(buf, pos).u32()
}

/// First occurrence of `sig` in `buf` at or after `from`.
pub fn find_signature(buf: &[u8], from: usize, sig: u32) -> Option<usize> {
    let needle = sig.to_le_bytes();
    let hay = buf.get(from..)?;
    hay.windows(4).position(|w| w == needle).map(|p| p + from)
}
