use crate::error::Result;
use std::io::{Read, Write};

/// ZIP compression method identifiers understood by the loader.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    Stored = 0,
    Deflated = 8,
}

impl CompressionMethod {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(CompressionMethod::Stored),
            8 => Some(CompressionMethod::Deflated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressionMethod::Stored => "stored",
            CompressionMethod::Deflated => "deflated",
        }
    }
}

pub trait Compressor: Send + Sync {
    fn id(&self) -> CompressionMethod;
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: u32) -> Result<u64>;
    /// Streaming reader that decodes `data`, the raw entry payload.
    fn decoder<'a>(&self, data: &'a [u8]) -> Box<dyn Read + Send + 'a>;
}

pub fn compressor_for(method: CompressionMethod) -> &'static dyn Compressor {
    match method {
        CompressionMethod::Stored => &store::Store,
        CompressionMethod::Deflated => &deflate::DeflateCompressor,
    }
}

/// Decoding reader over the raw entry bytes.
pub fn reader_for<'a>(method: CompressionMethod, data: &'a [u8]) -> Box<dyn Read + Send + 'a> {
    compressor_for(method).decoder(data)
}

pub mod deflate;
pub mod store;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressors_round_trip() {
        let plain = b"<w:t>round trip</w:t>".repeat(32);
        for method in [CompressionMethod::Stored, CompressionMethod::Deflated] {
            let c = compressor_for(method);
            assert_eq!(c.id(), method);
            let mut packed = Vec::new();
            assert_eq!(c.compress(&mut &plain[..], &mut packed, 6).unwrap(), plain.len() as u64);
            let mut streamed = Vec::new();
            reader_for(method, &packed).read_to_end(&mut streamed).unwrap();
            assert_eq!(streamed, plain);
        }
    }

    #[test]
    fn only_stored_and_deflated_are_known() {
        assert_eq!(CompressionMethod::from_u16(0), Some(CompressionMethod::Stored));
        assert_eq!(CompressionMethod::from_u16(8), Some(CompressionMethod::Deflated));
        assert_eq!(CompressionMethod::from_u16(12), None);
        assert_eq!(CompressionMethod::from_u16(93), None);
    }
}
