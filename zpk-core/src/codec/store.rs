use super::{CompressionMethod, Compressor};
use crate::error::Result;
use std::io::{Read, Write};

/// Method 0: bytes are kept as they are.
pub struct Store;

impl Compressor for Store {
    fn id(&self) -> CompressionMethod {
        CompressionMethod::Stored
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, _level: u32) -> Result<u64> {
        Ok(std::io::copy(src, dst)?)
    }

    fn decoder<'a>(&self, data: &'a [u8]) -> Box<dyn Read + Send + 'a> {
        Box::new(data)
    }
}
