use super::{CompressionMethod, Compressor};
use crate::error::Result;
use flate2::{Compression, Crc, Decompress, FlushDecompress, Status};
use std::io::{Read, Write};

/// Raw deflate (no zlib header), as stored in ZIP entries.
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn id(&self) -> CompressionMethod {
        CompressionMethod::Deflated
    }

    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: u32) -> Result<u64> {
        let mut enc = flate2::write::DeflateEncoder::new(dst, Compression::new(level.min(9)));
        let written_uncompressed = std::io::copy(src, &mut enc)?;
        enc.finish()?;
        Ok(written_uncompressed)
    }

    fn decoder<'a>(&self, data: &'a [u8]) -> Box<dyn Read + Send + 'a> {
        Box::new(flate2::read::DeflateDecoder::new(data))
    }
}

/// Where a deflate stream embedded in `data` ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflateExtent {
    pub consumed: u64,
    pub produced: u64,
    pub crc32: u32,
}

/// How far an inflate attempt got before it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflateStop {
    pub consumed: u64,
    pub produced: u64,
}

// Input handed to the decoder per call, so a failing call cannot hide how
// much it read.
const IN_CHUNK: usize = 64 * 1024;

/// Reusable raw-deflate scanner. Keeping one decoder and output buffer across
/// attempts makes each failed attempt cost only what it actually read.
pub struct Inflater {
    z: Decompress,
    out: Vec<u8>,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            z: Decompress::new(false),
            out: vec![0u8; 32 * 1024],
        }
    }

    /// Inflate from the start of `data` until the end-of-stream marker,
    /// without knowing the compressed length up front. Stops on corrupt
    /// input, on running out of input, or once more than `limit` bytes would
    /// be produced.
    pub fn extent(&mut self, data: &[u8], limit: u64) -> std::result::Result<InflateExtent, InflateStop> {
        self.z.reset(false);
        let mut crc = Crc::new();
        loop {
            let z = &mut self.z;
            let stop = InflateStop {
                consumed: z.total_in(),
                produced: z.total_out(),
            };
            let in_pos = usize::try_from(z.total_in()).map_err(|_| stop)?;
            let input = data.get(in_pos..).ok_or(stop)?;
            let input = &input[..input.len().min(IN_CHUNK)];
            let before_out = z.total_out();
            let before_in = z.total_in();
            let status = z.decompress(input, &mut self.out, FlushDecompress::None);
            let stop = InflateStop {
                consumed: z.total_in(),
                produced: z.total_out(),
            };
            let status = status.map_err(|_| stop)?;
            let produced = (z.total_out() - before_out) as usize;
            crc.update(&self.out[..produced]);
            if z.total_out() > limit {
                return Err(stop);
            }
            match status {
                Status::StreamEnd => {
                    return Ok(InflateExtent {
                        consumed: z.total_in(),
                        produced: z.total_out(),
                        crc32: crc.sum(),
                    });
                }
                Status::Ok | Status::BufError => {
                    // no progress in either direction means the input is exhausted
                    if produced == 0 && z.total_in() == before_in {
                        return Err(stop);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        DeflateCompressor
            .compress(&mut &data[..], &mut out, 6)
            .unwrap();
        out
    }

    #[test]
    fn compress_then_decode() {
        let data = b"<w:document>hello hello hello hello</w:document>".repeat(20);
        let packed = deflate(&data);
        assert!(packed.len() < data.len());
        let mut back = Vec::new();
        DeflateCompressor
            .decoder(&packed)
            .read_to_end(&mut back)
            .unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn extent_stops_at_end_of_stream() {
        let data = b"abcabcabcabc-payload".repeat(100);
        let mut packed = deflate(&data);
        let real_len = packed.len() as u64;
        packed.extend_from_slice(b"PK\x07\x08trailing");
        let ext = Inflater::new().extent(&packed, u64::MAX).unwrap();
        assert_eq!(ext.consumed, real_len);
        assert_eq!(ext.produced, data.len() as u64);
        let mut crc = Crc::new();
        crc.update(&data);
        assert_eq!(ext.crc32, crc.sum());
    }

    #[test]
    fn extent_respects_limit_and_truncation() {
        let data = vec![0u8; 100_000];
        let packed = deflate(&data);
        let stop = Inflater::new().extent(&packed, 1000).unwrap_err();
        assert!(stop.produced > 1000);
        let half = &packed[..packed.len() / 2];
        let stop = Inflater::new().extent(half, u64::MAX).unwrap_err();
        assert!(stop.consumed <= half.len() as u64);
        assert!(Inflater::new().extent(&[0xff, 0xff, 0xff], u64::MAX).is_err());
    }

    #[test]
    fn reused_inflater_starts_fresh() {
        let data = b"reuse me ".repeat(500);
        let packed = deflate(&data);
        let mut inf = Inflater::new();
        assert!(inf.extent(&packed[..10], u64::MAX).is_err());
        let ext = inf.extent(&packed, u64::MAX).unwrap();
        assert_eq!(ext.consumed, packed.len() as u64);
        assert_eq!(ext.produced, data.len() as u64);
    }
}
