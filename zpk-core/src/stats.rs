use crate::domain::EntryRecord;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoadStats {
    pub files: u64,
    pub dirs: u64,
    pub logical_bytes: u64,
    pub physical_bytes: u64,
    pub source_bytes: u64,
    pub compression_ratio: f32,
    pub repaired: bool,
}

impl LoadStats {
    pub fn from_entries(entries: &[EntryRecord], source_bytes: u64, repaired: bool) -> Self {
        let mut s = LoadStats {
            source_bytes,
            repaired,
            ..Default::default()
        };
        for e in entries {
            if e.is_dir() {
                s.dirs += 1;
            } else {
                s.files += 1;
            }
            s.logical_bytes += e.uncompressed_size;
            s.physical_bytes += e.compressed_size;
        }
        s.compression_ratio = if s.physical_bytes == 0 {
            1.0
        } else {
            s.logical_bytes as f32 / s.physical_bytes as f32
        };
        s
    }
}
