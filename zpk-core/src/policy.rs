use serde::{Deserialize, Serialize};

/// Resource limits and rule relaxations applied while opening a package.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub max_entries: u64,
    /// Largest uncompressed size accepted for a single entry.
    pub max_entry_size: u64,
    /// Reject entries whose uncompressed/compressed ratio exceeds this.
    pub max_ratio: u64,
    pub max_source_size: u64,
    /// Accept entries written with a trailing data descriptor, provided the
    /// descriptor agrees with the central directory.
    pub allow_data_descriptors: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_entries: 65_535,
            max_entry_size: 1 << 30,
            max_ratio: 1000,
            max_source_size: 4 << 30,
            allow_data_descriptors: false,
        }
    }
}
