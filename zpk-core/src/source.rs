use crate::defect::{Defect, DefectKind};
use crate::error::Result;
use std::sync::Arc;

/// Where package bytes come from.
pub trait PackageSource: Send + Sync {
    /// Human-readable label used in logs and events.
    fn describe(&self) -> String;

    /// Load the whole source. Sources larger than `limit` bytes are refused.
    fn load(&self, limit: u64) -> Result<Arc<[u8]>>;
}

pub(crate) fn too_large(len: u64, limit: u64) -> Defect {
    Defect::new(
        DefectKind::LimitExceeded,
        format!("source is {len} bytes, limit {limit}"),
    )
}

/// Bytes already in memory.
#[derive(Clone)]
pub struct MemorySource {
    label: String,
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(label: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }
}

impl PackageSource for MemorySource {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn load(&self, limit: u64) -> Result<Arc<[u8]>> {
        let len = self.bytes.len() as u64;
        if len > limit {
            return Err(too_large(len, limit).into());
        }
        Ok(self.bytes.clone())
    }
}
