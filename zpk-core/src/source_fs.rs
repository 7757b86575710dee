use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::source::{PackageSource, too_large};

pub struct FsSource {
    path: PathBuf,
}

impl FsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PackageSource for FsSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self, limit: u64) -> Result<Arc<[u8]>> {
        let len = fs::metadata(&self.path)?.len();
        if len > limit {
            return Err(too_large(len, limit).into());
        }
        let bytes = fs::read(&self.path)?;
        Ok(bytes.into())
    }
}
