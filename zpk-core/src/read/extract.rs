use super::opened::Package;
use crate::error::{Result, ZpkError};
use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Debug, Serialize)]
pub struct EntryDigest {
    pub name: String,
    pub size: u64,
    /// blake3 of the uncompressed content, hex encoded.
    pub blake3: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    pub entries: Vec<EntryDigest>,
    pub total_uncompressed: u64,
    pub total_compressed: u64,
    /// blake3 over every entry name and content digest, in entry order.
    pub package_digest: String,
}

/// Decode every entry, checking sizes and CRC-32, and digest the content.
pub fn verify(pkg: &Package) -> Result<VerifyReport> {
    let entries: Vec<EntryDigest> = pkg
        .entries()
        .par_iter()
        .map(|e| -> Result<EntryDigest> {
            let mut r = pkg.open_reader(&e.name)?;
            let mut h = blake3::Hasher::new();
            let mut buf = [0u8; 1 << 16];
            loop {
                let k = r.read(&mut buf).map_err(ZpkError::from_read_error)?;
                if k == 0 {
                    break;
                }
                h.update(&buf[..k]);
            }
            Ok(EntryDigest {
                name: e.name.clone(),
                size: r.bytes_read(),
                blake3: hex::encode(h.finalize().as_bytes()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut whole = blake3::Hasher::new();
    for d in &entries {
        whole.update(d.name.as_bytes());
        whole.update(&[0]);
        whole.update(d.blake3.as_bytes());
    }
    let report = VerifyReport {
        total_uncompressed: entries.iter().map(|d| d.size).sum(),
        total_compressed: pkg.entries().iter().map(|e| e.compressed_size).sum(),
        package_digest: hex::encode(whole.finalize().as_bytes()),
        entries,
    };
    info!(
        source = pkg.source(),
        entries = report.entries.len(),
        digest = %report.package_digest,
        "verified"
    );
    Ok(report)
}

/// Write every entry below `dest`. Directory entries become directories.
pub fn extract(pkg: &Package, dest: &Path) -> Result<u64> {
    fs::create_dir_all(dest)?;
    let mut written = 0u64;
    for e in pkg.entries() {
        let outp = safe_join(dest, &e.name)?;
        if e.is_dir() {
            fs::create_dir_all(&outp)?;
            continue;
        }
        if let Some(parent) = outp.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut r = pkg.open_reader(&e.name)?;
        let mut out = BufWriter::new(File::create(&outp)?);
        let n = io::copy(&mut r, &mut out).map_err(ZpkError::from_read_error)?;
        out.flush()?;
        debug!(name = %e.name, bytes = n, "extracted");
        written += n;
    }
    Ok(written)
}

fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);
    let escapes = p
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if p.is_absolute() || escapes || rel.contains('\\') {
        return Err(io::Error::other(format!("unsafe path: {rel}")).into());
    }
    Ok(root.join(p))
}
