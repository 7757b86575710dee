use std::path::PathBuf;

use crate::error::{Result, ZpkError};
use crate::source::PackageSource;
use crate::source_fs::FsSource;

/// Turn a `file:` URL or a plain path into a filesystem path.
pub fn resolve_url(url: &str) -> Result<PathBuf> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ZpkError::InvalidUrl("empty url".into()));
    }

    let rest = if let Some(r) = strip_prefix_ci(url, "file://") {
        // file://localhost/x and file:///x name the same path
        let r = strip_prefix_ci(r, "localhost").unwrap_or(r);
        if !r.starts_with('/') {
            return Err(ZpkError::InvalidUrl(format!("{url}: remote hosts are not supported")));
        }
        r
    } else if let Some(r) = strip_prefix_ci(url, "file:") {
        r
    } else if let Some((scheme, _)) = url.split_once("://") {
        return Err(ZpkError::InvalidUrl(format!("unsupported scheme \"{scheme}\"")));
    } else {
        return Ok(PathBuf::from(url));
    };

    let decoded = urlencoding::decode(rest)
        .map_err(|e| ZpkError::InvalidUrl(format!("{url}: {e}")))?;
    if decoded.is_empty() {
        return Err(ZpkError::InvalidUrl(format!("{url}: no path")));
    }
    Ok(PathBuf::from(decoded.into_owned()))
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

pub fn open_source(url: &str) -> Result<Box<dyn PackageSource>> {
    Ok(Box::new(FsSource::new(resolve_url(url)?)))
}
