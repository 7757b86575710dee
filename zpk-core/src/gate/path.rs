use crate::container::extra;
use crate::container::lfh::FLAG_UTF8;
use crate::defect::{Defect, DefectKind};
use flate2::Crc;

/// Decode a raw entry name. Plain ASCII is always accepted; anything else
/// must be flagged UTF-8 and actually be UTF-8, and an Info-ZIP Unicode
/// Path field, when present, must agree with the header name.
pub fn decode_name(raw: &[u8], flags: u16, extra_block: &[u8]) -> Result<String, Defect> {
    let lossy = || String::from_utf8_lossy(raw).into_owned();
    if let Some(up) = extra::unicode_path(extra_block) {
        let mut crc = Crc::new();
        crc.update(raw);
        if up.version != 1 || up.name_crc32 != crc.sum() || up.name != raw {
            return Err(Defect::new(
                DefectKind::UnicodePath,
                "unicode path extra field disagrees with header name",
            )
            .entry(lossy()));
        }
    }
    if raw.is_ascii() {
        return String::from_utf8(raw.to_vec())
            .map_err(|_| Defect::new(DefectKind::UnicodePath, "name is not UTF-8"));
    }
    if flags & FLAG_UTF8 == 0 {
        return Err(Defect::new(
            DefectKind::UnicodePath,
            "non-ASCII name without the UTF-8 flag",
        )
        .entry(lossy()));
    }
    String::from_utf8(raw.to_vec()).map_err(|_| {
        Defect::new(DefectKind::UnicodePath, "name flagged UTF-8 is not UTF-8").entry(lossy())
    })
}

/// Package-relative path rules shared by every format.
pub fn check_path(name: &str) -> Result<(), Defect> {
    let err = |kind, detail: &str| Err(Defect::new(kind, detail).entry(name));
    if name.is_empty() {
        return err(DefectKind::RelativePath, "empty name");
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return err(DefectKind::AbsolutePath, "leading path separator");
    }
    let b = name.as_bytes();
    if b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':' {
        return err(DefectKind::AbsolutePath, "drive letter");
    }
    if name.contains('\\') {
        return err(DefectKind::RelativePath, "backslash separator");
    }
    if name.contains('\0') {
        return err(DefectKind::RelativePath, "NUL in name");
    }
    let body = name.strip_suffix('/').unwrap_or(name);
    for seg in body.split('/') {
        match seg {
            "" => return err(DefectKind::RelativePath, "empty path segment"),
            "." => return err(DefectKind::RelativePath, "'.' path segment"),
            ".." => return err(DefectKind::RelativePath, "'..' path segment"),
            _ => {}
        }
    }
    Ok(())
}

/// Best-effort rewrite used during repair: drop leading separators and `.`
/// segments. Names that still escape the package root are refused.
pub fn normalize_lenient(name: &str) -> Option<String> {
    let trailing_slash = name.ends_with('/');
    let mut parts = Vec::new();
    for seg in name.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\0') => return None,
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        return None;
    }
    if parts[0].len() == 2 && parts[0].ends_with(':') {
        parts.remove(0);
        if parts.is_empty() {
            return None;
        }
    }
    let mut out = parts.join("/");
    if trailing_slash {
        out.push('/');
    }
    Some(out)
}
