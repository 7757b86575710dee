//! Strict structural validation of a ZIP byte stream against the rule set of
//! a declared storage format. Anything that is not exactly one well-formed
//! archive is reported as a [`Defect`].

pub mod path;
pub mod rules;

use crate::codec::CompressionMethod;
use crate::container::cdir::CentralDirectoryHeader;
use crate::container::descriptor::DataDescriptor;
use crate::container::eocd::{self, EOCD_SIG, EndOfCentralDirectory};
use crate::container::extra::{self, ZIP64_EXTRA_ID};
use crate::container::lfh::{FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED, LocalFileHeader};
use crate::defect::{Defect, DefectKind};
use crate::domain::EntryRecord;
use crate::policy::Policy;
use crate::util::le::find_signature;
use rules::{MIMETYPE_ENTRY, RuleSet};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Result of a successful inspection.
#[derive(Clone, Debug)]
pub struct Layout {
    /// Entries in central directory order.
    pub entries: Vec<EntryRecord>,
    pub cd_offset: u64,
    pub cd_size: u64,
    pub eocd_offset: u64,
    pub comment: Vec<u8>,
}

pub fn inspect(buf: &[u8], rules: &RuleSet, policy: &Policy) -> Result<Layout, Defect> {
    let len = buf.len() as u64;
    if len > policy.max_source_size {
        return Err(Defect::new(
            DefectKind::LimitExceeded,
            format!("source is {len} bytes, limit {}", policy.max_source_size),
        ));
    }

    let (eocd_off, eocd) = locate_end(buf)?;
    debug!(
        eocd_off,
        entries = eocd.total_entries,
        cd_offset = eocd.cd_offset,
        cd_size = eocd.cd_size,
        "end of central directory"
    );
    let cd_offset = u64::from(eocd.cd_offset);
    let cd_size = u64::from(eocd.cd_size);

    let headers = read_directory(buf, &eocd, eocd_off as u64, policy)?;

    let mut names: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut folded: HashMap<String, String> = HashMap::new();
    let mut entries = Vec::with_capacity(headers.len());
    for (cd_pos, h) in &headers {
        let name = path::decode_name(&h.name, h.flags, &h.extra).map_err(|d| d.at(*cd_pos))?;
        let at = |kind, detail: String| Defect::new(kind, detail).entry(name.clone()).at(*cd_pos);

        if h.needs_zip64() || extra::has_field(&h.extra, ZIP64_EXTRA_ID) {
            return Err(at(DefectKind::Zip64, "zip64 fields in central directory".into()));
        }
        if h.disk_start != 0 {
            return Err(at(DefectKind::MultiDisk, format!("entry starts on disk {}", h.disk_start)));
        }
        if h.flags & FLAG_ENCRYPTED != 0 {
            return Err(at(DefectKind::Encrypted, "entry is encrypted".into()));
        }
        let method = CompressionMethod::from_u16(h.method)
            .ok_or_else(|| at(DefectKind::UnsupportedMethod, format!("method {}", h.method)))?;

        path::check_path(&name).map_err(|d| d.at(*cd_pos))?;

        if !names.insert(name.clone()) {
            return Err(at(DefectKind::DuplicateEntry, "name appears twice in central directory".into()));
        }
        if rules.case_insensitive_names {
            if let Some(prev) = folded.insert(name.to_ascii_lowercase(), name.clone()) {
                return Err(at(DefectKind::CaseCollision, format!("collides with \"{prev}\"")));
            }
        }

        if h.flags & FLAG_DATA_DESCRIPTOR != 0 {
            let stored = method == CompressionMethod::Stored;
            let allowed =
                policy.allow_data_descriptors && (!stored || rules.stored_descriptors);
            if !allowed {
                let kind = if stored {
                    DefectKind::DataDescriptorStored
                } else {
                    DefectKind::DataDescriptorDeflated
                };
                return Err(at(kind, format!("data descriptor not allowed for {}", rules.format)));
            }
        }

        check_sizes(h, method, policy).map_err(|d| d.entry(name.clone()).at(*cd_pos))?;

        let rec = resolve_local(buf, h, method, name.clone(), cd_offset)?;
        debug!(
            name = %rec.name,
            method = method.as_str(),
            header_offset = rec.header_offset,
            region_end = rec.region_end,
            "entry"
        );
        entries.push(rec);
    }

    check_layout(&entries, cd_offset)?;

    if rules.require_mimetype {
        let first = entries.iter().min_by_key(|e| e.header_offset);
        match first {
            Some(e) if e.name == MIMETYPE_ENTRY && e.method == CompressionMethod::Stored => {}
            Some(e) => {
                return Err(Defect::new(
                    DefectKind::MissingMimetype,
                    "first entry must be a stored mimetype",
                )
                .entry(e.name.clone()));
            }
            None => {
                return Err(Defect::new(DefectKind::MissingMimetype, "package has no entries"));
            }
        }
    }

    Ok(Layout {
        entries,
        cd_offset,
        cd_size,
        eocd_offset: eocd_off as u64,
        comment: eocd.comment,
    })
}

fn locate_end(buf: &[u8]) -> Result<(usize, EndOfCentralDirectory), Defect> {
    let Some((eocd_off, eocd)) = eocd::locate(buf) else {
        if find_signature(buf, 0, EOCD_SIG).is_some() {
            return Err(Defect::new(
                DefectKind::ConcatenatedArchive,
                "trailing bytes after end of central directory",
            ));
        }
        return Err(Defect::new(
            DefectKind::Truncated,
            "end of central directory record not found",
        ));
    };

    if eocd.needs_zip64() || eocd::has_zip64_trailer(buf, eocd_off) {
        return Err(Defect::new(DefectKind::Zip64, "zip64 end of central directory").at(eocd_off as u64));
    }
    if eocd.disk != 0 || eocd.cd_disk != 0 || eocd.disk_entries != eocd.total_entries {
        return Err(Defect::new(DefectKind::MultiDisk, "archive spans several disks").at(eocd_off as u64));
    }

    let cd_end = u64::from(eocd.cd_offset) + u64::from(eocd.cd_size);
    let end_at = eocd_off as u64;
    if cd_end > end_at {
        return Err(Defect::new(
            DefectKind::Truncated,
            format!("central directory ends at {cd_end}, past the end record at {end_at}"),
        ));
    }
    if cd_end < end_at {
        // Another archive (or its tail) precedes the directory we found.
        return Err(Defect::new(
            DefectKind::ConcatenatedArchive,
            format!("{} bytes between central directory and end record", end_at - cd_end),
        )
        .at(cd_end));
    }
    Ok((eocd_off, eocd))
}

fn read_directory(
    buf: &[u8],
    eocd: &EndOfCentralDirectory,
    cd_end: u64,
    policy: &Policy,
) -> Result<Vec<(u64, CentralDirectoryHeader)>, Defect> {
    let total = u64::from(eocd.total_entries);
    if total > policy.max_entries {
        return Err(Defect::new(
            DefectKind::LimitExceeded,
            format!("{total} entries, limit {}", policy.max_entries),
        ));
    }

    let mut out = Vec::with_capacity(total as usize);
    let mut pos = u64::from(eocd.cd_offset);
    while pos < cd_end {
        let h = match CentralDirectoryHeader::parse(buf, pos as usize) {
            None => {
                return Err(Defect::new(DefectKind::Truncated, "central directory header cut short").at(pos));
            }
            Some(Err(sig)) => {
                return Err(Defect::new(
                    DefectKind::BadSignature,
                    format!("expected central directory header, found {sig:#010x}"),
                )
                .at(pos));
            }
            Some(Ok(h)) => h,
        };
        let next = pos + h.record_len();
        if next > cd_end {
            return Err(Defect::new(
                DefectKind::Truncated,
                "central directory header runs past the directory",
            )
            .at(pos));
        }
        out.push((pos, h));
        if out.len() as u64 > total {
            break;
        }
        pos = next;
    }

    if out.len() as u64 != total {
        return Err(Defect::new(
            DefectKind::EntryCountMismatch,
            format!("end record declares {total} entries, directory holds {}", out.len()),
        ));
    }
    Ok(out)
}

fn check_sizes(
    h: &CentralDirectoryHeader,
    method: CompressionMethod,
    policy: &Policy,
) -> Result<(), Defect> {
    let u = u64::from(h.uncompressed_size);
    let c = u64::from(h.compressed_size);
    if u > policy.max_entry_size {
        return Err(Defect::new(
            DefectKind::LimitExceeded,
            format!("uncompressed size {u}, limit {}", policy.max_entry_size),
        ));
    }
    match method {
        CompressionMethod::Stored if u != c => Err(Defect::new(
            DefectKind::SizeMismatch,
            format!("stored entry with compressed size {c} and uncompressed size {u}"),
        )),
        CompressionMethod::Deflated if c == 0 => Err(Defect::new(
            DefectKind::SizeMismatch,
            "deflated entry without compressed data",
        )),
        CompressionMethod::Deflated if u / c > policy.max_ratio => Err(Defect::new(
            DefectKind::LimitExceeded,
            format!("compression ratio {} exceeds {}", u / c, policy.max_ratio),
        )),
        _ => Ok(()),
    }
}

/// Parse the local header an entry points to and cross-check it against the
/// central directory.
fn resolve_local(
    buf: &[u8],
    h: &CentralDirectoryHeader,
    method: CompressionMethod,
    name: String,
    cd_offset: u64,
) -> Result<EntryRecord, Defect> {
    let lfh_off = u64::from(h.lfh_offset);
    let fail = |kind, detail: &str| Err(Defect::new(kind, detail).entry(name.clone()).at(lfh_off));

    if lfh_off >= cd_offset {
        return fail(DefectKind::OverlappingEntries, "local header inside the central directory");
    }
    let lfh = match LocalFileHeader::parse(buf, lfh_off as usize) {
        None => return fail(DefectKind::Truncated, "local header cut short"),
        Some(Err(_)) => return fail(DefectKind::BadSignature, "expected local file header"),
        Some(Ok(l)) => l,
    };

    if lfh.name != h.name {
        return fail(DefectKind::HeaderMismatch, "local header names a different entry");
    }
    if lfh.method != h.method {
        return fail(DefectKind::HeaderMismatch, "local header compression method differs");
    }
    if (lfh.flags ^ h.flags) & (FLAG_DATA_DESCRIPTOR | FLAG_ENCRYPTED) != 0 {
        return fail(DefectKind::HeaderMismatch, "local header flags differ");
    }
    if lfh.compressed_size == u32::MAX
        || lfh.uncompressed_size == u32::MAX
        || extra::has_field(&lfh.extra, ZIP64_EXTRA_ID)
    {
        return fail(DefectKind::Zip64, "zip64 fields in local header");
    }

    let data_offset = lfh_off + lfh.record_len();
    let data_end = data_offset + u64::from(h.compressed_size);
    let region_end = if lfh.has_data_descriptor() {
        let zero_or = |v: u32, want: u32| v == 0 || v == want;
        if !zero_or(lfh.crc32, h.crc32)
            || !zero_or(lfh.compressed_size, h.compressed_size)
            || !zero_or(lfh.uncompressed_size, h.uncompressed_size)
        {
            return fail(DefectKind::HeaderMismatch, "local header sizes differ");
        }
        let Some(dd) = DataDescriptor::parse(buf, data_end as usize) else {
            return fail(DefectKind::Truncated, "data descriptor cut short");
        };
        if !dd.matches(h.crc32, h.compressed_size, h.uncompressed_size) {
            return fail(DefectKind::HeaderMismatch, "data descriptor disagrees with central directory");
        }
        data_end + dd.record_len()
    } else {
        if lfh.crc32 != h.crc32
            || lfh.compressed_size != h.compressed_size
            || lfh.uncompressed_size != h.uncompressed_size
        {
            return fail(DefectKind::HeaderMismatch, "local header sizes differ");
        }
        data_end
    };

    if region_end > cd_offset {
        return fail(DefectKind::OverlappingEntries, "entry data runs into the central directory");
    }

    Ok(EntryRecord {
        name,
        method,
        flags: h.flags,
        crc32: h.crc32,
        compressed_size: u64::from(h.compressed_size),
        uncompressed_size: u64::from(h.uncompressed_size),
        header_offset: lfh_off,
        data_offset,
        region_end,
        mod_time: h.mod_time,
        mod_date: h.mod_date,
    })
}

/// Entries must tile the bytes from offset zero up to the central directory:
/// no leading data, no gaps, no overlaps.
fn check_layout(entries: &[EntryRecord], cd_offset: u64) -> Result<(), Defect> {
    let mut order: Vec<&EntryRecord> = entries.iter().collect();
    order.sort_by_key(|e| e.header_offset);

    let mut cursor = 0u64;
    let mut prev: Option<&EntryRecord> = None;
    for e in order {
        if e.header_offset < cursor {
            let prev_name = prev.map(|p| p.name.as_str()).unwrap_or_default();
            return Err(Defect::new(
                DefectKind::OverlappingEntries,
                format!("entry starts inside \"{prev_name}\""),
            )
            .entry(e.name.clone())
            .at(e.header_offset));
        }
        if e.header_offset > cursor {
            let gap = e.header_offset - cursor;
            let d = match prev {
                None => Defect::new(
                    DefectKind::ConcatenatedArchive,
                    format!("{gap} bytes before the first local header"),
                ),
                Some(p) => Defect::new(
                    DefectKind::InnerGap,
                    format!("{gap} unused bytes after \"{}\"", p.name),
                ),
            };
            return Err(d.entry(e.name.clone()).at(cursor));
        }
        cursor = e.region_end;
        prev = Some(e);
    }

    if cursor < cd_offset {
        let gap = cd_offset - cursor;
        let d = match prev {
            None => Defect::new(
                DefectKind::ConcatenatedArchive,
                format!("{gap} bytes before the central directory"),
            ),
            Some(p) => Defect::new(
                DefectKind::InnerGap,
                format!("{gap} unused bytes after \"{}\"", p.name),
            )
            .entry(p.name.clone()),
        };
        return Err(d.at(cursor));
    }
    Ok(())
}
