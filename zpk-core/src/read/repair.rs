//! Best-effort recovery for streams the strict gate rejected.
//!
//! The central directory is ignored. The scanner walks the stream looking for
//! local file headers, works out where each entry's data ends, and keeps the
//! entries whose content decodes and checksums correctly.

use crate::codec::CompressionMethod;
use crate::codec::deflate::{InflateExtent, Inflater};
use crate::container::descriptor::{DD_SIG, DataDescriptor};
use crate::container::extra::{self, ZIP64_EXTRA_ID};
use crate::container::lfh::{FLAG_ENCRYPTED, LFH_SIG, LocalFileHeader};
use crate::defect::{Defect, DefectKind};
use crate::domain::EntryRecord;
use crate::gate::path::{check_path, decode_name, normalize_lenient};
use crate::gate::rules::RuleSet;
use crate::observer::panic_message;
use crate::policy::Policy;
use crate::util::le::find_signature;
use flate2::Crc;
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::debug;

/// A local header the scanner found but could not use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dropped {
    pub name: Option<String>,
    pub offset: u64,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct RepairOutcome {
    /// Surviving entries in stream order.
    pub entries: Vec<EntryRecord>,
    pub dropped: Vec<Dropped>,
}

/// Run the scanner. Fails with `NoEntries` when nothing survives; a panic
/// inside the scanner is reported the same way instead of unwinding.
pub fn recover(buf: &[u8], rules: &RuleSet, policy: &Policy) -> Result<RepairOutcome, Defect> {
    let outcome = catch_unwind(AssertUnwindSafe(|| scan(buf, rules, policy))).map_err(|p| {
        Defect::new(
            DefectKind::NoEntries,
            format!("repair aborted: {}", panic_message(&*p)),
        )
    })?;
    if outcome.entries.is_empty() {
        return Err(Defect::new(
            DefectKind::NoEntries,
            format!("no recoverable entries ({} dropped)", outcome.dropped.len()),
        ));
    }
    Ok(outcome)
}

// Bytes the scanner may read per input byte, across every attempt.
const SCAN_PASSES: u64 = 8;
const SCAN_SLACK: u64 = 1 << 20;

/// Work the scanner may still spend. Nested or repeated headers make the
/// same bytes look like many candidates; charging every byte read or
/// inflated keeps a pass linear in the input length.
struct Budget {
    input: u64,
    output: u64,
}

impl Budget {
    fn new(len: usize, policy: &Policy) -> Self {
        let len = len as u64;
        Self {
            input: len.saturating_mul(SCAN_PASSES).saturating_add(SCAN_SLACK),
            output: len
                .saturating_mul(policy.max_ratio.max(1))
                .saturating_add(SCAN_SLACK),
        }
    }

    fn exhausted(&self) -> bool {
        self.input == 0 || self.output == 0
    }

    /// Longest prefix of `data` that may still be read.
    fn window<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let n = usize::try_from(self.input).unwrap_or(usize::MAX);
        &data[..data.len().min(n)]
    }

    fn spend(&mut self, read: u64, produced: u64) {
        self.input = self.input.saturating_sub(read);
        self.output = self.output.saturating_sub(produced);
    }

    fn inflate(&mut self, inf: &mut Inflater, data: &[u8], limit: u64) -> Option<InflateExtent> {
        let limit = limit.min(self.output);
        match inf.extent(self.window(data), limit) {
            Ok(ext) => {
                self.spend(ext.consumed, ext.produced);
                Some(ext)
            }
            Err(stop) => {
                self.spend(stop.consumed, stop.produced);
                None
            }
        }
    }
}

struct Scanner<'a> {
    buf: &'a [u8],
    policy: &'a Policy,
    budget: Budget,
    inflater: Inflater,
}

fn scan(buf: &[u8], rules: &RuleSet, policy: &Policy) -> RepairOutcome {
    let mut out = RepairOutcome::default();
    let mut names: HashSet<String> = HashSet::new();
    let mut folded: HashSet<String> = HashSet::new();
    let mut sc = Scanner {
        buf,
        policy,
        budget: Budget::new(buf.len(), policy),
        inflater: Inflater::new(),
    };

    let mut pos = 0usize;
    while let Some(off) = find_signature(buf, pos, LFH_SIG) {
        if out.entries.len() as u64 >= policy.max_entries {
            debug!(off, "entry limit reached, stopping scan");
            break;
        }
        if sc.budget.exhausted() {
            debug!(off, "scan budget spent, stopping scan");
            break;
        }
        let lfh = match LocalFileHeader::parse(buf, off) {
            Some(Ok(l)) => l,
            _ => {
                pos = off + 4;
                continue;
            }
        };
        sc.budget.spend(lfh.record_len(), 0);

        let rec = match sc.candidate(off, &lfh) {
            Ok(r) => r,
            Err((name, reason)) => {
                debug!(off, reason = %reason, "dropping header");
                out.dropped.push(Dropped {
                    name,
                    offset: off as u64,
                    reason,
                });
                pos = off + 4;
                continue;
            }
        };
        pos = rec.region_end as usize;

        let reject = if names.contains(&rec.name) {
            Some("duplicate name")
        } else if rules.case_insensitive_names && folded.contains(&rec.name.to_ascii_lowercase()) {
            Some("name differs from an earlier entry only in case")
        } else {
            None
        };
        if let Some(reason) = reject {
            out.dropped.push(Dropped {
                name: Some(rec.name),
                offset: off as u64,
                reason: reason.to_string(),
            });
            continue;
        }

        debug!(name = %rec.name, off, end = rec.region_end, "recovered");
        names.insert(rec.name.clone());
        folded.insert(rec.name.to_ascii_lowercase());
        out.entries.push(rec);
    }
    out
}

type Rejection = (Option<String>, String);

fn recovered_name(lfh: &LocalFileHeader) -> Result<String, Rejection> {
    let decoded = decode_name(&lfh.name, lfh.flags, &lfh.extra)
        .ok()
        .or_else(|| {
            extra::unicode_path(&lfh.extra)
                .and_then(|u| std::str::from_utf8(u.name).ok().map(str::to_string))
        })
        .or_else(|| String::from_utf8(lfh.name.clone()).ok());
    let Some(raw) = decoded else {
        return Err((None, "undecodable name".into()));
    };
    let Some(name) = normalize_lenient(&raw) else {
        return Err((Some(raw), "name cannot be normalized".into()));
    };
    if let Err(d) = check_path(&name) {
        return Err((Some(raw), d.detail));
    }
    Ok(name)
}

impl Scanner<'_> {
    /// Work out where the entry at `off` ends and check its content.
    fn candidate(&mut self, off: usize, lfh: &LocalFileHeader) -> Result<EntryRecord, Rejection> {
        let name = recovered_name(lfh)?;
        let reject = |reason: &str| Err((Some(name.clone()), reason.to_string()));
        let (buf, policy) = (self.buf, self.policy);

        if lfh.flags & FLAG_ENCRYPTED != 0 {
            return reject("encrypted");
        }
        let Some(method) = CompressionMethod::from_u16(lfh.method) else {
            return reject("unsupported compression method");
        };
        if lfh.compressed_size == u32::MAX
            || lfh.uncompressed_size == u32::MAX
            || extra::has_field(&lfh.extra, ZIP64_EXTRA_ID)
        {
            return reject("zip64 entry");
        }

        let data_offset = off + lfh.record_len() as usize;
        if data_offset > buf.len() {
            return reject("header runs past end of input");
        }
        let data = &buf[data_offset..];

        let (crc32, csize, ulen, region_len) = if lfh.has_data_descriptor() {
            match method {
                CompressionMethod::Deflated => {
                    let limit = policy.max_entry_size;
                    let Some(ext) = self.budget.inflate(&mut self.inflater, data, limit) else {
                        return reject("deflate stream does not terminate");
                    };
                    let mut region = ext.consumed;
                    let dd_at = data_offset + ext.consumed as usize;
                    if let Some(dd) = DataDescriptor::parse(buf, dd_at) {
                        let sizes_fit = u32::try_from(ext.consumed)
                            .ok()
                            .zip(u32::try_from(ext.produced).ok())
                            .is_some_and(|(c, u)| dd.matches(ext.crc32, c, u));
                        if sizes_fit {
                            region += dd.record_len();
                        }
                    }
                    (ext.crc32, ext.consumed, ext.produced, region)
                }
                CompressionMethod::Stored => match self.stored_extent(data_offset) {
                    Some((dd, len)) => (dd.crc32, len, len, len + dd.record_len()),
                    None => return reject("no matching data descriptor"),
                },
            }
        } else {
            let csize = u64::from(lfh.compressed_size);
            let ulen = u64::from(lfh.uncompressed_size);
            let Some(payload) = data.get(..csize as usize) else {
                return reject("entry data runs past end of input");
            };
            if ulen > policy.max_entry_size {
                return reject("entry exceeds size limit");
            }
            if csize > 0 && ulen / csize > policy.max_ratio {
                return reject("compression ratio exceeds limit");
            }
            match method {
                CompressionMethod::Stored => {
                    if csize != ulen {
                        return reject("stored sizes differ");
                    }
                    if csize > self.budget.input {
                        self.budget.spend(u64::MAX, 0);
                        return reject("scan budget spent");
                    }
                    self.budget.spend(csize, 0);
                    let mut crc = Crc::new();
                    crc.update(payload);
                    if crc.sum() != lfh.crc32 {
                        return reject("crc mismatch");
                    }
                }
                CompressionMethod::Deflated => {
                    match self.budget.inflate(&mut self.inflater, payload, ulen) {
                        Some(ext) if ext.produced == ulen && ext.crc32 == lfh.crc32 => {}
                        Some(_) => return reject("crc or size mismatch"),
                        None => return reject("corrupt deflate stream"),
                    }
                }
            }
            (lfh.crc32, csize, ulen, csize)
        };

        if ulen > policy.max_entry_size {
            return reject("entry exceeds size limit");
        }
        if csize > 0 && ulen / csize > policy.max_ratio {
            return reject("compression ratio exceeds limit");
        }

        let data_offset = data_offset as u64;
        Ok(EntryRecord {
            name,
            method,
            flags: lfh.flags,
            crc32,
            compressed_size: csize,
            uncompressed_size: ulen,
            header_offset: off as u64,
            data_offset,
            region_end: data_offset + region_len,
            mod_time: lfh.mod_time,
            mod_date: lfh.mod_date,
        })
    }

    /// Stored data has no end marker: find the first signed descriptor whose
    /// sizes equal its distance from `start` and whose CRC matches the bytes.
    /// The search stops at the next local header signature.
    fn stored_extent(&mut self, start: usize) -> Option<(DataDescriptor, u64)> {
        let rest = self.budget.window(self.buf.get(start..)?);
        let end = find_signature(rest, 0, LFH_SIG).unwrap_or(rest.len());
        self.budget.spend(end as u64, 0);
        let area = &rest[..end];

        let mut crc = Crc::new();
        let mut hashed = 0usize;
        let mut p = 0usize;
        while let Some(q) = find_signature(area, p, DD_SIG) {
            let len = q as u64;
            if len > self.policy.max_entry_size {
                return None;
            }
            if let Some(dd) = DataDescriptor::parse(self.buf, start + q) {
                if dd.signed
                    && u64::from(dd.compressed_size) == len
                    && u64::from(dd.uncompressed_size) == len
                {
                    crc.update(&area[hashed..q]);
                    hashed = q;
                    if crc.sum() == dd.crc32 {
                        return Some((dd, len));
                    }
                }
            }
            p = q + 1;
        }
        None
    }
}
