use crate::codec::{CompressionMethod, compressor_for};
use crate::container::cdir::CentralDirectoryHeader;
use crate::container::eocd::EndOfCentralDirectory;
use crate::container::lfh::{FLAG_UTF8, LocalFileHeader};
use crate::defect::{Defect, DefectKind};
use crate::error::{Result, ZpkError};
use crate::format::StorageFormat;
use crate::gate::path::check_path;
use crate::gate::rules::MIMETYPE_ENTRY;
use crate::util::counting::CountingWriter;
use flate2::Crc;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::debug;
use walkdir::WalkDir;

/// Earliest representable DOS timestamp, 1980-01-01 00:00:00.
pub const DOS_EPOCH: (u16, u16) = (0, 0x21);

const VERSION_NEEDED_STORED: u16 = 10;
const VERSION_NEEDED_DEFLATED: u16 = 20;
// Unix host, ZIP 2.0
const VERSION_MADE_BY: u16 = (3 << 8) | 20;
const DEFAULT_MIMETYPE: &str = "application/octet-stream";

#[derive(Clone, Debug)]
pub struct PackOptions {
    /// When true, every timestamp is pinned to the DOS epoch.
    pub deterministic: bool,
    /// Only accept compression if it saves at least this fraction.
    /// e.g. 0.05 means "compress only if >=5% smaller than STORE".
    pub min_gain: f32,
    pub format: StorageFormat,
    /// Deflate level, 0..=9.
    pub level: u32,
    /// Content of the `mimetype` entry when packing a `Package` and the
    /// inputs do not carry one.
    pub mimetype: Option<String>,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            deterministic: false,
            min_gain: 0.05,
            format: StorageFormat::Zip,
            level: 6,
            mimetype: None,
        }
    }
}

fn effective_min_gain(opts: &PackOptions) -> f32 {
    if opts.min_gain <= 0.0 { 0.05 } else { opts.min_gain }
}

fn should_compress(u: usize, c: usize, min_gain: f32) -> bool {
    // true if (u - c) >= u * min_gain  ⇔  c <= u * (1 - min_gain)
    u > 0 && (u as f64 - c as f64) >= (u as f64 * min_gain as f64)
}

/// Convert a UTC timestamp to the (time, date) pair stored in ZIP headers.
pub fn dos_datetime(t: OffsetDateTime) -> (u16, u16) {
    let year = t.year();
    if year < 1980 {
        return DOS_EPOCH;
    }
    let year = (year - 1980).min(127) as u16;
    let date = (year << 9) | ((u8::from(t.month()) as u16) << 5) | t.day() as u16;
    let time = ((t.hour() as u16) << 11) | ((t.minute() as u16) << 5) | (t.second() as u16 / 2);
    (time, date)
}

/// An entry whose payload has already been compressed and checksummed.
struct Prepared {
    name: String,
    method: CompressionMethod,
    crc32: u32,
    uncompressed_size: u64,
    payload: Vec<u8>,
    stamp: (u16, u16),
}

fn prepare(
    name: String,
    data: &[u8],
    force_store: bool,
    level: u32,
    min_gain: f32,
    stamp: (u16, u16),
) -> Result<Prepared> {
    let mut crc = Crc::new();
    crc.update(data);

    let mut method = CompressionMethod::Stored;
    let mut payload = Vec::with_capacity(data.len());
    if !force_store && !data.is_empty() {
        compressor_for(CompressionMethod::Deflated).compress(&mut &data[..], &mut payload, level)?;
        if should_compress(data.len(), payload.len(), min_gain) {
            method = CompressionMethod::Deflated;
        } else {
            payload.clear();
        }
    }
    if method == CompressionMethod::Stored {
        compressor_for(method).compress(&mut &data[..], &mut payload, level)?;
    }

    Ok(Prepared {
        name,
        method,
        crc32: crc.sum(),
        uncompressed_size: data.len() as u64,
        payload,
        stamp,
    })
}

fn limit(detail: String, name: &str) -> ZpkError {
    Defect::new(DefectKind::LimitExceeded, detail).entry(name).into()
}

/// Streams a well-formed archive: local headers carry final sizes, no data
/// descriptors, no Zip64 records.
pub struct PackageWriter<W: Write> {
    out: CountingWriter<W>,
    format: StorageFormat,
    deterministic: bool,
    level: u32,
    min_gain: f32,
    central: Vec<CentralDirectoryHeader>,
    names: HashSet<String>,
    folded: HashSet<String>,
}

impl<W: Write> PackageWriter<W> {
    pub fn new(inner: W, format: StorageFormat, deterministic: bool) -> Self {
        Self {
            out: CountingWriter::new(inner),
            format,
            deterministic,
            level: 6,
            min_gain: 0.05,
            central: Vec::new(),
            names: HashSet::new(),
            folded: HashSet::new(),
        }
    }

    pub fn with_options(inner: W, opts: &PackOptions) -> Self {
        let mut w = Self::new(inner, opts.format, opts.deterministic);
        w.level = opts.level.min(9);
        w.min_gain = effective_min_gain(opts);
        w
    }

    pub fn len(&self) -> usize {
        self.central.len()
    }

    pub fn is_empty(&self) -> bool {
        self.central.is_empty()
    }

    fn stamp(&self) -> (u16, u16) {
        if self.deterministic {
            DOS_EPOCH
        } else {
            dos_datetime(OffsetDateTime::now_utc())
        }
    }

    /// Compress (or store) `data` and append it as entry `name`.
    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let stamp = self.stamp();
        let force_store = self.is_mimetype(name);
        let p = prepare(name.to_string(), data, force_store, self.level, self.min_gain, stamp)?;
        self.write_prepared(p)
    }

    /// Append a directory entry. `name` gets a trailing `/` if it lacks one.
    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        let mut name = name.to_string();
        if !name.ends_with('/') {
            name.push('/');
        }
        let stamp = self.stamp();
        let p = prepare(name, &[], true, self.level, self.min_gain, stamp)?;
        self.write_prepared(p)
    }

    fn is_mimetype(&self, name: &str) -> bool {
        self.format == StorageFormat::Package && name == MIMETYPE_ENTRY
    }

    fn admit(&self, name: &str) -> Result<()> {
        check_path(name)?;
        if self.format == StorageFormat::Package && self.central.is_empty() && name != MIMETYPE_ENTRY {
            return Err(Defect::new(DefectKind::MissingMimetype, "first entry must be mimetype")
                .entry(name)
                .into());
        }
        if self.names.contains(name) {
            return Err(Defect::new(DefectKind::DuplicateEntry, "entry already written")
                .entry(name)
                .into());
        }
        if self.format == StorageFormat::OfOpXml && self.folded.contains(&name.to_ascii_lowercase()) {
            return Err(Defect::new(DefectKind::CaseCollision, "entry differs only in case")
                .entry(name)
                .into());
        }
        if self.central.len() >= usize::from(u16::MAX - 1) {
            return Err(limit("too many entries without zip64".into(), name));
        }
        Ok(())
    }

    fn write_prepared(&mut self, p: Prepared) -> Result<()> {
        self.admit(&p.name)?;

        let offset = self.out.position();
        let offset32 = u32::try_from(offset)
            .ok()
            .filter(|v| *v != u32::MAX)
            .ok_or_else(|| limit(format!("entry offset {offset} needs zip64"), &p.name))?;
        let csize = u32::try_from(p.payload.len())
            .ok()
            .filter(|v| *v != u32::MAX)
            .ok_or_else(|| limit("entry too large without zip64".into(), &p.name))?;
        let usize32 = u32::try_from(p.uncompressed_size)
            .ok()
            .filter(|v| *v != u32::MAX)
            .ok_or_else(|| limit("entry too large without zip64".into(), &p.name))?;

        let flags = if p.name.is_ascii() { 0 } else { FLAG_UTF8 };
        let version_needed = match p.method {
            CompressionMethod::Stored => VERSION_NEEDED_STORED,
            CompressionMethod::Deflated => VERSION_NEEDED_DEFLATED,
        };
        let name_bytes = p.name.as_bytes().to_vec();

        LocalFileHeader {
            version_needed,
            flags,
            method: p.method as u16,
            mod_time: p.stamp.0,
            mod_date: p.stamp.1,
            crc32: p.crc32,
            compressed_size: csize,
            uncompressed_size: usize32,
            name: name_bytes.clone(),
            extra: Vec::new(),
        }
        .write_to(&mut self.out)?;
        self.out.write_all(&p.payload)?;

        let external_attrs = if p.name.ends_with('/') {
            (0o040755 << 16) | 0x10
        } else {
            0o100644 << 16
        };
        self.central.push(CentralDirectoryHeader {
            version_made_by: VERSION_MADE_BY,
            version_needed,
            flags,
            method: p.method as u16,
            mod_time: p.stamp.0,
            mod_date: p.stamp.1,
            crc32: p.crc32,
            compressed_size: csize,
            uncompressed_size: usize32,
            disk_start: 0,
            internal_attrs: 0,
            external_attrs,
            lfh_offset: offset32,
            name: name_bytes,
            extra: Vec::new(),
            comment: Vec::new(),
        });
        debug!(name = %p.name, method = p.method.as_str(), offset, csize, "wrote entry");
        self.folded.insert(p.name.to_ascii_lowercase());
        self.names.insert(p.name);
        Ok(())
    }

    /// Write the central directory and end record; returns the sink.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.out.position();
        for h in &self.central {
            h.write_to(&mut self.out)?;
        }
        let cd_size = self.out.position() - cd_offset;
        let too_big = |what: &str| -> ZpkError {
            Defect::new(DefectKind::LimitExceeded, format!("{what} needs zip64")).into()
        };
        let cd_offset = u32::try_from(cd_offset)
            .ok()
            .filter(|v| *v != u32::MAX)
            .ok_or_else(|| too_big("central directory offset"))?;
        let cd_size = u32::try_from(cd_size)
            .ok()
            .filter(|v| *v != u32::MAX)
            .ok_or_else(|| too_big("central directory size"))?;
        let count = self.central.len() as u16;
        EndOfCentralDirectory {
            disk: 0,
            cd_disk: 0,
            disk_entries: count,
            total_entries: count,
            cd_size,
            cd_offset,
            comment: Vec::new(),
        }
        .write_to(&mut self.out)?;
        self.out.flush()?;
        Ok(self.out.into_inner())
    }
}

/// Entry name for `path` relative to the first matching root, with `/`
/// separators. A root that is itself a file contributes its file name.
fn entry_name(path: &Path, roots: &[&Path]) -> Option<String> {
    for r in roots {
        if let Ok(p) = path.strip_prefix(r) {
            let rel = if p.as_os_str().is_empty() {
                PathBuf::from(path.file_name()?)
            } else {
                p.to_path_buf()
            };
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            return Some(parts.join("/"));
        }
    }
    None
}

fn file_stamp(md: &fs::Metadata, deterministic: bool) -> (u16, u16) {
    if deterministic {
        return DOS_EPOCH;
    }
    md.modified()
        .map(|t| dos_datetime(OffsetDateTime::from(t)))
        .unwrap_or(DOS_EPOCH)
}

/// Walk `inputs` and write them into a new archive at `out`. Returns the
/// number of entries written.
pub fn pack(inputs: &[&Path], out: &Path, opts: Option<&PackOptions>) -> Result<usize> {
    let defaults = PackOptions::default();
    let opts = opts.unwrap_or(&defaults);

    let mut files: Vec<PathBuf> = Vec::new();
    let mut dirs: Vec<PathBuf> = Vec::new();
    for root in inputs {
        for e in WalkDir::new(root).follow_links(false) {
            let e = e.map_err(std::io::Error::other)?;
            let p = e.path();
            if e.file_type().is_dir() {
                dirs.push(p.to_path_buf());
            } else if e.file_type().is_file() {
                files.push(p.to_path_buf());
            }
            // symlinks are skipped
        }
    }
    dirs.sort();
    files.sort();

    let min_gain = effective_min_gain(opts);
    let level = opts.level.min(9);
    let is_package = opts.format == StorageFormat::Package;

    let prepared: Vec<Prepared> = files
        .par_iter() // In parallel, each file independent
        .filter_map(|src| entry_name(src, inputs).map(|name| (src, name)))
        .map(|(src, name)| -> Result<Prepared> {
            let md = fs::metadata(src)?;
            let data = fs::read(src)?;
            let force_store = is_package && name == MIMETYPE_ENTRY;
            let stamp = file_stamp(&md, opts.deterministic);
            prepare(name, &data, force_store, level, min_gain, stamp)
        })
        .collect::<Result<Vec<_>>>()?;

    let sink = BufWriter::new(File::create(out)?);
    let mut w = PackageWriter::with_options(sink, opts);

    let (mut mime, rest): (Vec<Prepared>, Vec<Prepared>) = prepared
        .into_iter()
        .partition(|p| is_package && p.name == MIMETYPE_ENTRY);
    if let Some(m) = mime.pop() {
        w.write_prepared(m)?;
    } else if is_package {
        let content = opts.mimetype.as_deref().unwrap_or(DEFAULT_MIMETYPE);
        let p = prepare(
            MIMETYPE_ENTRY.to_string(),
            content.as_bytes(),
            true,
            level,
            min_gain,
            w.stamp(),
        )?;
        w.write_prepared(p)?;
    }

    for d in &dirs {
        let Some(name) = entry_name(d, inputs) else {
            continue;
        };
        // a directory root contributes its contents, not itself
        if inputs.iter().any(|r| *r == d.as_path()) {
            continue;
        }
        w.add_directory(&name)?;
    }
    for p in rest {
        w.write_prepared(p)?;
    }

    let count = w.len();
    let mut sink = w.finish()?;
    sink.flush()?;
    debug!(entries = count, out = %out.display(), "pack finished");
    Ok(count)
}
