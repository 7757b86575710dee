use super::stream::EntryReader;
use crate::codec::CompressionMethod;
use crate::defect::{Defect, DefectKind};
use crate::domain::EntryRecord;
use crate::error::{Result, ZpkError};
use crate::format::StorageFormat;
use crate::observer::{Listener, ListenerList};
use crate::stats::LoadStats;
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Notifications a package sends to its own listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PackageEvent {
    /// The package was disposed or dropped; entry handles are now dead.
    Disposed { source: String },
}

pub(crate) struct PackageInner {
    source: String,
    bytes: Arc<[u8]>,
    format: StorageFormat,
    entries: Vec<EntryRecord>,
    by_name: HashMap<String, usize>,
    // lowercase name → index, OfOpXml only
    folded: HashMap<String, usize>,
    comment: Vec<u8>,
    repaired: bool,
    disposed: AtomicBool,
    listeners: ListenerList<PackageEvent>,
}

impl PackageInner {
    fn check_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ZpkError::Disposed);
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        if let Some(&i) = self.by_name.get(name) {
            return Some(i);
        }
        if self.format == StorageFormat::OfOpXml {
            return self.folded.get(&name.to_ascii_lowercase()).copied();
        }
        None
    }

    fn data_of(&self, e: &EntryRecord) -> Result<&[u8]> {
        let r = e.data_range();
        usize::try_from(r.start)
            .ok()
            .zip(usize::try_from(r.end).ok())
            .and_then(|(s, t)| self.bytes.get(s..t))
            .ok_or_else(|| {
                Defect::new(DefectKind::Truncated, "entry data lies outside the source")
                    .entry(e.name.clone())
                    .at(r.start)
                    .into()
            })
    }

    fn reader_at(&self, i: usize) -> Result<EntryReader<'_>> {
        self.check_live()?;
        let e = &self.entries[i];
        let stored = e.method == CompressionMethod::Stored;
        if stored && e.compressed_size != e.uncompressed_size {
            return Err(Defect::new(DefectKind::SizeMismatch, "stored entry sizes differ")
                .entry(e.name.clone())
                .into());
        }
        Ok(EntryReader::new(e, self.data_of(e)?))
    }

    fn read_at(&self, i: usize) -> Result<Vec<u8>> {
        let mut r = self.reader_at(i)?;
        let cap = self.entries[i].uncompressed_size.min(1 << 20) as usize;
        let mut out = Vec::with_capacity(cap);
        r.read_to_end(&mut out).map_err(ZpkError::from_read_error)?;
        Ok(out)
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(source = %self.source, "package disposed");
        self.listeners.dispose(&PackageEvent::Disposed {
            source: self.source.clone(),
        });
    }
}

/// An opened package. Owns the source bytes and the resolved entry table.
pub struct Package {
    inner: Arc<PackageInner>,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("source", &self.inner.source)
            .field("format", &self.inner.format)
            .field("entries", &self.inner.entries.len())
            .field("repaired", &self.inner.repaired)
            .finish()
    }
}

impl Package {
    pub(crate) fn new(
        source: String,
        bytes: Arc<[u8]>,
        format: StorageFormat,
        entries: Vec<EntryRecord>,
        comment: Vec<u8>,
        repaired: bool,
    ) -> Self {
        let by_name = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        let folded = if format == StorageFormat::OfOpXml {
            entries
                .iter()
                .enumerate()
                .map(|(i, e)| (e.name.to_ascii_lowercase(), i))
                .collect()
        } else {
            HashMap::new()
        };
        Self {
            inner: Arc::new(PackageInner {
                source,
                bytes,
                format,
                entries,
                by_name,
                folded,
                comment,
                repaired,
                disposed: AtomicBool::new(false),
                listeners: ListenerList::new(),
            }),
        }
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn format(&self) -> StorageFormat {
        self.inner.format
    }

    /// True when the package came out of the repair scanner rather than the
    /// strict path.
    pub fn is_repaired(&self) -> bool {
        self.inner.repaired
    }

    pub fn comment(&self) -> &[u8] {
        &self.inner.comment
    }

    pub fn entries(&self) -> &[EntryRecord] {
        &self.inner.entries
    }

    /// Look up an entry. Under `OfOpXml` names match case-insensitively.
    pub fn entry(&self, name: &str) -> Option<&EntryRecord> {
        self.inner.index_of(name).map(|i| &self.inner.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.index_of(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.inner.check_live()?;
        self.inner
            .index_of(name)
            .ok_or_else(|| ZpkError::NotFound(name.to_string()))
    }

    pub fn open_reader(&self, name: &str) -> Result<EntryReader<'_>> {
        let i = self.require(name)?;
        self.inner.reader_at(i)
    }

    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let i = self.require(name)?;
        self.inner.read_at(i)
    }

    /// A handle that stays valid only as long as this package does.
    pub fn handle(&self, name: &str) -> Result<EntryHandle> {
        let index = self.require(name)?;
        Ok(EntryHandle {
            owner: Arc::downgrade(&self.inner),
            index,
            name: self.inner.entries[index].name.clone(),
        })
    }

    pub fn verify(&self) -> Result<super::extract::VerifyReport> {
        super::extract::verify(self)
    }

    pub fn stats(&self) -> LoadStats {
        LoadStats::from_entries(&self.inner.entries, self.inner.bytes.len() as u64, self.inner.repaired)
    }

    pub fn add_listener(&self, l: Arc<dyn Listener<PackageEvent>>) -> bool {
        self.inner.listeners.add(l)
    }

    pub fn remove_listener(&self, l: &Arc<dyn Listener<PackageEvent>>) -> bool {
        self.inner.listeners.remove(l)
    }

    /// Release the package: listeners receive `PackageEvent::Disposed` and
    /// every outstanding handle starts failing with `ZpkError::Disposed`.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for Package {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

/// Weak reference to one entry of a [`Package`].
#[derive(Clone, Debug)]
pub struct EntryHandle {
    owner: Weak<PackageInner>,
    index: usize,
    name: String,
}

impl EntryHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> Result<Arc<PackageInner>> {
        let inner = self.owner.upgrade().ok_or(ZpkError::Disposed)?;
        inner.check_live()?;
        Ok(inner)
    }

    pub fn is_alive(&self) -> bool {
        self.owner().is_ok()
    }

    pub fn record(&self) -> Result<EntryRecord> {
        Ok(self.owner()?.entries[self.index].clone())
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        self.owner()?.read_at(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{inspect, rules::RuleSet};
    use crate::pack::writer::PackageWriter;
    use crate::policy::Policy;
    use std::sync::Mutex;

    fn open(format: StorageFormat, entries: &[(&str, &[u8])]) -> Package {
        let mut w = PackageWriter::new(Vec::new(), format, true);
        for (n, d) in entries {
            w.add_entry(n, d).unwrap();
        }
        let bytes: Arc<[u8]> = w.finish().unwrap().into();
        let layout = inspect(&bytes, &RuleSet::for_format(format), &Policy::default()).unwrap();
        Package::new("mem".into(), bytes, format, layout.entries, layout.comment, false)
    }

    #[test]
    fn lookups() {
        let p = open(StorageFormat::Zip, &[("a.txt", b"a"), ("b/c.txt", b"c")]);
        assert_eq!(p.len(), 2);
        assert!(p.contains("b/c.txt"));
        assert!(!p.contains("B/C.TXT"));
        assert_eq!(p.read_entry("a.txt").unwrap(), b"a");
        assert!(matches!(p.read_entry("zz"), Err(ZpkError::NotFound(_))));
    }

    #[test]
    fn archive_comment_is_kept() {
        let p = open(StorageFormat::Zip, &[("a.txt", b"a")]);
        assert!(p.comment().is_empty());
        let bytes: Arc<[u8]> = Arc::from(&b""[..]);
        let q = Package::new(
            "c".into(),
            bytes,
            StorageFormat::Zip,
            Vec::new(),
            b"note".to_vec(),
            true,
        );
        assert_eq!(q.comment(), b"note");
        assert!(q.is_empty());
    }

    #[test]
    fn ofopxml_lookup_ignores_case() {
        let p = open(StorageFormat::OfOpXml, &[("[Content_Types].xml", b"<Types/>")]);
        assert_eq!(p.read_entry("[content_types].XML").unwrap(), b"<Types/>");
    }

    #[test]
    fn handle_outlives_package_gracefully() {
        let p = open(StorageFormat::Zip, &[("a.txt", b"payload")]);
        let h = p.handle("a.txt").unwrap();
        assert_eq!(h.read().unwrap(), b"payload");
        drop(p);
        assert!(!h.is_alive());
        assert!(matches!(h.read(), Err(ZpkError::Disposed)));
        assert!(matches!(h.record(), Err(ZpkError::Disposed)));
    }

    #[test]
    fn dispose_notifies_once_and_blocks_reads() {
        let p = open(StorageFormat::Zip, &[("a.txt", b"payload")]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        p.add_listener(Arc::new(move |e: &PackageEvent| {
            s.lock().unwrap().push(e.clone());
        }));
        let h = p.handle("a.txt").unwrap();
        p.dispose();
        assert!(p.is_disposed());
        assert!(matches!(p.read_entry("a.txt"), Err(ZpkError::Disposed)));
        assert!(matches!(h.read(), Err(ZpkError::Disposed)));
        drop(p);
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![PackageEvent::Disposed {
                source: "mem".into()
            }]
        );
    }
}
