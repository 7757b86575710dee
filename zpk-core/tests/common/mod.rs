#![allow(dead_code)]

//! Raw archive builder for tests. Unlike `PackageWriter` it will happily
//! emit every kind of malformed archive.

use flate2::Crc;
use std::io::Write;
use zpk_core::container::cdir::CentralDirectoryHeader;
use zpk_core::container::descriptor::DataDescriptor;
use zpk_core::container::eocd::{EndOfCentralDirectory, ZIP64_EOCD_SIG, ZIP64_LOCATOR_SIG};
use zpk_core::container::lfh::{FLAG_DATA_DESCRIPTOR, FLAG_UTF8, LocalFileHeader};

pub fn crc32(data: &[u8]) -> u32 {
    let mut c = Crc::new();
    c.update(data);
    c.sum()
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

#[derive(Clone)]
pub struct Entry {
    pub name: Vec<u8>,
    pub content: Vec<u8>,
    pub deflated: bool,
    pub flags: u16,
    pub descriptor: bool,
    pub extra: Vec<u8>,
    /// Junk written immediately before this entry's local header.
    pub gap_before: usize,
}

impl Entry {
    pub fn stored(name: &str, content: &[u8]) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            content: content.to_vec(),
            deflated: false,
            flags: 0,
            descriptor: false,
            extra: Vec::new(),
            gap_before: 0,
        }
    }

    pub fn deflated(name: &str, content: &[u8]) -> Self {
        Self {
            deflated: true,
            ..Self::stored(name, content)
        }
    }

    pub fn raw_name(mut self, name: &[u8]) -> Self {
        self.name = name.to_vec();
        self
    }

    pub fn utf8(mut self) -> Self {
        self.flags |= FLAG_UTF8;
        self
    }

    pub fn with_descriptor(mut self) -> Self {
        self.descriptor = true;
        self.flags |= FLAG_DATA_DESCRIPTOR;
        self
    }

    pub fn with_extra(mut self, id: u16, body: &[u8]) -> Self {
        self.extra.extend_from_slice(&id.to_le_bytes());
        self.extra.extend_from_slice(&(body.len() as u16).to_le_bytes());
        self.extra.extend_from_slice(body);
        self
    }

    pub fn gap_before(mut self, n: usize) -> Self {
        self.gap_before = n;
        self
    }

    fn payload(&self) -> Vec<u8> {
        if self.deflated {
            deflate(&self.content)
        } else {
            self.content.clone()
        }
    }

    /// Local header, payload and optional descriptor, plus the matching
    /// central directory header pointing at `offset`.
    pub fn encode(&self, offset: u32) -> (Vec<u8>, CentralDirectoryHeader) {
        let payload = self.payload();
        let crc = crc32(&self.content);
        let method = if self.deflated { 8 } else { 0 };
        let (lcrc, lc, lu) = if self.descriptor {
            (0, 0, 0)
        } else {
            (crc, payload.len() as u32, self.content.len() as u32)
        };
        let mut out = Vec::new();
        LocalFileHeader {
            version_needed: 20,
            flags: self.flags,
            method,
            mod_time: 0,
            mod_date: 0x21,
            crc32: lcrc,
            compressed_size: lc,
            uncompressed_size: lu,
            name: self.name.clone(),
            extra: self.extra.clone(),
        }
        .write_to(&mut out)
        .unwrap();
        out.extend_from_slice(&payload);
        if self.descriptor {
            DataDescriptor {
                crc32: crc,
                compressed_size: payload.len() as u32,
                uncompressed_size: self.content.len() as u32,
                signed: true,
            }
            .write_to(&mut out)
            .unwrap();
        }
        let cdh = CentralDirectoryHeader {
            version_made_by: 20,
            version_needed: 20,
            flags: self.flags,
            method,
            mod_time: 0,
            mod_date: 0x21,
            crc32: crc,
            compressed_size: payload.len() as u32,
            uncompressed_size: self.content.len() as u32,
            disk_start: 0,
            internal_attrs: 0,
            external_attrs: 0,
            lfh_offset: offset,
            name: self.name.clone(),
            extra: self.extra.clone(),
            comment: Vec::new(),
        };
        (out, cdh)
    }
}

#[derive(Clone, Default)]
pub struct ArchiveBuilder {
    pub entries: Vec<Entry>,
    pub zip64_trailer: bool,
    /// Extra central directory records pointing at arbitrary offsets.
    pub extra_central: Vec<CentralDirectoryHeader>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, e: Entry) -> Self {
        self.entries.push(e);
        self
    }

    pub fn zip64_trailer(mut self) -> Self {
        self.zip64_trailer = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();
        for e in &self.entries {
            out.extend(std::iter::repeat_n(0xAAu8, e.gap_before));
            let (bytes, cdh) = e.encode(out.len() as u32);
            out.extend_from_slice(&bytes);
            central.push(cdh);
        }
        central.extend(self.extra_central.iter().cloned());

        let cd_offset = out.len();
        for h in &central {
            h.write_to(&mut out).unwrap();
        }
        let cd_size = out.len() - cd_offset;

        if self.zip64_trailer {
            let rec_off = out.len() as u64;
            out.extend_from_slice(&ZIP64_EOCD_SIG.to_le_bytes());
            out.extend_from_slice(&44u64.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(central.len() as u64).to_le_bytes());
            out.extend_from_slice(&(central.len() as u64).to_le_bytes());
            out.extend_from_slice(&(cd_size as u64).to_le_bytes());
            out.extend_from_slice(&(cd_offset as u64).to_le_bytes());

            out.extend_from_slice(&ZIP64_LOCATOR_SIG.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&rec_off.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
        }

        EndOfCentralDirectory {
            disk: 0,
            cd_disk: 0,
            disk_entries: central.len() as u16,
            total_entries: central.len() as u16,
            cd_size: cd_size as u32,
            cd_offset: cd_offset as u32,
            comment: Vec::new(),
        }
        .write_to(&mut out)
        .unwrap();
        out
    }
}

/// One fixture per defect class the loader must reject.
pub fn defective_fixtures() -> Vec<(&'static str, Vec<u8>)> {
    let xml = b"<?xml version=\"1.0\"?><doc>hello hello hello hello</doc>".to_vec();
    vec![
        ("duplicate", duplicate()),
        ("unicode", unicode()),
        ("slash", slash()),
        ("dot-slash", dot_slash()),
        ("two-zips", two_zips()),
        ("overlap", overlap()),
        ("inner-gap", inner_gap()),
        (
            "dd-deflated",
            ArchiveBuilder::new()
                .entry(Entry::deflated("content.xml", &xml).with_descriptor())
                .build(),
        ),
        (
            "dd-stored",
            ArchiveBuilder::new()
                .entry(Entry::stored("content.xml", &xml).with_descriptor())
                .build(),
        ),
        ("zip64-eocd", zip64_eocd()),
    ]
}

pub fn duplicate() -> Vec<u8> {
    ArchiveBuilder::new()
        .entry(Entry::stored("a.txt", b"one"))
        .entry(Entry::stored("a.txt", b"two"))
        .build()
}

pub fn unicode() -> Vec<u8> {
    ArchiveBuilder::new()
        .entry(Entry::stored("ok.txt", b"fine"))
        // flagged UTF-8 but the bytes are Latin-1
        .entry(Entry::stored("x", b"bad").raw_name(b"caf\xe9.txt").utf8())
        .build()
}

pub fn slash() -> Vec<u8> {
    ArchiveBuilder::new()
        .entry(Entry::stored("/etc/passwd", b"root:x:0:0"))
        .build()
}

pub fn dot_slash() -> Vec<u8> {
    ArchiveBuilder::new()
        .entry(Entry::stored("./a.txt", b"dot"))
        .build()
}

pub fn two_zips() -> Vec<u8> {
    let mut buf = ArchiveBuilder::new()
        .entry(Entry::stored("a.txt", b"first"))
        .build();
    buf.extend(
        ArchiveBuilder::new()
            .entry(Entry::stored("b.txt", b"second"))
            .build(),
    );
    buf
}

pub fn casing() -> Vec<u8> {
    ArchiveBuilder::new()
        .entry(Entry::stored("word/Document.xml", b"<w/>"))
        .entry(Entry::stored("word/document.xml", b"<w/>"))
        .build()
}

/// `inner.txt` is a complete entry hidden inside the payload of `outer.bin`,
/// and the central directory lists both.
pub fn overlap() -> Vec<u8> {
    let outer_name = "outer.bin";
    let inner = Entry::stored("inner.txt", b"nested");
    let inner_off = (30 + outer_name.len()) as u32;
    let (inner_bytes, inner_cdh) = inner.encode(inner_off);
    let mut content = inner_bytes;
    content.extend_from_slice(b"tail");
    let mut b = ArchiveBuilder::new().entry(Entry::stored(outer_name, &content));
    b.extra_central.push(inner_cdh);
    b.build()
}

pub fn inner_gap() -> Vec<u8> {
    ArchiveBuilder::new()
        .entry(Entry::stored("a.txt", b"alpha"))
        .entry(Entry::stored("b.txt", b"bravo").gap_before(17))
        .build()
}

pub fn zip64_eocd() -> Vec<u8> {
    ArchiveBuilder::new()
        .entry(Entry::stored("a.txt", b"alpha"))
        .zip64_trailer()
        .build()
}
