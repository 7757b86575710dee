use std::fmt;

/// Why a candidate byte stream was refused as a package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefectKind {
    DuplicateEntry,
    UnicodePath,
    AbsolutePath,
    RelativePath,
    ConcatenatedArchive,
    CaseCollision,
    OverlappingEntries,
    InnerGap,
    DataDescriptorDeflated,
    DataDescriptorStored,
    Zip64,
    Truncated,
    BadSignature,
    EntryCountMismatch,
    HeaderMismatch,
    UnsupportedMethod,
    Encrypted,
    MultiDisk,
    CrcMismatch,
    SizeMismatch,
    LimitExceeded,
    MissingMimetype,
    NoEntries,
}

impl DefectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DefectKind::DuplicateEntry => "duplicate entry",
            DefectKind::UnicodePath => "unicode path corruption",
            DefectKind::AbsolutePath => "absolute path",
            DefectKind::RelativePath => "relative path",
            DefectKind::ConcatenatedArchive => "concatenated archive",
            DefectKind::CaseCollision => "case collision",
            DefectKind::OverlappingEntries => "overlapping entries",
            DefectKind::InnerGap => "inner gap",
            DefectKind::DataDescriptorDeflated => "data descriptor after deflated data",
            DefectKind::DataDescriptorStored => "data descriptor after stored data",
            DefectKind::Zip64 => "zip64 record",
            DefectKind::Truncated => "truncated",
            DefectKind::BadSignature => "bad signature",
            DefectKind::EntryCountMismatch => "entry count mismatch",
            DefectKind::HeaderMismatch => "local header mismatch",
            DefectKind::UnsupportedMethod => "unsupported compression method",
            DefectKind::Encrypted => "encrypted entry",
            DefectKind::MultiDisk => "multi-disk archive",
            DefectKind::CrcMismatch => "crc mismatch",
            DefectKind::SizeMismatch => "size mismatch",
            DefectKind::LimitExceeded => "limit exceeded",
            DefectKind::MissingMimetype => "missing mimetype",
            DefectKind::NoEntries => "no recoverable entries",
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Defect {
    pub kind: DefectKind,
    pub entry: Option<String>,
    pub offset: Option<u64>,
    pub detail: String,
}

impl Defect {
    pub fn new(kind: DefectKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            entry: None,
            offset: None,
            detail: detail.into(),
        }
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn at(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)?;
        if let Some(e) = &self.entry {
            write!(f, " (entry \"{e}\")")?;
        }
        if let Some(off) = self.offset {
            write!(f, " at offset {off}")?;
        }
        Ok(())
    }
}
