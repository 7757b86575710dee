use crate::defect::Defect;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZpkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream is not a well-formed package under the declared format.
    #[error("package format error: {0}")]
    PackageFormat(Defect),

    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("package has been disposed")]
    Disposed,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("config error: {0}")]
    Config(String),
}

impl ZpkError {
    pub fn is_package_format(&self) -> bool {
        matches!(self, ZpkError::PackageFormat(_))
    }

    pub fn defect(&self) -> Option<&Defect> {
        match self {
            ZpkError::PackageFormat(d) => Some(d),
            _ => None,
        }
    }

    /// Entry readers report format problems through `io::Error`; unwrap them again.
    pub fn from_read_error(e: std::io::Error) -> Self {
        if e.get_ref().is_some_and(|inner| inner.is::<ZpkError>()) {
            if let Some(inner) = e.into_inner() {
                if let Ok(z) = inner.downcast::<ZpkError>() {
                    return *z;
                }
            }
            return ZpkError::Io(std::io::Error::other("entry read failed"));
        }
        ZpkError::Io(e)
    }
}

impl From<Defect> for ZpkError {
    fn from(d: Defect) -> Self {
        ZpkError::PackageFormat(d)
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ZpkError>;
