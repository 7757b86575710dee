#![forbid(unsafe_code)]

pub mod config;
pub mod defect;
pub mod domain;
pub mod error;
pub mod format;
pub mod policy;

pub mod util {
    pub mod counting;
    pub mod le;
}

pub mod codec;

pub mod container {
    pub mod cdir;
    pub mod descriptor;
    pub mod eocd;
    pub mod extra;
    pub mod lfh;
}

pub mod gate;

pub mod pack {
    pub mod writer;
}

pub mod read {
    pub mod extract;
    pub mod opened;
    pub mod repair;
    pub mod stream;
}

pub mod list;
pub mod loader;
pub mod observer;
pub mod source;
pub mod source_factory;
pub mod source_fs;
pub mod stats;

// Re-exports: stable API surface
pub use config::LoaderConfig;
pub use defect::{Defect, DefectKind};
pub use error::{Result, ZpkError};
pub use format::StorageFormat;
pub use list::list;
pub use loader::{LoadEvent, OpenRequest, PackageLoader, open};
pub use observer::{Listener, ListenerList};
pub use pack::writer::{PackOptions, PackageWriter, pack};
pub use policy::Policy;
pub use read::extract::{VerifyReport, extract, verify};
pub use read::opened::{EntryHandle, Package, PackageEvent};
