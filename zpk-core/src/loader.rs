use crate::config::LoaderConfig;
use crate::defect::Defect;
use crate::error::Result;
use crate::format::StorageFormat;
use crate::gate::{inspect, rules::RuleSet};
use crate::observer::{Listener, ListenerList};
use crate::policy::Policy;
use crate::read::opened::Package;
use crate::read::repair::recover;
use crate::source::PackageSource;
use crate::source_factory::open_source;
use std::sync::Arc;
use tracing::{info, warn};

/// What to open and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRequest {
    /// A filesystem path or `file:` URL.
    pub url: String,
    pub format: StorageFormat,
    pub repair: bool,
}

impl OpenRequest {
    pub fn new(url: impl Into<String>, format: StorageFormat) -> Self {
        Self {
            url: url.into(),
            format,
            repair: false,
        }
    }

    pub fn with_repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }
}

/// Progress of an open attempt, published to the loader's listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadEvent {
    Opened {
        source: String,
        format: StorageFormat,
        entries: usize,
        repaired: bool,
    },
    DefectFound {
        source: String,
        defect: Defect,
    },
    RepairStarted {
        source: String,
    },
    EntryRecovered {
        source: String,
        name: String,
    },
    EntryDropped {
        source: String,
        name: Option<String>,
        offset: u64,
        reason: String,
    },
    RepairFinished {
        source: String,
        recovered: usize,
        dropped: usize,
    },
    RepairFailed {
        source: String,
        defect: Defect,
    },
}

#[derive(Debug, Default)]
pub struct PackageLoader {
    policy: Policy,
    listeners: ListenerList<LoadEvent>,
}

impl PackageLoader {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            listeners: ListenerList::new(),
        }
    }

    pub fn from_config(cfg: &LoaderConfig) -> Self {
        Self::new(cfg.policy.clone())
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn add_listener(&self, l: Arc<dyn Listener<LoadEvent>>) -> bool {
        self.listeners.add(l)
    }

    pub fn remove_listener(&self, l: &Arc<dyn Listener<LoadEvent>>) -> bool {
        self.listeners.remove(l)
    }

    pub fn open(&self, req: &OpenRequest) -> Result<Package> {
        let src = open_source(&req.url)?;
        self.open_source(src.as_ref(), req.format, req.repair)
    }

    pub fn open_source(
        &self,
        src: &dyn PackageSource,
        format: StorageFormat,
        repair: bool,
    ) -> Result<Package> {
        let bytes = src.load(self.policy.max_source_size)?;
        self.open_bytes(src.describe(), bytes, format, repair)
    }

    /// Validate `bytes` under the rule set of `format`. On a defect, fail
    /// unless `repair` is set, in which case the repair scanner decides.
    pub fn open_bytes(
        &self,
        source: String,
        bytes: Arc<[u8]>,
        format: StorageFormat,
        repair: bool,
    ) -> Result<Package> {
        let rules = RuleSet::for_format(format);
        let defect = match inspect(&bytes, &rules, &self.policy) {
            Ok(layout) => {
                self.listeners.notify(&LoadEvent::Opened {
                    source: source.clone(),
                    format,
                    entries: layout.entries.len(),
                    repaired: false,
                });
                return Ok(Package::new(
                    source,
                    bytes,
                    format,
                    layout.entries,
                    layout.comment,
                    false,
                ));
            }
            Err(d) => d,
        };

        warn!(source = %source, format = %format, defect = %defect, "package rejected");
        self.listeners.notify(&LoadEvent::DefectFound {
            source: source.clone(),
            defect: defect.clone(),
        });
        if !repair {
            return Err(defect.into());
        }

        self.listeners.notify(&LoadEvent::RepairStarted {
            source: source.clone(),
        });
        let outcome = match recover(&bytes, &rules, &self.policy) {
            Ok(o) => o,
            Err(d) => {
                warn!(source = %source, defect = %d, "repair failed");
                self.listeners.notify(&LoadEvent::RepairFailed {
                    source,
                    defect: d.clone(),
                });
                return Err(d.into());
            }
        };

        for d in &outcome.dropped {
            self.listeners.notify(&LoadEvent::EntryDropped {
                source: source.clone(),
                name: d.name.clone(),
                offset: d.offset,
                reason: d.reason.clone(),
            });
        }
        for e in &outcome.entries {
            self.listeners.notify(&LoadEvent::EntryRecovered {
                source: source.clone(),
                name: e.name.clone(),
            });
        }
        info!(
            source = %source,
            recovered = outcome.entries.len(),
            dropped = outcome.dropped.len(),
            "package repaired"
        );
        self.listeners.notify(&LoadEvent::RepairFinished {
            source: source.clone(),
            recovered: outcome.entries.len(),
            dropped: outcome.dropped.len(),
        });
        self.listeners.notify(&LoadEvent::Opened {
            source: source.clone(),
            format,
            entries: outcome.entries.len(),
            repaired: true,
        });
        Ok(Package::new(
            source,
            bytes,
            format,
            outcome.entries,
            Vec::new(),
            true,
        ))
    }
}

/// Open `url` with the default policy.
pub fn open(url: &str, format: StorageFormat, repair: bool) -> Result<Package> {
    PackageLoader::default().open(&OpenRequest::new(url, format).with_repair(repair))
}
