//! Forensic target abstraction and backends
//!
//! A target is an opened disk-image representation. Two backends are provided:
//! [`MountedTarget`] for a mounted or extracted filesystem tree and
//! [`RawImageTarget`] for a raw disk image file.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::boundary;
use crate::error::TargetError;
use crate::observer::{AnalysisEvent, AnalysisObserver};

pub mod bootsector;
pub mod mounted;
pub mod raw;

pub use mounted::MountedTarget;
pub use raw::RawImageTarget;

/// A user account found on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub home: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shell: Option<String>,
}

impl User {
    pub fn named(name: impl Into<String>) -> Self {
        User {
            name: name.into(),
            uid: None,
            home: None,
            shell: None,
        }
    }
}

/// Filesystem identity decoded for a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemInfo {
    pub name: String,
    pub serial: Option<String>,
}

/// A volume (partition) of the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub index: usize,
    pub offset: u64,
    pub size: u64,
    pub kind: String,
    pub filesystem: Option<FilesystemInfo>,
}

/// An entry produced by filesystem enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// A named artefact (registry hive or log file) present on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub path: String,
    pub size: u64,
}

pub type EntryIter<'a> = Box<dyn Iterator<Item = Result<FsEntry, TargetError>> + 'a>;

/// Capability tags used to decide plugin compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Os,
    Linux,
    Windows,
    Users,
    Filesystem,
    Registry,
    Logs,
    PartitionTable,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Capability::Os => "os",
            Capability::Linux => "linux",
            Capability::Windows => "windows",
            Capability::Users => "users",
            Capability::Filesystem => "filesystem",
            Capability::Registry => "registry",
            Capability::Logs => "logs",
            Capability::PartitionTable => "partition_table",
        };
        write!(f, "{}", name)
    }
}

/// The set of capabilities a target offers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetCapabilities(BTreeSet<Capability>);

impl TargetCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for TargetCapabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        TargetCapabilities(iter.into_iter().collect())
    }
}

/// An opened forensic target.
///
/// Every lookup is fallible. Callers decide how to degrade: the extraction
/// steps substitute sentinel values, plugins skip.
pub trait ForensicTarget: Send + Sync {
    /// Identifier the target was opened from.
    fn identifier(&self) -> &str;

    fn path(&self) -> &Path;

    /// Verify the target is still readable before extraction starts.
    fn check_accessible(&self) -> Result<(), TargetError> {
        Ok(())
    }

    fn hostname(&self) -> Result<String, TargetError>;

    fn os_type(&self) -> Result<String, TargetError>;

    fn os_version(&self) -> Result<String, TargetError>;

    fn architecture(&self) -> Result<String, TargetError>;

    fn users(&self) -> Result<Vec<User>, TargetError>;

    /// Volumes in on-disk enumeration order.
    fn volumes(&self) -> Result<Vec<Volume>, TargetError>;

    /// Enumerate the filesystem entries of one volume.
    fn entries(&self, volume: &Volume) -> Result<EntryIter<'_>, TargetError>;

    fn registry_hives(&self) -> Result<BTreeMap<String, ArtifactRef>, TargetError>;

    fn logs(&self) -> Result<BTreeMap<String, ArtifactRef>, TargetError>;

    /// Read a file by its path relative to the target root.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, TargetError>;

    fn capabilities(&self) -> TargetCapabilities;
}

/// Open a single identifier as a target.
///
/// Directories are treated as mounted filesystem trees, regular files as raw
/// disk images.
pub fn open_target(identifier: &str) -> Result<Arc<dyn ForensicTarget>, TargetError> {
    let path = Path::new(identifier);
    let metadata = std::fs::metadata(path)?;

    if metadata.is_dir() {
        Ok(Arc::new(MountedTarget::open(identifier)?))
    } else if metadata.is_file() {
        Ok(Arc::new(RawImageTarget::open(identifier)?))
    } else {
        Err(TargetError::Unsupported(format!(
            "{} is neither a directory nor a regular file",
            identifier
        )))
    }
}

/// Open a batch of identifiers, dropping the ones that fail.
///
/// The returned handles keep the input order. Failed identifiers are reported
/// to the observer and returned separately.
pub fn open_all(
    identifiers: &[String],
    observer: &dyn AnalysisObserver,
) -> (Vec<Arc<dyn ForensicTarget>>, Vec<String>) {
    let mut targets = Vec::with_capacity(identifiers.len());
    let mut failed = Vec::new();

    for identifier in identifiers {
        let owned = identifier.clone();
        let opened = boundary::run_bounded(None, move || open_target(&owned)).unwrap_or_else(
            |interrupted| {
                Err(TargetError::Corrupt(format!(
                    "decoding aborted: {:?}",
                    interrupted
                )))
            },
        );
        match opened {
            Ok(target) => {
                observer.on_event(&AnalysisEvent::TargetOpened {
                    target: identifier.clone(),
                });
                targets.push(target);
            }
            Err(e) => {
                observer.on_event(&AnalysisEvent::TargetOpenFailed {
                    target: identifier.clone(),
                    message: e.to_string(),
                });
                failed.push(identifier.clone());
            }
        }
    }

    (targets, failed)
}
