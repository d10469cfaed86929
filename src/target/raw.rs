//! Raw disk image backend
//!
//! The image is memory-mapped and its volume layout decoded at open time.
//! A raw image carries no OS-level metadata without filesystem traversal, so
//! those lookups report `Unsupported`.
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;
use memmap2::Mmap;

use crate::error::TargetError;
use crate::target::bootsector::{self, SECTOR_SIZE};
use crate::target::{
    ArtifactRef, Capability, EntryIter, ForensicTarget, TargetCapabilities, User, Volume,
};

/// Bytes inspected at the start of each volume for filesystem detection.
const PROBE_LEN: u64 = 4096;

/// Memory mapped image file handle
struct ImageMap {
    _file: File,
    mapped: Mmap,
}

impl ImageMap {
    fn open(path: &Path) -> Result<Self, TargetError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < SECTOR_SIZE {
            return Err(TargetError::Corrupt(format!(
                "image is {} bytes, smaller than one sector",
                len
            )));
        }
        let mapped = unsafe { Mmap::map(&file)? };
        Ok(ImageMap {
            _file: file,
            mapped,
        })
    }

    /// Get a slice of the mapped image, clamped to the end of the file.
    fn probe(&self, offset: u64, length: u64) -> Option<&[u8]> {
        let len = self.mapped.len() as u64;
        if offset >= len {
            return None;
        }
        let end = offset.saturating_add(length).min(len);
        Some(&self.mapped[offset as usize..end as usize])
    }
}

/// A raw (dd-style) disk image.
pub struct RawImageTarget {
    identifier: String,
    path: PathBuf,
    image: ImageMap,
    volumes: Vec<Volume>,
}

impl RawImageTarget {
    /// Map the image and decode its volume layout.
    pub fn open(identifier: &str) -> Result<Self, TargetError> {
        let path = PathBuf::from(identifier);
        let image = ImageMap::open(&path)?;
        let volumes = decode_layout(&image)?;
        debug!("{}: decoded {} volumes", identifier, volumes.len());

        Ok(RawImageTarget {
            identifier: identifier.to_string(),
            path,
            image,
            volumes,
        })
    }

    /// Size of the mapped image in bytes.
    pub fn len(&self) -> u64 {
        self.image.mapped.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.image.mapped.is_empty()
    }
}

fn decode_layout(image: &ImageMap) -> Result<Vec<Volume>, TargetError> {
    let data = &image.mapped[..];

    // A filesystem starting at sector 0 means there is no partition table
    if let Some(fs) = bootsector::detect_filesystem(image.probe(0, PROBE_LEN).unwrap_or(&[])) {
        return Ok(vec![Volume {
            index: 0,
            offset: 0,
            size: data.len() as u64,
            kind: "superfloppy".to_string(),
            filesystem: Some(fs),
        }]);
    }

    let mbr_entries = bootsector::parse_mbr(&data[..SECTOR_SIZE as usize])?;
    let entries = if bootsector::is_protective_mbr(&mbr_entries) {
        bootsector::parse_gpt(data)?
    } else {
        mbr_entries.into_iter().map(|(_, entry)| entry).collect()
    };

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let filesystem = image
                .probe(entry.offset, PROBE_LEN)
                .and_then(bootsector::detect_filesystem);
            Volume {
                index,
                offset: entry.offset,
                size: entry.size,
                kind: entry.kind,
                filesystem,
            }
        })
        .collect())
}

fn unsupported<T>(what: &str) -> Result<T, TargetError> {
    Err(TargetError::Unsupported(format!(
        "{} is not available from a raw disk image",
        what
    )))
}

impl ForensicTarget for RawImageTarget {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn check_accessible(&self) -> Result<(), TargetError> {
        std::fs::metadata(&self.path)?;
        Ok(())
    }

    fn hostname(&self) -> Result<String, TargetError> {
        unsupported("hostname")
    }

    fn os_type(&self) -> Result<String, TargetError> {
        unsupported("OS type")
    }

    fn os_version(&self) -> Result<String, TargetError> {
        unsupported("OS version")
    }

    fn architecture(&self) -> Result<String, TargetError> {
        unsupported("architecture")
    }

    fn users(&self) -> Result<Vec<User>, TargetError> {
        unsupported("user list")
    }

    fn volumes(&self) -> Result<Vec<Volume>, TargetError> {
        Ok(self.volumes.clone())
    }

    fn entries(&self, volume: &Volume) -> Result<EntryIter<'_>, TargetError> {
        let fs_name = volume
            .filesystem
            .as_ref()
            .map(|fs| fs.name.as_str())
            .unwrap_or("unknown");
        Err(TargetError::Unsupported(format!(
            "entry enumeration of {} volumes in raw images",
            fs_name
        )))
    }

    fn registry_hives(&self) -> Result<BTreeMap<String, ArtifactRef>, TargetError> {
        unsupported("registry hive enumeration")
    }

    fn logs(&self) -> Result<BTreeMap<String, ArtifactRef>, TargetError> {
        unsupported("log enumeration")
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, TargetError> {
        unsupported(&format!("file {}", path))
    }

    fn capabilities(&self) -> TargetCapabilities {
        TargetCapabilities::new().with(Capability::PartitionTable)
    }
}
