//! Mounted filesystem tree backend
//!
//! Treats a directory as the root of a mounted (or extracted) disk image.
//! Paths inside the tree are resolved case-insensitively, and symlinks are
//! followed relative to the tree root so absolute links never escape to the
//! analysing host.
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use goblin::Object;
use log::{debug, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::TargetError;
use crate::target::{
    ArtifactRef, Capability, EntryIter, FilesystemInfo, ForensicTarget, FsEntry,
    TargetCapabilities, User, Volume,
};

const MAX_SYMLINK_HOPS: usize = 16;

const WINDOWS_HIVES: [&str; 5] = ["SYSTEM", "SOFTWARE", "SAM", "SECURITY", "DEFAULT"];

const WINDOWS_SKIPPED_PROFILES: [&str; 4] = ["Public", "Default", "Default User", "All Users"];

/// `os-release` locations in lookup order, as systemd reads them.
pub const OS_RELEASE_PATHS: [&str; 2] = ["etc/os-release", "usr/lib/os-release"];

const LINUX_SHELLS: [&str; 3] = ["bin/sh", "usr/bin/sh", "bin/bash"];

const WINDOWS_KERNEL: &str = "Windows/System32/ntoskrnl.exe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OsFamily {
    Linux,
    Windows,
}

/// A mounted or extracted filesystem tree.
pub struct MountedTarget {
    identifier: String,
    root: PathBuf,
}

impl MountedTarget {
    pub fn open(identifier: &str) -> Result<Self, TargetError> {
        let root = PathBuf::from(identifier);
        if !fs::metadata(&root)?.is_dir() {
            return Err(TargetError::Unsupported(format!(
                "{} is not a directory",
                identifier
            )));
        }
        Ok(MountedTarget {
            identifier: identifier.to_string(),
            root,
        })
    }

    /// Resolve a root-relative path inside the tree.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut pending: VecDeque<String> = split_components(relative);
        let mut current = self.root.clone();
        let mut hops = 0;

        while let Some(component) = pending.pop_front() {
            match component.as_str() {
                "" | "." => continue,
                ".." => {
                    if current != self.root {
                        current.pop();
                    }
                    continue;
                }
                _ => {}
            }

            let child = find_child(&current, &component)?;
            let meta = fs::symlink_metadata(&child).ok()?;
            if meta.file_type().is_symlink() {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return None;
                }
                let link = fs::read_link(&child).ok()?;
                if link.is_absolute() {
                    current = self.root.clone();
                }
                let mut next = split_components(&link.to_string_lossy());
                next.extend(pending.drain(..));
                pending = next;
            } else {
                current = child;
            }
        }

        Some(current)
    }

    fn resolve_file(&self, relative: &str) -> Option<PathBuf> {
        self.resolve(relative).filter(|p| p.is_file())
    }

    fn resolve_dir(&self, relative: &str) -> Option<PathBuf> {
        self.resolve(relative).filter(|p| p.is_dir())
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn family(&self) -> Option<OsFamily> {
        if self.resolve_dir("Windows/System32").is_some() {
            Some(OsFamily::Windows)
        } else if OS_RELEASE_PATHS
            .iter()
            .chain(["etc/passwd"].iter())
            .any(|candidate| self.resolve_file(candidate).is_some())
        {
            Some(OsFamily::Linux)
        } else {
            None
        }
    }

    fn require_family(&self) -> Result<OsFamily, TargetError> {
        self.family().ok_or_else(|| {
            TargetError::NotFound(format!(
                "no recognised operating system under {}",
                self.root.display()
            ))
        })
    }

    fn read_text(&self, relative: &str) -> Result<String, TargetError> {
        let bytes = self.read_file(relative)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn os_release(&self) -> Result<BTreeMap<String, String>, TargetError> {
        let path = OS_RELEASE_PATHS
            .iter()
            .find(|candidate| self.resolve_file(candidate).is_some())
            .ok_or_else(|| TargetError::NotFound("no os-release file".to_string()))?;
        Ok(parse_os_release(&self.read_text(path)?))
    }

    fn windows_profiles(&self) -> Result<Vec<(String, PathBuf)>, TargetError> {
        let users_dir = match self.resolve_dir("Users") {
            Some(dir) => dir,
            None => return Ok(Vec::new()),
        };

        let mut profiles = Vec::new();
        for entry in fs::read_dir(&users_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if WINDOWS_SKIPPED_PROFILES
                .iter()
                .any(|skip| skip.eq_ignore_ascii_case(&name))
            {
                continue;
            }
            profiles.push((name, entry.path()));
        }
        profiles.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(profiles)
    }

    /// Describe an artifact at a path already resolved inside the tree.
    fn artifact(&self, path: &Path) -> Result<(String, ArtifactRef), TargetError> {
        let relative = self.relative(path);
        let size = fs::symlink_metadata(path)?.len();
        Ok((
            relative.clone(),
            ArtifactRef {
                path: relative,
                size,
            },
        ))
    }
}

fn split_components(path: &str) -> VecDeque<String> {
    path.split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Find a directory child by exact name, falling back to a case-insensitive match.
fn find_child(dir: &Path, name: &str) -> Option<PathBuf> {
    let exact = dir.join(name);
    if fs::symlink_metadata(&exact).is_ok() {
        return Some(exact);
    }
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|entry| entry.path())
}

/// Parse `os-release` style `KEY=value` lines, stripping quotes.
pub fn parse_os_release(text: &str) -> BTreeMap<String, String> {
    static LINE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    // Keys are restricted to the characters os-release(5) allows
    let Some(line_re) = LINE_RE
        .get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)=(.*)$").ok())
        .as_ref()
    else {
        return BTreeMap::new();
    };
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line_re.captures(line))
        .map(|caps| {
            let value = caps[2].trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (caps[1].to_string(), value.to_string())
        })
        .collect()
}

/// Parse `/etc/passwd` entries.
pub fn parse_passwd(text: &str) -> Vec<User> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 || fields[0].is_empty() {
                return None;
            }
            Some(User {
                name: fields[0].to_string(),
                uid: fields[2].parse().ok(),
                home: Some(fields[5].to_string()).filter(|h| !h.is_empty()),
                shell: Some(fields[6].to_string()).filter(|s| !s.is_empty()),
            })
        })
        .collect()
}

/// Map an executable header to an architecture name.
fn executable_architecture(bytes: &[u8]) -> Result<String, TargetError> {
    use goblin::elf::header::{EM_386, EM_AARCH64, EM_ARM, EM_RISCV, EM_X86_64};
    use goblin::pe::header::{COFF_MACHINE_ARM64, COFF_MACHINE_X86, COFF_MACHINE_X86_64};

    let object = Object::parse(bytes).map_err(|e| TargetError::Corrupt(e.to_string()))?;
    let arch = match object {
        Object::Elf(elf) => match elf.header.e_machine {
            EM_X86_64 => "x86_64".to_string(),
            EM_386 => "x86".to_string(),
            EM_AARCH64 => "aarch64".to_string(),
            EM_ARM => "arm".to_string(),
            EM_RISCV => format!("riscv{}", if elf.is_64 { 64 } else { 32 }),
            other => format!("elf-machine-{}", other),
        },
        Object::PE(pe) => match pe.header.coff_header.machine {
            COFF_MACHINE_X86_64 => "x86_64".to_string(),
            COFF_MACHINE_X86 => "x86".to_string(),
            COFF_MACHINE_ARM64 => "aarch64".to_string(),
            other => format!("pe-machine-0x{:04x}", other),
        },
        _ => {
            return Err(TargetError::Unsupported(
                "executable format without architecture mapping".to_string(),
            ))
        }
    };
    Ok(arch)
}

impl ForensicTarget for MountedTarget {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn path(&self) -> &Path {
        &self.root
    }

    fn check_accessible(&self) -> Result<(), TargetError> {
        if fs::metadata(&self.root)?.is_dir() {
            Ok(())
        } else {
            Err(TargetError::NotFound(format!(
                "{} is no longer a directory",
                self.root.display()
            )))
        }
    }

    fn hostname(&self) -> Result<String, TargetError> {
        match self.require_family()? {
            OsFamily::Linux => {
                let hostname = self.read_text("etc/hostname")?.trim().to_string();
                if hostname.is_empty() {
                    Err(TargetError::NotFound("etc/hostname is empty".to_string()))
                } else {
                    Ok(hostname)
                }
            }
            OsFamily::Windows => Err(TargetError::Unsupported(
                "Windows hostname lives in the SYSTEM hive".to_string(),
            )),
        }
    }

    fn os_type(&self) -> Result<String, TargetError> {
        Ok(match self.require_family()? {
            OsFamily::Linux => "linux".to_string(),
            OsFamily::Windows => "windows".to_string(),
        })
    }

    fn os_version(&self) -> Result<String, TargetError> {
        match self.require_family()? {
            OsFamily::Linux => {
                let release = self.os_release()?;
                if let Some(pretty) = release.get("PRETTY_NAME") {
                    return Ok(pretty.clone());
                }
                match (release.get("NAME"), release.get("VERSION_ID")) {
                    (Some(name), Some(version)) => Ok(format!("{} {}", name, version)),
                    (Some(name), None) => Ok(name.clone()),
                    _ => Err(TargetError::NotFound(
                        "no NAME or PRETTY_NAME in os-release".to_string(),
                    )),
                }
            }
            OsFamily::Windows => Err(TargetError::Unsupported(
                "Windows version lives in the SOFTWARE hive".to_string(),
            )),
        }
    }

    fn architecture(&self) -> Result<String, TargetError> {
        let candidates: &[&str] = match self.require_family()? {
            OsFamily::Linux => &LINUX_SHELLS,
            OsFamily::Windows => &[WINDOWS_KERNEL],
        };

        let binary = candidates
            .iter()
            .find(|c| self.resolve_file(c).is_some())
            .ok_or_else(|| {
                TargetError::NotFound(format!("none of {:?} present", candidates))
            })?;
        executable_architecture(&self.read_file(binary)?)
    }

    fn users(&self) -> Result<Vec<User>, TargetError> {
        match self.require_family()? {
            OsFamily::Linux => Ok(parse_passwd(&self.read_text("etc/passwd")?)),
            OsFamily::Windows => Ok(self
                .windows_profiles()?
                .into_iter()
                .map(|(name, path)| User {
                    home: Some(self.relative(&path)),
                    ..User::named(name)
                })
                .collect()),
        }
    }

    fn volumes(&self) -> Result<Vec<Volume>, TargetError> {
        // Size is not reported: computing it means walking the whole tree
        Ok(vec![Volume {
            index: 0,
            offset: 0,
            size: 0,
            kind: "directory".to_string(),
            filesystem: Some(FilesystemInfo {
                name: "DirectoryFilesystem".to_string(),
                serial: None,
            }),
        }])
    }

    fn entries(&self, volume: &Volume) -> Result<EntryIter<'_>, TargetError> {
        if volume.index != 0 {
            return Err(TargetError::NotFound(format!(
                "volume {} does not exist",
                volume.index
            )));
        }

        let iter = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .map(move |entry| {
                let entry = entry.map_err(|e| TargetError::Io(e.into()))?;
                let is_dir = entry.file_type().is_dir();
                let size = if entry.file_type().is_file() {
                    entry.metadata().map(|m| m.len()).unwrap_or(0)
                } else {
                    0
                };
                Ok(FsEntry {
                    path: self.relative(entry.path()),
                    size,
                    is_dir,
                })
            });
        Ok(Box::new(iter))
    }

    fn registry_hives(&self) -> Result<BTreeMap<String, ArtifactRef>, TargetError> {
        let mut hives = BTreeMap::new();
        if self.family() != Some(OsFamily::Windows) {
            return Ok(hives);
        }

        for hive in WINDOWS_HIVES {
            if let Some(path) = self.resolve_file(&format!("Windows/System32/config/{}", hive)) {
                let (name, artifact) = self.artifact(&path)?;
                hives.insert(name, artifact);
            }
        }

        for (_, profile) in self.windows_profiles()? {
            let hive = format!("{}/NTUSER.DAT", self.relative(&profile));
            if let Some(path) = self.resolve_file(&hive) {
                let (name, artifact) = self.artifact(&path)?;
                hives.insert(name, artifact);
            }
        }

        Ok(hives)
    }

    fn logs(&self) -> Result<BTreeMap<String, ArtifactRef>, TargetError> {
        let mut logs = BTreeMap::new();

        if let Some(var_log) = self.resolve_dir("var/log") {
            // Only an unreadable var/log itself fails the lookup
            fs::read_dir(&var_log)?;

            let mut skipped = 0usize;
            for entry in WalkDir::new(&var_log).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!("{}: skipping log entry: {}", self.identifier, e);
                        skipped += 1;
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                match entry.metadata() {
                    Ok(meta) => {
                        let relative = self.relative(entry.path());
                        logs.insert(
                            relative.clone(),
                            ArtifactRef {
                                path: relative,
                                size: meta.len(),
                            },
                        );
                    }
                    Err(e) => {
                        debug!("{}: skipping log entry: {}", self.identifier, e);
                        skipped += 1;
                    }
                }
            }
            if skipped > 0 {
                warn!(
                    "{}: {} unreadable entries under var/log were skipped",
                    self.identifier, skipped
                );
            }
        }

        if let Some(evtx_dir) = self.resolve_dir("Windows/System32/winevt/Logs") {
            for entry in fs::read_dir(&evtx_dir)? {
                let path = entry?.path();
                let is_evtx = path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("evtx"))
                    .unwrap_or(false);
                if !is_evtx {
                    continue;
                }
                // Links are followed relative to the tree root
                if let Some(resolved) = self.resolve_file(&self.relative(&path)) {
                    let (_, artifact) = self.artifact(&resolved)?;
                    let name = self.relative(&path);
                    logs.insert(name, artifact);
                }
            }
        }

        Ok(logs)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, TargetError> {
        let resolved = self
            .resolve_file(path)
            .ok_or_else(|| TargetError::NotFound(path.to_string()))?;
        Ok(fs::read(resolved)?)
    }

    fn capabilities(&self) -> TargetCapabilities {
        let mut caps = TargetCapabilities::new().with(Capability::Filesystem);
        match self.family() {
            Some(OsFamily::Linux) => {
                caps.insert(Capability::Os);
                caps.insert(Capability::Linux);
                caps.insert(Capability::Users);
                caps.insert(Capability::Logs);
            }
            Some(OsFamily::Windows) => {
                caps.insert(Capability::Os);
                caps.insert(Capability::Windows);
                caps.insert(Capability::Users);
                caps.insert(Capability::Logs);
                caps.insert(Capability::Registry);
            }
            None => {}
        }
        caps
    }
}
