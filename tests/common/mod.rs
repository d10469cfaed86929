#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use diskreport::error::{IndexError, PluginError, TargetError};
use diskreport::plugins::plugin_trait::{ForensicPlugin, PluginOutput};
use diskreport::plugins::record;
use diskreport::publish::{Document, DocumentIndex};
use diskreport::target::{
    ArtifactRef, Capability, EntryIter, FilesystemInfo, ForensicTarget, FsEntry,
    TargetCapabilities, User, Volume,
};
use serde_json::json;

/// In-memory target with scriptable failures.
#[derive(Clone)]
pub struct FakeTarget {
    pub identifier: String,
    pub hostname: Option<String>,
    pub volumes: Vec<Volume>,
    pub entries: usize,
    pub hives: Vec<String>,
    pub logs: Vec<String>,
    pub capabilities: TargetCapabilities,
    pub inaccessible: bool,
    pub panic_on_volumes: bool,
}

impl FakeTarget {
    pub fn new(identifier: &str) -> Self {
        FakeTarget {
            identifier: identifier.to_string(),
            hostname: Some("HOST-A".to_string()),
            volumes: vec![
                volume(0, 1_048_576, 512 * 2048, "Linux", Some("ExtFilesystem")),
                volume(1, 2_097_152, 512 * 4096, "NTFS/exFAT", Some("NtfsFilesystem")),
            ],
            entries: 3,
            hives: Vec::new(),
            logs: Vec::new(),
            capabilities: TargetCapabilities::new()
                .with(Capability::Os)
                .with(Capability::Linux)
                .with(Capability::Users),
            inaccessible: false,
            panic_on_volumes: false,
        }
    }

    pub fn arc(self) -> Arc<dyn ForensicTarget> {
        Arc::new(self)
    }
}

pub fn volume(index: usize, offset: u64, size: u64, kind: &str, fs: Option<&str>) -> Volume {
    Volume {
        index,
        offset,
        size,
        kind: kind.to_string(),
        filesystem: fs.map(|name| FilesystemInfo {
            name: name.to_string(),
            serial: Some("ABCD-1234".to_string()),
        }),
    }
}

fn artifacts(names: &[String]) -> BTreeMap<String, ArtifactRef> {
    names
        .iter()
        .map(|name| {
            (
                name.clone(),
                ArtifactRef {
                    path: name.clone(),
                    size: 0,
                },
            )
        })
        .collect()
}

impl ForensicTarget for FakeTarget {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn path(&self) -> &Path {
        Path::new(&self.identifier)
    }

    fn check_accessible(&self) -> Result<(), TargetError> {
        if self.inaccessible {
            return Err(TargetError::NotFound("image vanished".to_string()));
        }
        Ok(())
    }

    fn hostname(&self) -> Result<String, TargetError> {
        self.hostname
            .clone()
            .ok_or_else(|| TargetError::NotFound("hostname".to_string()))
    }

    fn os_type(&self) -> Result<String, TargetError> {
        Ok("linux".to_string())
    }

    fn os_version(&self) -> Result<String, TargetError> {
        Ok("Debian GNU/Linux 12 (bookworm)".to_string())
    }

    fn architecture(&self) -> Result<String, TargetError> {
        Ok("x86_64".to_string())
    }

    fn users(&self) -> Result<Vec<User>, TargetError> {
        Ok(vec![User::named("root"), User::named("alice")])
    }

    fn volumes(&self) -> Result<Vec<Volume>, TargetError> {
        if self.panic_on_volumes {
            panic!("volume table exploded");
        }
        Ok(self.volumes.clone())
    }

    fn entries(&self, volume: &Volume) -> Result<EntryIter<'_>, TargetError> {
        let index = volume.index;
        Ok(Box::new((0..self.entries).map(move |i| {
            Ok(FsEntry {
                path: format!("vol{}/file{}", index, i),
                size: 10,
                is_dir: false,
            })
        })))
    }

    fn registry_hives(&self) -> Result<BTreeMap<String, ArtifactRef>, TargetError> {
        Ok(artifacts(&self.hives))
    }

    fn logs(&self) -> Result<BTreeMap<String, ArtifactRef>, TargetError> {
        Ok(artifacts(&self.logs))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, TargetError> {
        Err(TargetError::NotFound(path.to_string()))
    }

    fn capabilities(&self) -> TargetCapabilities {
        self.capabilities.clone()
    }
}

/// Plugin with a fixed capability and a fixed outcome.
pub struct FakePlugin {
    pub name: &'static str,
    pub capability: Capability,
    pub outcome: FakeOutcome,
    pub runs: AtomicUsize,
}

#[derive(Clone, Copy)]
pub enum FakeOutcome {
    Records(usize),
    Text,
    NotFound,
    Fail,
    Panic,
    Sleep(u64),
}

impl FakePlugin {
    pub fn new(name: &'static str, capability: Capability, outcome: FakeOutcome) -> Arc<Self> {
        Arc::new(FakePlugin {
            name,
            capability,
            outcome,
            runs: AtomicUsize::new(0),
        })
    }
}

impl ForensicPlugin for FakePlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "test plugin"
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn run(&self, target: &dyn ForensicTarget) -> Result<PluginOutput, PluginError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            FakeOutcome::Records(n) => Ok(PluginOutput::Records(
                (0..n)
                    .map(|i| record([("target", json!(target.identifier())), ("n", json!(i))]))
                    .collect(),
            )),
            FakeOutcome::Text => Ok(PluginOutput::Text("free text".to_string())),
            FakeOutcome::NotFound => Err(PluginError::NotFound("nothing here".to_string())),
            FakeOutcome::Fail => Err(PluginError::Failed("broken".to_string())),
            FakeOutcome::Panic => panic!("plugin panicked"),
            FakeOutcome::Sleep(ms) => {
                std::thread::sleep(std::time::Duration::from_millis(ms));
                Ok(PluginOutput::Records(Vec::new()))
            }
        }
    }
}

/// Index kept in memory, optionally refusing some document ids.
#[derive(Default)]
pub struct MemoryIndex {
    pub indices: Mutex<BTreeMap<String, Vec<Document>>>,
    pub exists_checks: AtomicUsize,
    pub creations: AtomicUsize,
    pub reject: Vec<String>,
}

impl MemoryIndex {
    pub fn rejecting(ids: &[&str]) -> Self {
        MemoryIndex {
            reject: ids.iter().map(|s| s.to_string()).collect(),
            ..MemoryIndex::default()
        }
    }

    pub fn documents(&self, index: &str) -> Vec<Document> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

impl DocumentIndex for MemoryIndex {
    fn index_exists(&self, index: &str) -> Result<bool, IndexError> {
        self.exists_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.indices.lock().unwrap().contains_key(index))
    }

    fn create_index(&self, index: &str) -> Result<(), IndexError> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        self.indices
            .lock()
            .unwrap()
            .insert(index.to_string(), Vec::new());
        Ok(())
    }

    fn put_document(&self, index: &str, document: &Document) -> Result<(), IndexError> {
        if self.reject.contains(&document.id) {
            return Err(IndexError::Unavailable(format!("{} rejected", document.id)));
        }
        let mut indices = self.indices.lock().unwrap();
        let docs = indices
            .get_mut(index)
            .ok_or_else(|| IndexError::Unavailable(index.to_string()))?;
        docs.push(document.clone());
        Ok(())
    }
}

pub fn write(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// Minimal 64-bit little-endian x86_64 ELF header.
pub fn elf_x86_64() -> Vec<u8> {
    let mut elf = vec![0u8; 64];
    elf[0..4].copy_from_slice(b"\x7fELF");
    elf[4] = 2; // ELFCLASS64
    elf[5] = 1; // little endian
    elf[6] = 1; // EV_CURRENT
    elf[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    elf[18..20].copy_from_slice(&62u16.to_le_bytes()); // EM_X86_64
    elf[20..24].copy_from_slice(&1u32.to_le_bytes());
    elf[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
    elf[54..56].copy_from_slice(&56u16.to_le_bytes()); // e_phentsize
    elf[58..60].copy_from_slice(&64u16.to_le_bytes()); // e_shentsize
    elf
}

/// A mounted Linux tree with hostname, os-release, passwd and logs.
pub fn linux_tree(root: &Path) {
    write(root, "etc/hostname", b"web-01\n");
    write(
        root,
        "etc/os-release",
        b"NAME=\"Debian GNU/Linux\"\nVERSION_ID=\"12\"\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n",
    );
    write(
        root,
        "etc/passwd",
        b"root:x:0:0:root:/root:/bin/bash\nalice:x:1000:1000:Alice:/home/alice:/bin/zsh\n",
    );
    write(root, "var/log/syslog", b"boot\n");
    write(root, "var/log/apt/history.log", b"install\n");
    write(root, "bin/sh", &elf_x86_64());
}

/// A mounted Windows tree with hives, profiles and event logs.
pub fn windows_tree(root: &Path) {
    write(root, "Windows/System32/config/SYSTEM", b"regf");
    write(root, "Windows/System32/config/SOFTWARE", b"regf");
    write(root, "Windows/System32/winevt/Logs/System.evtx", b"ElfFile");
    write(root, "Windows/System32/winevt/Logs/notes.txt", b"not a log");
    write(root, "Users/bob/NTUSER.DAT", b"regf");
    fs::create_dir_all(root.join("Users/Public")).unwrap();
    fs::create_dir_all(root.join("Users/Default")).unwrap();
}

fn le32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn le64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Raw image with an MBR holding a FAT32 partition and an ext partition.
pub fn mbr_image(path: &Path) {
    let mut image = vec![0u8; 512 * 64];

    // Partition 1: FAT32 LBA at sector 8, 16 sectors
    image[446 + 4] = 0x0C;
    le32(&mut image, 446 + 8, 8);
    le32(&mut image, 446 + 12, 16);
    // Partition 2: Linux at sector 24, 32 sectors
    image[462 + 4] = 0x83;
    le32(&mut image, 462 + 8, 24);
    le32(&mut image, 462 + 12, 32);
    image[510] = 0x55;
    image[511] = 0xAA;

    let fat = 8 * 512;
    image[fat + 0x52..fat + 0x5A].copy_from_slice(b"FAT32   ");
    le32(&mut image, fat + 0x43, 0x1234_ABCD);

    let ext = 24 * 512 + 1024;
    image[ext + 56..ext + 58].copy_from_slice(&0xEF53u16.to_le_bytes());

    fs::write(path, image).unwrap();
}

/// Raw image with a protective MBR and a GPT holding one Linux partition.
pub fn gpt_image(path: &Path) {
    gpt_image_with_entry(path, 34, 63);
}

/// Same layout as [`gpt_image`] with an arbitrary LBA range for the entry.
pub fn gpt_image_with_entry(path: &Path, first_lba: u64, last_lba: u64) {
    let mut image = vec![0u8; 512 * 64];

    image[446 + 4] = 0xEE;
    le32(&mut image, 446 + 8, 1);
    le32(&mut image, 446 + 12, 63);
    image[510] = 0x55;
    image[511] = 0xAA;

    let header = 512;
    image[header..header + 8].copy_from_slice(b"EFI PART");
    le64(&mut image, header + 72, 2);
    le32(&mut image, header + 80, 4);
    le32(&mut image, header + 84, 128);

    // Linux filesystem data GUID 0FC63DAF-8483-4772-8E79-3D69D8477DE4
    let entry = 2 * 512;
    let guid = [
        0xAF, 0x3D, 0xC6, 0x0F, 0x83, 0x84, 0x72, 0x47, 0x8E, 0x79, 0x3D, 0x69, 0xD8, 0x47,
        0x7D, 0xE4,
    ];
    image[entry..entry + 16].copy_from_slice(&guid);
    le64(&mut image, entry + 32, first_lba);
    le64(&mut image, entry + 40, last_lba);

    fs::write(path, image).unwrap();
}

/// Raw image with an NTFS boot sector at sector 0.
pub fn superfloppy_image(path: &Path) {
    let mut image = vec![0u8; 512 * 8];
    image[3..11].copy_from_slice(b"NTFS    ");
    le64(&mut image, 0x48, 0x0011_2233_4455_6677);
    image[510] = 0x55;
    image[511] = 0xAA;
    fs::write(path, image).unwrap();
}
