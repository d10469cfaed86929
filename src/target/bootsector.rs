//! Partition table and boot sector decoding for raw disk images
//!
//! Layouts follow the on-disk MBR, GPT, NTFS/FAT/exFAT boot sector and ext
//! superblock formats. Only the fields needed to enumerate volumes and
//! identify their filesystem are decoded.
use crate::error::TargetError;
use crate::target::FilesystemInfo;

pub const SECTOR_SIZE: u64 = 512;

/// The number of primary partitions supported by MBR.
pub const PART_CNT: usize = 4;

const MBR_TABLE_OFFSET: usize = 446;
const MBR_SIGNATURE_OFFSET: usize = 510;
const MBR_SIGNATURE: u16 = 0xAA55;
const GPT_PROTECTIVE: u8 = 0xEE;
const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
const EXT_SUPERBLOCK_OFFSET: usize = 1024;
const EXT_MAGIC: u16 = 0xEF53;

/// Read a u16 (2 bytes, little-endian) at a given offset.
pub fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read a u32 (4 bytes, little-endian) at a given offset.
pub fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    Some(u32::from_le_bytes(buf))
}

/// Read a u64 (8 bytes, little-endian) at a given offset.
pub fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

/// A populated MBR or GPT partition entry, in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    pub offset: u64,
    pub size: u64,
    pub kind: String,
}

/// Human-readable label for an MBR partition type byte.
pub fn mbr_type_name(byte: u8) -> String {
    let name = match byte {
        0x01 => "FAT12",
        0x04 | 0x06 | 0x0E => "FAT16",
        0x05 | 0x0F => "Extended",
        0x07 => "NTFS/exFAT",
        0x0B => "FAT32 CHS",
        0x0C => "LBA FAT32",
        0x27 => "Windows recovery",
        0x82 => "Linux swap",
        0x83 => "Linux",
        0x8E => "Linux LVM",
        0xA5 => "FreeBSD",
        0xAF => "HFS+",
        0xEE => "GPT protective",
        0xEF => "EFI System",
        other => return format!("0x{:02X}", other),
    };
    name.to_string()
}

/// Human-readable label for a GPT partition type GUID.
pub fn gpt_type_name(guid: &str) -> String {
    let name = match guid {
        "C12A7328-F81F-11D2-BA4B-00A0C93EC93B" => "EFI System",
        "E3C9E316-0B5C-4DB8-817D-F92DF00215AE" => "Microsoft reserved",
        "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7" => "Microsoft basic data",
        "DE94BBA4-06D1-4D40-A16A-BFD50179D6AC" => "Windows recovery",
        "0FC63DAF-8483-4772-8E79-3D69D8477DE4" => "Linux filesystem",
        "0657FD6D-A4AB-43C4-84E5-0933C84B4F4F" => "Linux swap",
        "E6D6D379-F507-44C2-A23C-238F2A3DF928" => "Linux LVM",
        other => return format!("GPT {}", other),
    };
    name.to_string()
}

/// Format a mixed-endian GUID as stored in GPT entries.
pub fn format_guid(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 16 {
        return None;
    }
    let d1 = read_u32(bytes, 0)?;
    let d2 = read_u16(bytes, 4)?;
    let d3 = read_u16(bytes, 6)?;
    let tail: String = bytes[10..16].iter().map(|b| format!("{:02X}", b)).collect();
    Some(format!(
        "{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{}",
        d1, d2, d3, bytes[8], bytes[9], tail
    ))
}

/// Whether the first sector carries the 0x55AA boot signature.
pub fn has_boot_signature(data: &[u8]) -> bool {
    read_u16(data, MBR_SIGNATURE_OFFSET) == Some(MBR_SIGNATURE)
}

/// Identify the filesystem whose boot sector (or superblock) starts at `data`.
pub fn detect_filesystem(data: &[u8]) -> Option<FilesystemInfo> {
    if data.get(3..11) == Some(b"NTFS    ".as_slice()) {
        return Some(FilesystemInfo {
            name: "NtfsFilesystem".to_string(),
            serial: read_u64(data, 0x48).map(|s| format!("{:016X}", s)),
        });
    }

    if data.get(3..11) == Some(b"EXFAT   ".as_slice()) {
        return Some(FilesystemInfo {
            name: "ExfatFilesystem".to_string(),
            serial: read_u32(data, 0x64).map(format_fat_serial),
        });
    }

    if data.get(0x52..0x5A) == Some(b"FAT32   ".as_slice()) {
        return Some(FilesystemInfo {
            name: "FatFilesystem".to_string(),
            serial: read_u32(data, 0x43).map(format_fat_serial),
        });
    }

    // FAT12/16 keep the type string in the extended BPB at 0x36
    if data.get(0x36..0x39) == Some(b"FAT".as_slice()) && has_boot_signature(data) {
        return Some(FilesystemInfo {
            name: "FatFilesystem".to_string(),
            serial: read_u32(data, 0x27).map(format_fat_serial),
        });
    }

    if read_u16(data, EXT_SUPERBLOCK_OFFSET + 56) == Some(EXT_MAGIC) {
        let uuid = data
            .get(EXT_SUPERBLOCK_OFFSET + 104..EXT_SUPERBLOCK_OFFSET + 120)
            .map(format_uuid);
        return Some(FilesystemInfo {
            name: "ExtFilesystem".to_string(),
            serial: uuid,
        });
    }

    None
}

fn format_fat_serial(serial: u32) -> String {
    format!("{:04X}-{:04X}", serial >> 16, serial & 0xFFFF)
}

fn format_uuid(bytes: &[u8]) -> String {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        hex[0..4].concat(),
        hex[4..6].concat(),
        hex[6..8].concat(),
        hex[8..10].concat(),
        hex[10..16].concat()
    )
}

/// Decode the four MBR partition entries, skipping empty slots.
///
/// Entries keep their table order. Overlapping entries make the table
/// invalid.
pub fn parse_mbr(sector: &[u8]) -> Result<Vec<(u8, PartitionEntry)>, TargetError> {
    if !has_boot_signature(sector) {
        return Err(TargetError::Corrupt(format!(
            "invalid boot signature 0x{:04X}",
            read_u16(sector, MBR_SIGNATURE_OFFSET).unwrap_or(0)
        )));
    }

    let mut entries = Vec::with_capacity(PART_CNT);
    for i in 0..PART_CNT {
        let base = MBR_TABLE_OFFSET + i * 16;
        let type_byte = sector[base + 0x04];
        let lba_start = read_u32(sector, base + 0x08).unwrap_or(0);
        let sector_cnt = read_u32(sector, base + 0x0C).unwrap_or(0);

        if type_byte == 0 || sector_cnt == 0 {
            continue;
        }

        entries.push((
            type_byte,
            PartitionEntry {
                offset: u64::from(lba_start) * SECTOR_SIZE,
                size: u64::from(sector_cnt) * SECTOR_SIZE,
                kind: mbr_type_name(type_byte),
            },
        ));
    }

    let mut sorted: Vec<&PartitionEntry> = entries.iter().map(|(_, e)| e).collect();
    sorted.sort_by_key(|e| e.offset);
    if sorted
        .windows(2)
        .any(|pair| pair[0].offset.saturating_add(pair[0].size) > pair[1].offset)
    {
        return Err(TargetError::Corrupt(
            "some partitions are overlapping".to_string(),
        ));
    }

    Ok(entries)
}

/// Whether the MBR only holds a GPT protective entry.
pub fn is_protective_mbr(entries: &[(u8, PartitionEntry)]) -> bool {
    entries.iter().any(|(t, _)| *t == GPT_PROTECTIVE)
}

/// Decode the GPT header at LBA 1 and its partition entry array.
pub fn parse_gpt(image: &[u8]) -> Result<Vec<PartitionEntry>, TargetError> {
    let header = image
        .get(SECTOR_SIZE as usize..2 * SECTOR_SIZE as usize)
        .ok_or_else(|| TargetError::Corrupt("image too small for a GPT header".to_string()))?;

    if &header[0..8] != GPT_SIGNATURE {
        return Err(TargetError::Corrupt("missing GPT header signature".to_string()));
    }

    let entries_lba = read_u64(header, 72).unwrap_or(0);
    let entry_count = read_u32(header, 80).unwrap_or(0) as usize;
    let entry_size = read_u32(header, 84).unwrap_or(0) as usize;

    if entry_size < 128 || entry_count > 1024 {
        return Err(TargetError::Corrupt(format!(
            "implausible GPT entry array ({} entries of {} bytes)",
            entry_count, entry_size
        )));
    }

    let array_start = entries_lba
        .checked_mul(SECTOR_SIZE)
        .and_then(|start| usize::try_from(start).ok())
        .ok_or_else(|| corrupt_gpt("partition entry array lies past the addressable range"))?;
    let image_len = image.len() as u64;
    let mut entries = Vec::new();
    for i in 0..entry_count {
        let Some(start) = i
            .checked_mul(entry_size)
            .and_then(|rel| array_start.checked_add(rel))
        else {
            break;
        };
        let raw = match start
            .checked_add(entry_size)
            .and_then(|end| image.get(start..end))
        {
            Some(raw) => raw,
            None => break,
        };
        if raw[0..16].iter().all(|b| *b == 0) {
            continue;
        }

        let first_lba = read_u64(raw, 32).unwrap_or(0);
        let last_lba = read_u64(raw, 40).unwrap_or(0);
        if last_lba < first_lba {
            continue;
        }
        let (offset, size) = first_lba
            .checked_mul(SECTOR_SIZE)
            .zip(
                (last_lba - first_lba)
                    .checked_add(1)
                    .and_then(|sectors| sectors.checked_mul(SECTOR_SIZE)),
            )
            .ok_or_else(|| corrupt_gpt(&format!("partition entry {} overflows", i)))?;
        match offset.checked_add(size) {
            Some(end) if end <= image_len => {}
            _ => {
                return Err(corrupt_gpt(&format!(
                    "partition entry {} ends past the image ({} bytes)",
                    i, image_len
                )))
            }
        }
        let kind = format_guid(&raw[0..16])
            .map(|guid| gpt_type_name(&guid))
            .unwrap_or_else(|| "GPT".to_string());

        entries.push(PartitionEntry { offset, size, kind });
    }

    Ok(entries)
}

fn corrupt_gpt(reason: &str) -> TargetError {
    TargetError::Corrupt(format!("GPT: {}", reason))
}
