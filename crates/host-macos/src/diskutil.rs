//! Property-list output of `diskutil` and `hdiutil`, and feeding it into the repository.

use crate::HostError;
use plist::Value;
use std::io::Cursor;
use utilities_core::record::{record_list, string_field};
use utilities_core::{Disk, ModelCompatibility, Record};
use utilities_repository::ItemRepository;

pub const DISKUTIL: &str = "/usr/sbin/diskutil";
pub const HDIUTIL: &str = "/usr/bin/hdiutil";

fn parse_root(bytes: &[u8], command: &str) -> Result<Record, HostError> {
    let value = Value::from_reader(Cursor::new(bytes)).map_err(|source| HostError::Plist {
        command: command.to_string(),
        source,
    })?;
    match value {
        Value::Dictionary(dict) => Ok(dict),
        _ => Err(HostError::UnexpectedShape {
            command: command.to_string(),
            key: "<root>",
        }),
    }
}

fn top_level_list(root: &Record, command: &str, key: &'static str) -> Result<Vec<Record>, HostError> {
    let list = record_list(root, key).ok_or_else(|| HostError::UnexpectedShape {
        command: command.to_string(),
        key,
    })?;
    Ok(list.into_iter().cloned().collect())
}

/// `AllDisksAndPartitions` entries of `diskutil list -plist`.
pub fn parse_disk_list(bytes: &[u8]) -> Result<Vec<Record>, HostError> {
    let root = parse_root(bytes, "diskutil list")?;
    top_level_list(&root, "diskutil list", "AllDisksAndPartitions")
}

/// `images` entries of `hdiutil info -plist`. No attached images is not an error.
pub fn parse_disk_images(bytes: &[u8]) -> Result<Vec<Record>, HostError> {
    let root = parse_root(bytes, "hdiutil info")?;
    if root.get("images").is_none() {
        return Ok(Vec::new());
    }
    top_level_list(&root, "hdiutil info", "images")
}

/// Every `Containers[].Volumes[]` entry of `diskutil apfs list -plist`.
pub fn parse_apfs_volumes(bytes: &[u8]) -> Result<Vec<Record>, HostError> {
    let root = parse_root(bytes, "diskutil apfs list")?;
    let containers = top_level_list(&root, "diskutil apfs list", "Containers")?;
    Ok(containers
        .iter()
        .flat_map(|container| record_list(container, "Volumes").unwrap_or_default())
        .cloned()
        .collect())
}

pub fn ingest_disk_list(
    repo: &ItemRepository,
    compat: &ModelCompatibility,
    bytes: &[u8],
) -> Result<usize, HostError> {
    let records = parse_disk_list(bytes)?;
    for record in &records {
        repo.ingest_disk(&Disk::from_record(record, compat));
    }
    Ok(records.len())
}

pub fn ingest_disk_images(
    repo: &ItemRepository,
    compat: &ModelCompatibility,
    bytes: &[u8],
) -> Result<usize, HostError> {
    let records = parse_disk_images(bytes)?;
    for record in &records {
        repo.ingest_disk(&Disk::from_disk_image_record(record, compat));
    }
    Ok(records.len())
}

/// Matches APFS entries to stored volumes by device identifier, then by
/// volume UUID. Returns how many stored volumes were refreshed.
pub fn apply_apfs_volumes(
    repo: &ItemRepository,
    compat: &ModelCompatibility,
    bytes: &[u8],
) -> Result<usize, HostError> {
    let mut refreshed = 0;
    for record in parse_apfs_volumes(bytes)? {
        let by_device = string_field(&record, "DeviceIdentifier")
            .and_then(|device| repo.find_volume_by_device(device));
        let target = by_device.or_else(|| {
            string_field(&record, "APFSVolumeUUID").and_then(|uuid| repo.find_volume_by_uuid(uuid))
        });
        let Some(volume) = target else {
            continue;
        };
        if repo.refresh_volume(&volume.id, [&record], compat) {
            refreshed += 1;
        }
    }
    Ok(refreshed)
}

pub fn scan_disks(repo: &ItemRepository, compat: &ModelCompatibility) -> Result<usize, HostError> {
    let output = crate::run_command(DISKUTIL, &["list", "-plist"])?;
    ingest_disk_list(repo, compat, &output)
}

pub fn scan_disk_images(
    repo: &ItemRepository,
    compat: &ModelCompatibility,
) -> Result<usize, HostError> {
    let output = crate::run_command(HDIUTIL, &["info", "-plist"])?;
    ingest_disk_images(repo, compat, &output)
}

pub fn refresh_apfs(repo: &ItemRepository, compat: &ModelCompatibility) -> Result<usize, HostError> {
    let output = crate::run_command(DISKUTIL, &["apfs", "list", "-plist"])?;
    apply_apfs_volumes(repo, compat, &output)
}
