use crate::compat::ModelCompatibility;
use crate::record::{integer_field, record_list, string_field, string_or, Record};
use crate::volume::Volume;
use crate::{
    normalize_size, random_id, size_in_gigabytes, size_is_installable, MeasurementUnit, INVALID,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FAKE_DISK_IDENTIFIER: &str = "FakeDisk";
pub const FAKE_DISK_CONTENT: &str = "FakeDisk_Null";
pub const DISK_IMAGE_CONTENT: &str = "Disk Image";
const FAKE_DISK_BYTES: i64 = 500 * (1 << 30);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disk {
    pub id: String,
    pub device_identifier: String,
    pub content: String,
    pub size: f64,
    pub measurement_unit: MeasurementUnit,
    pub is_fake: bool,
    pub volumes: Vec<Volume>,
}

/// The parent fields a volume keeps about its disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiskRef {
    pub id: String,
    pub device_identifier: String,
    pub is_fake: bool,
}

impl Disk {
    fn empty() -> Self {
        Self {
            id: random_id(),
            device_identifier: INVALID.to_string(),
            content: INVALID.to_string(),
            size: 0.0,
            measurement_unit: MeasurementUnit::Gigabytes,
            is_fake: false,
            volumes: Vec::new(),
        }
    }

    /// Builds a disk from one `diskutil list -plist` entry.
    ///
    /// `APFSVolumes` wins over `Partitions` when both are present.
    pub fn from_record(record: &Record, compat: &ModelCompatibility) -> Self {
        let mut disk = Self::empty();
        disk.device_identifier = string_or(record, "DeviceIdentifier", INVALID);
        disk.content = string_or(record, "Content", INVALID);
        if let Some(bytes) = integer_field(record, "Size") {
            (disk.size, disk.measurement_unit) = normalize_size(bytes);
        }

        let children = record_list(record, "APFSVolumes")
            .or_else(|| record_list(record, "Partitions"))
            .unwrap_or_default();
        let parent = disk.to_ref();
        disk.volumes = children
            .into_iter()
            .map(|child| Volume::from_partition_record(child, &parent, compat))
            .collect();
        disk
    }

    /// Builds a disk from one `hdiutil info -plist` image entry.
    pub fn from_disk_image_record(record: &Record, compat: &ModelCompatibility) -> Self {
        let mut disk = Self::empty();
        disk.content = DISK_IMAGE_CONTENT.to_string();
        if let Some(bytes) = integer_field(record, "image-size") {
            (disk.size, disk.measurement_unit) = normalize_size(bytes);
        }

        let entities = record_list(record, "system-entities").unwrap_or_default();
        let whole_disk = entities
            .iter()
            .find(|entity| string_field(entity, "mount-point").is_none())
            .and_then(|entity| string_field(entity, "dev-entry"));
        if let Some(dev_entry) = whole_disk {
            disk.device_identifier = dev_entry.trim_start_matches("/dev/").to_string();
        }

        let parent = disk.to_ref();
        disk.volumes = entities
            .into_iter()
            .filter(|entity| string_field(entity, "mount-point").is_some())
            .map(|entity| Volume::from_disk_image_entity(entity, &parent, compat))
            .collect();
        disk
    }

    /// Placeholder disk with a single volume, for when no real hardware is found.
    pub fn synthetic() -> Self {
        let mut disk = Self::empty();
        disk.device_identifier = FAKE_DISK_IDENTIFIER.to_string();
        disk.content = FAKE_DISK_CONTENT.to_string();
        (disk.size, disk.measurement_unit) = normalize_size(FAKE_DISK_BYTES);
        disk.is_fake = true;
        let volume = Volume::synthetic(&disk);
        disk.volumes.push(volume);
        disk
    }

    pub fn to_ref(&self) -> DiskRef {
        DiskRef {
            id: self.id.clone(),
            device_identifier: self.device_identifier.clone(),
            is_fake: self.is_fake,
        }
    }

    pub fn is_installable(&self) -> bool {
        size_is_installable(self.size, self.measurement_unit)
    }

    /// The largest volume, compared across units.
    pub fn main_volume(&self) -> Option<&Volume> {
        self.volumes.iter().max_by(|a, b| {
            size_in_gigabytes(a.size, a.measurement_unit)
                .total_cmp(&size_in_gigabytes(b.size, b.measurement_unit))
        })
    }
}

impl fmt::Display for Disk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Disk:")?;
        writeln!(f, "\tDevice Identifier: {}", self.device_identifier)?;
        writeln!(f, "\tContent: {}", self.content)?;
        writeln!(f, "\tSize: {} {}", self.size, self.measurement_unit)?;
        write!(f, "\tVolumes: {}", self.volumes.len())
    }
}
