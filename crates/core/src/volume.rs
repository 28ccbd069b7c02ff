use crate::compat::ModelCompatibility;
use crate::disk::{Disk, DiskRef, FAKE_DISK_CONTENT, FAKE_DISK_IDENTIFIER};
use crate::installer::{Installer, VolumeRef};
use crate::record::{integer_field, real_field, string_field, Record};
use crate::{is_excluded, normalize_size, random_id, size_is_installable, MeasurementUnit, INVALID};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_CONTENT: &str = "Apple_HFS";
pub const NETWORK_CONTENT: &str = "NFS";
const FAKE_MOUNT_POINT: &str = "/tmp";

/// Substrings that mark a volume as carrying OS installer media.
pub const INSTALLER_NAME_MARKERS: [&str; 2] = ["Install OS X", "Install macOS"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    pub id: String,
    pub device_identifier: String,
    pub disk_uuid: String,
    pub volume_uuid: String,
    pub mount_point: String,
    pub volume_name: String,
    pub content: String,
    pub size: f64,
    pub measurement_unit: MeasurementUnit,
    pub contains_installer: bool,
    pub installer: Option<Installer>,
    pub parent_disk: DiskRef,
}

impl Volume {
    fn empty(parent: &DiskRef) -> Self {
        Self {
            id: random_id(),
            device_identifier: String::new(),
            disk_uuid: String::new(),
            volume_uuid: String::new(),
            mount_point: INVALID.to_string(),
            volume_name: INVALID.to_string(),
            content: DEFAULT_CONTENT.to_string(),
            size: 0.0,
            measurement_unit: MeasurementUnit::Gigabytes,
            contains_installer: false,
            installer: None,
            parent_disk: parent.clone(),
        }
    }

    /// Builds a volume from a `Partitions` or `APFSVolumes` entry of `diskutil list -plist`.
    pub fn from_partition_record(
        record: &Record,
        parent: &DiskRef,
        compat: &ModelCompatibility,
    ) -> Self {
        let mut volume = Self::empty(parent);
        if let Some(value) = string_field(record, "DeviceIdentifier") {
            volume.device_identifier = value.to_string();
        }
        if let Some(value) = string_field(record, "DiskUUID") {
            volume.disk_uuid = value.to_string();
        }
        if let Some(value) = string_field(record, "MountPoint") {
            volume.mount_point = value.to_string();
        }
        if let Some(value) = string_field(record, "Content") {
            volume.content = value.to_string();
        }
        if let Some(bytes) = integer_field(record, "Size") {
            (volume.size, volume.measurement_unit) = normalize_size(bytes);
        }
        if let Some(value) = string_field(record, "VolumeName") {
            volume.volume_name = value.to_string();
        }
        if let Some(value) = string_field(record, "VolumeUUID") {
            volume.volume_uuid = value.to_string();
        }
        volume.finish(compat)
    }

    /// Builds a volume from one `system-entities` entry of `hdiutil info -plist`.
    pub fn from_disk_image_entity(
        record: &Record,
        parent: &DiskRef,
        compat: &ModelCompatibility,
    ) -> Self {
        let mut volume = Self::empty(parent);
        if let Some(value) = string_field(record, "mount-point") {
            volume.mount_point = value.to_string();
        }
        if let Some(value) = string_field(record, "content-hint") {
            volume.content = value.to_string();
        }
        if let Some(value) = string_field(record, "dev-entry") {
            volume.device_identifier = value.to_string();
        }
        if let Some(value) = string_field(record, "unmapped-content-hint") {
            volume.volume_uuid = value.to_string();
        }
        volume.volume_name = last_path_component(&volume.mount_point);
        volume.finish(compat)
    }

    /// Volume for a manually mounted share, e.g. `/Volumes/Installers` over NFS.
    pub fn from_mount_point(
        mount_point: &str,
        content: Option<&str>,
        parent: &DiskRef,
        compat: &ModelCompatibility,
    ) -> Self {
        let mut volume = Self::empty(parent);
        volume.mount_point = mount_point.to_string();
        volume.content = content.unwrap_or(NETWORK_CONTENT).to_string();
        volume.volume_name = last_path_component(mount_point);
        volume.finish(compat)
    }

    /// Placeholder volume mirroring a synthetic disk.
    pub fn synthetic(disk: &Disk) -> Self {
        let mut volume = Self::empty(&disk.to_ref());
        if disk.is_fake {
            volume.mount_point = FAKE_MOUNT_POINT.to_string();
            volume.volume_name = FAKE_DISK_IDENTIFIER.to_string();
            volume.content = FAKE_DISK_CONTENT.to_string();
        } else {
            tracing::error!(
                disk = %disk.device_identifier,
                "synthetic volume requested for a real disk"
            );
        }
        volume.size = disk.size;
        volume.measurement_unit = disk.measurement_unit;
        volume
    }

    fn finish(mut self, compat: &ModelCompatibility) -> Self {
        if self.is_valid() {
            self.check_if_contains_installer(compat);
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        !is_excluded(&self.volume_name) && !is_excluded(&self.mount_point)
    }

    pub fn is_installable(&self) -> bool {
        (size_is_installable(self.size, self.measurement_unit) && !is_excluded(&self.content))
            || self.parent_disk.is_fake
    }

    pub fn has_installer_name(&self) -> bool {
        INSTALLER_NAME_MARKERS
            .iter()
            .any(|marker| self.volume_name.contains(marker))
    }

    pub fn to_ref(&self) -> VolumeRef {
        VolumeRef {
            id: self.id.clone(),
            volume_name: self.volume_name.clone(),
            mount_point: self.mount_point.clone(),
        }
    }

    /// Attaches an installer when the name starts to match, detaches it when
    /// the name stops matching. Returns true when an installer was attached.
    pub fn check_if_contains_installer(&mut self, compat: &ModelCompatibility) -> bool {
        let named_like_installer = self.has_installer_name();
        if named_like_installer && !self.contains_installer {
            let candidate = Installer::from_volume(self, compat);
            if candidate.is_valid() {
                tracing::debug!(volume = %self.volume_name, "found {}", candidate);
                self.installer = Some(candidate);
                self.contains_installer = true;
                return true;
            }
            tracing::debug!(volume = %self.volume_name, "installer candidate rejected");
        } else if !named_like_installer && self.contains_installer {
            self.contains_installer = false;
            self.installer = None;
        }
        false
    }

    /// Applies `diskutil apfs list` volume entries, then re-checks for an installer.
    pub fn update_with_apfs_data<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a Record>,
        compat: &ModelCompatibility,
    ) -> bool {
        let mut attached = false;
        for record in records {
            if let Some(value) = string_field(record, "APFSVolumeUUID") {
                self.volume_uuid = value.to_string();
            }
            if let Some(value) = string_field(record, "DiskUUID") {
                self.disk_uuid = value.to_string();
            }
            if self.contains_installer {
                if let Some(bytes) = real_field(record, "CapacityInUse") {
                    (self.size, self.measurement_unit) = normalize_size(bytes as i64);
                }
            }
            attached |= self.check_if_contains_installer(compat);
        }
        attached
    }
}

fn last_path_component(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(INVALID)
        .to_string()
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parent_disk.is_fake {
            return write!(f, "FakeVolume on {}", self.parent_disk.device_identifier);
        }
        writeln!(f, "Volume:")?;
        writeln!(f, "\tDevice Identifier: {}", self.device_identifier)?;
        writeln!(f, "\tDisk UUID: {}", self.disk_uuid)?;
        writeln!(f, "\tInstallable: {}", self.is_installable())?;
        writeln!(f, "\tMount Point: {}", self.mount_point)?;
        writeln!(f, "\tVolume Name: {}", self.volume_name)?;
        writeln!(f, "\tVolume UUID: {}", self.volume_uuid)?;
        match &self.installer {
            Some(installer) => writeln!(f, "\tInstaller: {}", installer)?,
            None => writeln!(f, "\tInstaller: None")?,
        }
        write!(f, "\tSize: {} {}", self.size, self.measurement_unit)
    }
}
