use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

pub mod application;
pub mod catalog;
pub mod compat;
pub mod disk;
pub mod installer;
pub mod record;
pub mod volume;

pub use application::Application;
pub use catalog::{MacOsVersion, VersionCatalog};
pub use compat::{ModelCompatibility, ModelFamily, ModelIdentifierError};
pub use disk::{Disk, DiskRef};
pub use installer::{Installer, InstallerIcon, VolumeRef};
pub use record::Record;
pub use volume::Volume;

pub const INVENTORY_SCHEMA_VERSION: &str = "1.0.0";

/// Placeholder for string fields missing from a raw record.
pub const INVALID: &str = "Invalid";

/// Names, mount points and content tags that never describe a usable volume.
pub const EXCLUDED_PROPERTY_VALUES: [&str; 4] = ["EFI", INVALID, "VM", "Apple_APFS"];

const BYTES_PER_GIGABYTE: f64 = 1_073_741_824.0;

/// Below this many gigabytes a disk is too small to receive an installer.
const MIN_INSTALLABLE_GB: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MeasurementUnit {
    #[default]
    #[serde(rename = "GB")]
    Gigabytes,
    #[serde(rename = "TB")]
    Terabytes,
}

impl MeasurementUnit {
    pub fn label(&self) -> &'static str {
        match self {
            MeasurementUnit::Gigabytes => "GB",
            MeasurementUnit::Terabytes => "TB",
        }
    }
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scales a raw byte count to whole gigabytes, switching to terabytes past 1000 GB.
///
/// The gigabyte value is rounded once; the terabyte value is that rounded figure
/// divided by 1000 and keeps its fraction.
pub fn normalize_size(bytes: i64) -> (f64, MeasurementUnit) {
    let gigabytes = (bytes.max(0) as f64 / BYTES_PER_GIGABYTE).round();
    if gigabytes > 1000.0 {
        (gigabytes / 1000.0, MeasurementUnit::Terabytes)
    } else {
        (gigabytes, MeasurementUnit::Gigabytes)
    }
}

pub(crate) fn size_is_installable(size: f64, unit: MeasurementUnit) -> bool {
    match unit {
        MeasurementUnit::Gigabytes => size > MIN_INSTALLABLE_GB,
        MeasurementUnit::Terabytes => true,
    }
}

/// Size expressed in gigabytes regardless of the unit it was normalized to.
pub(crate) fn size_in_gigabytes(size: f64, unit: MeasurementUnit) -> f64 {
    match unit {
        MeasurementUnit::Gigabytes => size,
        MeasurementUnit::Terabytes => size * 1000.0,
    }
}

pub(crate) fn is_excluded(value: &str) -> bool {
    EXCLUDED_PROPERTY_VALUES.contains(&value)
}

/// Opaque identity for entities that have no natural key.
pub(crate) fn random_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Deterministic identity: equal inputs collide on purpose.
pub(crate) fn content_id(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

pub fn now_utc_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: i64 = 1 << 30;

    #[test]
    fn small_sizes_stay_in_gigabytes() {
        assert_eq!(normalize_size(500 * GIB), (500.0, MeasurementUnit::Gigabytes));
        assert_eq!(normalize_size(1000 * GIB), (1000.0, MeasurementUnit::Gigabytes));
        assert_eq!(normalize_size(0), (0.0, MeasurementUnit::Gigabytes));
    }

    #[test]
    fn gigabytes_round_to_nearest() {
        assert_eq!(normalize_size(GIB + GIB / 2 + 1).0, 2.0);
        assert_eq!(normalize_size(GIB + GIB / 3).0, 1.0);
    }

    #[test]
    fn large_sizes_switch_to_terabytes_without_second_rounding() {
        let (size, unit) = normalize_size(2001 * GIB);
        assert_eq!(unit, MeasurementUnit::Terabytes);
        assert!((size - 2.001).abs() < 1e-9);
    }

    #[test]
    fn negative_byte_counts_clamp_to_zero() {
        assert_eq!(normalize_size(-42), (0.0, MeasurementUnit::Gigabytes));
    }

    #[test]
    fn installable_threshold() {
        assert!(!size_is_installable(150.0, MeasurementUnit::Gigabytes));
        assert!(size_is_installable(151.0, MeasurementUnit::Gigabytes));
        assert!(size_is_installable(0.5, MeasurementUnit::Terabytes));
    }

    #[test]
    fn content_id_is_stable() {
        assert_eq!(content_id("Install macOS Mojave"), content_id("Install macOS Mojave"));
        assert_ne!(content_id("Install macOS Mojave"), content_id("Install macOS Sierra"));
        assert_eq!(content_id("x").len(), 64);
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(random_id(), random_id());
    }

    #[test]
    fn unit_serializes_as_label() {
        assert_eq!(
            serde_json::to_string(&MeasurementUnit::Terabytes).unwrap(),
            "\"TB\""
        );
    }
}
