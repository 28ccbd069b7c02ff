use crate::catalog::VersionCatalog;
use crate::compat::ModelCompatibility;
use crate::content_id;
use crate::volume::Volume;
use plist::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const NOT_AVAILABLE: &str = "Not Available";
pub const UNKNOWN_VERSION: &str = "0.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallerIcon {
    Bundle {
        path: PathBuf,
        #[serde(skip)]
        data: Vec<u8>,
    },
    /// Shown when the bundle icon cannot be read.
    Prohibited,
}

/// The volume fields an installer keeps about the volume it lives on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeRef {
    pub id: String,
    pub volume_name: String,
    pub mount_point: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Installer {
    pub id: String,
    pub version_name: String,
    pub version_number: String,
    pub app_label: String,
    pub icon: InstallerIcon,
    pub volume: VolumeRef,
    /// Evaluated against the machine running the scan.
    pub can_install: bool,
}

fn copy_suffix() -> &'static Regex {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    SUFFIX.get_or_init(|| Regex::new(r".[0-9].*").expect("static pattern"))
}

/// Drops the numeric tail Finder adds to duplicate names, e.g. `Install macOS Mojave.2`.
pub fn parse_version_name(volume_name: &str) -> String {
    copy_suffix().replace(volume_name, "").into_owned()
}

impl Installer {
    pub fn from_volume(volume: &Volume, compat: &ModelCompatibility) -> Self {
        let version_name = parse_version_name(&volume.volume_name);
        let version_number = VersionCatalog::version_for_name(&version_name).to_string();
        let app_label = format!("{}.app", version_name);
        let icon = load_icon(Path::new(&volume.mount_point), &version_name);
        let can_install = compat.can_install(&version_number);
        if can_install {
            tracing::info!("{} can install {}", compat.model_identifier, version_number);
        }

        Self {
            id: content_id(&version_name),
            version_name,
            version_number,
            app_label,
            icon,
            volume: volume.to_ref(),
            can_install,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.app_label != NOT_AVAILABLE && self.version_number != UNKNOWN_VERSION
    }

    pub fn app_path(&self) -> PathBuf {
        Path::new(&self.volume.mount_point).join(&self.app_label)
    }

    pub fn has_icon(&self) -> bool {
        matches!(self.icon, InstallerIcon::Bundle { .. })
    }
}

fn load_icon(mount_point: &Path, version_name: &str) -> InstallerIcon {
    let contents = mount_point
        .join(format!("{}.app", version_name))
        .join("Contents");
    let info_path = contents.join("Info.plist");

    let info = match Value::from_file(&info_path) {
        Ok(info) => info,
        Err(err) => {
            tracing::debug!("no Info.plist at {}: {}", info_path.display(), err);
            return InstallerIcon::Prohibited;
        }
    };
    let Some(icon_name) = info
        .as_dictionary()
        .and_then(|dict| dict.get("CFBundleIconFile"))
        .and_then(Value::as_string)
    else {
        return InstallerIcon::Prohibited;
    };

    let mut file_name = icon_name.to_string();
    if !file_name.contains(".icns") {
        file_name.push_str(".icns");
    }
    let path = contents.join("Resources").join(file_name);
    match std::fs::read(&path) {
        Ok(data) => InstallerIcon::Bundle { path, data },
        Err(err) => {
            tracing::debug!("icon {} unreadable: {}", path.display(), err);
            InstallerIcon::Prohibited
        }
    }
}

impl fmt::Display for Installer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Installer - {} - {} - Icon: {} - Valid: {}",
            self.version_number,
            self.version_name,
            if self.has_icon() { "yes" } else { "no" },
            self.is_valid()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::DiskRef;
    use crate::record::Record;

    fn volume_at(name: &str, mount: &Path) -> Volume {
        let mut record = Record::new();
        record.insert("VolumeName".to_string(), Value::String(name.to_string()));
        record.insert(
            "MountPoint".to_string(),
            Value::String(mount.display().to_string()),
        );
        let parent = DiskRef {
            id: "d".to_string(),
            device_identifier: "disk3".to_string(),
            is_fake: false,
        };
        Volume::from_partition_record(&record, &parent, &ModelCompatibility::for_model("iMac12,2"))
    }

    #[test]
    fn strips_copy_suffix() {
        assert_eq!(parse_version_name("Install macOS Mojave.2"), "Install macOS Mojave");
        assert_eq!(parse_version_name("Install macOS Mojave"), "Install macOS Mojave");
        assert_eq!(parse_version_name("Install macOS Sierra 1"), "Install macOS Sierra");
    }

    #[test]
    fn resolves_version_and_label() {
        let volume = volume_at("Install macOS Mojave.2", Path::new("/nonexistent"));
        let installer = Installer::from_volume(&volume, &ModelCompatibility::for_model("MacBookPro15,1"));
        assert_eq!(installer.version_name, "Install macOS Mojave");
        assert_eq!(installer.version_number, "10.14");
        assert_eq!(installer.app_label, "Install macOS Mojave.app");
        assert_eq!(installer.app_path(), PathBuf::from("/nonexistent/Install macOS Mojave.app"));
        assert!(installer.is_valid());
        assert!(installer.can_install);
        assert_eq!(installer.icon, InstallerIcon::Prohibited);
    }

    #[test]
    fn unknown_name_falls_back_and_stays_valid() {
        let volume = volume_at("Install Weird OS", Path::new("/nonexistent"));
        let installer = Installer::from_volume(&volume, &ModelCompatibility::for_model("MacBookPro15,1"));
        assert_eq!(installer.version_number, "10.11");
        assert!(installer.is_valid());
    }

    #[test]
    fn eligibility_follows_host_model() {
        let volume = volume_at("Install macOS Mojave", Path::new("/nonexistent"));
        let old = ModelCompatibility::for_model("iMac12,2");
        assert!(!Installer::from_volume(&volume, &old).can_install);
        let sierra = volume_at("Install macOS Sierra", Path::new("/nonexistent"));
        assert!(!Installer::from_volume(&sierra, &old).can_install);
        let high_sierra = volume_at("Install macOS High Sierra", Path::new("/nonexistent"));
        assert!(Installer::from_volume(&high_sierra, &old).can_install);
    }

    #[test]
    fn same_name_means_same_identity() {
        let a = volume_at("Install macOS Mojave", Path::new("/Volumes/a"));
        let b = volume_at("Install macOS Mojave.1", Path::new("/Volumes/b"));
        let compat = ModelCompatibility::for_model("MacBookPro15,1");
        assert_eq!(
            Installer::from_volume(&a, &compat).id,
            Installer::from_volume(&b, &compat).id
        );
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn loads_bundle_icon() {
        let dir = tempfile::tempdir().unwrap();
        let contents = dir.path().join("Install macOS Mojave.app/Contents");
        std::fs::create_dir_all(contents.join("Resources")).unwrap();
        let mut info = plist::Dictionary::new();
        info.insert(
            "CFBundleIconFile".to_string(),
            Value::String("InstallAssistant".to_string()),
        );
        Value::Dictionary(info)
            .to_file_xml(contents.join("Info.plist"))
            .unwrap();
        std::fs::write(contents.join("Resources/InstallAssistant.icns"), b"icns").unwrap();

        let volume = volume_at("Install macOS Mojave", dir.path());
        let installer = volume.installer.clone().unwrap();
        match &installer.icon {
            InstallerIcon::Bundle { path, data } => {
                assert!(path.ends_with("Resources/InstallAssistant.icns"));
                assert_eq!(data.as_slice(), b"icns");
            }
            InstallerIcon::Prohibited => panic!("expected bundle icon"),
        }
        assert!(installer.to_string().contains("Icon: yes"));
    }

    #[test]
    fn missing_icon_file_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let contents = dir.path().join("Install macOS Sierra.app/Contents");
        std::fs::create_dir_all(&contents).unwrap();
        let mut info = plist::Dictionary::new();
        info.insert(
            "CFBundleIconFile".to_string(),
            Value::String("Missing.icns".to_string()),
        );
        Value::Dictionary(info)
            .to_file_xml(contents.join("Info.plist"))
            .unwrap();

        let volume = volume_at("Install macOS Sierra", dir.path());
        assert_eq!(volume.installer.unwrap().icon, InstallerIcon::Prohibited);
    }
}
