pub mod applications;
pub mod diskutil;
pub mod settings;

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use utilities_core::{Disk, DiskRef, ModelCompatibility, Volume};
use utilities_repository::ItemRepository;

pub use applications::discover_applications;
pub use diskutil::{refresh_apfs, scan_disk_images, scan_disks};
pub use settings::{NetworkMount, Settings};

pub const UNKNOWN_MODEL: &str = "Unknown";
const NETWORK_DEVICE: &str = "Network";

#[derive(Debug, Error)]
pub enum HostError {
    #[error("{0} requires macOS")]
    Unsupported(String),
    #[error("run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("invalid property list from {command}: {source}")]
    Plist {
        command: String,
        #[source]
        source: plist::Error,
    },
    #[error("{command} output has no usable {key}")]
    UnexpectedShape { command: String, key: &'static str },
    #[error("read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sysctl {name}: {source}")]
    Sysctl {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sysctl {name} is not a UTF-8 string")]
    SysctlValue { name: String },
    #[error("settings {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub model_identifier: String,
    pub disks: usize,
    pub volumes: usize,
    pub installers: usize,
    pub applications: usize,
    pub used_fake_disk: bool,
}

/// `hw.model` of the running machine, `None` off macOS.
pub fn read_model_identifier() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        match sysctl_string("hw.model") {
            Ok(model) => Some(model),
            Err(err) => {
                tracing::warn!("model identifier unavailable: {}", err);
                None
            }
        }
    }

    #[cfg(not(target_os = "macos"))]
    {
        None
    }
}

pub fn host_compatibility(settings: &Settings) -> ModelCompatibility {
    let model = settings
        .model_identifier
        .clone()
        .or_else(read_model_identifier)
        .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
    ModelCompatibility::for_model(model)
}

pub fn register_network_mount(
    repo: &ItemRepository,
    compat: &ModelCompatibility,
    mount: &NetworkMount,
) -> bool {
    let parent = DiskRef {
        id: format!("network:{}", mount.path),
        device_identifier: NETWORK_DEVICE.to_string(),
        is_fake: false,
    };
    let volume = Volume::from_mount_point(&mount.path, mount.content.as_deref(), &parent, compat);
    repo.ingest_volume(&volume)
}

/// Runs every producer once. Individual producer failures are logged and
/// skipped; only the primary disk listing aborts the scan.
pub fn full_scan(repo: &ItemRepository, settings: &Settings) -> Result<ScanSummary, HostError> {
    let compat = host_compatibility(settings);
    tracing::info!(
        model = %compat.model_identifier,
        "installable versions: {:?}",
        compat.installable_version_numbers()
    );

    let scanned = match scan_disks(repo, &compat) {
        Ok(count) => count,
        Err(HostError::Unsupported(what)) if settings.fake_disk_when_empty => {
            tracing::warn!("{} requires macOS, continuing without real disks", what);
            0
        }
        Err(err) => return Err(err),
    };
    tracing::info!("diskutil reported {} disks", scanned);

    if settings.scan_disk_images {
        if let Err(err) = scan_disk_images(repo, &compat) {
            tracing::warn!("disk image scan skipped: {}", err);
        }
    }
    if settings.refresh_apfs {
        match refresh_apfs(repo, &compat) {
            Ok(count) => tracing::debug!("refreshed {} volumes from APFS metadata", count),
            Err(err) => tracing::warn!("APFS refresh skipped: {}", err),
        }
    }
    for mount in &settings.network_mounts {
        if !register_network_mount(repo, &compat, mount) {
            tracing::warn!("network mount {} is not a usable volume", mount.path);
        }
    }

    let dirs = settings
        .application_dirs
        .iter()
        .map(|dir| (dir, false))
        .chain(settings.utility_dirs.iter().map(|dir| (dir, true)));
    for (dir, is_utility) in dirs {
        if let Err(err) = discover_applications(repo, dir, is_utility) {
            tracing::warn!("application discovery skipped: {}", err);
        }
    }

    let mut used_fake_disk = false;
    if settings.fake_disk_when_empty && repo.get_disks().is_empty() {
        tracing::info!("no disks found, registering a synthetic disk");
        repo.ingest_disk(&Disk::synthetic());
        used_fake_disk = true;
    }

    Ok(ScanSummary {
        model_identifier: compat.model_identifier.clone(),
        disks: repo.get_disks().len(),
        volumes: repo.get_volumes().len(),
        installers: repo.get_installers().len(),
        applications: repo.get_applications().len(),
        used_fake_disk,
    })
}

/// Starts a background scan and returns immediately.
pub fn spawn_initial_scan(repo: Arc<ItemRepository>, settings: Settings) -> JoinHandle<()> {
    std::thread::spawn(move || match full_scan(&repo, &settings) {
        Ok(summary) => tracing::info!(
            "initial scan finished: {} disks, {} volumes, {} installers",
            summary.disks,
            summary.volumes,
            summary.installers
        ),
        Err(err) => tracing::error!("initial scan failed: {}", err),
    })
}

#[cfg(target_os = "macos")]
pub(crate) fn run_command(cmd: &str, args: &[&str]) -> Result<Vec<u8>, HostError> {
    let output = std::process::Command::new(cmd)
        .args(args)
        .output()
        .map_err(|source| HostError::Spawn {
            command: cmd.to_string(),
            source,
        })?;
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(HostError::CommandFailed {
            command: format!("{} {}", cmd, args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(not(target_os = "macos"))]
pub(crate) fn run_command(cmd: &str, _args: &[&str]) -> Result<Vec<u8>, HostError> {
    Err(HostError::Unsupported(cmd.to_string()))
}

#[cfg(target_os = "macos")]
fn sysctl_string(name: &str) -> Result<String, HostError> {
    use std::ffi::CString;
    use std::ptr;

    let failed = |source| HostError::Sysctl {
        name: name.to_string(),
        source,
    };
    let c_name = CString::new(name)
        .map_err(|err| failed(std::io::Error::new(std::io::ErrorKind::InvalidInput, err)))?;

    // First call sizes the buffer, second call fills it.
    let mut len = 0usize;
    let rc = unsafe {
        libc::sysctlbyname(c_name.as_ptr(), ptr::null_mut(), &mut len, ptr::null_mut(), 0)
    };
    if rc != 0 {
        return Err(failed(std::io::Error::last_os_error()));
    }
    let mut value = vec![0u8; len];
    let rc = unsafe {
        libc::sysctlbyname(
            c_name.as_ptr(),
            value.as_mut_ptr().cast(),
            &mut len,
            ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(failed(std::io::Error::last_os_error()));
    }
    value.truncate(len);
    decode_sysctl_value(name, value)
}

/// Decodes a NUL-terminated sysctl string value.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn decode_sysctl_value(name: &str, mut value: Vec<u8>) -> Result<String, HostError> {
    if let Some(end) = value.iter().position(|&b| b == 0) {
        value.truncate(end);
    }
    String::from_utf8(value).map_err(|_| HostError::SysctlValue {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_model_wins() {
        let settings = Settings {
            model_identifier: Some("MacPro6,1".to_string()),
            ..Settings::default()
        };
        let compat = host_compatibility(&settings);
        assert_eq!(compat.model_identifier, "MacPro6,1");
        assert!(compat.can_install("10.9"));
    }

    #[test]
    fn sysctl_values_stop_at_nul() {
        let model = decode_sysctl_value("hw.model", b"MacBookPro15,1\0\0".to_vec()).unwrap();
        assert_eq!(model, "MacBookPro15,1");
        assert_eq!(decode_sysctl_value("hw.model", Vec::new()).unwrap(), "");
        assert!(matches!(
            decode_sysctl_value("hw.model", vec![0xff, 0xfe, 0]),
            Err(HostError::SysctlValue { .. })
        ));
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn unknown_sysctl_is_an_error() {
        assert!(matches!(
            sysctl_string("hw.no_such_key"),
            Err(HostError::Sysctl { .. })
        ));
    }

    #[test]
    fn network_mount_registers_volume() {
        let repo = ItemRepository::new();
        let compat = ModelCompatibility::for_model("iMac18,3");
        let mount = NetworkMount {
            path: "/Volumes/Install macOS Mojave".to_string(),
            content: Some("smbfs".to_string()),
        };
        assert!(register_network_mount(&repo, &compat, &mount));
        let volumes = repo.get_volumes();
        assert_eq!(volumes[0].content, "smbfs");
        assert_eq!(volumes[0].parent_disk.device_identifier, NETWORK_DEVICE);
        assert_eq!(repo.get_installers().len(), 1);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn scan_off_macos_falls_back_to_fake_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Terminal.app")).unwrap();
        let settings = Settings {
            model_identifier: Some("MacBookPro15,1".to_string()),
            application_dirs: Vec::new(),
            utility_dirs: vec![dir.path().to_path_buf()],
            fake_disk_when_empty: true,
            ..Settings::default()
        };
        let repo = ItemRepository::new();
        let summary = full_scan(&repo, &settings).unwrap();
        assert!(summary.used_fake_disk);
        assert_eq!(summary.disks, 1);
        assert_eq!(summary.volumes, 1);
        assert_eq!(summary.applications, 1);
        assert!(repo.get_applications()[0].is_utility);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn scan_off_macos_without_fallback_fails() {
        let settings = Settings {
            fake_disk_when_empty: false,
            ..Settings::default()
        };
        let repo = ItemRepository::new();
        assert!(matches!(
            full_scan(&repo, &settings),
            Err(HostError::Unsupported(_))
        ));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn background_scan_populates_shared_repository() {
        let repo = Arc::new(ItemRepository::new());
        let rx = repo.subscribe();
        let settings = Settings {
            application_dirs: Vec::new(),
            utility_dirs: Vec::new(),
            fake_disk_when_empty: true,
            ..Settings::default()
        };
        spawn_initial_scan(Arc::clone(&repo), settings).join().unwrap();
        assert_eq!(repo.get_disks().len(), 1);
        assert!(rx.try_iter().count() >= 2);
    }
}
