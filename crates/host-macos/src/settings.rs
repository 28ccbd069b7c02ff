use crate::HostError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_ENV: &str = "UTILITIES_SETTINGS";
pub const MODEL_IDENTIFIER_ENV: &str = "UTILITIES_MODEL_IDENTIFIER";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkMount {
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Overrides `hw.model`, e.g. to check eligibility for another machine.
    pub model_identifier: Option<String>,
    pub scan_disk_images: bool,
    pub refresh_apfs: bool,
    pub application_dirs: Vec<PathBuf>,
    pub utility_dirs: Vec<PathBuf>,
    pub network_mounts: Vec<NetworkMount>,
    pub fake_disk_when_empty: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_identifier: None,
            scan_disk_images: true,
            refresh_apfs: true,
            application_dirs: vec![PathBuf::from("/Applications")],
            utility_dirs: vec![PathBuf::from("/Applications/Utilities")],
            network_mounts: Vec::new(),
            fake_disk_when_empty: false,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&data).map_err(|source| HostError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the file named by `UTILITIES_SETTINGS` if set, then applies
    /// environment overrides.
    pub fn from_env() -> Result<Self, HostError> {
        let mut settings = match std::env::var(SETTINGS_ENV).ok() {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup(MODEL_IDENTIFIER_ENV).filter(|m| !m.trim().is_empty()) {
            self.model_identifier = Some(model.trim().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            "model_identifier: iMac18,3\nnetwork_mounts:\n  - path: /Volumes/Installers\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.model_identifier.as_deref(), Some("iMac18,3"));
        assert!(settings.scan_disk_images);
        assert_eq!(settings.application_dirs, vec![PathBuf::from("/Applications")]);
        assert_eq!(settings.network_mounts[0].path, "/Volumes/Installers");
        assert_eq!(settings.network_mounts[0].content, None);
    }

    #[test]
    fn bad_yaml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "scan_disk_images: [").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, HostError::Settings { .. }));
        assert!(err.to_string().contains("settings.yaml"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Settings::load("/nonexistent/settings.yaml").unwrap_err();
        assert!(matches!(err, HostError::Io { .. }));
    }

    #[test]
    fn environment_overrides_model() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| {
            (key == MODEL_IDENTIFIER_ENV).then(|| " MacPro6,1 ".to_string())
        });
        assert_eq!(settings.model_identifier.as_deref(), Some("MacPro6,1"));

        let mut untouched = Settings::default();
        untouched.apply_overrides(|_| Some(String::new()));
        assert_eq!(untouched.model_identifier, None);
    }
}
