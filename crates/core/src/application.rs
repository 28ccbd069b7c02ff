use crate::content_id;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// An `.app` bundle found in one of the application directories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub is_utility: bool,
}

impl Application {
    /// Returns `None` unless the path names an `.app` bundle.
    pub fn from_bundle_path(path: impl AsRef<Path>, is_utility: bool) -> Option<Self> {
        let path = path.as_ref();
        let is_app = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("app"))
            .unwrap_or(false);
        if !is_app {
            return None;
        }
        let name = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            id: content_id(&path.to_string_lossy()),
            name,
            path: path.to_path_buf(),
            is_utility,
        })
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}{}",
            self.name,
            self.path.display(),
            if self.is_utility { " (utility)" } else { "" }
        )
    }
}
