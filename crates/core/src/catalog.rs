//! Installer display names and the OS version numbers they ship.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacOsVersion {
    Mavericks,
    ElCapitan,
    Sierra,
    HighSierra,
    Mojave,
}

impl MacOsVersion {
    /// Newest release any supported machine can be offered.
    pub const NEWEST: MacOsVersion = MacOsVersion::Mojave;
    /// Version assumed for names the catalog does not know.
    pub const FALLBACK: MacOsVersion = MacOsVersion::ElCapitan;

    pub fn number(&self) -> &'static str {
        match self {
            MacOsVersion::Mavericks => "10.9",
            MacOsVersion::ElCapitan => "10.11",
            MacOsVersion::Sierra => "10.12",
            MacOsVersion::HighSierra => "10.13",
            MacOsVersion::Mojave => "10.14",
        }
    }

    pub fn installer_name(&self) -> &'static str {
        match self {
            MacOsVersion::Mavericks => "Install OS X Mavericks",
            MacOsVersion::ElCapitan => "Install OS X El Capitan",
            MacOsVersion::Sierra => "Install macOS Sierra",
            MacOsVersion::HighSierra => "Install macOS High Sierra",
            MacOsVersion::Mojave => "Install macOS Mojave",
        }
    }
}

impl fmt::Display for MacOsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.installer_name(), self.number())
    }
}

/// Static lookup between version numbers and installer names.
pub struct VersionCatalog;

impl VersionCatalog {
    pub const ENTRIES: [MacOsVersion; 5] = [
        MacOsVersion::Mavericks,
        MacOsVersion::ElCapitan,
        MacOsVersion::Sierra,
        MacOsVersion::HighSierra,
        MacOsVersion::Mojave,
    ];

    pub fn find_by_number(number: &str) -> Option<MacOsVersion> {
        Self::ENTRIES
            .into_iter()
            .find(|version| version.number() == number)
    }

    pub fn find_by_name(name: &str) -> Option<MacOsVersion> {
        Self::ENTRIES
            .into_iter()
            .find(|version| version.installer_name() == name)
    }

    pub fn name_for_version(number: &str) -> &'static str {
        Self::find_by_number(number)
            .unwrap_or(MacOsVersion::FALLBACK)
            .installer_name()
    }

    pub fn version_for_name(name: &str) -> &'static str {
        match Self::find_by_name(name) {
            Some(version) => version.number(),
            None => {
                tracing::debug!(
                    installer = name,
                    "unknown installer name, assuming {}",
                    MacOsVersion::FALLBACK.number()
                );
                MacOsVersion::FALLBACK.number()
            }
        }
    }
}
