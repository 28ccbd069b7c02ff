//! Decides which installer versions the host hardware may run, from its model identifier.

use crate::catalog::MacOsVersion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelFamily {
    MacBookPro,
    MacBookAir,
    MacBook,
    Macmini,
    MacPro,
    IMac,
}

impl ModelFamily {
    /// Matching order matters: the three MacBook prefixes overlap.
    pub const ALL: [ModelFamily; 6] = [
        ModelFamily::MacBookPro,
        ModelFamily::MacBookAir,
        ModelFamily::MacBook,
        ModelFamily::Macmini,
        ModelFamily::MacPro,
        ModelFamily::IMac,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            ModelFamily::MacBookPro => "MacBookPro",
            ModelFamily::MacBookAir => "MacBookAir",
            ModelFamily::MacBook => "MacBook",
            ModelFamily::Macmini => "Macmini",
            ModelFamily::MacPro => "MacPro",
            ModelFamily::IMac => "iMac",
        }
    }

    /// Identifier digits must exceed this for the newest release.
    pub fn newest_release_threshold(&self) -> i64 {
        match self {
            ModelFamily::MacBookPro => 91,
            ModelFamily::MacBookAir => 51,
            ModelFamily::MacBook => 81,
            ModelFamily::Macmini => 61,
            ModelFamily::MacPro => 41,
            ModelFamily::IMac => 131,
        }
    }

    pub fn detect(model_identifier: &str) -> Option<ModelFamily> {
        Self::ALL
            .into_iter()
            .find(|family| model_identifier.starts_with(family.prefix()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelIdentifierError {
    #[error("model identifier {identifier:?} has non-numeric revision {remainder:?}")]
    NonNumericRevision { identifier: String, remainder: String },
}

/// Strips the family prefix and commas, e.g. `MacBookPro15,1` becomes 151.
pub fn identifier_digits(
    model_identifier: &str,
    family: ModelFamily,
) -> Result<i64, ModelIdentifierError> {
    let remainder = model_identifier
        .strip_prefix(family.prefix())
        .unwrap_or(model_identifier)
        .replace(',', "");
    remainder
        .parse::<i64>()
        .map_err(|_| ModelIdentifierError::NonNumericRevision {
            identifier: model_identifier.to_string(),
            remainder,
        })
}

/// Installable versions for one machine, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCompatibility {
    pub model_identifier: String,
    pub family: Option<ModelFamily>,
    installable_versions: Vec<MacOsVersion>,
}

impl ModelCompatibility {
    pub fn for_model(model_identifier: impl Into<String>) -> Self {
        let model_identifier = model_identifier.into();
        let family = ModelFamily::detect(&model_identifier);
        let mut versions = vec![MacOsVersion::ElCapitan, MacOsVersion::HighSierra];

        if let Some(family) = family {
            if family == ModelFamily::MacPro {
                versions.push(MacOsVersion::Mavericks);
            }
            match identifier_digits(&model_identifier, family) {
                Ok(digits) if digits > family.newest_release_threshold() => {
                    versions.push(MacOsVersion::NEWEST);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("{}; treating as below the {} threshold", err, family.prefix());
                }
            }
        } else {
            tracing::debug!(model = %model_identifier, "unknown model family, baseline versions only");
        }

        versions.reverse();
        Self {
            model_identifier,
            family,
            installable_versions: versions,
        }
    }

    pub fn installable_versions(&self) -> &[MacOsVersion] {
        &self.installable_versions
    }

    pub fn installable_version_numbers(&self) -> Vec<&'static str> {
        self.installable_versions
            .iter()
            .map(|version| version.number())
            .collect()
    }

    pub fn can_install(&self, version_number: &str) -> bool {
        self.installable_versions
            .iter()
            .any(|version| version.number() == version_number)
    }
}
