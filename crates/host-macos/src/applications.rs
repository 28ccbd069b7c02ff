use crate::HostError;
use std::fs;
use std::path::Path;
use utilities_core::Application;
use utilities_repository::ItemRepository;

/// Registers every `.app` bundle directly inside `dir`. Returns how many were new.
pub fn discover_applications(
    repo: &ItemRepository,
    dir: &Path,
    is_utility: bool,
) -> Result<usize, HostError> {
    let entries = fs::read_dir(dir).map_err(|source| HostError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut added = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(application) = Application::from_bundle_path(&path, is_utility) {
            if repo.add_application(application) {
                added += 1;
            }
        }
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_bundles_and_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Safari.app")).unwrap();
        fs::create_dir(dir.path().join("Utilities")).unwrap();
        fs::write(dir.path().join("Notes.app"), b"not a bundle").unwrap();

        let repo = ItemRepository::new();
        assert_eq!(discover_applications(&repo, dir.path(), false).unwrap(), 1);
        assert_eq!(discover_applications(&repo, dir.path(), false).unwrap(), 0);
        let apps = repo.get_applications();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "Safari");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let repo = ItemRepository::new();
        assert!(matches!(
            discover_applications(&repo, Path::new("/nonexistent/Applications"), true),
            Err(HostError::Io { .. })
        ));
    }
}
