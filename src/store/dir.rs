// src/store/dir.rs

//! Directory-backed release store.
//!
//! Layout under the store root:
//!
//! ```text
//! releases/
//!   v1.1.0/
//!     manifest.json
//!     files/<relative path>...
//! ```
//!
//! Used by the producer for local publishing, by air-gapped consumers,
//! and as the backend double in tests.

use crate::error::{Error, Result};
use crate::fsutil::safe_join;
use crate::release::Manifest;
use crate::store::{ReleaseId, ReleaseStore};
use crate::version::Version;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DirReleaseStore {
    root: PathBuf,
}

impl DirReleaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn releases_dir(&self) -> PathBuf {
        self.root.join("releases")
    }

    fn release_dir(&self, version: Version) -> PathBuf {
        self.releases_dir().join(format!("v{}", version))
    }
}

impl ReleaseStore for DirReleaseStore {
    fn list_versions(&self) -> Result<Vec<Version>> {
        let releases = self.releases_dir();
        if !releases.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&releases)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match Version::parse(&name) {
                Ok(version) => versions.push(version),
                Err(_) => debug!(dir = %name, "skipping non-version directory in store"),
            }
        }
        Ok(versions)
    }

    fn fetch_manifest(&self, version: Version) -> Result<Manifest> {
        let path = self.release_dir(version).join("manifest.json");
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("manifest for version {}", version)));
            }
            Err(e) => return Err(e.into()),
        };
        Manifest::from_json(&data)
    }

    fn fetch_file(&self, version: Version, rel_path: &str) -> Result<Vec<u8>> {
        let files_root = self.release_dir(version).join("files");
        let path = safe_join(&files_root, rel_path)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(format!(
                "file {} in release {}",
                rel_path, version
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn publish(&self, manifest: &Manifest, files: &[(String, Vec<u8>)]) -> Result<ReleaseId> {
        manifest.validate()?;

        let release_dir = self.release_dir(manifest.version);
        if release_dir.exists() {
            return Err(Error::ManifestValidation(format!(
                "release {} already published",
                manifest.version
            )));
        }

        let files_root = release_dir.join("files");
        fs::create_dir_all(&files_root)?;

        for (rel_path, bytes) in files {
            let dest = safe_join(&files_root, rel_path)?;
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, bytes)?;
        }

        // Manifest last: its presence is what makes the release visible
        // as complete, so write it via temp file + atomic rename.
        let manifest_path = release_dir.join("manifest.json");
        let mut tmp = tempfile::NamedTempFile::new_in(&release_dir)?;
        tmp.write_all(manifest.to_json()?.as_bytes())?;
        tmp.persist(&manifest_path)
            .map_err(|e| Error::Io(e.error))?;

        info!(version = %manifest.version, "published release to {}", release_dir.display());
        Ok(ReleaseId(format!("v{}", manifest.version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ChangeSet;
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn manifest(version: &str, added: &[&str]) -> Manifest {
        let changes = ChangeSet::new(
            added.iter().map(|s| s.to_string()),
            std::iter::empty(),
            std::iter::empty(),
        )
        .unwrap();
        Manifest::build(v(version), &changes, false).unwrap()
    }

    #[test]
    fn test_publish_then_fetch() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path());

        let m = manifest("1.1.0", &["feature_x.bin"]);
        let id = store
            .publish(&m, &[("feature_x.bin".to_string(), b"payload".to_vec())])
            .unwrap();
        assert_eq!(id, ReleaseId("v1.1.0".to_string()));

        assert_eq!(store.list_versions().unwrap(), vec![v("1.1.0")]);
        assert_eq!(store.fetch_manifest(v("1.1.0")).unwrap(), m);
        assert_eq!(
            store.fetch_file(v("1.1.0"), "feature_x.bin").unwrap(),
            b"payload"
        );
    }

    #[test]
    fn test_missing_resources_are_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path());

        assert!(matches!(
            store.fetch_manifest(v("9.9.9")),
            Err(Error::NotFound(_))
        ));

        store
            .publish(&manifest("1.0.0", &[]), &[])
            .unwrap();
        assert!(matches!(
            store.fetch_file(v("1.0.0"), "absent.bin"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_republish_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path());
        store.publish(&manifest("1.0.0", &[]), &[]).unwrap();
        assert!(store.publish(&manifest("1.0.0", &[]), &[]).is_err());
    }

    #[test]
    fn test_fetch_file_traversal_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path());
        store.publish(&manifest("1.0.0", &[]), &[]).unwrap();
        assert!(matches!(
            store.fetch_file(v("1.0.0"), "../manifest.json"),
            Err(Error::PathViolation(_))
        ));
    }

    #[test]
    fn test_list_skips_foreign_directories() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path());
        store.publish(&manifest("1.0.0", &[]), &[]).unwrap();
        fs::create_dir_all(tmp.path().join("releases/notes")).unwrap();
        assert_eq!(store.list_versions().unwrap(), vec![v("1.0.0")]);
    }
}
