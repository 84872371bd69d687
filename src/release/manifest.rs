// src/release/manifest.rs

//! The versioned manifest: one per published release, describing that
//! release's file changes. An ordered chain of manifests forms the
//! release history consumed by the update planner.

use crate::error::{Error, Result};
use crate::fsutil::validate_rel_path;
use crate::release::ChangeSet;
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-version declaration of added/edited/deleted files and whether the
/// dependency set changed. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: Version,
    pub files_add: Vec<String>,
    pub files_edit: Vec<String>,
    pub files_delete: Vec<String>,
    pub requirements_changed: bool,
    pub build_date: DateTime<Utc>,

    /// The version this release was cut against, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<Version>,

    /// Free-form notes carried for display; ignored by planning and apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

impl Manifest {
    /// Build a manifest from a change set, validating disjointness and
    /// Path-Guard compliance of every entry.
    pub fn build(version: Version, changes: &ChangeSet, requirements_changed: bool) -> Result<Self> {
        let manifest = Self {
            version,
            files_add: changes.added.iter().cloned().collect(),
            files_edit: changes.edited.iter().cloned().collect(),
            files_delete: changes.deleted.iter().cloned().collect(),
            requirements_changed,
            build_date: Utc::now(),
            previous_version: None,
            release_notes: None,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the manifest invariants: pairwise-disjoint file lists, every
    /// path safe. Called on build and again whenever a manifest is
    /// hydrated from a store, so nothing unchecked reaches the installer.
    pub fn validate(&self) -> Result<()> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for path in self.all_files() {
            validate_rel_path(path)
                .map_err(|e| Error::ManifestValidation(format!("{}: {}", self.version, e)))?;
            if !seen.insert(path) {
                return Err(Error::ManifestValidation(format!(
                    "{}: path listed more than once: {}",
                    self.version, path
                )));
            }
        }
        Ok(())
    }

    /// All paths the manifest touches, in add/edit/delete order.
    pub fn all_files(&self) -> impl Iterator<Item = &str> {
        self.files_add
            .iter()
            .chain(self.files_edit.iter())
            .chain(self.files_delete.iter())
            .map(|s| s.as_str())
    }

    /// Paths the manifest writes (add + edit).
    pub fn written_files(&self) -> impl Iterator<Item = &str> {
        self.files_add
            .iter()
            .chain(self.files_edit.iter())
            .map(|s| s.as_str())
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(data)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The ordered, append-only history of all published manifests.
#[derive(Debug, Clone, Default)]
pub struct ManifestChain {
    manifests: Vec<Manifest>,
}

impl ManifestChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate a chain from an unordered listing, sorting by version and
    /// rejecting duplicates.
    pub fn from_manifests(mut manifests: Vec<Manifest>) -> Result<Self> {
        manifests.sort_by_key(|m| m.version);
        for pair in manifests.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(Error::ManifestValidation(format!(
                    "duplicate manifest for version {}",
                    pair[0].version
                )));
            }
        }
        Ok(Self { manifests })
    }

    /// Append a newly published manifest. Fails when the version does not
    /// move strictly forward: no republishing, no going backward.
    pub fn append(&mut self, manifest: Manifest) -> Result<()> {
        if let Some(latest) = self.latest() {
            if manifest.version <= latest.version {
                return Err(Error::ManifestValidation(format!(
                    "cannot publish {} after {}: versions must be strictly increasing",
                    manifest.version, latest.version
                )));
            }
        }
        manifest.validate()?;
        self.manifests.push(manifest);
        Ok(())
    }

    pub fn latest(&self) -> Option<&Manifest> {
        self.manifests.last()
    }

    pub fn get(&self, version: Version) -> Option<&Manifest> {
        self.manifests.iter().find(|m| m.version == version)
    }

    pub fn contains(&self, version: Version) -> bool {
        self.get(version).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.iter()
    }

    pub fn versions(&self) -> Vec<Version> {
        self.manifests.iter().map(|m| m.version).collect()
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}
