// src/store/mod.rs

//! Release storage backends.
//!
//! The engine talks to release hosting through the [`ReleaseStore`] trait:
//! list published versions, fetch a version's manifest, fetch a file from
//! a release, and publish a new release. Failures distinguish a missing
//! resource ([`crate::Error::NotFound`]) from a transport fault
//! ([`crate::Error::Transport`]); only the latter is retryable.

mod dir;
mod http;

pub use dir::DirReleaseStore;
pub use http::HttpReleaseStore;

use crate::error::Result;
use crate::release::{Manifest, ManifestChain};
use crate::version::Version;
use std::fmt;

/// Identifier assigned to a published release by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseId(pub String);

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A release-hosting backend.
pub trait ReleaseStore {
    /// All published versions, unordered.
    fn list_versions(&self) -> Result<Vec<Version>>;

    /// The manifest published for `version`.
    fn fetch_manifest(&self, version: Version) -> Result<Manifest>;

    /// The bytes of `rel_path` as published in release `version`.
    fn fetch_file(&self, version: Version, rel_path: &str) -> Result<Vec<u8>>;

    /// Publish a manifest together with the file contents it names.
    fn publish(&self, manifest: &Manifest, files: &[(String, Vec<u8>)]) -> Result<ReleaseId>;
}

/// Fetch every published manifest and assemble the ordered chain.
pub fn load_chain(store: &dyn ReleaseStore) -> Result<ManifestChain> {
    let versions = store.list_versions()?;
    let mut manifests = Vec::with_capacity(versions.len());
    for version in versions {
        manifests.push(store.fetch_manifest(version)?);
    }
    ManifestChain::from_manifests(manifests)
}
