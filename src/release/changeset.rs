// src/release/changeset.rs

//! The per-release change set: added, edited, and deleted paths.
//!
//! A change set is produced once per release cycle from a diff against the
//! previously released state (the diffing itself is an external concern;
//! the producer CLI reads the result as JSON) and consumed once by the
//! classifier and the manifest builder. It is never mutated afterwards.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Three disjoint sets of repository-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub added: BTreeSet<String>,
    #[serde(default)]
    pub edited: BTreeSet<String>,
    #[serde(default)]
    pub deleted: BTreeSet<String>,
}

impl ChangeSet {
    /// Build a change set, enforcing that a path appears in exactly one set.
    pub fn new<I, J, K>(added: I, edited: J, deleted: K) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
        K: IntoIterator<Item = String>,
    {
        let cs = Self {
            added: added.into_iter().collect(),
            edited: edited.into_iter().collect(),
            deleted: deleted.into_iter().collect(),
        };
        cs.validate_disjoint()?;
        Ok(cs)
    }

    /// Parse from JSON, re-checking disjointness.
    pub fn from_json(data: &str) -> Result<Self> {
        let cs: ChangeSet = serde_json::from_str(data)?;
        cs.validate_disjoint()?;
        Ok(cs)
    }

    fn validate_disjoint(&self) -> Result<()> {
        for path in &self.added {
            if self.edited.contains(path) || self.deleted.contains(path) {
                return Err(Error::ManifestValidation(format!(
                    "path appears in more than one change category: {}",
                    path
                )));
            }
        }
        for path in &self.edited {
            if self.deleted.contains(path) {
                return Err(Error::ManifestValidation(format!(
                    "path appears in more than one change category: {}",
                    path
                )));
            }
        }
        Ok(())
    }

    /// All changed paths, regardless of category.
    pub fn all_paths(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.edited.iter()).chain(self.deleted.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.edited.is_empty() && self.deleted.is_empty()
    }
}
