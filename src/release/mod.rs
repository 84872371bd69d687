// src/release/mod.rs

//! Producer-side release machinery: change sets, bump classification, and
//! the versioned manifest model.

pub mod changeset;
pub mod classifier;
pub mod manifest;

pub use changeset::ChangeSet;
pub use classifier::{ChangeClassifier, ClassifierRules};
pub use manifest::{Manifest, ManifestChain};
