// src/fsutil/mod.rs

//! Filesystem safety utilities: path validation and exclude-pattern
//! matching. Every path taken from a manifest or user input goes through
//! these before any filesystem call.

pub mod exclude;
pub mod path;

pub use exclude::{ExcludeMatcher, ExcludePattern};
pub use path::{safe_join, validate_rel_path};
