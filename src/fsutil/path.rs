// src/fsutil/path.rs

//! Path validation for untrusted relative paths.
//!
//! Manifests and backup operations name files by repository-relative path.
//! A compromised or malformed manifest could attempt to write outside the
//! install root using paths like `../../etc/passwd` or `/etc/passwd`, so
//! every such path is validated here before any filesystem call. This is
//! the sole defense against path-traversal writes.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Validate a relative path from an untrusted source.
///
/// Rejects:
/// - empty paths;
/// - absolute paths (and Windows drive/UNC prefixes);
/// - any `..` segment;
/// - NUL or ASCII control characters;
/// - backslashes (separator smuggling on non-Windows hosts).
///
/// # Examples
///
/// ```
/// use conveyor::fsutil::validate_rel_path;
///
/// assert!(validate_rel_path("core/engine.bin").is_ok());
/// assert!(validate_rel_path("../etc/passwd").is_err());
/// assert!(validate_rel_path("/etc/passwd").is_err());
/// ```
pub fn validate_rel_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::PathViolation("empty path".to_string()));
    }

    if path.bytes().any(|b| b == 0 || b.is_ascii_control()) {
        return Err(Error::PathViolation(format!(
            "control character in path: {:?}",
            path
        )));
    }

    if path.contains('\\') {
        return Err(Error::PathViolation(format!(
            "backslash in path: {}",
            path
        )));
    }

    let p = Path::new(path);
    let mut has_normal = false;
    for component in p.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::PathViolation(format!(
                    "parent-directory segment in path: {}",
                    path
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(Error::PathViolation(format!("absolute path: {}", path)));
            }
        }
    }

    if !has_normal {
        return Err(Error::PathViolation(format!(
            "path has no usable component: {}",
            path
        )));
    }

    Ok(())
}

/// Validate `path` and join it under `root`.
///
/// Defense in depth: when the joined path already exists, its canonical
/// form is additionally checked to be under the canonical root. For paths
/// that do not exist yet, `validate_rel_path` is the guarantee.
pub fn safe_join(root: &Path, path: &str) -> Result<PathBuf> {
    validate_rel_path(path)?;
    let joined = root.join(path);

    if let (Ok(canonical_root), Ok(canonical_joined)) = (root.canonicalize(), joined.canonicalize())
    {
        if !canonical_joined.starts_with(&canonical_root) {
            return Err(Error::PathViolation(format!(
                "path {} escapes root {}",
                joined.display(),
                root.display()
            )));
        }
    }

    Ok(joined)
}
