// src/fsutil/exclude.rs

//! Exclude-pattern matching for permanent/user data.
//!
//! Patterns classify a relative path as permanent data (user files, caches,
//! secrets, backup/staging artifacts) versus managed codebase. The matcher
//! is used with two polarities: backup creation skips excluded paths, and
//! manifest application refuses to target them even when a manifest names
//! one. Both uses share the same compiled matcher.

use crate::error::{Error, Result};
use glob::Pattern;

/// A single exclude rule, compiled once at matcher construction.
#[derive(Debug, Clone)]
pub enum ExcludePattern {
    /// Trailing-`/` pattern: matches the directory and everything under it.
    DirPrefix(String),
    /// Pattern containing glob metacharacters, matched against the full
    /// relative path and against each path component.
    Glob(Pattern),
    /// Exact relative path, or a bare file name matched at any depth
    /// (OS metadata like `.DS_Store` appears anywhere).
    Literal(String),
}

/// Compiled exclude matcher.
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    patterns: Vec<ExcludePattern>,
}

/// Default exclude set: user data and permanent folders, temporary files,
/// environment/secret files, user-generated content, backup/staging
/// artifacts, and OS metadata files.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "user_data/",
    "config/user_settings.json",
    "logs/",
    "cache/",
    "temp/",
    "backup_*/",
    "staging*/",
    "*.tmp",
    "*.temp",
    "*.bak",
    ".env",
    ".env.*",
    "*.key",
    "*.secret",
    "user_files/",
    "documents/",
    "media/",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
];

impl ExcludeMatcher {
    /// Compile a pattern list. Invalid glob syntax is a configuration error.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref();
            if raw.is_empty() {
                continue;
            }
            compiled.push(Self::compile(raw)?);
        }
        Ok(Self { patterns: compiled })
    }

    /// Matcher with the default pattern set.
    pub fn with_defaults() -> Self {
        // The default set is statically known-good.
        Self::new(DEFAULT_EXCLUDES).expect("default exclude patterns compile")
    }

    fn compile(raw: &str) -> Result<ExcludePattern> {
        if let Some(dir) = raw.strip_suffix('/') {
            if dir.contains('*') || dir.contains('?') || dir.contains('[') {
                let pattern = Pattern::new(dir).map_err(|e| {
                    Error::Config(format!("invalid exclude pattern '{}': {}", raw, e))
                })?;
                return Ok(ExcludePattern::Glob(pattern));
            }
            return Ok(ExcludePattern::DirPrefix(dir.to_string()));
        }

        if raw.contains('*') || raw.contains('?') || raw.contains('[') {
            let pattern = Pattern::new(raw)
                .map_err(|e| Error::Config(format!("invalid exclude pattern '{}': {}", raw, e)))?;
            return Ok(ExcludePattern::Glob(pattern));
        }

        Ok(ExcludePattern::Literal(raw.to_string()))
    }

    /// Whether `rel_path` names permanent data that must never be
    /// overwritten, deleted, or backed up.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        let normalized = rel_path.trim_start_matches("./");
        let components: Vec<&str> = normalized.split('/').filter(|c| !c.is_empty()).collect();

        for pattern in &self.patterns {
            match pattern {
                ExcludePattern::DirPrefix(dir) => {
                    if components.first() == Some(&dir.as_str())
                        || components.iter().take(components.len().saturating_sub(1)).any(|c| c == dir)
                    {
                        return true;
                    }
                }
                ExcludePattern::Glob(pattern) => {
                    if pattern.matches(normalized) || components.iter().any(|c| pattern.matches(c)) {
                        return true;
                    }
                }
                ExcludePattern::Literal(lit) => {
                    if normalized == lit || components.iter().any(|c| c == lit) {
                        return true;
                    }
                }
            }
        }

        false
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
