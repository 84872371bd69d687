// src/release/classifier.rs

//! Bump classification for a release's change set.
//!
//! Rules fire in priority order; when several fire, the strongest bump
//! wins (Major beats Minor beats Patch):
//!
//! 1. any changed path matching a major-indicator token (schema, database,
//!    migration, build-definition files) → Major;
//! 2. any commit message matching a breaking-change marker → Major;
//! 3. any added path matching a minor-indicator token, or any added file
//!    at all → Minor;
//! 4. only edits/deletes to existing files → Patch.
//!
//! Note the default-new-file rule in step 3: it makes any addition at
//! least Minor, so the minor-indicator tokens only ever confirm a result
//! the fallback would reach anyway. Kept as observed in the source
//! history; major tokens still apply to added files, which is what lets
//! an added migration script escalate to Major.
//!
//! A configured override replaces the computed result unconditionally.

use crate::release::ChangeSet;
use crate::version::BumpType;
use regex::RegexSet;
use tracing::debug;

/// Default path tokens that indicate a breaking release.
pub const DEFAULT_MAJOR_INDICATORS: &[&str] = &[
    "config",
    "database",
    "schema",
    "migrate",
    "migration",
    "requirements.txt",
    "setup.py",
    "pyproject.toml",
    "Dockerfile",
    "docker-compose",
];

/// Default path tokens that indicate a feature release when added.
pub const DEFAULT_MINOR_INDICATORS: &[&str] =
    &["module", "feature", "component", "service", "handler"];

/// Default breaking-change markers for commit messages.
pub const DEFAULT_BREAKING_MARKERS: &[&str] = &[
    r"BREAKING CHANGE:",
    r"breaking:",
    r"!:",
    r"major change",
    r"deprecat",
    r"\bremove\b",
    r"\bdelete\b",
    r"\bschema\b",
    r"\bmigration\b",
];

/// Classifier rule configuration.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    pub major_indicators: Vec<String>,
    pub minor_indicators: Vec<String>,
    pub breaking_markers: Vec<String>,
    /// When set, replaces the computed result unconditionally.
    pub force_bump: Option<BumpType>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            major_indicators: DEFAULT_MAJOR_INDICATORS.iter().map(|s| s.to_string()).collect(),
            minor_indicators: DEFAULT_MINOR_INDICATORS.iter().map(|s| s.to_string()).collect(),
            breaking_markers: DEFAULT_BREAKING_MARKERS.iter().map(|s| s.to_string()).collect(),
            force_bump: None,
        }
    }
}

/// Compiled classifier.
pub struct ChangeClassifier {
    rules: ClassifierRules,
    breaking: RegexSet,
}

impl ChangeClassifier {
    pub fn new(rules: ClassifierRules) -> crate::Result<Self> {
        let patterns: Vec<String> = rules
            .breaking_markers
            .iter()
            .map(|m| format!("(?i){}", m))
            .collect();
        let breaking = RegexSet::new(&patterns)
            .map_err(|e| crate::Error::Config(format!("invalid breaking-change marker: {}", e)))?;
        Ok(Self { rules, breaking })
    }

    pub fn with_defaults() -> Self {
        // Default markers are statically known-good regexes.
        Self::new(ClassifierRules::default()).expect("default classifier rules compile")
    }

    /// Classify a change set, optionally informed by commit messages.
    pub fn classify(&self, changes: &ChangeSet, commit_messages: &[String]) -> BumpType {
        if let Some(forced) = self.rules.force_bump {
            debug!(bump = %forced, "using configured bump override");
            return forced;
        }

        let mut strongest = BumpType::Patch;

        for path in changes.all_paths() {
            if let Some(token) = self.matching_token(path, &self.rules.major_indicators) {
                debug!(%path, token, "major indicator in changed path");
                return BumpType::Major;
            }
        }

        if self.breaking.matches(&commit_messages.join("\n")).matched_any() {
            debug!("breaking-change marker in commit messages");
            return BumpType::Major;
        }

        if !changes.added.is_empty() {
            for path in &changes.added {
                if let Some(token) = self.matching_token(path, &self.rules.minor_indicators) {
                    debug!(%path, token, "minor indicator in added path");
                }
            }
            // Any new file suggests a feature release.
            strongest = strongest.max(BumpType::Minor);
        }

        strongest
    }

    fn matching_token<'a>(&self, path: &str, tokens: &'a [String]) -> Option<&'a str> {
        let normalized = path.to_ascii_lowercase();
        tokens
            .iter()
            .find(|token| normalized.contains(&token.to_ascii_lowercase()))
            .map(|s| s.as_str())
    }
}
