// src/config.rs

//! Engine configuration.
//!
//! Loaded from an optional `conveyor.toml`; every field has a default
//! matching the built-in behavior, so a missing file or a partial file is
//! fine. The producer and consumer CLIs both read the same file.

use crate::error::{Error, Result};
use crate::fsutil::{exclude::DEFAULT_EXCLUDES, ExcludeMatcher};
use crate::release::classifier::{
    ClassifierRules, DEFAULT_BREAKING_MARKERS, DEFAULT_MAJOR_INDICATORS, DEFAULT_MINOR_INDICATORS,
};
use crate::version::BumpType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "conveyor.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub excludes: ExcludeConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub progress: ProgressConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludeConfig {
    /// Patterns marking permanent/user data. Replaces the default set
    /// when present.
    #[serde(default = "default_exclude_patterns")]
    pub patterns: Vec<String>,
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            patterns: default_exclude_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_major_indicators")]
    pub major_indicators: Vec<String>,

    #[serde(default = "default_minor_indicators")]
    pub minor_indicators: Vec<String>,

    #[serde(default = "default_breaking_markers")]
    pub breaking_markers: Vec<String>,

    /// When set (`"major"`, `"minor"`, `"patch"`), replaces the computed
    /// bump unconditionally.
    #[serde(default)]
    pub force_bump: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            major_indicators: default_major_indicators(),
            minor_indicators: default_minor_indicators(),
            breaking_markers: default_breaking_markers(),
            force_bump: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Bound on progress-lock acquisition in seconds.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

fn default_major_indicators() -> Vec<String> {
    DEFAULT_MAJOR_INDICATORS.iter().map(|s| s.to_string()).collect()
}

fn default_minor_indicators() -> Vec<String> {
    DEFAULT_MINOR_INDICATORS.iter().map(|s| s.to_string()).collect()
}

fn default_breaking_markers() -> Vec<String> {
    DEFAULT_BREAKING_MARKERS.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_lock_timeout_secs() -> u64 {
    5
}

impl EngineConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => {
                let config: EngineConfig = toml::from_str(&data)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                debug!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Compile the configured exclude patterns.
    pub fn exclude_matcher(&self) -> Result<ExcludeMatcher> {
        ExcludeMatcher::new(&self.excludes.patterns)
    }

    /// Assemble the classifier rule set.
    pub fn classifier_rules(&self) -> Result<ClassifierRules> {
        let force_bump = match &self.classifier.force_bump {
            Some(raw) => Some(BumpType::parse(raw).ok_or_else(|| {
                Error::Config(format!("invalid force_bump value: {}", raw))
            })?),
            None => None,
        };
        Ok(ClassifierRules {
            major_indicators: self.classifier.major_indicators.clone(),
            minor_indicators: self.classifier.minor_indicators.clone(),
            breaking_markers: self.classifier.breaking_markers.clone(),
            force_bump,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::load(&tmp.path().join("conveyor.toml")).unwrap();
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.progress.lock_timeout_secs, 5);
        assert!(!config.excludes.patterns.is_empty());
        assert!(config.classifier.force_bump.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conveyor.toml");
        std::fs::write(&path, "[network]\ntimeout_secs = 60\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.network.timeout_secs, 60);
        assert_eq!(config.progress.lock_timeout_secs, 5);
    }

    #[test]
    fn test_force_bump_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conveyor.toml");
        std::fs::write(&path, "[classifier]\nforce_bump = \"minor\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        let rules = config.classifier_rules().unwrap();
        assert_eq!(rules.force_bump, Some(BumpType::Minor));
    }

    #[test]
    fn test_invalid_force_bump_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conveyor.toml");
        std::fs::write(&path, "[classifier]\nforce_bump = \"huge\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert!(config.classifier_rules().is_err());
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conveyor.toml");
        std::fs::write(&path, "not toml at all [").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_custom_excludes_compile() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("conveyor.toml");
        std::fs::write(&path, "[excludes]\npatterns = [\"private/\", \"*.db\"]\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        let matcher = config.exclude_matcher().unwrap();
        assert!(matcher.is_excluded("private/key.pem"));
        assert!(matcher.is_excluded("store.db"));
        assert!(!matcher.is_excluded("core.dat"));
    }
}
