// src/error.rs

//! Crate-wide error type and `Result` alias.

use thiserror::Error;

/// Planning failures, surfaced before any filesystem mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    /// The target version has no manifest in the chain.
    #[error("no published release for version {0}")]
    NoSuchVersion(String),

    /// Downgrades are handled by out-of-band tooling, never the forward path.
    #[error("target version {target} is behind installed version {current}")]
    TargetBehindCurrent { current: String, target: String },

    /// The chain is missing a required intermediate version.
    #[error("release history has a gap: expected a manifest for {0}")]
    GapInHistory(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// Bad version string.
    #[error("invalid version format: {0} (expected major.minor.patch)")]
    Format(String),

    /// Unsafe path from a manifest or user input. Always fatal, never retried.
    #[error("path violation: {0}")]
    PathViolation(String),

    /// Malformed manifest. Fatal.
    #[error("manifest validation failed: {0}")]
    ManifestValidation(String),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    /// Download/publish failure. Retryable by the caller.
    #[error("transport error: {0}")]
    Transport(String),

    /// A requested release, manifest, or file does not exist in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Dependency installation failure. Triggers the same rollback as an
    /// apply failure.
    #[error("dependency installation failed: {0}")]
    Install(String),

    /// Progress-write contention. Retryable.
    #[error("could not acquire progress lock within {0} ms")]
    LockTimeout(u64),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether a caller may reasonably retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::LockTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
