// src/progress/mod.rs

//! Crash-safe progress reporting for external monitors.
//!
//! One JSON document per orchestration run lives at a well-known path
//! inside the install root. Every mutation reads the current document,
//! applies the change in memory, and publishes the whole document via
//! write-to-temp-file + atomic rename: a reader sees either the pre- or
//! post-update document, never a torn one, regardless of crash timing.
//!
//! Writers serialize through an advisory exclusive lock on a sibling
//! `.lock` file (which never contains payload), acquired with a bounded
//! timeout. On expiry the call fails with [`Error::LockTimeout`], which
//! callers must treat as retryable. Readers never take the lock.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// File name of the progress document inside the install root.
pub const PROGRESS_FILE: &str = "progress.json";

/// File name of the writer lock beside the document.
pub const PROGRESS_LOCK_FILE: &str = "progress.lock";

/// Default bound on lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for the lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The codebase-update phase name.
pub const PHASE_CODEBASE_UPDATE: &str = "codebase_update";

/// The environment-verification phase name.
pub const PHASE_ENV_VERIFICATION: &str = "environment_verification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Initializing,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    /// Phase status only moves forward: pending → running → {completed, failed}.
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Per-phase progress record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseState {
    pub status: PhaseStatus,
    pub progress: u8,
    pub current_step: String,
    pub steps_completed: Vec<String>,
    pub steps_total: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl PhaseState {
    fn new(initial_step: &str, steps_total: u32) -> Self {
        Self {
            status: PhaseStatus::Pending,
            progress: 0,
            current_step: initial_step.to_string(),
            steps_completed: Vec::new(),
            steps_total,
            start_time: None,
            end_time: None,
        }
    }
}

/// The whole progress document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
    pub setup_id: String,
    pub timestamp: DateTime<Utc>,
    pub overall_status: OverallStatus,
    pub overall_progress: u8,
    pub phases: BTreeMap<String, PhaseState>,
    pub error_details: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl ProgressState {
    fn new(setup_id: &str) -> Self {
        let mut phases = BTreeMap::new();
        phases.insert(
            PHASE_CODEBASE_UPDATE.to_string(),
            PhaseState::new("Initializing codebase update", 10),
        );
        phases.insert(
            PHASE_ENV_VERIFICATION.to_string(),
            PhaseState::new("Initializing environment verification", 8),
        );

        let mut metadata = BTreeMap::new();
        metadata.insert("schema".to_string(), "1.0".to_string());
        metadata.insert("platform".to_string(), std::env::consts::OS.to_string());
        metadata.insert(
            "engine".to_string(),
            format!("conveyor {}", env!("CARGO_PKG_VERSION")),
        );

        Self {
            setup_id: setup_id.to_string(),
            timestamp: Utc::now(),
            overall_status: OverallStatus::Initializing,
            overall_progress: 0,
            phases,
            error_details: None,
            metadata,
        }
    }

    /// Recompute overall progress as the cumulative equal-weight
    /// contribution of each phase: completed phases count in full, failed
    /// phases count zero, running phases count proportionally.
    fn recompute_overall(&mut self) {
        if self.phases.is_empty() {
            self.overall_progress = 0;
            return;
        }
        let share = 100.0 / self.phases.len() as f64;
        let mut total = 0.0;
        for phase in self.phases.values() {
            match phase.status {
                PhaseStatus::Completed => total += share,
                PhaseStatus::Failed => {}
                _ => total += (phase.progress as f64 / 100.0) * share,
            }
        }
        self.overall_progress = total.clamp(0.0, 100.0) as u8;
    }
}

/// RAII guard over the advisory writer lock.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(error = %e, "failed to release progress lock");
        }
    }
}

/// Handle to the progress document for one orchestration run.
pub struct ProgressTracker {
    doc_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl ProgressTracker {
    /// Open (creating if absent) the progress document for `run_id` under
    /// `root`. An existing document is left in place so a restarted run
    /// does not reset completed phases.
    pub fn open(root: &Path, run_id: &str) -> Result<Self> {
        fs::create_dir_all(root)?;
        let tracker = Self {
            doc_path: root.join(PROGRESS_FILE),
            lock_path: root.join(PROGRESS_LOCK_FILE),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        };

        if !tracker.doc_path.exists() {
            let _guard = tracker.acquire_lock()?;
            // Re-check under the lock: another writer may have raced us.
            if !tracker.doc_path.exists() {
                tracker.write_atomic(&ProgressState::new(run_id))?;
            }
        }

        Ok(tracker)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn doc_path(&self) -> &Path {
        &self.doc_path
    }

    /// Read the current document without locking. This is the reader
    /// (monitor) path: atomic rename is the sole publication point, so an
    /// unlocked read always sees a complete document.
    pub fn load(&self) -> Result<ProgressState> {
        let data = fs::read_to_string(&self.doc_path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Record a step in `phase`, optionally advancing its progress.
    ///
    /// Progress is monotonically non-decreasing while the phase runs;
    /// reaching 100 completes it and stamps `end_time` exactly once.
    pub fn update_phase(
        &self,
        phase: &str,
        step_description: &str,
        completed: bool,
        delta_progress: u8,
    ) -> Result<()> {
        self.mutate(|state| {
            let Some(entry) = state.phases.get_mut(phase) else {
                warn!(phase, "ignoring update for unknown phase");
                return;
            };
            if entry.status.is_terminal() {
                debug!(phase, "phase already finished, skipping update");
                return;
            }

            entry.current_step = step_description.to_string();
            if completed && !entry.steps_completed.iter().any(|s| s == step_description) {
                entry.steps_completed.push(step_description.to_string());
            }

            entry.progress = entry.progress.saturating_add(delta_progress).min(100);

            if entry.start_time.is_none() {
                entry.start_time = Some(Utc::now());
            }
            if entry.status == PhaseStatus::Pending {
                entry.status = PhaseStatus::Running;
            }
            if entry.progress >= 100 {
                entry.status = PhaseStatus::Completed;
                if entry.end_time.is_none() {
                    entry.end_time = Some(Utc::now());
                }
            }

            state.recompute_overall();
        })
    }

    /// Mark a phase failed with a user-facing detail message. The overall
    /// run goes `failed` and `error_details` is populated.
    pub fn mark_phase_failed(&self, phase: &str, detail: &str) -> Result<()> {
        self.mutate(|state| {
            if let Some(entry) = state.phases.get_mut(phase) {
                if !entry.status.is_terminal() {
                    entry.status = PhaseStatus::Failed;
                    entry.current_step = detail.to_string();
                    if entry.end_time.is_none() {
                        entry.end_time = Some(Utc::now());
                    }
                }
            }
            state.overall_status = OverallStatus::Failed;
            state.error_details = Some(format!("{}: {}", phase, detail));
            state.recompute_overall();
        })
    }

    /// Update the overall run status.
    pub fn set_overall_status(
        &self,
        status: OverallStatus,
        error_details: Option<&str>,
    ) -> Result<()> {
        self.mutate(|state| {
            state.overall_status = status;
            if let Some(detail) = error_details {
                state.error_details = Some(detail.to_string());
            }
        })
    }

    /// Mark the run completed.
    pub fn finish(&self) -> Result<()> {
        self.set_overall_status(OverallStatus::Completed, None)
    }

    /// Read-modify-write under the writer lock, publishing atomically.
    fn mutate<F: FnOnce(&mut ProgressState)>(&self, apply: F) -> Result<()> {
        let _guard = self.acquire_lock()?;

        let mut state = match fs::read_to_string(&self.doc_path) {
            Ok(data) => serde_json::from_str(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ProgressState::new(&format!("run_{}", uuid::Uuid::new_v4()))
            }
            Err(e) => return Err(e.into()),
        };

        apply(&mut state);
        state.timestamp = Utc::now();

        self.write_atomic(&state)
    }

    /// Publish the document: temp file in the same directory, then atomic
    /// rename. The rename is the sole publication point.
    fn write_atomic(&self, state: &ProgressState) -> Result<()> {
        let dir = self
            .doc_path
            .parent()
            .ok_or_else(|| Error::Config("progress document has no parent directory".into()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(state)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.doc_path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Acquire the advisory exclusive lock, polling up to the bounded
    /// timeout.
    fn acquire_lock(&self) -> Result<LockGuard> {
        let file = File::create(&self.lock_path)?;
        let deadline = Instant::now() + self.lock_timeout;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(LockGuard { file }),
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(_) => {
                    return Err(Error::LockTimeout(self.lock_timeout.as_millis() as u64));
                }
            }
        }
    }
}
