// src/install/mod.rs

//! Staged atomic installation.
//!
//! Two flows share the same primitives (stage → verify → commit →
//! cleanup, failure → preserve-for-recovery):
//!
//! - **Fresh install**: every file across the manifest chain is staged
//!   into a directory beside the final root, verified, and committed by a
//!   single atomic rename. A failure leaves the staging directory for
//!   inspection and the final root untouched.
//! - **Incremental update**: each plan step backs up the managed codebase,
//!   applies one manifest to the live root, and commits by advancing the
//!   version record. A failure restores the backed-up files, leaves the
//!   version record unchanged, and halts the plan, so the root always
//!   reflects the last committed version.
//!
//! The install root is only guaranteed self-consistent in `Idle`,
//! `Completed`, and `RolledBack` states.

pub mod backup;

pub use backup::{create_backup, restore_backup};

use crate::deps::DependencyInstaller;
use crate::error::{Error, Result};
use crate::fsutil::{safe_join, ExcludeMatcher};
use crate::planner::UpdatePlan;
use crate::progress::{ProgressTracker, PHASE_CODEBASE_UPDATE};
use crate::release::{Manifest, ManifestChain};
use crate::store::ReleaseStore;
use crate::version::Version;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the version record file inside the install root.
pub const VERSION_FILE: &str = "version.txt";

/// Per-operation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    Resolving,
    Staging,
    Verifying,
    Applying,
    Committing,
    Completed,
    Failed,
    RolledBack,
}

impl InstallState {
    /// Legal forward transitions.
    pub fn can_transition(self, next: InstallState) -> bool {
        use InstallState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, Staging)
                | (Staging, Verifying)
                | (Verifying, Applying)
                | (Applying, Committing)
                | (Committing, Completed)
                | (Staging, Failed)
                | (Verifying, Failed)
                | (Applying, Failed)
                | (Failed, RolledBack)
        )
    }
}

/// Installer configuration for one install root.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// The final install root.
    pub root: PathBuf,
    /// Unique identifier for this run; staging and backup directories are
    /// derived from it so leftovers of a previous run never collide.
    pub run_id: String,
}

impl InstallerConfig {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            run_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    fn root_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "install".to_string())
    }

    fn work_parent(&self) -> PathBuf {
        self.root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Staging directory for fresh installs, beside the final root.
    pub fn staging_dir(&self) -> PathBuf {
        self.work_parent()
            .join(format!("{}.staging.{}", self.root_name(), self.run_id))
    }

    /// Backup-staging directory for one update step.
    pub fn backup_dir(&self, version: Version) -> PathBuf {
        self.work_parent()
            .join(format!("{}.backup.{}", self.root_name(), self.run_id))
            .join(format!("v{}", version))
    }
}

/// Read the installed version record. `None` means a fresh installation.
pub fn read_installed_version(root: &Path) -> Result<Option<Version>> {
    let path = root.join(VERSION_FILE);
    match fs::read_to_string(&path) {
        Ok(data) => Ok(Some(Version::parse(data.trim())?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Persist the installed version record. Written only after a plan step
/// fully commits; published via temp file + atomic rename.
pub fn write_installed_version(root: &Path, version: Version) -> Result<()> {
    fs::create_dir_all(root)?;
    let mut tmp = tempfile::NamedTempFile::new_in(root)?;
    tmp.write_all(version.to_string().as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(root.join(VERSION_FILE))
        .map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// The staged installer.
pub struct Installer<'a> {
    config: InstallerConfig,
    store: &'a dyn ReleaseStore,
    deps: &'a dyn DependencyInstaller,
    excludes: ExcludeMatcher,
    tracker: Option<&'a ProgressTracker>,
    state: InstallState,
}

impl<'a> Installer<'a> {
    pub fn new(
        config: InstallerConfig,
        store: &'a dyn ReleaseStore,
        deps: &'a dyn DependencyInstaller,
        excludes: ExcludeMatcher,
    ) -> Self {
        Self {
            config,
            store,
            deps,
            excludes,
            tracker: None,
            state: InstallState::Idle,
        }
    }

    /// Report progress through the given tracker at each step.
    pub fn with_tracker(mut self, tracker: &'a ProgressTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    fn transition(&mut self, next: InstallState) -> Result<()> {
        if !self.state.can_transition(next) {
            return Err(Error::Install(format!(
                "illegal installer state transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!(from = ?self.state, to = ?next, "installer state transition");
        self.state = next;
        Ok(())
    }

    fn report(&self, step: &str, completed: bool, delta: u8) {
        if let Some(tracker) = self.tracker {
            // Progress reporting is best-effort; a lock timeout must not
            // fail the install itself.
            if let Err(e) = tracker.update_phase(PHASE_CODEBASE_UPDATE, step, completed, delta) {
                warn!(error = %e, "progress update failed");
            }
        }
    }

    fn report_failure(&self, detail: &str) {
        if let Some(tracker) = self.tracker {
            if let Err(e) = tracker.mark_phase_failed(PHASE_CODEBASE_UPDATE, detail) {
                warn!(error = %e, "progress failure report failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Fresh install
    // ------------------------------------------------------------------

    /// Install `target` from scratch.
    ///
    /// Applies every manifest up to and including `target` into a staging
    /// directory, verifies the result, then atomically relocates staging
    /// onto the final root. On verification or download failure the
    /// staging directory is preserved for inspection and the final root
    /// is never touched.
    pub fn fresh_install(&mut self, target: Version, chain: &ManifestChain) -> Result<Version> {
        self.transition(InstallState::Resolving)?;
        self.report("Resolving release history", true, 5);

        if !chain.contains(target) {
            let err = Error::NotFound(format!("no published release for version {}", target));
            self.report_failure(&err.to_string());
            return Err(err);
        }

        // The commit below is a single rename onto the final root, which
        // requires the root to be absent (or an empty leftover directory).
        if self.config.root.is_dir()
            && fs::read_dir(&self.config.root)?.next().is_some()
        {
            let err = Error::Install(format!(
                "install root {} is not empty; refusing fresh install",
                self.config.root.display()
            ));
            self.report_failure(&err.to_string());
            return Err(err);
        }

        let steps: Vec<&Manifest> = chain.iter().filter(|m| m.version <= target).collect();

        let staging = self.config.staging_dir();
        info!(
            version = %target,
            staging = %staging.display(),
            "starting fresh installation"
        );

        self.transition(InstallState::Staging)?;
        let per_step = (60 / steps.len().max(1)) as u8;
        let mut expected: BTreeSet<String> = BTreeSet::new();

        for manifest in &steps {
            self.report(&format!("Staging release {}", manifest.version), true, per_step);
            if let Err(e) = self.apply_manifest_to(&staging, manifest, &mut expected) {
                self.fail_fresh(&staging, &e);
                return Err(e);
            }
        }

        self.transition(InstallState::Verifying)?;
        self.report("Verifying staged files", true, 10);
        if let Err(e) = verify_tree(&staging, &expected) {
            self.fail_fresh(&staging, &e);
            return Err(e);
        }

        // The rename is the commit point: any concurrent reader of the
        // final root sees either nothing or the complete tree.
        self.transition(InstallState::Applying)?;
        self.transition(InstallState::Committing)?;
        self.report("Committing installation", true, 15);
        fs::rename(&staging, &self.config.root)?;
        write_installed_version(&self.config.root, target)?;

        self.transition(InstallState::Completed)?;
        self.report("Installation complete", true, 10);
        info!(version = %target, root = %self.config.root.display(), "fresh installation committed");
        Ok(target)
    }

    fn fail_fresh(&mut self, staging: &Path, err: &Error) {
        warn!(
            error = %err,
            staging = %staging.display(),
            "fresh installation failed; staging preserved for inspection"
        );
        self.report_failure(&err.to_string());
        let _ = self.transition(InstallState::Failed);
    }

    // ------------------------------------------------------------------
    // Incremental update
    // ------------------------------------------------------------------

    /// Apply an update plan, one manifest at a time.
    ///
    /// Each step commits independently: after a step succeeds the version
    /// record advances and its backup is deleted, so a failure in a later
    /// step only rolls back that step. Returns the version the root is at
    /// when the call finishes.
    pub fn apply_plan(&mut self, plan: &UpdatePlan) -> Result<Version> {
        self.transition(InstallState::Resolving)?;
        let mut installed = plan.current();

        if plan.is_noop() {
            info!(version = %installed, "already at target version");
            self.transition(InstallState::Staging)?;
            self.transition(InstallState::Verifying)?;
            self.transition(InstallState::Applying)?;
            self.transition(InstallState::Committing)?;
            self.transition(InstallState::Completed)?;
            return Ok(installed);
        }

        let total = plan.len();
        let per_step = (80 / total.max(1)) as u8;

        for (index, manifest) in plan.steps().iter().enumerate() {
            info!(
                step = index + 1,
                total,
                version = %manifest.version,
                "applying update step"
            );
            self.report(
                &format!("Updating to version {}", manifest.version),
                true,
                0,
            );

            match self.apply_step(manifest) {
                Ok(()) => {
                    installed = manifest.version;
                    self.report(
                        &format!("Version {} committed", manifest.version),
                        true,
                        per_step,
                    );
                }
                Err(e) => {
                    // The root has been restored to `installed`; halt the
                    // plan and surface the failure with the last good
                    // version intact.
                    self.report_failure(&format!(
                        "update to {} failed: {} (still at {})",
                        manifest.version, e, installed
                    ));
                    return Err(e);
                }
            }

            // Reset the per-step machine for the next manifest.
            if index + 1 < total {
                self.state = InstallState::Idle;
                self.transition(InstallState::Resolving)?;
            }
        }

        self.report("Update complete", true, 20);
        info!(version = %installed, "update plan fully applied");
        Ok(installed)
    }

    /// One manifest step: backup, apply, verify, commit. On any failure
    /// the backup is restored and the error propagated.
    fn apply_step(&mut self, manifest: &Manifest) -> Result<()> {
        let backup_dir = self.config.backup_dir(manifest.version);

        self.transition(InstallState::Staging)?;
        create_backup(&self.config.root, &backup_dir, &self.excludes)?;

        self.transition(InstallState::Verifying)?;
        let result = self
            .apply_manifest_live(manifest)
            .and_then(|expected| verify_tree(&self.config.root, &expected))
            .and_then(|()| {
                if manifest.requirements_changed {
                    self.deps.install(&self.config.root)
                } else {
                    Ok(())
                }
            });

        match result {
            Ok(()) => {
                self.transition(InstallState::Committing)?;
                write_installed_version(&self.config.root, manifest.version)?;
                fs::remove_dir_all(&backup_dir).unwrap_or_else(|e| {
                    warn!(error = %e, "failed to remove step backup after commit");
                });
                self.transition(InstallState::Completed)?;
                Ok(())
            }
            Err(e) => {
                warn!(version = %manifest.version, error = %e, "update step failed, rolling back");
                let _ = self.transition(InstallState::Failed);
                restore_backup(&self.config.root, &backup_dir, manifest, &self.excludes)?;
                let _ = self.transition(InstallState::RolledBack);
                info!(
                    backup = %backup_dir.display(),
                    "rollback complete; backup staging preserved for recovery"
                );
                Err(e)
            }
        }
    }

    /// Apply one manifest to the live install root. Returns the set of
    /// written paths for verification.
    fn apply_manifest_live(&mut self, manifest: &Manifest) -> Result<BTreeSet<String>> {
        self.transition(InstallState::Applying)?;
        let mut written = BTreeSet::new();
        let root = self.config.root.clone();
        self.apply_manifest_inner(&root, manifest, &mut written)?;
        Ok(written)
    }

    /// Apply one manifest into `dest` (staging or the live root).
    fn apply_manifest_to(
        &self,
        dest: &Path,
        manifest: &Manifest,
        expected: &mut BTreeSet<String>,
    ) -> Result<()> {
        self.apply_manifest_inner(dest, manifest, expected)
    }

    fn apply_manifest_inner(
        &self,
        dest: &Path,
        manifest: &Manifest,
        written: &mut BTreeSet<String>,
    ) -> Result<()> {
        fs::create_dir_all(dest)?;

        // Deletes first, mirroring the published release's own ordering.
        for rel_path in &manifest.files_delete {
            if self.excludes.is_excluded(rel_path) {
                warn!(path = %rel_path, "manifest names an excluded path; refusing to delete");
                continue;
            }
            let target = safe_join(dest, rel_path)?;
            match fs::remove_file(&target) {
                Ok(()) => {
                    debug!(path = %rel_path, "deleted");
                    written.remove(rel_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %rel_path, "delete target already absent");
                    written.remove(rel_path);
                }
                Err(e) => return Err(e.into()),
            }
        }

        for rel_path in manifest.written_files() {
            if self.excludes.is_excluded(rel_path) {
                warn!(path = %rel_path, "manifest names an excluded path; refusing to write");
                continue;
            }
            let target = safe_join(dest, rel_path)?;
            let bytes = self.store.fetch_file(manifest.version, rel_path)?;
            if bytes.is_empty() {
                return Err(Error::Transport(format!(
                    "downloaded file {} from release {} is empty",
                    rel_path, manifest.version
                )));
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let parent = target
                .parent()
                .ok_or_else(|| Error::Install(format!("no parent directory for {}", rel_path)))?;
            let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&target).map_err(|e| Error::Io(e.error))?;

            debug!(path = %rel_path, bytes = bytes.len(), "wrote");
            written.insert(rel_path.to_string());
        }

        Ok(())
    }
}

/// Verify that every expected file exists under `root` with non-zero size.
fn verify_tree(root: &Path, expected: &BTreeSet<String>) -> Result<()> {
    for rel_path in expected {
        let path = root.join(rel_path);
        let metadata = fs::metadata(&path).map_err(|_| {
            Error::Install(format!("verification failed: {} is missing", rel_path))
        })?;
        if metadata.len() == 0 {
            return Err(Error::Install(format!(
                "verification failed: {} is empty",
                rel_path
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::NoopInstaller;
    use crate::planner;
    use crate::release::ChangeSet;
    use crate::store::{DirReleaseStore, ReleaseId};
    use tempfile::TempDir;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn manifest(version: &str, added: &[&str], edited: &[&str], deleted: &[&str]) -> Manifest {
        let changes = ChangeSet::new(
            added.iter().map(|s| s.to_string()),
            edited.iter().map(|s| s.to_string()),
            deleted.iter().map(|s| s.to_string()),
        )
        .unwrap();
        Manifest::build(v(version), &changes, false).unwrap()
    }

    fn publish(store: &DirReleaseStore, m: &Manifest, files: &[(&str, &str)]) {
        let files: Vec<(String, Vec<u8>)> = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
            .collect();
        store.publish(m, &files).unwrap();
    }

    /// Store double whose fetch_file fails for one specific path, to
    /// simulate a crash mid-manifest-application.
    struct FailingStore<'a> {
        inner: &'a DirReleaseStore,
        poison: String,
    }

    impl ReleaseStore for FailingStore<'_> {
        fn list_versions(&self) -> Result<Vec<Version>> {
            self.inner.list_versions()
        }
        fn fetch_manifest(&self, version: Version) -> Result<Manifest> {
            self.inner.fetch_manifest(version)
        }
        fn fetch_file(&self, version: Version, rel_path: &str) -> Result<Vec<u8>> {
            if rel_path == self.poison {
                return Err(Error::Transport("injected failure".to_string()));
            }
            self.inner.fetch_file(version, rel_path)
        }
        fn publish(&self, manifest: &Manifest, files: &[(String, Vec<u8>)]) -> Result<ReleaseId> {
            self.inner.publish(manifest, files)
        }
    }

    #[test]
    fn test_state_machine_legal_path() {
        use InstallState::*;
        let path = [Idle, Resolving, Staging, Verifying, Applying, Committing, Completed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_state_machine_illegal_moves() {
        use InstallState::*;
        assert!(!Idle.can_transition(Completed));
        assert!(!Completed.can_transition(Idle));
        assert!(!Resolving.can_transition(Failed));
        assert!(!Committing.can_transition(Failed));
        assert!(Applying.can_transition(Failed));
        assert!(Failed.can_transition(RolledBack));
        assert!(!RolledBack.can_transition(Resolving));
    }

    #[test]
    fn test_version_record_round_trip() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(read_installed_version(tmp.path()).unwrap(), None);
        write_installed_version(tmp.path(), v("1.2.3")).unwrap();
        assert_eq!(read_installed_version(tmp.path()).unwrap(), Some(v("1.2.3")));
    }

    #[test]
    fn test_fresh_install_commits_atomically() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path().join("store"));
        let m1 = manifest("1.0.0", &["core.dat"], &[], &[]);
        publish(&store, &m1, &[("core.dat", "core v1")]);
        let m2 = manifest("1.1.0", &["feature_x.bin"], &["core.dat"], &[]);
        publish(&store, &m2, &[("feature_x.bin", "fx"), ("core.dat", "core v1.1")]);

        let chain = ManifestChain::from_manifests(vec![m1, m2]).unwrap();
        let root = tmp.path().join("app");
        let config = InstallerConfig::new(root.clone());
        let staging = config.staging_dir();
        let deps = NoopInstaller;
        let mut installer =
            Installer::new(config, &store, &deps, ExcludeMatcher::with_defaults());

        let installed = installer.fresh_install(v("1.1.0"), &chain).unwrap();
        assert_eq!(installed, v("1.1.0"));
        assert_eq!(installer.state(), InstallState::Completed);

        assert_eq!(fs::read_to_string(root.join("core.dat")).unwrap(), "core v1.1");
        assert_eq!(fs::read_to_string(root.join("feature_x.bin")).unwrap(), "fx");
        assert_eq!(read_installed_version(&root).unwrap(), Some(v("1.1.0")));
        assert!(!staging.exists());
    }

    #[test]
    fn test_fresh_install_failure_preserves_staging_and_root() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path().join("store"));
        let m1 = manifest("1.0.0", &["core.dat", "broken.bin"], &[], &[]);
        // broken.bin is never uploaded, so staging verification fails.
        publish(&store, &m1, &[("core.dat", "core v1")]);

        let chain = ManifestChain::from_manifests(vec![m1]).unwrap();
        let root = tmp.path().join("app");
        let config = InstallerConfig::new(root.clone());
        let staging = config.staging_dir();
        let deps = NoopInstaller;
        let mut installer =
            Installer::new(config, &store, &deps, ExcludeMatcher::with_defaults());

        assert!(installer.fresh_install(v("1.0.0"), &chain).is_err());
        assert_eq!(installer.state(), InstallState::Failed);
        assert!(!root.exists(), "final root must be untouched");
        assert!(staging.exists(), "staging must be preserved for inspection");
    }

    #[test]
    fn test_sequential_update_commits_per_step() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path().join("store"));
        let m1 = manifest("1.1.0", &["feature_x.bin"], &[], &[]);
        publish(&store, &m1, &[("feature_x.bin", "fx")]);
        let m2 = manifest("1.2.0", &[], &["core.dat"], &["legacy.dat"]);
        publish(&store, &m2, &[("core.dat", "core v1.2")]);

        let root = tmp.path().join("app");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("core.dat"), "core v1.0").unwrap();
        fs::write(root.join("legacy.dat"), "old").unwrap();
        write_installed_version(&root, v("1.0.0")).unwrap();

        let chain = ManifestChain::from_manifests(vec![m1, m2]).unwrap();
        let plan = planner::plan(v("1.0.0"), v("1.2.0"), &chain).unwrap();

        let deps = NoopInstaller;
        let mut installer = Installer::new(
            InstallerConfig::new(root.clone()),
            &store,
            &deps,
            ExcludeMatcher::with_defaults(),
        );
        let installed = installer.apply_plan(&plan).unwrap();

        assert_eq!(installed, v("1.2.0"));
        assert_eq!(read_installed_version(&root).unwrap(), Some(v("1.2.0")));
        assert!(root.join("feature_x.bin").exists());
        assert!(!root.join("legacy.dat").exists());
        assert_eq!(fs::read_to_string(root.join("core.dat")).unwrap(), "core v1.2");
    }

    #[test]
    fn test_failed_step_rolls_back_and_halts() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path().join("store"));
        let m1 = manifest("1.1.0", &["feature_x.bin"], &["core.dat"], &[]);
        publish(&store, &m1, &[("feature_x.bin", "fx"), ("core.dat", "core v1.1")]);
        let m2 = manifest("1.2.0", &[], &["core.dat"], &[]);
        publish(&store, &m2, &[("core.dat", "core v1.2")]);

        let root = tmp.path().join("app");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("core.dat"), "core v1.0").unwrap();
        write_installed_version(&root, v("1.0.0")).unwrap();

        let chain = ManifestChain::from_manifests(vec![m1, m2]).unwrap();
        let plan = planner::plan(v("1.0.0"), v("1.2.0"), &chain).unwrap();

        // core.dat downloads fail after feature_x.bin has been written:
        // a crash in the middle of manifest application.
        let failing = FailingStore {
            inner: &store,
            poison: "core.dat".to_string(),
        };
        let deps = NoopInstaller;
        let mut installer = Installer::new(
            InstallerConfig::new(root.clone()),
            &failing,
            &deps,
            ExcludeMatcher::with_defaults(),
        );
        assert!(installer.apply_plan(&plan).is_err());
        assert_eq!(installer.state(), InstallState::RolledBack);

        // Managed files identical to the pre-step state, version record
        // unchanged, later manifests never attempted.
        assert_eq!(fs::read_to_string(root.join("core.dat")).unwrap(), "core v1.0");
        assert!(!root.join("feature_x.bin").exists());
        assert_eq!(read_installed_version(&root).unwrap(), Some(v("1.0.0")));
    }

    #[test]
    fn test_failure_in_second_step_keeps_first_commit() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path().join("store"));
        let m1 = manifest("1.1.0", &["feature_x.bin"], &[], &[]);
        publish(&store, &m1, &[("feature_x.bin", "fx")]);
        let m2 = manifest("1.2.0", &[], &["core.dat"], &[]);
        publish(&store, &m2, &[("core.dat", "core v1.2")]);

        let root = tmp.path().join("app");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("core.dat"), "core v1.0").unwrap();
        write_installed_version(&root, v("1.0.0")).unwrap();

        let chain = ManifestChain::from_manifests(vec![m1, m2]).unwrap();
        let plan = planner::plan(v("1.0.0"), v("1.2.0"), &chain).unwrap();

        let failing = FailingStore {
            inner: &store,
            poison: "core.dat".to_string(),
        };
        let deps = NoopInstaller;
        let mut installer = Installer::new(
            InstallerConfig::new(root.clone()),
            &failing,
            &deps,
            ExcludeMatcher::with_defaults(),
        );
        assert!(installer.apply_plan(&plan).is_err());

        // Step one committed before step two failed and rolled back.
        assert_eq!(read_installed_version(&root).unwrap(), Some(v("1.1.0")));
        assert!(root.join("feature_x.bin").exists());
        assert_eq!(fs::read_to_string(root.join("core.dat")).unwrap(), "core v1.0");
    }

    #[test]
    fn test_manifest_naming_user_data_is_refused() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path().join("store"));
        let m1 = manifest("1.1.0", &[], &["core.dat"], &["user_data/profile.db"]);
        publish(&store, &m1, &[("core.dat", "core v1.1")]);

        let root = tmp.path().join("app");
        fs::create_dir_all(root.join("user_data")).unwrap();
        fs::write(root.join("core.dat"), "core v1.0").unwrap();
        fs::write(root.join("user_data/profile.db"), "precious").unwrap();
        write_installed_version(&root, v("1.0.0")).unwrap();

        let chain = ManifestChain::from_manifests(vec![m1]).unwrap();
        let plan = planner::plan(v("1.0.0"), v("1.1.0"), &chain).unwrap();

        let deps = NoopInstaller;
        let mut installer = Installer::new(
            InstallerConfig::new(root.clone()),
            &store,
            &deps,
            ExcludeMatcher::with_defaults(),
        );
        installer.apply_plan(&plan).unwrap();

        // The delete of user data was refused; the edit went through.
        assert_eq!(
            fs::read_to_string(root.join("user_data/profile.db")).unwrap(),
            "precious"
        );
        assert_eq!(fs::read_to_string(root.join("core.dat")).unwrap(), "core v1.1");
    }

    #[test]
    fn test_dependency_failure_rolls_back() {
        struct FailingInstaller;
        impl DependencyInstaller for FailingInstaller {
            fn install(&self, _root: &Path) -> Result<()> {
                Err(Error::Install("pip exploded".to_string()))
            }
        }

        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path().join("store"));
        let changes =
            ChangeSet::new(vec![], vec!["core.dat".to_string()], vec![]).unwrap();
        let m1 = Manifest::build(v("1.1.0"), &changes, true).unwrap();
        publish(&store, &m1, &[("core.dat", "core v1.1")]);

        let root = tmp.path().join("app");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("core.dat"), "core v1.0").unwrap();
        write_installed_version(&root, v("1.0.0")).unwrap();

        let chain = ManifestChain::from_manifests(vec![m1]).unwrap();
        let plan = planner::plan(v("1.0.0"), v("1.1.0"), &chain).unwrap();

        let deps = FailingInstaller;
        let mut installer = Installer::new(
            InstallerConfig::new(root.clone()),
            &store,
            &deps,
            ExcludeMatcher::with_defaults(),
        );
        let err = installer.apply_plan(&plan).unwrap_err();
        assert!(matches!(err, Error::Install(_)));

        assert_eq!(fs::read_to_string(root.join("core.dat")).unwrap(), "core v1.0");
        assert_eq!(read_installed_version(&root).unwrap(), Some(v("1.0.0")));
    }

    #[test]
    fn test_noop_plan_is_trivially_complete() {
        let tmp = TempDir::new().unwrap();
        let store = DirReleaseStore::new(tmp.path().join("store"));
        let root = tmp.path().join("app");
        fs::create_dir_all(&root).unwrap();
        write_installed_version(&root, v("1.0.0")).unwrap();

        let chain = ManifestChain::new();
        let plan = planner::plan(v("1.0.0"), v("1.0.0"), &chain).unwrap();

        let deps = NoopInstaller;
        let mut installer = Installer::new(
            InstallerConfig::new(root.clone()),
            &store,
            &deps,
            ExcludeMatcher::with_defaults(),
        );
        assert_eq!(installer.apply_plan(&plan).unwrap(), v("1.0.0"));
        assert_eq!(installer.state(), InstallState::Completed);
    }
}
