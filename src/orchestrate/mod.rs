// src/orchestrate/mod.rs

//! Run orchestration: composes the codebase-update and
//! environment-verification phases sequentially and wires every step into
//! the progress tracker.
//!
//! Each phase is an independently invocable unit implementing [`Phase`],
//! so a single phase can be re-run by hand for testing or manual
//! recovery. Phases run strictly in order because later phases assume the
//! filesystem state the former produced; a failed phase halts the run.
//! There is no process-wide state: everything a phase needs travels in
//! the [`PhaseContext`].

use crate::deps::{CommandInstaller, DependencyInstaller};
use crate::error::Result;
use crate::fsutil::ExcludeMatcher;
use crate::install::{read_installed_version, Installer, InstallerConfig};
use crate::planner;
use crate::progress::{
    OverallStatus, ProgressTracker, PHASE_CODEBASE_UPDATE, PHASE_ENV_VERIFICATION,
};
use crate::store::{load_chain, ReleaseStore};
use crate::version::Version;
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything a phase needs to run.
pub struct PhaseContext<'a> {
    pub root: PathBuf,
    pub target: Version,
    pub run_id: String,
    pub store: &'a dyn ReleaseStore,
    pub deps: &'a dyn DependencyInstaller,
    pub excludes: ExcludeMatcher,
    pub tracker: &'a ProgressTracker,
}

/// Outcome of one phase.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: &'static str,
    pub detail: String,
}

/// An independently invocable unit of the setup run.
pub trait Phase {
    fn name(&self) -> &'static str;
    fn run(&mut self, ctx: &mut PhaseContext<'_>) -> Result<PhaseReport>;
}

/// Phase 1: bring the install root to the target version, fresh or
/// incremental.
#[derive(Debug, Default)]
pub struct CodebaseUpdatePhase;

impl Phase for CodebaseUpdatePhase {
    fn name(&self) -> &'static str {
        PHASE_CODEBASE_UPDATE
    }

    fn run(&mut self, ctx: &mut PhaseContext<'_>) -> Result<PhaseReport> {
        let chain = load_chain(ctx.store)?;
        let config = InstallerConfig {
            root: ctx.root.clone(),
            run_id: ctx.run_id.clone(),
        };

        let mut installer = Installer::new(config, ctx.store, ctx.deps, ctx.excludes.clone())
            .with_tracker(ctx.tracker);

        let installed = match read_installed_version(&ctx.root)? {
            None => {
                info!(version = %ctx.target, "no version record, performing fresh installation");
                installer.fresh_install(ctx.target, &chain)?
            }
            Some(current) => {
                let plan = planner::plan(current, ctx.target, &chain)?;
                installer.apply_plan(&plan)?
            }
        };

        ctx.tracker
            .update_phase(self.name(), "Codebase update completed", true, 100)
            .unwrap_or_else(|e| warn!(error = %e, "progress update failed"));

        Ok(PhaseReport {
            phase: self.name(),
            detail: format!("installed version {}", installed),
        })
    }
}

/// Phase 2: verify the updated environment.
///
/// The real checks (package and binary presence) belong to an external
/// collaborator; this phase runs the configured verification command when
/// one is set and otherwise performs the built-in boundary checks: the
/// install root exists and the version record parses as the target.
pub struct EnvironmentVerificationPhase {
    command: Option<CommandInstaller>,
}

impl EnvironmentVerificationPhase {
    pub fn new(command: Option<CommandInstaller>) -> Self {
        Self { command }
    }
}

impl Phase for EnvironmentVerificationPhase {
    fn name(&self) -> &'static str {
        PHASE_ENV_VERIFICATION
    }

    fn run(&mut self, ctx: &mut PhaseContext<'_>) -> Result<PhaseReport> {
        ctx.tracker
            .update_phase(self.name(), "Starting environment verification", true, 10)
            .unwrap_or_else(|e| warn!(error = %e, "progress update failed"));

        if let Some(command) = &self.command {
            command.install(&ctx.root)?;
        } else {
            let recorded = read_installed_version(&ctx.root)?;
            if recorded != Some(ctx.target) {
                return Err(crate::Error::Install(format!(
                    "version record mismatch after update: expected {}, found {}",
                    ctx.target,
                    recorded.map(|v| v.to_string()).unwrap_or_else(|| "none".into())
                )));
            }
        }

        ctx.tracker
            .update_phase(self.name(), "Environment verification completed", true, 90)
            .unwrap_or_else(|e| warn!(error = %e, "progress update failed"));

        Ok(PhaseReport {
            phase: self.name(),
            detail: "environment verified".to_string(),
        })
    }
}

/// Composes the phases and maps the outcome to a process exit code:
/// 0 on success, 1 when the codebase update fails, 2 when verification
/// fails.
pub struct Orchestrator<'a> {
    phases: Vec<Box<dyn Phase + 'a>>,
}

impl<'a> Orchestrator<'a> {
    /// The standard two-phase run.
    pub fn standard(verify_command: Option<CommandInstaller>) -> Self {
        Self {
            phases: vec![
                Box::new(CodebaseUpdatePhase),
                Box::new(EnvironmentVerificationPhase::new(verify_command)),
            ],
        }
    }

    pub fn with_phases(phases: Vec<Box<dyn Phase + 'a>>) -> Self {
        Self { phases }
    }

    /// Run all phases in order, stopping at the first failure.
    pub fn run(&mut self, ctx: &mut PhaseContext<'_>) -> i32 {
        if let Err(e) = ctx
            .tracker
            .set_overall_status(OverallStatus::Running, None)
        {
            warn!(error = %e, "could not mark run started");
        }

        for (index, phase) in self.phases.iter_mut().enumerate() {
            info!(phase = phase.name(), "starting phase");
            match phase.run(ctx) {
                Ok(report) => {
                    info!(phase = report.phase, detail = %report.detail, "phase completed");
                }
                Err(e) => {
                    warn!(phase = phase.name(), error = %e, "phase failed");
                    // The installer reports its own failures with more
                    // context; this is the safety net for everything else.
                    let _ = ctx.tracker.mark_phase_failed(phase.name(), &e.to_string());
                    return (index + 1) as i32;
                }
            }
        }

        if let Err(e) = ctx.tracker.finish() {
            warn!(error = %e, "could not mark run completed");
        }
        0
    }
}
