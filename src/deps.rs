// src/deps.rs

//! Dependency-installation collaborator.
//!
//! The engine does not install dependencies itself. When a manifest's
//! `requirements_changed` flag is set, the staged installer invokes this
//! boundary; a failure takes the same rollback path as any other apply
//! failure.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};
use wait_timeout::ChildExt;

/// Default bound on a dependency-installation subprocess.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Installs the dependency set declared by the codebase in `install_root`.
pub trait DependencyInstaller {
    fn install(&self, install_root: &Path) -> Result<()>;
}

/// Runs a configured command inside the install root, bounded by a
/// timeout. The command is expected to read the dependency spec the
/// codebase ships (for example `requirements.txt`).
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: INSTALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl DependencyInstaller for CommandInstaller {
    fn install(&self, install_root: &Path) -> Result<()> {
        info!(
            program = %self.program,
            root = %install_root.display(),
            "installing dependencies"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(install_root)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| Error::Install(format!("failed to spawn {}: {}", self.program, e)))?;

        let status = match child
            .wait_timeout(self.timeout)
            .map_err(|e| Error::Install(format!("failed to wait for {}: {}", self.program, e)))?
        {
            Some(status) => status,
            None => {
                warn!(program = %self.program, "dependency installation timed out, killing");
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Install(format!(
                    "{} timed out after {} seconds",
                    self.program,
                    self.timeout.as_secs()
                )));
            }
        };

        if !status.success() {
            return Err(Error::Install(format!(
                "{} exited with status {}",
                self.program, status
            )));
        }

        info!("dependencies installed");
        Ok(())
    }
}

/// No-op installer for tests and installations without a dependency step.
#[derive(Debug, Default)]
pub struct NoopInstaller;

impl DependencyInstaller for NoopInstaller {
    fn install(&self, _install_root: &Path) -> Result<()> {
        Ok(())
    }
}
