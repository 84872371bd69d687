// src/commands.rs

//! Command implementations behind the CLI.

use crate::config::EngineConfig;
use crate::deps::{CommandInstaller, DependencyInstaller, NoopInstaller};
use crate::error::{Error, Result};
use crate::install::read_installed_version;
use crate::orchestrate::{Orchestrator, PhaseContext};
use crate::planner;
use crate::progress::ProgressTracker;
use crate::release::{ChangeClassifier, ChangeSet, Manifest};
use crate::store::{load_chain, DirReleaseStore, HttpReleaseStore, ReleaseStore};
use crate::version::Version;
use indicatif::ProgressBar;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Resolve the install root: explicit flag, or `~/.conveyor`.
fn resolve_root(root: Option<&str>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(PathBuf::from(path)),
        None => dirs::home_dir()
            .map(|home| home.join(".conveyor"))
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string())),
    }
}

/// Build a store from an http(s) URL or a local directory path.
fn open_store(spec: &str, timeout: Duration) -> Result<Box<dyn ReleaseStore>> {
    if spec.starts_with("http://") || spec.starts_with("https://") {
        Ok(Box::new(HttpReleaseStore::with_timeout(spec, timeout)?))
    } else {
        Ok(Box::new(DirReleaseStore::new(spec)))
    }
}

/// Directory beside the install root holding the progress document. It
/// survives the fresh-install rename of the root itself, so monitors can
/// poll it through the whole lifecycle.
fn state_dir(root: &Path) -> PathBuf {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "install".to_string());
    root.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("{}.state", name))
}

/// Split a shell-ish command string into program + args.
fn parse_command(raw: &str) -> Result<CommandInstaller> {
    let mut parts = raw.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| Error::Config("empty command".to_string()))?;
    Ok(CommandInstaller::new(
        program,
        parts.map(str::to_string).collect(),
    ))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} (y/N): ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_apply(
    version: Option<String>,
    list: bool,
    dry_run: bool,
    yes: bool,
    root: Option<String>,
    store_spec: String,
    config_path: String,
    deps_command: Option<String>,
    verify_command: Option<String>,
) -> Result<i32> {
    let config = EngineConfig::load(Path::new(&config_path))?;
    let store = open_store(
        &store_spec,
        Duration::from_secs(config.network.timeout_secs),
    )?;

    if list {
        let mut versions = store.list_versions()?;
        versions.sort();
        if versions.is_empty() {
            println!("No published releases");
        } else {
            println!("Available versions:");
            for v in versions {
                println!("  {}", v);
            }
        }
        return Ok(0);
    }

    let target = match version {
        Some(raw) => Version::parse(&raw)?,
        None => {
            return Err(Error::Config(
                "a target version is required (or use --list)".to_string(),
            ))
        }
    };

    let root = resolve_root(root.as_deref())?;
    let current = read_installed_version(&root)?;
    let chain = load_chain(store.as_ref())?;

    match current {
        None => {
            println!("Fresh installation of {} into {}", target, root.display());
            if !chain.contains(target) {
                return Err(Error::NotFound(format!(
                    "no published release for version {}",
                    target
                )));
            }
            if dry_run {
                let releases: Vec<String> = chain
                    .iter()
                    .filter(|m| m.version <= target)
                    .map(|m| m.version.to_string())
                    .collect();
                println!("Would stage releases: {}", releases.join(" -> "));
                return Ok(0);
            }
        }
        Some(current) => {
            let plan = planner::plan(current, target, &chain)?;
            if plan.is_noop() {
                println!("Already at version {}", current);
                return Ok(0);
            }

            let steps: Vec<String> = plan.steps().iter().map(|m| m.version.to_string()).collect();
            println!(
                "Update {} -> {} ({} step{}): {}",
                current,
                target,
                plan.len(),
                if plan.len() == 1 { "" } else { "s" },
                steps.join(" -> ")
            );
            if let Some(bump) = plan.strongest_bump() {
                println!("Strongest change: {}", bump);
            }

            if dry_run {
                return Ok(0);
            }

            // Breaking releases are expected to be intentional; routine
            // minor/patch updates ask first.
            if plan.requires_confirmation() && !yes && !confirm("Proceed with this update?")? {
                println!("Update cancelled");
                return Ok(1);
            }
        }
    }

    let state_dir = state_dir(&root);
    let run_id = format!("run_{}", uuid::Uuid::new_v4().simple());
    let tracker = ProgressTracker::open(&state_dir, &run_id)?
        .with_lock_timeout(Duration::from_secs(config.progress.lock_timeout_secs));

    let deps: Box<dyn DependencyInstaller> = match deps_command.as_deref() {
        Some(raw) => Box::new(parse_command(raw)?),
        None => Box::new(NoopInstaller),
    };
    let verify = verify_command.as_deref().map(parse_command).transpose()?;

    let mut ctx = PhaseContext {
        root: root.clone(),
        target,
        run_id,
        store: store.as_ref(),
        deps: deps.as_ref(),
        excludes: config.exclude_matcher()?,
        tracker: &tracker,
    };

    let exit = Orchestrator::standard(verify).run(&mut ctx);
    if exit == 0 {
        println!("Version {} installed at {}", target, root.display());
    } else {
        println!("Setup failed; see {}", tracker.doc_path().display());
    }
    Ok(exit)
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_release(
    version: Option<String>,
    changes_path: String,
    messages: Vec<String>,
    source: String,
    store_spec: String,
    requirements_changed: bool,
    notes: Option<String>,
    dry_run: bool,
    config_path: String,
) -> Result<i32> {
    let config = EngineConfig::load(Path::new(&config_path))?;
    let store = open_store(
        &store_spec,
        Duration::from_secs(config.network.timeout_secs),
    )?;

    let changes_json = std::fs::read_to_string(&changes_path).map_err(|e| {
        Error::Config(format!(
            "cannot read change set {}: {} (generate it from your VCS diff)",
            changes_path, e
        ))
    })?;
    let changes = ChangeSet::from_json(&changes_json)?;

    let chain = load_chain(store.as_ref())?;
    let previous = chain.latest().map(|m| m.version);

    let next = match version {
        Some(raw) => Version::parse(&raw)?,
        None => {
            let classifier = ChangeClassifier::new(config.classifier_rules()?)?;
            let bump = classifier.classify(&changes, &messages);
            match previous {
                Some(prev) => {
                    let next = prev.bump(bump);
                    info!(%prev, %next, %bump, "classified release");
                    next
                }
                None => Version::new(1, 0, 0),
            }
        }
    };

    let mut manifest = Manifest::build(next, &changes, requirements_changed)?;
    manifest.previous_version = previous;
    manifest.release_notes = notes;

    println!("Release manifest for version {}:", next);
    println!("{}", manifest.to_json()?);

    if dry_run {
        println!("(dry run, nothing published)");
        return Ok(0);
    }

    // Upload the content of every file the manifest writes.
    let source_root = PathBuf::from(&source);
    let mut files = Vec::new();
    let bar = ProgressBar::new(manifest.written_files().count() as u64);
    for rel_path in manifest.written_files() {
        bar.set_message(rel_path.to_string());
        let path = crate::fsutil::safe_join(&source_root, rel_path)?;
        let bytes = std::fs::read(&path).map_err(|e| {
            Error::Config(format!("cannot read {} from {}: {}", rel_path, source, e))
        })?;
        files.push((rel_path.to_string(), bytes));
        bar.inc(1);
    }
    bar.finish_and_clear();

    let release_id = store.publish(&manifest, &files)?;
    println!("Published release {} ({} files)", release_id, files.len());
    Ok(0)
}
