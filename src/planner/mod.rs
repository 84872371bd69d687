// src/planner/mod.rs

//! Sequential update planning.
//!
//! Given the installed version, a target version, and the manifest chain,
//! the planner computes the ordered list of manifests to apply. Updates
//! never skip a published version: the chain must be dense between
//! current and target, where dense means each step is exactly one
//! semantic-version bump ahead of its predecessor. Planning performs no
//! filesystem I/O; every failure is surfaced before any mutation.

use crate::error::PlanningError;
use crate::release::{Manifest, ManifestChain};
use crate::version::{BumpType, Version};
use tracing::debug;

/// Ordered manifests from the version immediately after `current` up to
/// and including `target`. Empty only for a no-op (current == target).
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    current: Version,
    steps: Vec<Manifest>,
}

impl UpdatePlan {
    pub fn current(&self) -> Version {
        self.current
    }

    /// The final version after a full apply; `current` for a no-op plan.
    pub fn target(&self) -> Version {
        self.steps.last().map(|m| m.version).unwrap_or(self.current)
    }

    pub fn steps(&self) -> &[Manifest] {
        &self.steps
    }

    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The strongest per-step bump contained in the plan.
    pub fn strongest_bump(&self) -> Option<BumpType> {
        let mut prev = self.current;
        let mut strongest: Option<BumpType> = None;
        for step in &self.steps {
            if let Some(kind) = step.version.bump_from(&prev) {
                strongest = Some(strongest.map_or(kind, |s| s.max(kind)));
            }
            prev = step.version;
        }
        strongest
    }

    /// Whether the plan needs explicit operator confirmation before the
    /// installer executes it.
    ///
    /// Major plans proceed unprompted: a breaking release is expected to
    /// be an intentional, reviewed act. Minor and patch plans are the
    /// routine ones where an unintended target slips in, so those ask.
    pub fn requires_confirmation(&self) -> bool {
        match self.strongest_bump() {
            Some(BumpType::Major) => false,
            Some(_) => true,
            None => false,
        }
    }
}

/// Compute the ordered update plan from `current` to `target`.
pub fn plan(
    current: Version,
    target: Version,
    chain: &ManifestChain,
) -> std::result::Result<UpdatePlan, PlanningError> {
    if target == current {
        debug!(%current, "target equals installed version, empty plan");
        return Ok(UpdatePlan {
            current,
            steps: Vec::new(),
        });
    }

    if target < current {
        return Err(PlanningError::TargetBehindCurrent {
            current: current.to_string(),
            target: target.to_string(),
        });
    }

    if !chain.contains(target) {
        return Err(PlanningError::NoSuchVersion(target.to_string()));
    }

    // Walk forward one bump at a time; every expected intermediate version
    // must have a published manifest.
    let mut steps = Vec::new();
    let mut cursor = current;
    while cursor < target {
        let next = next_step(cursor, target);
        match chain.get(next) {
            Some(manifest) => steps.push(manifest.clone()),
            None => return Err(PlanningError::GapInHistory(next.to_string())),
        }
        cursor = next;
    }

    debug!(
        from = %current,
        to = %target,
        steps = steps.len(),
        "computed sequential update plan"
    );

    Ok(UpdatePlan { current, steps })
}

/// The next version on the stepping path from `cursor` toward `target`:
/// majors first, then minors, then patches.
fn next_step(cursor: Version, target: Version) -> Version {
    if cursor.major < target.major {
        cursor.bump(BumpType::Major)
    } else if cursor.minor < target.minor {
        cursor.bump(BumpType::Minor)
    } else {
        cursor.bump(BumpType::Patch)
    }
}
