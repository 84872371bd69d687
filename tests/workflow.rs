// tests/workflow.rs

//! End-to-end release/update workflow tests against a directory-backed
//! release store.

use conveyor::deps::NoopInstaller;
use conveyor::install::{read_installed_version, Installer, InstallerConfig};
use conveyor::planner;
use conveyor::release::{ChangeSet, Manifest};
use conveyor::store::{load_chain, DirReleaseStore, ReleaseStore};
use conveyor::version::{BumpType, Version};
use conveyor::{ChangeClassifier, ExcludeMatcher, PlanningError};
use std::fs;
use tempfile::TempDir;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn changeset(added: &[&str], edited: &[&str], deleted: &[&str]) -> ChangeSet {
    ChangeSet::new(
        added.iter().map(|s| s.to_string()),
        edited.iter().map(|s| s.to_string()),
        deleted.iter().map(|s| s.to_string()),
    )
    .unwrap()
}

fn publish(store: &DirReleaseStore, manifest: &Manifest, files: &[(&str, &str)]) {
    let files: Vec<(String, Vec<u8>)> = files
        .iter()
        .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
        .collect();
    store.publish(manifest, &files).unwrap();
}

/// Sequential update across two releases: 1.0.0 installed, chain has
/// 1.1.0 (adds feature_x.bin) and 1.2.0 (edits core.dat, deletes
/// legacy.dat).
#[test]
fn test_sequential_update_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let store = DirReleaseStore::new(tmp.path().join("store"));

    let m1 = Manifest::build(v("1.1.0"), &changeset(&["feature_x.bin"], &[], &[]), false).unwrap();
    publish(&store, &m1, &[("feature_x.bin", "feature x payload")]);
    let m2 = Manifest::build(
        v("1.2.0"),
        &changeset(&[], &["core.dat"], &["legacy.dat"]),
        false,
    )
    .unwrap();
    publish(&store, &m2, &[("core.dat", "core v1.2")]);

    // Installed copy at 1.0.0.
    let root = tmp.path().join("app");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("core.dat"), "core v1.0").unwrap();
    fs::write(root.join("legacy.dat"), "obsolete").unwrap();
    conveyor::write_installed_version(&root, v("1.0.0")).unwrap();

    let chain = load_chain(&store).unwrap();
    let plan = planner::plan(v("1.0.0"), v("1.2.0"), &chain).unwrap();
    let versions: Vec<Version> = plan.steps().iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![v("1.1.0"), v("1.2.0")]);

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
    assert_eq!(
        fs::read_to_string(root.join("core.dat")).unwrap(),
        "core v1.2"
    );
}

/// Producer publishes, consumer fresh-installs, then updates; the whole
/// cycle through one store.
#[test]
fn test_release_then_install_then_update_cycle() {
    let tmp = TempDir::new().unwrap();
    let store = DirReleaseStore::new(tmp.path().join("store"));
    let classifier = ChangeClassifier::with_defaults();

    // Release 1.0.0: the initial codebase.
    let base = changeset(&["core.dat", "lib/engine.bin"], &[], &[]);
    let m1 = Manifest::build(v("1.0.0"), &base, false).unwrap();
    publish(
        &store,
        &m1,
        &[("core.dat", "core v1.0"), ("lib/engine.bin", "engine v1")],
    );

    // Release 1.1.0: a feature addition, classified Minor.
    let feature = changeset(&["feature_login.bin"], &[], &[]);
    assert_eq!(classifier.classify(&feature, &[]), BumpType::Minor);
    let next = v("1.0.0").bump(BumpType::Minor);
    assert_eq!(next, v("1.1.0"));
    let m2 = Manifest::build(next, &feature, false).unwrap();
    publish(&store, &m2, &[("feature_login.bin", "login feature")]);

    // Fresh install straight to 1.1.0.
    let root = tmp.path().join("app");
    let chain = load_chain(&store).unwrap();
    let deps = NoopInstaller;
    let mut installer = Installer::new(
        InstallerConfig::new(root.clone()),
        &store,
        &deps,
        ExcludeMatcher::with_defaults(),
    );
    assert_eq!(installer.fresh_install(v("1.1.0"), &chain).unwrap(), v("1.1.0"));
    assert!(root.join("feature_login.bin").exists());
    assert!(root.join("lib/engine.bin").exists());

    // Release 1.1.1: a fix, classified Patch.
    let fix = changeset(&[], &["core.dat"], &[]);
    assert_eq!(classifier.classify(&fix, &[]), BumpType::Patch);
    let m3 = Manifest::build(v("1.1.1"), &fix, false).unwrap();
    publish(&store, &m3, &[("core.dat", "core v1.1.1")]);

    // Update the installed copy.
    let chain = load_chain(&store).unwrap();
    let plan = planner::plan(v("1.1.0"), v("1.1.1"), &chain).unwrap();
    assert!(plan.requires_confirmation());
    let mut installer = Installer::new(
        InstallerConfig::new(root.clone()),
        &store,
        &deps,
        ExcludeMatcher::with_defaults(),
    );
    installer.apply_plan(&plan).unwrap();

    assert_eq!(read_installed_version(&root).unwrap(), Some(v("1.1.1")));
    assert_eq!(
        fs::read_to_string(root.join("core.dat")).unwrap(),
        "core v1.1.1"
    );
}

/// A gap in the published history fails planning before anything is
/// touched on disk.
#[test]
fn test_gap_in_history_mutates_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = DirReleaseStore::new(tmp.path().join("store"));

    // 1.2.0 exists, but 1.1.0 was never published.
    let m = Manifest::build(v("1.2.0"), &changeset(&[], &["core.dat"], &[]), false).unwrap();
    publish(&store, &m, &[("core.dat", "core v1.2")]);

    let root = tmp.path().join("app");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("core.dat"), "core v1.0").unwrap();
    conveyor::write_installed_version(&root, v("1.0.0")).unwrap();

    let chain = load_chain(&store).unwrap();
    let err = planner::plan(v("1.0.0"), v("1.2.0"), &chain).unwrap_err();
    assert_eq!(err, PlanningError::GapInHistory("1.1.0".to_string()));

    // Nothing on disk moved.
    assert_eq!(
        fs::read_to_string(root.join("core.dat")).unwrap(),
        "core v1.0"
    );
    assert_eq!(read_installed_version(&root).unwrap(), Some(v("1.0.0")));
}

/// User data survives a multi-step update that also rolls back.
#[test]
fn test_user_data_survives_update_and_rollback() {
    let tmp = TempDir::new().unwrap();
    let store = DirReleaseStore::new(tmp.path().join("store"));

    let m1 = Manifest::build(v("1.1.0"), &changeset(&[], &["core.dat"], &[]), false).unwrap();
    publish(&store, &m1, &[("core.dat", "core v1.1")]);
    // 1.2.0 names a file that is never uploaded, so its step fails.
    let m2 = Manifest::build(v("1.2.0"), &changeset(&["missing.bin"], &[], &[]), false).unwrap();
    publish(&store, &m2, &[]);

    let root = tmp.path().join("app");
    fs::create_dir_all(root.join("user_data")).unwrap();
    fs::write(root.join("core.dat"), "core v1.0").unwrap();
    fs::write(root.join("user_data/notes.txt"), "do not lose me").unwrap();
    conveyor::write_installed_version(&root, v("1.0.0")).unwrap();

    let chain = load_chain(&store).unwrap();
    let plan = planner::plan(v("1.0.0"), v("1.2.0"), &chain).unwrap();

    let deps = NoopInstaller;
    let mut installer = Installer::new(
        InstallerConfig::new(root.clone()),
        &store,
        &deps,
        ExcludeMatcher::with_defaults(),
    );
    assert!(installer.apply_plan(&plan).is_err());

    // Step one committed, step two rolled back, user data untouched.
    assert_eq!(read_installed_version(&root).unwrap(), Some(v("1.1.0")));
    assert_eq!(
        fs::read_to_string(root.join("core.dat")).unwrap(),
        "core v1.1"
    );
    assert_eq!(
        fs::read_to_string(root.join("user_data/notes.txt")).unwrap(),
        "do not lose me"
    );
}

/// A manifest with an unsafe path never reaches the installer: the chain
/// refuses to hydrate.
#[test]
fn test_tampered_manifest_rejected_at_load() {
    let tmp = TempDir::new().unwrap();
    let store = DirReleaseStore::new(tmp.path().join("store"));

    let m = Manifest::build(v("1.0.0"), &changeset(&["core.dat"], &[], &[]), false).unwrap();
    publish(&store, &m, &[("core.dat", "core v1")]);

    // Tamper with the stored manifest on disk.
    let manifest_path = tmp
        .path()
        .join("store/releases/v1.0.0/manifest.json");
    let tampered = fs::read_to_string(&manifest_path)
        .unwrap()
        .replace("core.dat", "../../escape.dat");
    fs::write(&manifest_path, tampered).unwrap();

    assert!(load_chain(&store).is_err());
}

/// Versions listed by the store hydrate into a strictly ordered chain.
#[test]
fn test_chain_hydration_is_ordered() {
    let tmp = TempDir::new().unwrap();
    let store = DirReleaseStore::new(tmp.path().join("store"));

    for version in ["1.1.0", "1.0.0", "2.0.0", "1.2.0"] {
        let m = Manifest::build(v(version), &ChangeSet::default(), false).unwrap();
        publish(&store, &m, &[]);
    }

    let chain = load_chain(&store).unwrap();
    assert_eq!(
        chain.versions(),
        vec![v("1.0.0"), v("1.1.0"), v("1.2.0"), v("2.0.0")]
    );
}
