use std::path::{Path, PathBuf};

use keg_layout::{DropReason, LayoutError, LayoutPlanner, UnmatchedPolicy};
use keg_resource::{Anchor, FileClass, LayoutRuleSpec, PackageSpec, InstallationPrefix};
use keg_verify::Checksum;

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, relative).unwrap();
}

fn server_distribution() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in [
        "bin/server",
        "bin/server.in.sh",
        "bin/plugin",
        "bin/server.bat",
        "bin/service.exe",
        "lib/server-1.5.jar",
        "lib/lucene-core.jar",
        "lib/sigar/sigar.jar",
        "lib/sigar/libsigar-universal64-macosx.dylib",
        "config/server.yml",
        "config/logging.yml",
        "LICENSE.txt",
        "NOTICE.txt",
        "README.textile",
    ] {
        touch(dir.path(), file);
    }
    dir
}

fn server_rules() -> Vec<LayoutRuleSpec> {
    vec![
        LayoutRuleSpec::new("bin/*.{bat,exe}", FileClass::Excluded("windows".into())),
        LayoutRuleSpec::new("bin/*", FileClass::Executable),
        LayoutRuleSpec::new("lib/sigar/*.{jar,dylib}", FileClass::PluginLibrary)
            .into_dir("libexec/sigar")
            .flatten(),
        LayoutRuleSpec::new("lib/*.jar", FileClass::Library)
            .into_dir("libexec")
            .flatten(),
        LayoutRuleSpec::new("config/*", FileClass::Configuration).strip(1),
        LayoutRuleSpec::new("*.{txt,textile}", FileClass::Documentation),
    ]
}

#[test]
fn planning_is_deterministic() {
    let staging = server_distribution();
    let planner = LayoutPlanner::new(&server_rules()).unwrap();

    let first = planner.plan(staging.path()).unwrap();
    let second = planner.plan(staging.path()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.mapping(), second.mapping());

    let sources: Vec<_> = first.files.iter().map(|f| f.source.clone()).collect();
    let mut sorted = sources.clone();
    sorted.sort();
    assert_eq!(sources, sorted);
}

#[test]
fn every_file_is_placed_or_dropped() {
    let staging = server_distribution();
    let plan = LayoutPlanner::new(&server_rules())
        .unwrap()
        .policy(UnmatchedPolicy::Strict)
        .plan(staging.path())
        .unwrap();

    assert_eq!(plan.files.len() + plan.dropped.len(), 14);
    assert_eq!(plan.dropped.len(), 2);
    for dropped in &plan.dropped {
        assert_eq!(dropped.reason, DropReason::Excluded("windows".into()));
    }

    let jar = plan.find("lib/server-1.5.jar").unwrap();
    assert_eq!(jar.anchor, Anchor::Prefix);
    assert_eq!(jar.target, PathBuf::from("libexec/server-1.5.jar"));

    let sigar = plan.find("lib/sigar/sigar.jar").unwrap();
    assert_eq!(sigar.target, PathBuf::from("libexec/sigar/sigar.jar"));
    assert_eq!(sigar.class, FileClass::PluginLibrary);

    let config = plan.find("config/server.yml").unwrap();
    assert_eq!(config.anchor, Anchor::Config);
    assert_eq!(config.target, PathBuf::from("server.yml"));

    assert_eq!(plan.anchored(Anchor::Config).count(), 2);
}

#[test]
fn destinations_resolve_against_the_prefix() {
    let staging = server_distribution();
    let plan = LayoutPlanner::new(&server_rules())
        .unwrap()
        .plan(staging.path())
        .unwrap();

    let root = tempfile::tempdir().unwrap();
    let spec = PackageSpec::archive("server", "1.5", "file:///dev/null", Checksum::of(b""));
    let prefix = InstallationPrefix::new(root.path(), &spec).unwrap();

    let config = plan.find("config/logging.yml").unwrap();
    assert_eq!(config.destination(&prefix), prefix.config_root().join("logging.yml"));
    let bin = plan.find("bin/plugin").unwrap();
    assert_eq!(bin.destination(&prefix), prefix.prefix().join("bin/plugin"));
}

#[test]
fn strict_mode_rejects_unclassified_files() {
    let staging = server_distribution();
    touch(staging.path(), "contrib/extra.py");

    let err = LayoutPlanner::new(&server_rules())
        .unwrap()
        .strict(true)
        .plan(staging.path())
        .unwrap_err();
    assert!(matches!(err, LayoutError::Unclassified(path) if path == Path::new("contrib/extra.py")));
}

#[test]
fn lenient_mode_records_unclassified_files() {
    let staging = server_distribution();
    touch(staging.path(), "contrib/extra.py");

    let plan = LayoutPlanner::new(&server_rules())
        .unwrap()
        .plan(staging.path())
        .unwrap();
    assert!(
        plan.dropped
            .iter()
            .any(|d| d.source == Path::new("contrib/extra.py") && d.reason == DropReason::Unclassified)
    );
}

#[test]
fn two_sources_for_one_target_collide() {
    let staging = tempfile::tempdir().unwrap();
    touch(staging.path(), "lib/a/core.jar");
    touch(staging.path(), "lib/b/core.jar");

    let err = LayoutPlanner::new(&[LayoutRuleSpec::new("lib/**", FileClass::Library)
        .into_dir("libexec")
        .flatten()])
    .unwrap()
    .plan(staging.path())
    .unwrap_err();
    assert!(matches!(err, LayoutError::Collision { .. }));
}

#[test]
fn reserved_paths_are_protected() {
    let staging = tempfile::tempdir().unwrap();
    touch(staging.path(), "config/app.yml");

    let err = LayoutPlanner::new(&[LayoutRuleSpec::new("**", FileClass::Payload)])
        .unwrap()
        .reserve(Anchor::Prefix, "config")
        .plan(staging.path())
        .unwrap_err();
    assert!(matches!(err, LayoutError::Reserved { .. }));
}
