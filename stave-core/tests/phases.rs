// Filesystem-level behavior of the artifact phases, driven through the
// public `artifacts_for` / `run_phase` boundary against a temp root.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use serde_json::json;
use stave_common::config::Config;
use stave_common::error::StaveError;
use stave_common::model::cask::Cask;
use stave_core::artifact::ArtifactKind;
use stave_core::privilege::{PrivilegeHelper, PrivilegeOutput, PrivilegeRequest};
use stave_core::{artifacts_for, run_phase, Phase, PhaseOptions};
use tempfile::TempDir;

/// Records escalation requests and pretends they succeeded, so tests can
/// assert on *whether* escalation happened without needing root.
#[derive(Default)]
struct RecordingHelper {
    requests: RefCell<Vec<PrivilegeRequest>>,
}

impl PrivilegeHelper for RecordingHelper {
    fn run(&self, request: &PrivilegeRequest) -> stave_common::error::Result<PrivilegeOutput> {
        self.requests.borrow_mut().push(request.clone());
        Ok(PrivilegeOutput {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

struct Fixture {
    _tmp: TempDir,
    config: Config,
    stage: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let home = tmp.path().join("home");
    let stage = tmp.path().join("stage");
    fs::create_dir_all(&home).unwrap();
    fs::create_dir_all(&stage).unwrap();
    let config = Config {
        stave_root: tmp.path().join("stave"),
        home_dir: home,
        appdir: Some(tmp.path().join("Applications")),
        bindir: None,
        mandir: None,
        explicit: HashMap::new(),
    };
    Fixture {
        _tmp: tmp,
        config,
        stage,
    }
}

fn cask(token: &str, stanzas: serde_json::Value) -> Cask {
    Cask {
        token: token.to_string(),
        version: Some("1.0".to_string()),
        artifacts: Some(stanzas.as_array().unwrap().clone()),
        ..Default::default()
    }
}

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn run_all(
    artifacts: &[stave_core::Artifact],
    phase: Phase,
    cask: &Cask,
    fx: &Fixture,
    opts: &PhaseOptions,
) {
    for artifact in artifacts {
        run_phase(artifact, phase, cask, &fx.stage, &fx.config, opts).unwrap();
    }
}

#[test]
fn binary_install_then_uninstall_restores_prior_state() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let opts = PhaseOptions::new(&helper);

    write_file(&fx.stage.join("bin/foo"), "#!/bin/sh\n");
    let cask = cask("foo", json!([{"binary": ["bin/foo"]}]));
    let artifacts = artifacts_for(&cask).unwrap();
    assert_eq!(artifacts.len(), 1);

    run_all(&artifacts, Phase::Install, &cask, &fx, &opts);
    let link = fx.config.bin_dir().join("foo");
    assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), fx.stage.join("bin/foo"));

    run_all(&artifacts, Phase::Uninstall, &cask, &fx, &opts);
    assert!(link.symlink_metadata().is_err());
    // Parent directories created on the way in are intentionally retained.
    assert!(fx.config.bin_dir().is_dir());
    assert!(helper.requests.borrow().is_empty());
}

#[test]
fn occupied_target_without_force_is_target_exists() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let opts = PhaseOptions::new(&helper);

    write_file(&fx.stage.join("bin/foo"), "#!/bin/sh\n");
    write_file(&fx.config.bin_dir().join("foo"), "something else");
    let cask = cask("foo", json!([{"binary": ["bin/foo"]}]));
    let artifacts = artifacts_for(&cask).unwrap();

    let err = run_phase(
        &artifacts[0],
        Phase::Install,
        &cask,
        &fx.stage,
        &fx.config,
        &opts,
    )
    .unwrap_err();
    match err {
        StaveError::TargetExists(path) => {
            assert_eq!(path, fx.config.bin_dir().join("foo"));
        }
        other => panic!("expected TargetExists, got {other:?}"),
    }
}

#[test]
fn missing_source_fails_before_touching_the_target() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let opts = PhaseOptions::new(&helper);

    let cask = cask("foo", json!([{"binary": ["bin/foo"]}]));
    let artifacts = artifacts_for(&cask).unwrap();
    let err = run_phase(
        &artifacts[0],
        Phase::Install,
        &cask,
        &fx.stage,
        &fx.config,
        &opts,
    )
    .unwrap_err();
    assert!(matches!(err, StaveError::SourceMissing(_)));
    assert!(!fx.config.bin_dir().join("foo").exists());
}

#[test]
fn force_adopts_a_stale_self_owned_link() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let mut opts = PhaseOptions::new(&helper);
    opts.force = true;

    write_file(&fx.stage.join("bin/foo"), "#!/bin/sh\n");
    // A dangling link left behind by a previous version, pointing into this
    // cask's own Caskroom directory.
    let own_root = fx.config.cask_room_token_path("foo");
    fs::create_dir_all(fx.config.bin_dir()).unwrap();
    let link = fx.config.bin_dir().join("foo");
    symlink(own_root.join("0.9/bin/foo"), &link).unwrap();

    let cask = cask("foo", json!([{"binary": ["bin/foo"]}]));
    let artifacts = artifacts_for(&cask).unwrap();
    run_all(&artifacts, Phase::Install, &cask, &fx, &opts);

    assert_eq!(fs::read_link(&link).unwrap(), fx.stage.join("bin/foo"));
}

#[test]
fn formula_owned_target_is_skipped_even_with_force() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let mut opts = PhaseOptions::new(&helper);
    opts.force = true;

    write_file(&fx.stage.join("bin/foo"), "#!/bin/sh\n");
    // A link whose real path resolves into the formula Cellar: another
    // package manager entity owns it.
    let cellar_tool = fx.config.cellar_dir().join("othertool/1.0/bin/foo");
    write_file(&cellar_tool, "#!/bin/sh\nformula\n");
    fs::create_dir_all(fx.config.bin_dir()).unwrap();
    let link = fx.config.bin_dir().join("foo");
    symlink(&cellar_tool, &link).unwrap();

    let cask = cask("foo", json!([{"binary": ["bin/foo"]}]));
    let artifacts = artifacts_for(&cask).unwrap();

    // Skip is informational: the phase succeeds and the link is untouched.
    run_all(&artifacts, Phase::Install, &cask, &fx, &opts);
    assert_eq!(fs::read_link(&link).unwrap(), cellar_tool);

    run_all(&artifacts, Phase::Uninstall, &cask, &fx, &opts);
    assert_eq!(fs::read_link(&link).unwrap(), cellar_tool);
}

#[test]
fn uninstalling_a_non_symlink_target_is_a_no_op() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let opts = PhaseOptions::new(&helper);

    write_file(&fx.stage.join("bin/foo"), "#!/bin/sh\n");
    let target = fx.config.bin_dir().join("foo");
    write_file(&target, "a real file, not ours");

    let cask = cask("foo", json!([{"binary": ["bin/foo"]}]));
    let artifacts = artifacts_for(&cask).unwrap();
    run_all(&artifacts, Phase::Uninstall, &cask, &fx, &opts);
    assert!(target.is_file());
}

#[test]
fn manpage_links_into_its_section_directory() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let opts = PhaseOptions::new(&helper);

    write_file(&fx.stage.join("man/foo.1"), ".TH FOO 1\n");
    let cask = cask("foo", json!([{"manpage": ["man/foo.1"]}]));
    let artifacts = artifacts_for(&cask).unwrap();
    run_all(&artifacts, Phase::Install, &cask, &fx, &opts);

    let link = fx.config.man_base_dir().join("man1/foo.1");
    assert_eq!(fs::read_link(&link).unwrap(), fx.stage.join("man/foo.1"));
}

#[test]
fn app_bundle_moves_in_and_out_of_the_applications_dir() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let opts = PhaseOptions::new(&helper);

    write_file(&fx.stage.join("Foo.app/Contents/MacOS/Foo"), "binary\n");
    let cask = cask("foo", json!([{"app": ["Foo.app"]}]));
    let artifacts = artifacts_for(&cask).unwrap();

    run_all(&artifacts, Phase::Install, &cask, &fx, &opts);
    let installed = fx.config.applications_dir().join("Foo.app");
    assert!(installed.join("Contents/MacOS/Foo").is_file());
    assert!(!fx.stage.join("Foo.app").exists());

    run_all(&artifacts, Phase::Uninstall, &cask, &fx, &opts);
    assert!(!installed.exists());
}

#[test]
fn app_install_and_uninstall_with_quit_and_deferred_rmdir() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let opts = PhaseOptions::new(&helper);

    write_file(&fx.stage.join("Foo.app/Contents/MacOS/Foo"), "binary\n");
    let cache_dir = fx.config.home_dir().join("Library/Caches/Foo");
    write_file(&cache_dir.join("cache.db"), "cache\n");

    let cask = cask(
        "foo",
        json!([
            {"app": ["Foo.app"]},
            {"uninstall": [{
                "quit": "com.example.foo-cask-test",
                "delete": ["~/Library/Caches/Foo/cache.db"],
                "rmdir": ["~/Library/Caches/Foo"]
            }]}
        ]),
    );
    let artifacts = artifacts_for(&cask).unwrap();
    let kinds: Vec<ArtifactKind> = artifacts.iter().map(|a| a.kind()).collect();
    assert_eq!(kinds, vec![ArtifactKind::Uninstall, ArtifactKind::App]);

    // Install: only the App artifact does anything; the cleanup directives
    // have no install phase, so the cache survives.
    run_all(&artifacts, Phase::Install, &cask, &fx, &opts);
    assert!(fx
        .config
        .applications_dir()
        .join("Foo.app/Contents/MacOS/Foo")
        .is_file());
    assert!(cache_dir.join("cache.db").is_file());

    // Uninstall: quit and delete dispatch, the app comes out, but rmdir is
    // deferred so the (now empty) cache directory is still there.
    run_all(&artifacts, Phase::Uninstall, &cask, &fx, &opts);
    assert!(!fx.config.applications_dir().join("Foo.app").exists());
    assert!(!cache_dir.join("cache.db").exists());
    assert!(cache_dir.is_dir());

    // Post-uninstall: rmdir finally runs against the emptied directory.
    run_all(&artifacts, Phase::PostUninstall, &cask, &fx, &opts);
    assert!(!cache_dir.exists());
}

#[test]
fn zap_trashes_and_removes_unconditionally() {
    let fx = fixture();
    let helper = RecordingHelper::default();
    let mut opts = PhaseOptions::new(&helper);
    // Zap ignores upgrade filtering entirely.
    opts.upgrade = true;

    let prefs = fx.config.home_dir().join("Library/Preferences/com.foo.plist");
    write_file(&prefs, "prefs\n");
    let support = fx.config.home_dir().join("Library/Application Support/Foo");
    fs::create_dir_all(&support).unwrap();

    let cask = cask(
        "foo",
        json!([{"zap": [{
            "delete": ["~/Library/Preferences/com.foo.plist"],
            "rmdir": ["~/Library/Application Support/Foo"]
        }]}]),
    );
    let artifacts = artifacts_for(&cask).unwrap();
    run_all(&artifacts, Phase::Zap, &cask, &fx, &opts);

    assert!(!prefs.exists());
    assert!(!support.exists());
}

#[test]
fn summaries_are_stable_one_liners() {
    let cask = cask(
        "foo",
        json!([
            {"app": ["Foo.app"]},
            {"binary": ["bin/foo"]},
            {"uninstall": [{"quit": "com.foo.App", "rmdir": ["~/Library/Foo"]}]}
        ]),
    );
    let artifacts = artifacts_for(&cask).unwrap();
    let summaries: Vec<String> = artifacts.iter().map(stave_core::summarize).collect();
    assert_eq!(
        summaries,
        vec![
            "Uninstall directives [quit, rmdir]",
            "App 'Foo.app'",
            "Binary 'foo'",
        ]
    );
}
