// stave-core/src/artifact/mod.rs
pub mod directives;
pub mod flight;
pub mod helpers;
pub mod installer;
pub mod moved;
pub mod ordering;
pub mod symlinked;

use std::fmt;
use std::path::Path;

use serde_json::Value;
use stave_common::config::Config;
use stave_common::error::Result;
use stave_common::model::cask::{Cask, FlightPoint};
use tracing::warn;

use self::directives::DirectiveSet;
use self::flight::FlightBlock;
use self::installer::{InstallerArtifact, PkgArtifact};
use self::moved::MovedArtifact;
use self::symlinked::SymlinkedArtifact;
use crate::privilege::PrivilegeHelper;

/// The closed set of artifact kinds the engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Preflight,
    Uninstall,
    Installer,
    Pkg,
    App,
    Suite,
    Binary,
    Manpage,
    Postflight,
    Zap,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Preflight => "preflight",
            ArtifactKind::Uninstall => "uninstall",
            ArtifactKind::Installer => "installer",
            ArtifactKind::Pkg => "pkg",
            ArtifactKind::App => "app",
            ArtifactKind::Suite => "suite",
            ArtifactKind::Binary => "binary",
            ArtifactKind::Manpage => "manpage",
            ArtifactKind::Postflight => "postflight",
            ArtifactKind::Zap => "zap",
        };
        f.write_str(name)
    }
}

/// The operations the orchestrator may request for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Install,
    Uninstall,
    PostUninstall,
    Zap,
}

/// Per-operation flags plus the escalation boundary. Artifacts never mutate
/// global state; everything they need arrives through here and the phase
/// arguments.
pub struct PhaseOptions<'a> {
    pub force: bool,
    pub adopt: bool,
    pub upgrade: bool,
    pub reinstall: bool,
    pub helper: &'a dyn PrivilegeHelper,
}

impl<'a> PhaseOptions<'a> {
    pub fn new(helper: &'a dyn PrivilegeHelper) -> Self {
        Self {
            force: false,
            adopt: false,
            upgrade: false,
            reinstall: false,
            helper,
        }
    }
}

/// One declared installable/removable unit within a cask. Constructed once by
/// the registry, read-only afterwards; phase calls receive the cask by
/// reference instead of the artifact owning it.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    App(MovedArtifact),
    Suite(MovedArtifact),
    Installer(InstallerArtifact),
    Pkg(PkgArtifact),
    Binary(SymlinkedArtifact),
    Manpage(SymlinkedArtifact),
    Preflight(FlightBlock),
    Postflight(FlightBlock),
    Uninstall(DirectiveSet),
    Zap(DirectiveSet),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::App(_) => ArtifactKind::App,
            Artifact::Suite(_) => ArtifactKind::Suite,
            Artifact::Installer(_) => ArtifactKind::Installer,
            Artifact::Pkg(_) => ArtifactKind::Pkg,
            Artifact::Binary(_) => ArtifactKind::Binary,
            Artifact::Manpage(_) => ArtifactKind::Manpage,
            Artifact::Preflight(_) => ArtifactKind::Preflight,
            Artifact::Postflight(_) => ArtifactKind::Postflight,
            Artifact::Uninstall(_) => ArtifactKind::Uninstall,
            Artifact::Zap(_) => ArtifactKind::Zap,
        }
    }

    /// Human-readable one-line description, used for dry runs and logging.
    pub fn summarize(&self) -> String {
        match self {
            Artifact::App(m) => m.describe("App"),
            Artifact::Suite(m) => m.describe("Suite"),
            Artifact::Installer(i) => i.describe(),
            Artifact::Pkg(p) => format!("Pkg '{}'", p.source),
            Artifact::Binary(s) => s.describe("Binary"),
            Artifact::Manpage(s) => s.describe("Manpage"),
            Artifact::Preflight(b) => b.describe("Preflight"),
            Artifact::Postflight(b) => b.describe("Postflight"),
            Artifact::Uninstall(d) => d.describe("Uninstall"),
            Artifact::Zap(d) => d.describe("Zap"),
        }
    }

    pub fn install_phase(
        &self,
        cask: &Cask,
        stage_path: &Path,
        config: &Config,
        opts: &PhaseOptions,
    ) -> Result<()> {
        match self {
            Artifact::App(m) | Artifact::Suite(m) => m.install(cask, stage_path, config, opts),
            Artifact::Installer(i) => i.run(cask, stage_path, config, opts),
            Artifact::Pkg(p) => p.run(cask, stage_path, config, opts),
            Artifact::Binary(s) | Artifact::Manpage(s) => s.install(cask, stage_path, config, opts),
            Artifact::Preflight(b) => b.run_point(FlightPoint::PreInstall, cask, stage_path, config),
            Artifact::Postflight(b) => {
                b.run_point(FlightPoint::PostInstall, cask, stage_path, config)
            }
            // Cleanup directives have no install-time work.
            Artifact::Uninstall(_) | Artifact::Zap(_) => Ok(()),
        }
    }

    pub fn uninstall_phase(
        &self,
        cask: &Cask,
        stage_path: &Path,
        config: &Config,
        opts: &PhaseOptions,
    ) -> Result<()> {
        match self {
            Artifact::App(m) | Artifact::Suite(m) => m.uninstall(cask, config, opts),
            Artifact::Binary(s) | Artifact::Manpage(s) => s.uninstall(cask, config, opts),
            Artifact::Preflight(b) => {
                b.run_point(FlightPoint::PreUninstall, cask, stage_path, config)
            }
            Artifact::Postflight(b) => {
                b.run_point(FlightPoint::PostUninstall, cask, stage_path, config)
            }
            Artifact::Uninstall(d) => d.uninstall_phase(cask, config, opts),
            // Installer runs and pkg payloads are cleaned up through
            // `uninstall`/`zap` directives, not by the artifact itself.
            Artifact::Installer(_) | Artifact::Pkg(_) | Artifact::Zap(_) => Ok(()),
        }
    }

    /// The deferred sub-phase: only `rmdir` directives dispatch here, after
    /// every other directive has had its chance to empty the directories.
    pub fn post_uninstall_phase(
        &self,
        cask: &Cask,
        _stage_path: &Path,
        config: &Config,
        opts: &PhaseOptions,
    ) -> Result<()> {
        match self {
            Artifact::Uninstall(d) => d.post_uninstall_phase(cask, config, opts),
            _ => Ok(()),
        }
    }

    pub fn zap_phase(
        &self,
        cask: &Cask,
        _stage_path: &Path,
        config: &Config,
        opts: &PhaseOptions,
    ) -> Result<()> {
        match self {
            Artifact::Zap(d) => d.zap_phase(cask, config, opts),
            _ => Ok(()),
        }
    }
}

/// Stanza values arrive either as a single entry or an array of entries;
/// normalize to a list the parsers can iterate.
pub(crate) fn normalize_entries(value: &Value) -> Vec<Value> {
    if let Some(arr) = value.as_array() {
        arr.clone()
    } else {
        vec![value.clone()]
    }
}

/// Construction-time forward compatibility: newer cask declarations may carry
/// keys an older engine does not know. Warn and strip, never fail.
pub(crate) fn warn_unknown_keys(
    obj: &serde_json::Map<String, Value>,
    recognized: &[&str],
    context: &str,
) {
    for key in obj.keys() {
        if !recognized.contains(&key.as_str()) {
            warn!("Unknown key '{key}' in {context} stanza, ignoring");
        }
    }
}
