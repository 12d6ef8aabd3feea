// stave-core/src/engine.rs
use std::path::Path;

use stave_common::config::Config;
use stave_common::error::Result;
use stave_common::model::cask::Cask;
use tracing::debug;

use crate::artifact::{Artifact, Phase, PhaseOptions};

/// Runs one phase of one artifact. The orchestrator walks the sorted
/// artifact list and calls this once per artifact per phase; artifacts a
/// phase does not apply to are no-ops. Errors surface per artifact; whether
/// to continue with the remaining artifacts is the orchestrator's call.
pub fn run_phase(
    artifact: &Artifact,
    phase: Phase,
    cask: &Cask,
    stage_path: &Path,
    config: &Config,
    opts: &PhaseOptions,
) -> Result<()> {
    debug!(
        "Running {:?} phase for {} of cask {}",
        phase,
        artifact.summarize(),
        cask.token
    );
    match phase {
        Phase::Install => artifact.install_phase(cask, stage_path, config, opts),
        Phase::Uninstall => artifact.uninstall_phase(cask, stage_path, config, opts),
        Phase::PostUninstall => artifact.post_uninstall_phase(cask, stage_path, config, opts),
        Phase::Zap => artifact.zap_phase(cask, stage_path, config, opts),
    }
}

/// Human-readable one-line description of an artifact, for dry runs and
/// operation summaries.
pub fn summarize(artifact: &Artifact) -> String {
    artifact.summarize()
}
