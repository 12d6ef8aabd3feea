// stave-core/src/registry.rs
use stave_common::error::Result;
use stave_common::model::cask::{Cask, FlightPoint};
use tracing::{debug, warn};

use crate::artifact::directives::DirectiveSet;
use crate::artifact::flight::FlightBlock;
use crate::artifact::installer::{InstallerArtifact, PkgArtifact};
use crate::artifact::moved::MovedArtifact;
use crate::artifact::ordering;
use crate::artifact::symlinked::SymlinkedArtifact;
use crate::artifact::Artifact;

/// Builds the cask's typed artifact list from its declared stanzas, sorted
/// into execution order.
///
/// Construction is a pure function of the cask description: calling it again
/// with an unchanged cask yields an element-for-element equal sequence.
/// Stanzas are visited in declaration order and the ordering sort is stable,
/// so same-kind artifacts keep their declared relative order.
pub fn artifacts_for(cask: &Cask) -> Result<Vec<Artifact>> {
    let mut artifacts: Vec<Artifact> = Vec::new();

    if let Some(stanzas) = &cask.artifacts {
        for stanza in stanzas {
            let Some(obj) = stanza.as_object() else {
                warn!(
                    "Invalid artifact stanza for cask {} (expected an object), ignoring: {stanza:?}",
                    cask.token
                );
                continue;
            };
            for (key, value) in obj {
                match key.as_str() {
                    "app" => artifacts.extend(
                        MovedArtifact::parse(value, "app")
                            .into_iter()
                            .map(Artifact::App),
                    ),
                    "suite" => artifacts.extend(
                        MovedArtifact::parse(value, "suite")
                            .into_iter()
                            .map(Artifact::Suite),
                    ),
                    "installer" => artifacts.extend(
                        InstallerArtifact::parse(value)
                            .into_iter()
                            .map(Artifact::Installer),
                    ),
                    "pkg" => {
                        artifacts.extend(PkgArtifact::parse(value).into_iter().map(Artifact::Pkg))
                    }
                    "binary" => artifacts.extend(
                        SymlinkedArtifact::parse_binaries(value)
                            .into_iter()
                            .map(Artifact::Binary),
                    ),
                    "manpage" => artifacts.extend(
                        SymlinkedArtifact::parse_manpages(value)
                            .into_iter()
                            .map(Artifact::Manpage),
                    ),
                    "uninstall" => artifacts.push(Artifact::Uninstall(DirectiveSet::from_stanza(
                        value,
                        &cask.token,
                    ))),
                    "zap" => artifacts.push(Artifact::Zap(DirectiveSet::from_stanza(
                        value,
                        &cask.token,
                    ))),
                    other => {
                        // Forward compatibility: newer declarations may use
                        // stanza kinds this engine does not know yet.
                        warn!(
                            "Unknown artifact stanza '{other}' for cask {}, ignoring",
                            cask.token
                        );
                    }
                }
            }
        }
    }

    let preflight: Vec<_> = cask
        .flight_hooks
        .iter()
        .filter(|def| {
            matches!(
                def.point,
                FlightPoint::PreInstall | FlightPoint::PreUninstall
            )
        })
        .cloned()
        .collect();
    if !preflight.is_empty() {
        artifacts.push(Artifact::Preflight(FlightBlock::new(preflight)));
    }
    let postflight: Vec<_> = cask
        .flight_hooks
        .iter()
        .filter(|def| {
            matches!(
                def.point,
                FlightPoint::PostInstall | FlightPoint::PostUninstall
            )
        })
        .cloned()
        .collect();
    if !postflight.is_empty() {
        artifacts.push(Artifact::Postflight(FlightBlock::new(postflight)));
    }

    artifacts.sort_by(ordering::cmp_artifacts);
    debug!(
        "Built {} artifact(s) for cask {}",
        artifacts.len(),
        cask.token
    );
    Ok(artifacts)
}
