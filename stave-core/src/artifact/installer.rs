// stave-core/src/artifact/installer.rs
use std::path::Path;
use std::process::Command;

use stave_common::config::Config;
use stave_common::error::{Result, StaveError};
use stave_common::model::cask::{Cask, RawStanza};
use tracing::{debug, error, info, warn};

use super::{directives::ScriptSpec, normalize_entries, warn_unknown_keys, PhaseOptions};

/// An `installer` stanza: either a manual notice (the user must open the
/// staged payload themselves) or a vendor script run from the stage.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallerArtifact {
    Manual { path: String },
    Script(ScriptSpec),
}

impl InstallerArtifact {
    pub fn parse(value: &RawStanza) -> Vec<InstallerArtifact> {
        let mut parsed = Vec::new();
        for entry in normalize_entries(value) {
            let Some(map) = entry.as_object() else {
                warn!("Invalid installer stanza entry, skipping: {entry:?}");
                continue;
            };
            if let Some(manual) = map.get("manual").and_then(|v| v.as_str()) {
                warn_unknown_keys(map, &["manual"], "installer");
                parsed.push(InstallerArtifact::Manual {
                    path: manual.to_string(),
                });
                continue;
            }
            if let Some(spec) = ScriptSpec::from_value(&entry, "installer") {
                parsed.push(InstallerArtifact::Script(spec));
            }
        }
        parsed
    }

    pub fn describe(&self) -> String {
        match self {
            InstallerArtifact::Manual { path } => format!("Installer (manual) '{path}'"),
            InstallerArtifact::Script(spec) => format!("Installer (script) '{}'", spec.executable),
        }
    }

    pub fn run(
        &self,
        cask: &Cask,
        stage_path: &Path,
        _config: &Config,
        _opts: &PhaseOptions,
    ) -> Result<()> {
        match self {
            InstallerArtifact::Manual { path } => {
                info!(
                    "Cask {} requires manual installation. To finish:\n    open {}",
                    cask.token,
                    stage_path.join(path).display()
                );
                Ok(())
            }
            // Unlike cleanup directives, a failed install script is fatal.
            InstallerArtifact::Script(spec) => spec.run(Some(stage_path)).map_err(|e| {
                StaveError::InstallError(format!(
                    "Installer script failed for cask {}: {e}",
                    cask.token
                ))
            }),
        }
    }
}

/// A `pkg` stanza: a staged macOS package payload handed to the system
/// `installer` tool, which always needs root.
#[derive(Debug, Clone, PartialEq)]
pub struct PkgArtifact {
    /// Path of the package inside the staging area.
    pub source: String,
}

impl PkgArtifact {
    pub fn parse(value: &RawStanza) -> Vec<PkgArtifact> {
        let mut parsed = Vec::new();
        for entry in normalize_entries(value) {
            if let Some(name) = entry.as_str() {
                parsed.push(PkgArtifact {
                    source: name.to_string(),
                });
            } else if let Some(map) = entry.as_object() {
                // `choices` customization is accepted in declarations but not
                // interpreted by this engine.
                warn_unknown_keys(map, &["source", "choices"], "pkg");
                if let Some(name) = map.get("source").and_then(|v| v.as_str()) {
                    parsed.push(PkgArtifact {
                        source: name.to_string(),
                    });
                } else {
                    warn!("Pkg stanza entry missing 'source', skipping: {entry:?}");
                }
            } else {
                warn!("Invalid pkg stanza entry, skipping: {entry:?}");
            }
        }
        parsed
    }

    pub fn run(
        &self,
        cask: &Cask,
        stage_path: &Path,
        _config: &Config,
        _opts: &PhaseOptions,
    ) -> Result<()> {
        let pkg_path = stage_path.join(&self.source);
        if !pkg_path.exists() || !pkg_path.is_file() {
            return Err(StaveError::SourceMissing(pkg_path));
        }

        debug!(
            "Running installer for pkg {} (requires sudo)",
            pkg_path.display()
        );
        let output = Command::new("sudo")
            .arg("installer")
            .arg("-pkg")
            .arg(&pkg_path)
            .arg("-target")
            .arg("/")
            .output()
            .map_err(|e| {
                StaveError::CommandExecError(format!("Failed to execute sudo installer: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("sudo installer failed ({}): {}", output.status, stderr);
            return Err(StaveError::InstallError(format!(
                "Package installation failed for cask {} ({}): {}",
                cask.token,
                pkg_path.display(),
                stderr.trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("Installer stdout:\n{}", stdout.trim());
        }
        debug!("Successfully installed pkg: {}", pkg_path.display());
        Ok(())
    }
}
