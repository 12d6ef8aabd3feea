// stave-core/src/artifact/moved.rs
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;

use stave_common::config::Config;
use stave_common::error::{Result, StaveError};
use stave_common::model::cask::{Cask, RawStanza};
use tracing::{debug, warn};

use super::{helpers, normalize_entries, warn_unknown_keys, PhaseOptions};
use crate::privilege::{PrivilegeRequest, PrivilegedOp};

/// A bundle relocated from the staging area into the applications directory
/// (`app` and `suite` stanzas).
#[derive(Debug, Clone, PartialEq)]
pub struct MovedArtifact {
    /// Name of the bundle inside the staging area.
    pub source: String,
    /// Name it takes on in the target directory.
    pub target: String,
}

impl MovedArtifact {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    /// Parse one `app`/`suite` stanza value. Entries are either a bundle name
    /// or a map with `source` and an optional `target` rename.
    pub fn parse(value: &RawStanza, context: &str) -> Vec<MovedArtifact> {
        let mut parsed = Vec::new();
        for entry in normalize_entries(value) {
            if let Some(name) = entry.as_str() {
                parsed.push(MovedArtifact::new(name, name));
            } else if let Some(map) = entry.as_object() {
                warn_unknown_keys(map, &["source", "target"], context);
                let Some(source) = map.get("source").and_then(|v| v.as_str()) else {
                    warn!("{context} stanza entry missing 'source', skipping: {entry:?}");
                    continue;
                };
                let target = map
                    .get("target")
                    .and_then(|v| v.as_str())
                    .unwrap_or(source);
                parsed.push(MovedArtifact::new(source, target));
            } else {
                warn!("Invalid {context} stanza entry, skipping: {entry:?}");
            }
        }
        parsed
    }

    pub fn describe(&self, kind_word: &str) -> String {
        if self.source == self.target {
            format!("{kind_word} '{}'", self.target)
        } else {
            format!("{kind_word} '{}' -> '{}'", self.source, self.target)
        }
    }

    pub fn install(
        &self,
        _cask: &Cask,
        stage_path: &Path,
        config: &Config,
        opts: &PhaseOptions,
    ) -> Result<()> {
        let src = stage_path.join(&self.source);
        if !src.exists() {
            return Err(StaveError::SourceMissing(src));
        }

        let dest_dir = config.applications_dir();
        fs::create_dir_all(&dest_dir)?;
        let dest = dest_dir.join(&self.target);

        if dest.exists() || dest.symlink_metadata().is_ok() {
            debug!("Removing existing bundle at {}", dest.display());
            if !helpers::remove_filesystem_artifact(&dest, Some(opts.helper)) {
                return Err(StaveError::PermissionDenied {
                    path: dest,
                    operation: "remove existing bundle at".to_string(),
                });
            }
        }

        debug!("Moving '{}' -> '{}'", src.display(), dest.display());
        if let Err(rename_err) = fs::rename(&src, &dest) {
            // Cross-device moves and permission quirks fall back to a copy.
            debug!("Direct rename failed ({rename_err}), trying cp -R...");
            let output = Command::new("cp")
                .arg("-R")
                .arg(&src)
                .arg(&dest)
                .output()
                .map_err(|e| StaveError::CommandExecError(format!("Failed to execute cp: {e}")))?;
            if !output.status.success() {
                return Err(StaveError::InstallError(format!(
                    "Failed to copy '{}' to '{}': {}",
                    src.display(),
                    dest.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }

        if config.is_system_location(&dest) {
            self.fix_world_permissions(&dest, opts)?;
        }

        debug!("Successfully installed bundle: {}", self.target);
        Ok(())
    }

    /// Bundles installed into a shared location must be usable by all users:
    /// read bits everywhere, execute bits on directories and on files that
    /// were already owner-executable.
    fn fix_world_permissions(&self, root: &Path, opts: &PhaseOptions) -> Result<()> {
        for entry in walkdir::WalkDir::new(root) {
            let entry = entry.map_err(|e| {
                StaveError::Generic(format!("Failed to walk {}: {e}", root.display()))
            })?;
            let metadata = entry.metadata().map_err(|e| {
                StaveError::Generic(format!("Failed to stat {}: {e}", entry.path().display()))
            })?;

            let mode = metadata.permissions().mode();
            let mut desired = mode | 0o444;
            if metadata.is_dir() || mode & 0o100 != 0 {
                desired |= 0o111;
            }
            if desired & 0o7777 == mode & 0o7777 {
                continue;
            }

            let path = entry.path();
            if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(desired)) {
                if e.kind() != std::io::ErrorKind::PermissionDenied {
                    return Err(e.into());
                }
                debug!(
                    "chmod of {} failed (Permission Denied), escalating",
                    path.display()
                );
                let out = opts.helper.run(&PrivilegeRequest {
                    operation: PrivilegedOp::Chmod {
                        mode: format!("{:o}", desired & 0o7777),
                        path: path.to_path_buf(),
                    },
                    sudo: true,
                })?;
                if !out.success {
                    return Err(StaveError::PermissionDenied {
                        path: path.to_path_buf(),
                        operation: "chmod".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn uninstall(&self, _cask: &Cask, config: &Config, opts: &PhaseOptions) -> Result<()> {
        let dest = config.applications_dir().join(&self.target);
        if !dest.exists() && dest.symlink_metadata().is_err() {
            debug!(
                "Bundle {} not present, nothing to uninstall",
                dest.display()
            );
            return Ok(());
        }
        if !helpers::remove_filesystem_artifact(&dest, Some(opts.helper)) {
            return Err(StaveError::PermissionDenied {
                path: dest,
                operation: "remove bundle at".to_string(),
            });
        }
        Ok(())
    }
}
