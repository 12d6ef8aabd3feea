// stave-core/src/artifact/symlinked.rs
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::Command;

use lazy_static::lazy_static;
use regex::Regex;
use stave_common::config::Config;
use stave_common::error::{Result, StaveError};
use stave_common::model::cask::{Cask, RawStanza};
use tracing::{debug, info, warn};

use super::{helpers, normalize_entries, warn_unknown_keys, PhaseOptions};
use crate::privilege::{PrivilegeRequest, PrivilegedOp};

lazy_static! {
    // Section number or letter at the end of a man page filename.
    static ref MANPAGE_SECTION_RE: Regex = Regex::new(r"\.([1-8nl])(?:\.gz)?$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkKind {
    Binary,
    Manpage { section: String },
}

/// A lightweight artifact installed by symlink and removed by unlink
/// (`binary` and `manpage` stanzas).
#[derive(Debug, Clone, PartialEq)]
pub struct SymlinkedArtifact {
    /// Path of the link source, relative to the staging area.
    pub source: String,
    /// File name of the link inside the target directory.
    pub target_name: String,
    /// Optional mode applied to the created link (`binary` map form).
    pub chmod: Option<String>,
    pub kind: LinkKind,
}

impl SymlinkedArtifact {
    pub fn binary(source: &str, target_name: &str, chmod: Option<String>) -> Self {
        Self {
            source: source.to_string(),
            target_name: target_name.to_string(),
            chmod,
            kind: LinkKind::Binary,
        }
    }

    /// Parse a `binary` stanza value. Entries are either a path inside the
    /// stage (`"bin/foo"`, linked as `foo`) or a map with `source`, an
    /// optional `target` name, and an optional `chmod` mode.
    pub fn parse_binaries(value: &RawStanza) -> Vec<SymlinkedArtifact> {
        let mut parsed = Vec::new();
        for entry in normalize_entries(value) {
            if let Some(source) = entry.as_str() {
                let Some(target_name) = file_name_of(source) else {
                    warn!("Binary source '{source}' has no file name, skipping");
                    continue;
                };
                parsed.push(SymlinkedArtifact::binary(source, &target_name, None));
            } else if let Some(map) = entry.as_object() {
                warn_unknown_keys(map, &["source", "target", "chmod"], "binary");
                let Some(source) = map.get("source").and_then(|v| v.as_str()) else {
                    warn!("Binary stanza entry missing 'source', skipping: {entry:?}");
                    continue;
                };
                let target_name = match map.get("target").and_then(|v| v.as_str()) {
                    Some(t) => t.to_string(),
                    None => match file_name_of(source) {
                        Some(t) => t,
                        None => {
                            warn!("Binary source '{source}' has no file name, skipping");
                            continue;
                        }
                    },
                };
                let chmod = map.get("chmod").and_then(|v| v.as_str()).map(String::from);
                parsed.push(SymlinkedArtifact::binary(source, &target_name, chmod));
            } else {
                warn!("Invalid binary stanza entry, skipping: {entry:?}");
            }
        }
        parsed
    }

    /// Parse a `manpage` stanza value. Entries are filenames whose section
    /// directory is derived from the trailing `.1`..`.8`/`.n`/`.l` suffix; a
    /// name that does not look like a man page is skipped with a warning.
    pub fn parse_manpages(value: &RawStanza) -> Vec<SymlinkedArtifact> {
        let mut parsed = Vec::new();
        for entry in normalize_entries(value) {
            let Some(source) = entry.as_str() else {
                warn!("Invalid manpage stanza entry, skipping: {entry:?}");
                continue;
            };
            let Some(caps) = MANPAGE_SECTION_RE.captures(source) else {
                warn!("Filename '{source}' does not look like a manpage, skipping");
                continue;
            };
            let section = caps.get(1).map(|m| m.as_str().to_string()).unwrap();
            let Some(target_name) = file_name_of(source) else {
                warn!("Manpage source '{source}' has no file name, skipping");
                continue;
            };
            parsed.push(SymlinkedArtifact {
                source: source.to_string(),
                target_name,
                chmod: None,
                kind: LinkKind::Manpage { section },
            });
        }
        parsed
    }

    pub fn describe(&self, kind_word: &str) -> String {
        format!("{kind_word} '{}'", self.target_name)
    }

    fn target_dir(&self, config: &Config) -> PathBuf {
        match &self.kind {
            LinkKind::Binary => config.bin_dir(),
            LinkKind::Manpage { section } => config.man_base_dir().join(format!("man{section}")),
        }
    }

    pub fn install(
        &self,
        cask: &Cask,
        stage_path: &Path,
        config: &Config,
        opts: &PhaseOptions,
    ) -> Result<()> {
        let src = stage_path.join(&self.source);
        if !src.exists() {
            return Err(StaveError::SourceMissing(src));
        }

        let target_dir = self.target_dir(config);
        fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(&self.target_name);

        if target.symlink_metadata().is_ok() {
            let is_symlink = target
                .symlink_metadata()
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);

            if (opts.force || opts.adopt)
                && is_symlink
                && self.is_self_owned(&target, &src, cask, config)
            {
                debug!("Adopting stale link at {}", target.display());
                if !helpers::remove_filesystem_artifact(&target, Some(opts.helper)) {
                    return Err(StaveError::PermissionDenied {
                        path: target,
                        operation: "remove stale link at".to_string(),
                    });
                }
            } else if resolves_into_formula_root(&target, config) {
                info!(
                    "'{}' belongs to a formula install; skipping link for cask {}",
                    target.display(),
                    cask.token
                );
                return Ok(());
            } else {
                return Err(StaveError::TargetExists(target));
            }
        }

        debug!("Linking '{}' -> '{}'", src.display(), target.display());
        create_link(&src, &target, opts)?;

        if let Some(mode) = self.chmod.as_deref() {
            let _ = Command::new("chmod").arg(mode).arg(&target).status();
        }

        Ok(())
    }

    pub fn uninstall(&self, cask: &Cask, config: &Config, opts: &PhaseOptions) -> Result<()> {
        let target = self.target_dir(config).join(&self.target_name);

        let metadata = match target.symlink_metadata() {
            Ok(m) => m,
            Err(_) => {
                debug!("Link {} not present, nothing to do", target.display());
                return Ok(());
            }
        };
        if !metadata.file_type().is_symlink() {
            debug!(
                "'{}' is not a symlink; leaving it alone",
                target.display()
            );
            return Ok(());
        }
        if resolves_into_formula_root(&target, config) {
            info!(
                "'{}' belongs to a formula install; skipping unlink for cask {}",
                target.display(),
                cask.token
            );
            return Ok(());
        }

        debug!("Unlinking {}", target.display());
        match fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                let out = opts.helper.run(&PrivilegeRequest {
                    operation: PrivilegedOp::RemovePath {
                        path: target.clone(),
                    },
                    sudo: true,
                })?;
                if out.success {
                    Ok(())
                } else {
                    Err(StaveError::PermissionDenied {
                        path: target,
                        operation: "remove link at".to_string(),
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A pre-existing link is adoptable when it points back at this cask:
    /// either at the staged source itself or anywhere under the cask's own
    /// Caskroom directory. `read_link` is checked first so stale links left
    /// behind by a previous version (whose destination no longer exists) are
    /// still recognized as ours.
    fn is_self_owned(&self, target: &Path, src: &Path, cask: &Cask, config: &Config) -> bool {
        let own_root = config.cask_room_token_path(&cask.token);
        if let Ok(link_dest) = fs::read_link(target) {
            if link_dest == *src || link_dest.starts_with(&own_root) {
                return true;
            }
        }
        match (fs::canonicalize(target), fs::canonicalize(src)) {
            (Ok(real_target), Ok(real_src)) if real_target == real_src => true,
            (Ok(real_target), _) => {
                let own_real = fs::canonicalize(&own_root).unwrap_or(own_root);
                real_target.starts_with(own_real)
            }
            _ => false,
        }
    }
}

fn file_name_of(source: &str) -> Option<String> {
    Path::new(source)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
}

/// Whether the target's real path resolves into the formula-side install
/// root, meaning some formula owns the file and the engine must not touch
/// it. Any error while resolving (broken link, permission problem) counts as
/// "no conflict detected" so it cannot block a legitimate install.
fn resolves_into_formula_root(target: &Path, config: &Config) -> bool {
    match fs::canonicalize(target) {
        Ok(real) => {
            let cellar = config.cellar_dir();
            let cellar_real = fs::canonicalize(&cellar).unwrap_or(cellar);
            real.starts_with(cellar_real)
        }
        Err(e) => {
            debug!(
                "Could not resolve real path of {} ({e}); treating as no conflict",
                target.display()
            );
            false
        }
    }
}

fn create_link(src: &Path, target: &Path, opts: &PhaseOptions) -> Result<()> {
    match symlink(src, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            debug!(
                "Direct symlink failed (Permission Denied), escalating: {} -> {}",
                target.display(),
                src.display()
            );
            let out = opts.helper.run(&PrivilegeRequest {
                operation: PrivilegedOp::CreateSymlink {
                    source: src.to_path_buf(),
                    target: target.to_path_buf(),
                },
                sudo: true,
            })?;
            if out.success {
                Ok(())
            } else {
                Err(StaveError::PermissionDenied {
                    path: target.to_path_buf(),
                    operation: "create link at".to_string(),
                })
            }
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn binary_string_entry_links_under_its_basename() {
        let parsed = SymlinkedArtifact::parse_binaries(&json!(["bin/foo"]));
        assert_eq!(
            parsed,
            vec![SymlinkedArtifact::binary("bin/foo", "foo", None)]
        );
    }

    #[test]
    fn binary_map_entry_honors_target_and_chmod() {
        let parsed = SymlinkedArtifact::parse_binaries(&json!([
            {"source": "helpers/foo-cli", "target": "foo", "chmod": "0755"}
        ]));
        assert_eq!(
            parsed,
            vec![SymlinkedArtifact::binary(
                "helpers/foo-cli",
                "foo",
                Some("0755".to_string())
            )]
        );
    }

    #[test]
    fn manpage_section_comes_from_the_filename() {
        let parsed = SymlinkedArtifact::parse_manpages(&json!(["man/foo.1", "doc/bar.5.gz"]));
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[0].kind,
            LinkKind::Manpage {
                section: "1".to_string()
            }
        );
        assert_eq!(
            parsed[1].kind,
            LinkKind::Manpage {
                section: "5".to_string()
            }
        );
        assert_eq!(parsed[1].target_name, "bar.5.gz");
    }

    #[test]
    fn non_manpage_filenames_are_skipped() {
        assert!(SymlinkedArtifact::parse_manpages(&json!(["README.md"])).is_empty());
    }
}
