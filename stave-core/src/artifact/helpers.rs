// stave-core/src/artifact/helpers.rs
use std::path::{Component, Path, PathBuf};
use std::{fs, io};

use stave_common::config::Config;
use tracing::{debug, error, warn};

use crate::privilege::{PrivilegeHelper, PrivilegeRequest, PrivilegedOp};

/// Removes a filesystem artifact (file, directory, or symlink).
///
/// Attempts direct removal. If a helper is supplied and direct removal fails
/// with a permission error, retries once through the helper with `sudo`.
///
/// Returns `true` if the artifact is successfully removed or was already
/// gone, `false` otherwise.
pub(crate) fn remove_filesystem_artifact(
    path: &Path,
    helper: Option<&dyn PrivilegeHelper>,
) -> bool {
    match path.symlink_metadata() {
        Ok(metadata) => {
            let file_type = metadata.file_type();
            // A symlink to a directory must go through remove_file, never
            // remove_dir_all.
            let is_real_dir = file_type.is_dir();

            debug!(
                "Removing filesystem artifact ({}) at: {}",
                if is_real_dir {
                    "directory"
                } else if file_type.is_symlink() {
                    "symlink"
                } else {
                    "file"
                },
                path.display()
            );

            let remove_op = || -> io::Result<()> {
                if is_real_dir {
                    fs::remove_dir_all(path)
                } else {
                    fs::remove_file(path)
                }
            };

            if let Err(e) = remove_op() {
                if e.kind() == io::ErrorKind::NotFound {
                    debug!("Artifact {} already removed.", path.display());
                    return true;
                }
                if e.kind() == io::ErrorKind::PermissionDenied {
                    if let Some(helper) = helper {
                        warn!(
                            "Direct removal failed (Permission Denied). Escalating removal of: {}",
                            path.display()
                        );
                        match helper.run(&PrivilegeRequest {
                            operation: PrivilegedOp::RemovePath {
                                path: path.to_path_buf(),
                            },
                            sudo: true,
                        }) {
                            Ok(out) if out.success => {
                                debug!("Successfully removed {} via helper.", path.display());
                                return true;
                            }
                            Ok(out) => {
                                error!(
                                    "Failed to remove {} via helper: {}",
                                    path.display(),
                                    out.stderr.trim()
                                );
                                return false;
                            }
                            Err(helper_err) => {
                                error!(
                                    "Error invoking privilege helper for {}: {}",
                                    path.display(),
                                    helper_err
                                );
                                return false;
                            }
                        }
                    }
                }
                error!("Failed to remove artifact {}: {}", path.display(), e);
                false
            } else {
                debug!("Successfully removed artifact: {}", path.display());
                true
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Artifact not found (already removed?): {}", path.display());
            true
        }
        Err(e) => {
            warn!(
                "Failed to get metadata for artifact {}: {}",
                path.display(),
                e
            );
            false
        }
    }
}

/// Expands a path string that may start with `~` to the user's home directory.
pub(crate) fn expand_tilde(path_str: &str, home: &Path) -> PathBuf {
    if let Some(stripped) = path_str.strip_prefix("~/") {
        home.join(stripped)
    } else {
        PathBuf::from(path_str)
    }
}

/// Checks whether a path is safe for destructive cleanup directives.
/// Safe paths live in user Library/.config, the applications directory,
/// /Library, or the engine's own Caskroom. Root, home, /Applications and
/// /Library themselves are never safe.
pub(crate) fn is_safe_path(path: &Path, home: &Path, config: &Config) -> bool {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        warn!("Cleanup path rejected (contains '..'): {}", path.display());
        return false;
    }

    let applications_dir = config.applications_dir();
    if path == Path::new("/")
        || path == home
        || path == Path::new("/Applications")
        || path == Path::new("/Library")
        || path == applications_dir
    {
        warn!("Cleanup path rejected (too broad): {}", path.display());
        return false;
    }

    let allowed_roots = [
        home.join("Library"),
        home.join(".config"),
        PathBuf::from("/Applications"),
        PathBuf::from("/Library"),
        applications_dir,
        config.cask_room_dir(),
    ];

    if allowed_roots.iter().any(|root| path.starts_with(root)) {
        return true;
    }

    warn!(
        "Cleanup path rejected (outside allowed areas): {}",
        path.display()
    );
    false
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn test_config(root: &Path, home: &Path) -> Config {
        Config {
            stave_root: root.to_path_buf(),
            home_dir: home.to_path_buf(),
            appdir: None,
            bindir: None,
            mandir: None,
            explicit: HashMap::new(),
        }
    }

    #[test]
    fn expand_tilde_rewrites_home_relative_paths() {
        let home = Path::new("/home/u");
        assert_eq!(
            expand_tilde("~/Library/Caches/foo", home),
            PathBuf::from("/home/u/Library/Caches/foo")
        );
        assert_eq!(expand_tilde("/tmp/foo", home), PathBuf::from("/tmp/foo"));
    }

    #[test]
    fn broad_roots_are_never_safe() {
        let home = Path::new("/home/u");
        let config = test_config(Path::new("/opt/stave"), home);
        assert!(!is_safe_path(Path::new("/"), home, &config));
        assert!(!is_safe_path(home, home, &config));
        assert!(!is_safe_path(Path::new("/Applications"), home, &config));
        assert!(!is_safe_path(Path::new("/Library"), home, &config));
    }

    #[test]
    fn library_subpaths_are_safe_but_traversal_is_not() {
        let home = Path::new("/home/u");
        let config = test_config(Path::new("/opt/stave"), home);
        assert!(is_safe_path(
            Path::new("/home/u/Library/Caches/com.foo"),
            home,
            &config
        ));
        assert!(is_safe_path(
            Path::new("/Applications/Foo.app"),
            home,
            &config
        ));
        assert!(!is_safe_path(
            Path::new("/home/u/Library/../../etc"),
            home,
            &config
        ));
        assert!(!is_safe_path(Path::new("/etc/passwd"), home, &config));
    }

    #[test]
    fn removing_a_missing_path_counts_as_success() {
        assert!(remove_filesystem_artifact(
            Path::new("/nonexistent/definitely/not/here"),
            None
        ));
    }
}
