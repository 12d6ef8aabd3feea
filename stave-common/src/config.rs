// stave-common/src/config.rs
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use tracing::debug;

use super::error::{Result, StaveError};

// Fallback if STAVE_ROOT is not set or is empty.
const DEFAULT_FALLBACK_STAVE_ROOT: &str = "/opt/stave";

/// Filesystem layout used by the artifact engine.
///
/// `stave_root` anchors everything the engine owns (Caskroom, bin, man);
/// `cellar_dir()` is the *formula* install root, used only to recognize
/// files owned by the formula side of the package manager during conflict
/// detection.
#[derive(Debug, Clone)]
pub struct Config {
    pub stave_root: PathBuf, // Public for direct construction in tests/init
    pub home_dir: PathBuf,
    /// Target-directory overrides (`appdir`, `bindir`, `mandir`).
    pub appdir: Option<PathBuf>,
    pub bindir: Option<PathBuf>,
    pub mandir: Option<PathBuf>,
    /// Overrides the user supplied explicitly (as opposed to defaulted),
    /// kept for audit output by the surrounding system.
    pub explicit: HashMap<String, String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading stave configuration");

        let stave_root_str = env::var("STAVE_ROOT")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                debug!(
                    "STAVE_ROOT environment variable not set or empty, falling back to default: {}",
                    DEFAULT_FALLBACK_STAVE_ROOT
                );
                DEFAULT_FALLBACK_STAVE_ROOT.to_string()
            });

        let stave_root = PathBuf::from(&stave_root_str);
        debug!("Effective STAVE_ROOT set to: {}", stave_root.display());

        let home_dir = UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| {
                StaveError::Config("Could not determine user home directory".to_string())
            })?;

        let mut explicit = HashMap::new();
        let appdir = env::var("STAVE_APPDIR").ok().filter(|s| !s.is_empty());
        if let Some(dir) = &appdir {
            explicit.insert("appdir".to_string(), dir.clone());
        }
        let bindir = env::var("STAVE_BINDIR").ok().filter(|s| !s.is_empty());
        if let Some(dir) = &bindir {
            explicit.insert("bindir".to_string(), dir.clone());
        }
        let mandir = env::var("STAVE_MANDIR").ok().filter(|s| !s.is_empty());
        if let Some(dir) = &mandir {
            explicit.insert("mandir".to_string(), dir.clone());
        }

        Ok(Self {
            stave_root,
            home_dir,
            appdir: appdir.map(PathBuf::from),
            bindir: bindir.map(PathBuf::from),
            mandir: mandir.map(PathBuf::from),
            explicit,
        })
    }

    pub fn stave_root(&self) -> &Path {
        &self.stave_root
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.bindir
            .clone()
            .unwrap_or_else(|| self.stave_root.join("bin"))
    }

    pub fn man_base_dir(&self) -> PathBuf {
        self.mandir
            .clone()
            .unwrap_or_else(|| self.stave_root.join("share").join("man"))
    }

    pub fn applications_dir(&self) -> PathBuf {
        if let Some(dir) = &self.appdir {
            return dir.clone();
        }
        if cfg!(target_os = "macos") {
            PathBuf::from("/Applications")
        } else {
            self.home_dir.join("Applications")
        }
    }

    /// The formula-side install root. Anything whose real path resolves in
    /// here is owned by the formula engine, not by a cask.
    pub fn cellar_dir(&self) -> PathBuf {
        self.stave_root.join("Cellar")
    }

    pub fn cask_room_dir(&self) -> PathBuf {
        self.stave_root.join("Caskroom")
    }

    pub fn cask_room_token_path(&self, cask_token: &str) -> PathBuf {
        self.cask_room_dir().join(cask_token)
    }

    pub fn cask_version_path(&self, cask_token: &str, version_str: &str) -> PathBuf {
        self.cask_room_token_path(cask_token).join(version_str)
    }

    /// Whether `path` sits in a tree shared by all users of the machine,
    /// which decides if moved bundles get a world-readable permission sweep.
    pub fn is_system_location(&self, path: &Path) -> bool {
        !path.starts_with(&self.home_dir)
    }
}
