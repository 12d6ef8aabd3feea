// stave-common/src/model/cask.rs
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;

/// One declared artifact stanza, exactly as the cask-description collaborator
/// hands it over (e.g. `{"app": ["Foo.app"]}` or `{"uninstall": [...]}`).
/// The registry turns these into typed artifacts at cask-load time.
pub type RawStanza = serde_json::Value;

/// Helper to coerce string-or-list argument shapes into `Vec<String>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrVec {
    One(String),
    Many(Vec<String>),
}

impl StringOrVec {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrVec::One(s) => vec![s],
            StringOrVec::Many(v) => v,
        }
    }
}

/// The four points at which author-supplied flight hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlightPoint {
    PreInstall,
    PostInstall,
    PreUninstall,
    PostUninstall,
}

impl fmt::Display for FlightPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightPoint::PreInstall => "pre-install",
            FlightPoint::PostInstall => "post-install",
            FlightPoint::PreUninstall => "pre-uninstall",
            FlightPoint::PostUninstall => "post-uninstall",
        };
        f.write_str(name)
    }
}

/// What a flight hook is allowed to see: cask metadata and the staging area.
/// The hook may do arbitrary filesystem/process work; it cannot reach the
/// artifact list.
pub struct FlightContext<'a> {
    pub token: &'a str,
    pub staged_path: &'a Path,
    pub config: &'a Config,
}

/// Hook code captured at cask-load time. The engine's contract is only about
/// *when* this runs, not what it does internally.
pub type FlightHook = Arc<dyn Fn(&FlightContext<'_>) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct FlightHookDef {
    pub point: FlightPoint,
    pub hook: FlightHook,
}

impl fmt::Debug for FlightHookDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightHookDef")
            .field("point", &self.point)
            .finish_non_exhaustive()
    }
}

impl PartialEq for FlightHookDef {
    fn eq(&self, other: &Self) -> bool {
        self.point == other.point && Arc::ptr_eq(&self.hook, &other.hook)
    }
}

/// The resolved cask description handed to the engine by the DSL/eval
/// collaborator. Immutable for the duration of one operation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Cask {
    pub token: String,

    #[serde(default)]
    pub name: Option<Vec<String>>,
    pub version: Option<String>,
    pub desc: Option<String>,
    pub homepage: Option<String>,

    #[serde(default)]
    pub artifacts: Option<Vec<RawStanza>>,

    /// Flight hooks are closures, registered programmatically at load time.
    #[serde(skip)]
    pub flight_hooks: Vec<FlightHookDef>,
}

impl Cask {
    /// Get a friendly name for display purposes.
    pub fn display_name(&self) -> String {
        self.name
            .as_ref()
            .and_then(|names| names.first().cloned())
            .unwrap_or_else(|| self.token.clone())
    }

    /// Register hook code for one flight point. Called by the cask-DSL
    /// evaluator while building the description.
    pub fn register_flight_hook<F>(&mut self, point: FlightPoint, hook: F)
    where
        F: Fn(&FlightContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.flight_hooks.push(FlightHookDef {
            point,
            hook: Arc::new(hook),
        });
    }
}
