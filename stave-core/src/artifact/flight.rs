// stave-core/src/artifact/flight.rs
use std::path::Path;

use stave_common::config::Config;
use stave_common::error::{Result, StaveError};
use stave_common::model::cask::{Cask, FlightContext, FlightHookDef, FlightPoint};
use tracing::debug;

/// Author-supplied hook code bound to flight points. One block carries the
/// two "pre" points (as the Preflight artifact) or the two "post" points (as
/// Postflight); points with no registered hook are no-ops.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightBlock {
    hooks: Vec<FlightHookDef>,
}

impl FlightBlock {
    pub fn new(hooks: Vec<FlightHookDef>) -> Self {
        Self { hooks }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Points with at least one registered hook, in registration order.
    pub fn points(&self) -> Vec<FlightPoint> {
        let mut points = Vec::new();
        for def in &self.hooks {
            if !points.contains(&def.point) {
                points.push(def.point);
            }
        }
        points
    }

    pub fn describe(&self, kind_word: &str) -> String {
        let points: Vec<String> = self.points().iter().map(|p| p.to_string()).collect();
        format!("{kind_word} hooks [{}]", points.join(", "))
    }

    /// Run every hook registered for `point`, in registration order. The
    /// hooks are trusted code; the engine only guarantees invocation timing
    /// and that a raised error surfaces as `HookFailed` tagged with the
    /// point.
    pub fn run_point(
        &self,
        point: FlightPoint,
        cask: &Cask,
        stage_path: &Path,
        config: &Config,
    ) -> Result<()> {
        for def in self.hooks.iter().filter(|d| d.point == point) {
            debug!("Running {point} hook for cask {}", cask.token);
            let ctx = FlightContext {
                token: &cask.token,
                staged_path: stage_path,
                config,
            };
            (def.hook)(&ctx).map_err(|e| StaveError::HookFailed {
                point,
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}
