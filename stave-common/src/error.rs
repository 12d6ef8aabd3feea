use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::model::cask::FlightPoint;

#[derive(Error, Debug, Clone)]
pub enum StaveError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Source artifact missing: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("Permission denied while trying to {operation} {}", .path.display())]
    PermissionDenied { path: PathBuf, operation: String },

    #[error("{point} hook failed: {message}")]
    HookFailed { point: FlightPoint, message: String },

    #[error("Directive '{directive}' failed: {message}")]
    DirectiveFailed { directive: String, message: String },

    #[error("Installation Error: {0}")]
    InstallError(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for StaveError {
    fn from(err: std::io::Error) -> Self {
        StaveError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for StaveError {
    fn from(err: serde_json::Error) -> Self {
        StaveError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_missing_display_includes_path() {
        let err = StaveError::SourceMissing(PathBuf::from("/stage/Foo.app"));
        assert!(err.to_string().contains("/stage/Foo.app"));
    }

    #[test]
    fn hook_failed_display_names_the_point() {
        let err = StaveError::HookFailed {
            point: FlightPoint::PostUninstall,
            message: "script exited with 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("post-uninstall"));
        assert!(msg.contains("script exited with 1"));
    }

    #[test]
    fn permission_denied_display_includes_operation_and_path() {
        let err = StaveError::PermissionDenied {
            path: PathBuf::from("/Applications/Foo.app"),
            operation: "chmod".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("chmod"));
        assert!(msg.contains("/Applications/Foo.app"));
    }
}
