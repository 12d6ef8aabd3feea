// stave-core/src/privilege.rs
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use stave_common::error::{Result, StaveError};
use tracing::debug;

/// A single privileged filesystem operation. Each request is independent and
/// stateless; artifacts issue as many as they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegedOp {
    Chmod { mode: String, path: PathBuf },
    CreateSymlink { source: PathBuf, target: PathBuf },
    RemovePath { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeRequest {
    pub operation: PrivilegedOp,
    pub sudo: bool,
}

/// Outcome of a helper invocation: exit success plus captured output.
#[derive(Debug, Clone, Default)]
pub struct PrivilegeOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// The escalation boundary artifacts call back into whenever an operation
/// needs rights the current process lacks.
pub trait PrivilegeHelper {
    fn run(&self, request: &PrivilegeRequest) -> Result<PrivilegeOutput>;
}

impl PrivilegedOp {
    fn command_line(&self) -> (&'static str, Vec<OsString>) {
        match self {
            PrivilegedOp::Chmod { mode, path } => {
                ("chmod", vec![mode.clone().into(), path.clone().into()])
            }
            PrivilegedOp::CreateSymlink { source, target } => (
                "ln",
                vec![
                    OsString::from("-sf"),
                    source.clone().into(),
                    target.clone().into(),
                ],
            ),
            PrivilegedOp::RemovePath { path } => {
                ("rm", vec![OsString::from("-rf"), path.clone().into()])
            }
        }
    }
}

/// Default helper: shells out, prefixing `sudo` when the request asks for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessPrivilegeHelper;

impl PrivilegeHelper for ProcessPrivilegeHelper {
    fn run(&self, request: &PrivilegeRequest) -> Result<PrivilegeOutput> {
        let (program, args) = request.operation.command_line();
        debug!(
            "Privilege helper executing: {}{} {:?}",
            if request.sudo { "sudo " } else { "" },
            program,
            args
        );

        let mut cmd = if request.sudo {
            let mut c = Command::new("sudo");
            c.arg(program);
            c
        } else {
            Command::new(program)
        };
        cmd.args(&args);

        let output = cmd.output().map_err(|e| {
            StaveError::CommandExecError(format!("Failed to execute {program}: {e}"))
        })?;

        let result = PrivilegeOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        if !result.success {
            debug!(
                "Privilege helper command {} failed ({}): {}",
                program,
                output.status,
                result.stderr.trim()
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chmod_request_builds_expected_command_line() {
        let op = PrivilegedOp::Chmod {
            mode: "0755".to_string(),
            path: PathBuf::from("/Applications/Foo.app"),
        };
        let (program, args) = op.command_line();
        assert_eq!(program, "chmod");
        assert_eq!(args[0], OsString::from("0755"));
    }

    #[test]
    fn remove_request_is_recursive_and_forced() {
        let op = PrivilegedOp::RemovePath {
            path: PathBuf::from("/tmp/x"),
        };
        let (program, args) = op.command_line();
        assert_eq!(program, "rm");
        assert_eq!(args[0], OsString::from("-rf"));
    }
}
