//! Vendor CLI invocation.
//!
//! The directory, workspace, database, and ERP systems are reached through
//! their own admin CLIs (`ldapsearch`/`ldapmodify`, `gam`, `sqlcmd`,
//! `sqlplus`). This module owns the one place a subprocess is spawned;
//! adapters describe commands and interpret output, tests substitute a
//! scripted runner.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{AcctlError, Result};

#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Seam between adapters and the operating system. The production
/// implementation spawns the vendor binary; tests inject scripted outputs.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CmdOutput>;
}

/// Spawns real vendor CLIs found on PATH.
pub struct VendorCli;

impl CommandRunner for VendorCli {
    fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<CmdOutput> {
        // Resolve up front so a missing admin tool fails the run immediately
        // instead of surfacing as a per-account error mid-batch.
        let binary =
            which::which(program).map_err(|_| AcctlError::CliMissing(program.to_string()))?;

        let mut cmd = Command::new(binary);
        cmd.args(args);
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| AcctlError::CliFailed {
            command: program.to_string(),
            detail: e.to_string(),
        })?;

        if let Some(input) = stdin {
            if let Some(handle) = child.stdin.as_mut() {
                handle
                    .write_all(input.as_bytes())
                    .map_err(|e| AcctlError::CliFailed {
                        command: program.to_string(),
                        detail: format!("failed to write stdin: {e}"),
                    })?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| AcctlError::CliFailed {
                command: program.to_string(),
                detail: e.to_string(),
            })?;

        Ok(CmdOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
