//! External tool invocation
//!
//! Every call to `wg` or `qrencode` goes through [`run`]: stdout and stderr are
//! captured, an optional payload is written to stdin, and a nonzero exit turns
//! into [`Error::ExternalTool`] carrying the tool's stderr.

use crate::{Error, Result};
use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Run a program to completion and return its trimmed stdout
pub async fn run(program: &str, args: &[&str], input: Option<&str>) -> Result<String> {
    let command_line = describe(program, args);
    debug!("Running: {}", command_line);

    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::ExternalTool {
            command: command_line.clone(),
            status: None,
            stderr: e.to_string(),
        })?;

    // Feed stdin alongside the wait so a tool that exits early is judged by
    // its exit status, not by the write that hit a closed pipe
    let stdin = child.stdin.take();
    let feed = async move {
        if let (Some(data), Some(mut stdin)) = (input, stdin) {
            match stdin.write_all(data.as_bytes()).await {
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
            // Dropping stdin closes the pipe so the tool sees EOF
        }
        Ok(())
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;

    if !output.status.success() {
        return Err(Error::ExternalTool {
            command: command_line,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    fed?;

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Human-readable command line for logs and errors
pub fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
