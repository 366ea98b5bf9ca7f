//! Local executor processes speaking newline-delimited JSON over stdio.

use super::error::{Result, TransportError};
use super::lines::{LineReader, LineWriter};
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// A spawned executor and the line transport attached to its stdio.
pub struct ExecutorProcess {
    pub reader: LineReader<ChildStdout>,
    pub writer: LineWriter<ChildStdin>,
    /// Killed when dropped.
    pub child: Child,
}

/// Spawn `command` with piped stdin/stdout; stderr is inherited.
pub fn spawn_executor(
    command: &str,
    args: &[String],
    working_dir: Option<&Path>,
) -> Result<ExecutorProcess> {
    debug!("Spawning executor: {} {:?}", command, args);

    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    // Linux: request kernel to send SIGTERM to child when parent dies.
    // This catches cases where Drop doesn't run (SIGKILL, OOM kill).
    #[cfg(target_os = "linux")]
    unsafe {
        cmd.pre_exec(|| {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
            Ok(())
        });
    }

    let spawn_error = |source: std::io::Error| TransportError::Spawn {
        command: command.to_string(),
        source,
    };

    let mut child = cmd.spawn().map_err(spawn_error)?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| spawn_error(std::io::Error::other("Failed to capture stdin")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| spawn_error(std::io::Error::other("Failed to capture stdout")))?;

    Ok(ExecutorProcess {
        reader: LineReader::new(stdout),
        writer: LineWriter::new(stdin),
        child,
    })
}
