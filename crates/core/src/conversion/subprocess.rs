//! Subprocess execution with captured output.
//!
//! [`run_command`] spawns a prepared [`Command`], drains stdout and stderr
//! concurrently so a chatty child never blocks on a full pipe, and waits for
//! it to exit. No timeout is applied; a conversion runs until the tool exits.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best diagnostic text for a failed run: stderr, else stdout.
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Spawn `cmd`, capture its output and wait for it to exit.
///
/// Errors are returned only when the process could not be spawned or waited
/// on. A non-zero exit is a successful call with `exit_code != 0`.
pub async fn run_command(cmd: &mut Command) -> std::io::Result<ToolOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let status = child.wait().await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_code: status.code().unwrap_or(-1),
        duration_ms,
    })
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
///
/// Output past the cap is read and discarded so the child never sees a
/// closed pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let mut limited = h.take(MAX_OUTPUT_BYTES);
        let _ = limited.read_to_end(&mut buf).await;
        let mut rest = limited.into_inner();
        let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello; echo oops >&2; exit 3"]);

        let output = run_command(&mut cmd).await.expect("spawn");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.diagnostics(), "oops");
    }

    #[tokio::test]
    async fn diagnostics_fall_back_to_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo only-stdout; exit 1"]);

        let output = run_command(&mut cmd).await.expect("spawn");
        assert_eq!(output.diagnostics(), "only-stdout");
    }

    #[tokio::test]
    async fn output_past_cap_is_drained_not_closed() {
        let mut cmd = Command::new("sh");
        cmd.args([
            "-c",
            &format!("head -c {} /dev/zero", MAX_OUTPUT_BYTES + 1024 * 1024),
        ]);

        let output = run_command(&mut cmd).await.expect("spawn");
        assert_eq!(output.exit_code, 0, "writer must not hit a closed pipe");
        assert_eq!(output.stdout.len() as u64, MAX_OUTPUT_BYTES);
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let mut cmd = Command::new("/nonexistent/program");
        let err = run_command(&mut cmd).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
