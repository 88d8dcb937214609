//! Runs an external command and captures its standard output.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::error::ProcessError;

/// Maximum number of stderr bytes kept in a [`ProcessError::Failed`].
const STDERR_TAIL_BYTES: usize = 1024;

/// Runs `program` with `args`, returning its standard output on exit code 0.
///
/// The child is killed if it runs longer than `limit`. Stdin is closed and
/// stderr is captured only to enrich the error on failure.
pub async fn run_command<S: AsRef<str>>(
    program: &Path,
    args: &[S],
    limit: Duration,
) -> Result<String, ProcessError> {
    let name = program.display().to_string();
    debug!(
        "Running {} {}",
        name,
        args.iter().map(|a| a.as_ref()).collect::<Vec<_>>().join(" ")
    );

    let child = Command::new(program)
        .args(args.iter().map(|a| a.as_ref()))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::NotFound {
                    program: name.clone(),
                }
            } else {
                ProcessError::Io {
                    program: name.clone(),
                    source: e,
                }
            }
        })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| ProcessError::Io {
            program: name.clone(),
            source: e,
        })?,
        Err(_) => {
            return Err(ProcessError::Timeout {
                program: name,
                timeout_secs: limit.as_secs(),
            })
        }
    };

    if !output.status.success() {
        return Err(ProcessError::Failed {
            program: name,
            code: output.status.code(),
            stderr: stderr_tail(&output.stderr),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
