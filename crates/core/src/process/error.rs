//! Error types for external process execution.

use thiserror::Error;

/// Errors that can occur while running an external command.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The binary could not be found on disk or in `PATH`.
    #[error("command not found: {program}")]
    NotFound { program: String },

    /// The process ran but exited unsuccessfully.
    #[error("{program} failed with exit code {}: {stderr}", display_code(.code))]
    Failed {
        program: String,
        /// Exit code, `None` when the process was terminated by a signal.
        code: Option<i32>,
        stderr: String,
    },

    /// The watchdog killed the process.
    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: String, timeout_secs: u64 },

    /// The process produced output that could not be interpreted.
    #[error("unexpected output from {program}: {output:?}")]
    UnexpectedOutput { program: String, output: String },

    /// Spawning or waiting on the process failed.
    #[error("I/O error running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (killed by signal)".to_string())
}

impl ProcessError {
    /// Exit code carried by a [`ProcessError::Failed`] error.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => *code,
            _ => None,
        }
    }

    pub(crate) fn unexpected_output(program: impl Into<String>, output: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            program: program.into(),
            output: output.into(),
        }
    }
}
