use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::error::ReadError;

/// Output of one battery query. Invocation failures are carried as a value,
/// never raised.
#[derive(Debug)]
pub enum RawStatus {
    /// Trimmed stdout. May be empty when the mouse is off.
    Output(String),
    Failed(ReadError),
}

impl RawStatus {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Output(text) => Some(text),
            Self::Failed(_) => None,
        }
    }
}

/// Anything that can produce a raw battery status.
pub trait StatusSource: Send + Sync {
    fn fetch_status(&self) -> RawStatus;
}

/// Runs the battery query command as a subprocess.
#[derive(Debug, Clone)]
pub struct BatteryReader {
    program: String,
    args: Vec<String>,
}

impl BatteryReader {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for BatteryReader {
    fn default() -> Self {
        Self::new("rivalcfg", vec!["--battery-level".into()])
    }
}

impl StatusSource for BatteryReader {
    fn fetch_status(&self) -> RawStatus {
        let output = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
        {
            Ok(o) => o,
            Err(e) => {
                warn!(program = %self.program, error = %e, "failed to run battery command");
                return RawStatus::Failed(ReadError::Spawn(e));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(program = %self.program, status = %output.status, stdout = %stdout, "battery command finished");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = %output.status, stderr = %stderr, "battery command exited with failure");
            // The exit code does not decide the reading; only empty output does.
            if stdout.is_empty() {
                return RawStatus::Failed(ReadError::Exit {
                    code: output.status.code(),
                    stderr,
                });
            }
        }

        RawStatus::Output(stdout)
    }
}
