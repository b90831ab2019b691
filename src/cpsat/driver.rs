//! C3: drives the sibling `fuelsched-solver` binary as an opaque child
//! process, honouring cooperative stop and streaming progress frames
//! (spec.md §4.3, §5).

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

use crate::cpsat::types::{OutputFrame, ProgressReport, SolverInput, SolverOutput, StopMessage};
use crate::error::CoreError;

pub struct SolverDriver {
    binary_path: PathBuf,
}

impl SolverDriver {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Runs the child to completion. `stop` is watched for a cooperative-stop
    /// request; `on_progress` is invoked for every progress frame observed.
    pub async fn run(
        &self,
        input: &SolverInput,
        mut stop: watch::Receiver<bool>,
        mut on_progress: impl FnMut(ProgressReport) + Send,
    ) -> Result<SolverOutput, CoreError> {
        let mut child = Command::new(&self.binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::TransientIo(format!("spawning solver: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .expect("solver spawned with piped stdin");
        let stdout = child
            .stdout
            .take()
            .expect("solver spawned with piped stdout");
        let mut lines = BufReader::new(stdout).lines();

        let mut payload = serde_json::to_vec(input)?;
        payload.push(b'\n');
        stdin.write_all(&payload).await?;

        let result = loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_ok() && *stop.borrow() {
                        tracing::debug!("forwarding cooperative stop to solver child");
                        let mut stop_msg = serde_json::to_vec(&StopMessage { stop: true })?;
                        stop_msg.push(b'\n');
                        let _ = stdin.write_all(&stop_msg).await;
                    }
                }
                line = lines.next_line() => {
                    match line? {
                        Some(text) if text.trim().is_empty() => continue,
                        Some(text) => match serde_json::from_str::<OutputFrame>(&text)? {
                            OutputFrame::Progress { progress } => on_progress(progress),
                            OutputFrame::Result { result } => break Ok(result),
                        },
                        None => {
                            break Err(CoreError::TransientIo(
                                "solver closed stdout without a result frame".to_string(),
                            ));
                        }
                    }
                }
            }
        };

        let status = child.wait().await?;
        if !status.success() && result.is_ok() {
            tracing::warn!(code = ?status.code(), "solver exited non-zero after emitting a result");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_holds_configured_binary_path() {
        let driver = SolverDriver::new("fuelsched-solver");
        assert_eq!(driver.binary_path, PathBuf::from("fuelsched-solver"));
    }
}
