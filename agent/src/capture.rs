use async_trait::async_trait;
use chrono::Utc;
use frame_courier_common::frame::CapturedFrame;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::AgentError;

/// Placeholder written by the stub source: JPEG SOI marker, ASCII filler, EOI marker.
const STUB_FRAME: &[u8] = b"\xFF\xD8dummy frame data\xFF\xD9";

/// Token in a capture command replaced by the frame path.
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Produces one frame per call at a fixed transient path.
///
/// Each capture replaces whatever the previous one left at that path.
#[async_trait]
pub trait FrameSource: Send {
    async fn capture(&mut self) -> Result<CapturedFrame, AgentError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Writes a fixed placeholder image. Used when no camera is attached.
pub struct StubFrameSource {
    path: PathBuf,
    seq: u64,
}

impl StubFrameSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path, seq: 0 }
    }
}

#[async_trait]
impl FrameSource for StubFrameSource {
    async fn capture(&mut self) -> Result<CapturedFrame, AgentError> {
        tokio::fs::write(&self.path, STUB_FRAME)
            .await
            .map_err(AgentError::CaptureIo)?;
        let seq = self.seq;
        self.seq += 1;
        Ok(CapturedFrame::new(&self.path, Utc::now().timestamp_millis(), seq))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Runs an external still-capture program (e.g. `libcamera-still`) that
/// writes its image to the frame path.
pub struct CommandFrameSource {
    path: PathBuf,
    program: String,
    args: Vec<String>,
    timeout: Duration,
    seq: u64,
}

impl CommandFrameSource {
    /// `command[0]` is the program; `{output}` in any argument becomes `path`.
    pub fn new(path: PathBuf, command: &[String], timeout: Duration) -> Result<Self, AgentError> {
        let (program, rest) = command.split_first().ok_or(AgentError::CaptureCommandEmpty)?;
        let output = path.to_string_lossy();
        let args = rest
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output))
            .collect();
        Ok(Self {
            path,
            program: program.clone(),
            args,
            timeout,
            seq: 0,
        })
    }

    async fn remove_stale(&self) -> Result<(), AgentError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed stale frame");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AgentError::CaptureIo(e)),
        }
    }
}

#[async_trait]
impl FrameSource for CommandFrameSource {
    async fn capture(&mut self) -> Result<CapturedFrame, AgentError> {
        self.remove_stale().await?;

        let run = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| AgentError::CaptureTimeout(self.timeout))?
            .map_err(|e| AgentError::CaptureSpawn(self.program.clone(), e))?;

        if !output.status.success() {
            return Err(AgentError::CaptureExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let size = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(AgentError::CaptureIo(e)),
        };
        if size == 0 {
            return Err(AgentError::CaptureEmpty(self.path.display().to_string()));
        }

        let seq = self.seq;
        self.seq += 1;
        debug!(seq, size, program = self.program, "capture command finished");
        Ok(CapturedFrame::new(&self.path, Utc::now().timestamp_millis(), seq))
    }

    fn name(&self) -> &str {
        "command"
    }
}
