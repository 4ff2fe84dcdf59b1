//! External transcode step.
//!
//! The step is a containerized process invoked with
//! `(source_url, destination_url, video_id)`. Success requires the
//! exact success token on stdout and an empty stderr; any stderr
//! content is failure text regardless of exit code. Execution is
//! bounded by a hard wall-clock deadline with forced termination.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use vpipe_models::{TranscodeMessage, VideoId};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Seam for the external transcode step.
#[async_trait]
pub trait TranscodeStep: Send + Sync {
    /// Run the step to completion or failure.
    async fn run(&self, message: &TranscodeMessage) -> WorkerResult<()>;

    /// Best-effort release of external resources tied to the job.
    /// Failures are logged, never propagated.
    async fn release(&self, video_id: &VideoId);
}

/// Docker-backed transcode step.
pub struct DockerTranscoder {
    image: String,
    timeout: Duration,
    success_token: String,
}

impl DockerTranscoder {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            image: config.transcoder_image.clone(),
            timeout: config.processing_timeout,
            success_token: config.success_token.clone(),
        }
    }

    fn container_name(video_id: &VideoId) -> String {
        format!("vpipe-transcode-{}", video_id)
    }
}

#[async_trait]
impl TranscodeStep for DockerTranscoder {
    async fn run(&self, message: &TranscodeMessage) -> WorkerResult<()> {
        let mut cmd = Command::new("docker");
        cmd.args([
            "run",
            "--name",
            &Self::container_name(&message.video_id),
            &self.image,
            &message.source_url,
            &message.destination_url,
            message.video_id.as_str(),
        ]);

        run_step(cmd, self.timeout, &self.success_token).await
    }

    async fn release(&self, video_id: &VideoId) {
        let name = Self::container_name(video_id);
        match Command::new("docker").args(["rm", "-f", &name]).output().await {
            Ok(output) if output.status.success() => {
                debug!("Removed container {}", name);
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("Failed to remove container {}: {}", name, stderr.trim());
            }
            Err(e) => {
                warn!("Failed to remove container {}: {}", name, e);
            }
        }
    }
}

/// Run a command under a hard deadline and apply the success-token
/// protocol to its output.
pub(crate) async fn run_step(
    mut cmd: Command,
    timeout: Duration,
    success_token: &str,
) -> WorkerResult<()> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    debug!("Running transcode step: {:?}", cmd);

    let mut child = cmd.spawn()?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    // Drain pipes concurrently so the child never blocks on a full pipe
    let stdout_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf).await;
        }
        buf
    });

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            // Hard deadline: forcibly terminate the external process
            child.kill().await.ok();
            return Err(WorkerError::StepTimeout(timeout.as_secs()));
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    // Any diagnostic output is failure text, whatever the exit code
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return Err(WorkerError::step_failed(
            stderr.trim_start_matches("ERROR: ").to_string(),
        ));
    }

    // A nonzero exit is failure even when stdout carries the token
    if !status.success() {
        return Err(WorkerError::step_failed(format!(
            "Process failed with exit code {}",
            status.code().map_or_else(|| "unknown".to_string(), |c| c.to_string())
        )));
    }

    if stdout.trim() == success_token {
        Ok(())
    } else {
        Err(WorkerError::step_failed(
            "Process completed without success confirmation",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn test_success_token_accepted() {
        let result = run_step(sh("echo SUCCESS"), Duration::from_secs(5), "SUCCESS").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_output_without_token_fails() {
        let err = run_step(sh("echo done"), Duration::from_secs(5), "SUCCESS")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("without success confirmation"));
    }

    #[tokio::test]
    async fn test_stderr_is_failure_despite_token() {
        let err = run_step(
            sh("echo 'ERROR: broken input' >&2; echo SUCCESS"),
            Duration::from_secs(5),
            "SUCCESS",
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "broken input");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reported() {
        let err = run_step(sh("exit 3"), Duration::from_secs(5), "SUCCESS")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_rejected_despite_token() {
        let err = run_step(sh("echo SUCCESS; exit 3"), Duration::from_secs(5), "SUCCESS")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let start = Instant::now();
        let err = run_step(sh("sleep 30"), Duration::from_millis(200), "SUCCESS")
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out"));
        // Observable within timeout plus a small epsilon
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_custom_success_token() {
        let result = run_step(sh("echo DONE"), Duration::from_secs(5), "DONE").await;
        assert!(result.is_ok());
    }
}
