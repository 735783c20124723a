use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, warn};

use crate::TranscodeError;
use crate::job::{Failure, Job};

/// Result of one encoder invocation that ran to completion or was cut off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStatus {
    Completed,
    Failed(Failure),
}

/// Something that turns a job's input into its output.
#[async_trait::async_trait]
pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;

    /// Fail fast if the encoder cannot run at all.
    fn ensure_available(&self) -> Result<(), TranscodeError> {
        Ok(())
    }

    /// Encode `job.input` into `job.output`.
    ///
    /// A non-zero exit is reported as `EncodeStatus::Failed`, not as an error;
    /// errors are reserved for conditions that should stop the batch.
    async fn encode(&self, job: &Job) -> Result<EncodeStatus, TranscodeError>;
}

/// Runs the `ffmpeg` binary once per job.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    path: PathBuf,
    codec: String,
    timeout: Option<Duration>,
}

impl FfmpegEncoder {
    pub fn new(path: impl Into<PathBuf>, codec: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            codec: codec.into(),
            timeout: None,
        }
    }

    /// Kill the encoder and fail the job if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments for converting `input` to `output`. Never overwrites.
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-n".into()];
        args.extend(["-i".into(), input.as_os_str().to_owned()]);
        args.extend(["-acodec".into(), OsString::from(&self.codec)]);
        args.push(output.as_os_str().to_owned());
        args
    }
}

#[async_trait::async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn ensure_available(&self) -> Result<(), TranscodeError> {
        which::which(&self.path)
            .map(|_| ())
            .map_err(|_| TranscodeError::EncoderNotFound(self.path.clone()))
    }

    async fn encode(&self, job: &Job) -> Result<EncodeStatus, TranscodeError> {
        let log_file = std::fs::File::create(&job.log_path)?;
        let args = self.build_args(&job.input, &job.output);

        let mut child = tokio::process::Command::new(&self.path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log_file))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::EncoderNotFound(self.path.clone())
                } else {
                    TranscodeError::Spawn {
                        input: job.input.clone(),
                        source: e,
                    }
                }
            })?;

        debug!(job = job.index, input = %job.input.display(), "encoder started");

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(
                        job = job.index,
                        input = %job.input.display(),
                        timeout_secs = limit.as_secs(),
                        "encoder exceeded deadline, killing"
                    );
                    if let Err(e) = child.kill().await {
                        warn!(job = job.index, error = %e, "failed to kill encoder");
                    }
                    return Ok(EncodeStatus::Failed(Failure::TimedOut(limit)));
                }
            },
            None => child.wait().await?,
        };

        if status.success() {
            Ok(EncodeStatus::Completed)
        } else {
            Ok(EncodeStatus::Failed(Failure::Exit(status.code())))
        }
    }
}

/// Last `max_lines` lines of an encoder log, for diagnostics.
pub fn log_tail(path: &Path, max_lines: usize) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    let start = lines.len().saturating_sub(max_lines);
    Some(lines[start..].join("\n"))
}
