use std::path::{Path, PathBuf};
use std::time::Duration;

use flacport_core::JobState;
use flacport_core::paths::mirror_path;

use crate::TranscodeError;

/// One source file and where its conversion goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Position in submission order.
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Encoder stderr for this job.
    pub log_path: PathBuf,
}

impl Job {
    pub fn output_exists(&self) -> bool {
        self.output.exists()
    }
}

/// Why a dispatched job did not produce an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Encoder exited unsuccessfully; `None` when killed by a signal.
    Exit(Option<i32>),
    TimedOut(Duration),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exit(Some(code)) => write!(f, "encoder exited with status {code}"),
            Self::Exit(None) => f.write_str("encoder terminated by signal"),
            Self::TimedOut(d) => write!(f, "encoder timed out after {}s", d.as_secs()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Skipped,
    Succeeded,
    Failed(Failure),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            Self::Skipped => JobState::Skipped,
            Self::Succeeded => JobState::Succeeded,
            Self::Failed(_) => JobState::Failed,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Build one job per input, mirroring each under `output_root` with
/// `target_extension`, and create every output's parent directory.
pub fn build_jobs(
    inputs: Vec<PathBuf>,
    input_root: &Path,
    output_root: &Path,
    target_extension: &str,
    log_dir: &Path,
) -> Result<Vec<Job>, TranscodeError> {
    let mut jobs = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.into_iter().enumerate() {
        let output = mirror_path(input_root, &input, output_root, target_extension)
            .ok_or_else(|| TranscodeError::OutsideInputRoot(input.clone()))?;

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TranscodeError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        jobs.push(Job {
            index,
            log_path: log_dir.join(format!("job-{index:06}.log")),
            input,
            output,
        });
    }

    Ok(jobs)
}
