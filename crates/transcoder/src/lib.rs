#![allow(clippy::collapsible_if)]
pub mod batch;
pub mod convert;
pub mod encoder;
pub mod job;
pub mod report;

use std::path::PathBuf;
use thiserror::Error;

pub use batch::{BatchSummary, ProgressEvent};
pub use convert::{ConversionRun, Converter};
pub use encoder::{EncodeStatus, Encoder, FfmpegEncoder};
pub use job::{Failure, Job, JobOutcome};

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("encoder not found: {}", .0.display())]
    EncoderNotFound(PathBuf),
    #[error("failed to spawn encoder for {}: {source}", input.display())]
    Spawn {
        input: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write report {}: {source}", path.display())]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not under the input root", .0.display())]
    OutsideInputRoot(PathBuf),
    #[error("worker task failed: {0}")]
    TaskPanicked(String),
    #[error("scan error: {0}")]
    Scan(#[from] flacport_scanner::ScanError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
