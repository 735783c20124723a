//! The batch conversion driver: discover, build jobs, dispatch, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flacport_core::ConvertConfig;
use flacport_scanner::walk::find_by_extension;
use tracing::info;

use crate::TranscodeError;
use crate::batch::{self, BatchSummary, ProgressEvent};
use crate::encoder::{Encoder, FfmpegEncoder};
use crate::job::build_jobs;
use crate::report::write_report;

/// Outcome of a whole conversion run.
#[derive(Debug, Clone)]
pub struct ConversionRun {
    pub summary: BatchSummary,
    pub report_path: PathBuf,
}

pub struct Converter {
    config: ConvertConfig,
    encoder: Arc<dyn Encoder>,
}

impl Converter {
    /// Converter backed by the configured ffmpeg binary.
    pub fn new(config: ConvertConfig) -> Self {
        let encoder = FfmpegEncoder::new(config.encoder.clone(), config.codec.clone())
            .with_timeout(config.job_timeout());
        Self::with_encoder(config, Arc::new(encoder))
    }

    pub fn with_encoder(config: ConvertConfig, encoder: Arc<dyn Encoder>) -> Self {
        Self { config, encoder }
    }

    /// Convert every source file under `input_root` into the mirrored tree
    /// under `output_root`, then write the failure report.
    pub async fn run<F>(
        &self,
        input_root: &Path,
        output_root: &Path,
        on_progress: F,
    ) -> Result<ConversionRun, TranscodeError>
    where
        F: FnMut(ProgressEvent<'_>),
    {
        let inputs = find_by_extension(input_root, &self.config.source_extension)?;
        info!(
            input_root = %input_root.display(),
            output_root = %output_root.display(),
            found = inputs.len(),
            "discovered source files"
        );

        std::fs::create_dir_all(output_root).map_err(|source| TranscodeError::CreateDir {
            path: output_root.to_path_buf(),
            source,
        })?;

        // Per-job encoder logs; removed when this goes out of scope.
        let scratch = tempfile::Builder::new()
            .prefix("flacport-logs-")
            .tempdir()?;

        let jobs = build_jobs(
            inputs,
            input_root,
            output_root,
            &self.config.target_extension,
            scratch.path(),
        )?;

        if jobs.iter().any(|j| !j.output_exists()) {
            self.encoder.ensure_available()?;
        }

        let summary = batch::run_batch(
            jobs,
            Arc::clone(&self.encoder),
            self.config.worker_count(),
            on_progress,
        )
        .await?;

        write_report(&self.config.report_path, &summary.failed)?;

        Ok(ConversionRun {
            summary,
            report_path: self.config.report_path.clone(),
        })
    }
}
