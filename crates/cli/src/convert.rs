use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use flacport_core::ConvertConfig;
use flacport_transcoder::{Converter, ProgressEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::cli::ConvertArgs;

/// Exit status when the batch ran but some files failed to convert.
const EXIT_PARTIAL_FAILURE: u8 = 2;

pub async fn run(args: ConvertArgs, mut config: ConvertConfig) -> anyhow::Result<ExitCode> {
    args.apply(&mut config);
    config.validate().context("invalid convert settings")?;

    let converter = Converter::new(config);

    let progress = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));

    let bar = progress.clone();
    let result = converter
        .run(&args.input_dir, &args.output_dir, move |event| match event {
            ProgressEvent::Started { total } => bar.set_length(total as u64),
            ProgressEvent::Finished { job, .. } => {
                if let Some(name) = job.input.file_name() {
                    bar.set_message(name.to_string_lossy().into_owned());
                }
                bar.inc(1);
            }
        })
        .await
        .with_context(|| {
            format!(
                "failed to convert '{}' into '{}'",
                args.input_dir.display(),
                args.output_dir.display()
            )
        });

    progress.finish_and_clear();
    let run = result?;

    let summary = &run.summary;
    println!(
        "Conversion completed: {} converted, {} already present, {} failed.",
        summary.succeeded,
        summary.skipped,
        summary.failed.len()
    );
    println!("Failure report: {}", run.report_path.display());

    if summary.has_failures() {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
