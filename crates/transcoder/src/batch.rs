use std::path::PathBuf;
use std::sync::Arc;

use flacport_core::JobState;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::TranscodeError;
use crate::encoder::{EncodeStatus, Encoder, log_tail};
use crate::job::{Job, JobOutcome};

/// Lines of encoder output echoed for each failed job.
const FAILURE_LOG_LINES: usize = 5;

/// Progress notifications, delivered from the collecting task in completion order.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    Started { total: usize },
    Finished { job: &'a Job, outcome: JobOutcome },
}

/// What happened to a batch, in submission order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub submitted: usize,
    pub skipped: usize,
    pub succeeded: usize,
    /// Inputs of failed jobs, in submission order.
    pub failed: Vec<PathBuf>,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Run every job with at most `workers` encoder invocations in flight.
///
/// A job whose output already exists is skipped without touching the
/// encoder. Encoder failures are recorded and the batch carries on. A
/// `TranscodeError` stops any job not yet dispatched; jobs already running
/// are allowed to finish, then the first error is returned.
pub async fn run_batch<F>(
    jobs: Vec<Job>,
    encoder: Arc<dyn Encoder>,
    workers: usize,
    mut on_progress: F,
) -> Result<BatchSummary, TranscodeError>
where
    F: FnMut(ProgressEvent<'_>),
{
    let total = jobs.len();
    let workers = workers.max(1);
    info!(jobs = total, workers, encoder = encoder.name(), "batch started");
    on_progress(ProgressEvent::Started { total });

    let semaphore = Arc::new(Semaphore::new(workers));
    let jobs: Vec<Arc<Job>> = jobs.into_iter().map(Arc::new).collect();
    let mut tasks = JoinSet::new();

    for (slot, job) in jobs.iter().enumerate() {
        tasks.spawn(dispatch(
            slot,
            Arc::clone(job),
            Arc::clone(&encoder),
            Arc::clone(&semaphore),
        ));
    }

    // One slot per job; each task owns exactly one.
    let mut outcomes: Vec<Option<JobOutcome>> = vec![None; total];
    let mut fatal: Option<TranscodeError> = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined
            .map_err(|e| TranscodeError::TaskPanicked(e.to_string()))
            .and_then(|r| r);
        match result {
            Ok((slot, Some(outcome))) => {
                debug_assert!(outcome.state().is_terminal());
                debug!(job = slot, state = %outcome.state(), "job finished");
                on_progress(ProgressEvent::Finished {
                    job: &jobs[slot],
                    outcome,
                });
                outcomes[slot] = Some(outcome);
            }
            Ok((_, None)) => {}
            Err(e) => {
                semaphore.close();
                if fatal.is_none() {
                    warn!(error = %e, "batch aborting, waiting for running jobs");
                    fatal = Some(e);
                }
            }
        }
    }
    if let Some(e) = fatal {
        return Err(e);
    }

    let mut summary = BatchSummary {
        submitted: total,
        ..Default::default()
    };
    for (job, outcome) in jobs.iter().zip(outcomes) {
        match outcome {
            Some(JobOutcome::Skipped) => summary.skipped += 1,
            Some(JobOutcome::Succeeded) => summary.succeeded += 1,
            Some(JobOutcome::Failed(_)) => summary.failed.push(job.input.clone()),
            None => {
                return Err(TranscodeError::TaskPanicked(format!(
                    "job {} never reported an outcome",
                    job.index
                )));
            }
        }
    }

    info!(
        submitted = summary.submitted,
        skipped = summary.skipped,
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        "batch finished"
    );
    Ok(summary)
}

/// Wait for a worker slot, then run `job`. `None` means the batch was
/// aborting and the job was never dispatched.
async fn dispatch(
    slot: usize,
    job: Arc<Job>,
    encoder: Arc<dyn Encoder>,
    semaphore: Arc<Semaphore>,
) -> Result<(usize, Option<JobOutcome>), TranscodeError> {
    let Ok(_permit) = Arc::clone(&semaphore).acquire_owned().await else {
        return Ok((slot, None));
    };
    match process_job(&job, encoder.as_ref()).await {
        Ok(outcome) => Ok((slot, Some(outcome))),
        Err(e) => {
            // Close before the permit is released so no queued job starts.
            semaphore.close();
            Err(e)
        }
    }
}

async fn process_job(job: &Job, encoder: &dyn Encoder) -> Result<JobOutcome, TranscodeError> {
    let mut state = JobState::Discovered;
    if job.output_exists() {
        advance(job, &mut state, JobState::Skipped);
        debug!(job = job.index, output = %job.output.display(), "output exists, skipping");
        return Ok(JobOutcome::Skipped);
    }
    advance(job, &mut state, JobState::Dispatched);
    debug!(job = job.index, input = %job.input.display(), "encoding");

    let status = match encoder.encode(job).await {
        Ok(status) => status,
        Err(e) => {
            discard_partial_output(job);
            return Err(e);
        }
    };

    match status {
        EncodeStatus::Completed => {
            advance(job, &mut state, JobState::Succeeded);
            debug!(job = job.index, output = %job.output.display(), "converted");
            Ok(JobOutcome::Succeeded)
        }
        EncodeStatus::Failed(failure) => {
            advance(job, &mut state, JobState::Failed);
            discard_partial_output(job);
            let detail = log_tail(&job.log_path, FAILURE_LOG_LINES).unwrap_or_default();
            warn!(
                job = job.index,
                input = %job.input.display(),
                reason = %failure,
                encoder_output = %detail,
                "conversion failed"
            );
            Ok(JobOutcome::Failed(failure))
        }
    }
}

fn advance(job: &Job, state: &mut JobState, next: JobState) {
    debug_assert!(
        state.can_transition_to(next),
        "job {}: illegal transition {state} -> {next}",
        job.index
    );
    *state = next;
}

/// A failed encode must not leave a file behind, or the next run would skip it.
fn discard_partial_output(job: &Job) {
    match std::fs::remove_file(&job.output) {
        Ok(()) => debug!(job = job.index, output = %job.output.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            job = job.index,
            output = %job.output.display(),
            error = %e,
            "failed to remove partial output"
        ),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::job::{Failure, build_jobs};
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Writes the output unless the input name contains "corrupt".
    #[derive(Default)]
    pub(crate) struct FakeEncoder {
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub seen: Mutex<Vec<PathBuf>>,
        pub delay: Duration,
    }

    #[async_trait::async_trait]
    impl Encoder for FakeEncoder {
        fn name(&self) -> &str {
            "fake"
        }

        async fn encode(&self, job: &Job) -> Result<EncodeStatus, TranscodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.seen.lock().unwrap().push(job.input.clone());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let name = job.input.file_name().unwrap().to_string_lossy().into_owned();
            let status = if name.contains("corrupt") {
                // Leave a partial file, as a real encoder might.
                std::fs::write(&job.output, b"partial")?;
                EncodeStatus::Failed(Failure::Exit(Some(1)))
            } else {
                std::fs::write(&job.output, b"alac")?;
                EncodeStatus::Completed
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(status)
        }
    }

    fn jobs_for(input: &Path, output: &Path, names: &[&str]) -> Vec<Job> {
        let inputs = names
            .iter()
            .map(|n| {
                let p = input.join(n);
                std::fs::create_dir_all(p.parent().unwrap()).unwrap();
                std::fs::write(&p, b"fLaC").unwrap();
                p
            })
            .collect();
        build_jobs(inputs, input, output, "m4a", output).unwrap()
    }

    #[tokio::test]
    async fn failures_are_recorded_and_batch_continues() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let jobs = jobs_for(input.path(), output.path(), &["a.flac", "b-corrupt.flac", "c.flac"]);
        let encoder = Arc::new(FakeEncoder::default());

        let summary = run_batch(jobs, encoder.clone(), 2, |_| {}).await.unwrap();

        assert_eq!(summary.submitted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, vec![input.path().join("b-corrupt.flac")]);
        assert!(output.path().join("a.m4a").exists());
        assert!(output.path().join("c.m4a").exists());
        assert!(!output.path().join("b-corrupt.m4a").exists());
    }

    #[tokio::test]
    async fn existing_outputs_are_never_encoded() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let jobs = jobs_for(input.path(), output.path(), &["a.flac", "b.flac"]);
        std::fs::write(output.path().join("a.m4a"), b"old").unwrap();
        let encoder = Arc::new(FakeEncoder::default());

        let summary = run_batch(jobs, encoder.clone(), 4, |_| {}).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*encoder.seen.lock().unwrap(), vec![input.path().join("b.flac")]);
        // Stale outputs are left alone.
        assert_eq!(std::fs::read(output.path().join("a.m4a")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn second_run_makes_no_encoder_calls() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let names = ["x.flac", "y/z.flac", "y/w/v.flac"];

        let first = Arc::new(FakeEncoder::default());
        let jobs = jobs_for(input.path(), output.path(), &names);
        let summary = run_batch(jobs, first.clone(), 2, |_| {}).await.unwrap();
        assert_eq!(summary.succeeded, 3);

        let second = Arc::new(FakeEncoder::default());
        let jobs = jobs_for(input.path(), output.path(), &names);
        let summary = run_batch(jobs, second.clone(), 2, |_| {}).await.unwrap();
        assert_eq!(summary.skipped, 3);
        assert!(!summary.has_failures());
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_inputs_keep_submission_order() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..12).map(|i| format!("{i:02}-corrupt.flac")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let jobs = jobs_for(input.path(), output.path(), &names);
        let expected: Vec<PathBuf> = jobs.iter().map(|j| j.input.clone()).collect();
        let encoder = Arc::new(FakeEncoder::default());

        let summary = run_batch(jobs, encoder, 4, |_| {}).await.unwrap();
        assert_eq!(summary.failed, expected);
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_workers() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..10).map(|i| format!("{i}.flac")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let jobs = jobs_for(input.path(), output.path(), &names);
        let encoder = Arc::new(FakeEncoder {
            delay: Duration::from_millis(20),
            ..Default::default()
        });

        run_batch(jobs, encoder.clone(), 3, |_| {}).await.unwrap();
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 10);
        assert!(encoder.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn progress_reports_every_job() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let jobs = jobs_for(input.path(), output.path(), &["a.flac", "b-corrupt.flac"]);
        std::fs::write(output.path().join("a.m4a"), b"done").unwrap();

        let mut started = None;
        let mut finished = Vec::new();
        run_batch(jobs, Arc::new(FakeEncoder::default()), 2, |event| match event {
            ProgressEvent::Started { total } => started = Some(total),
            ProgressEvent::Finished { job, outcome } => finished.push((job.index, outcome)),
        })
        .await
        .unwrap();

        finished.sort_by_key(|(i, _)| *i);
        assert_eq!(started, Some(2));
        assert_eq!(finished, vec![
            (0, JobOutcome::Skipped),
            (1, JobOutcome::Failed(Failure::Exit(Some(1)))),
        ]);
    }

    #[tokio::test]
    async fn empty_batch_finishes_immediately() {
        let encoder = Arc::new(FakeEncoder::default());
        let summary = run_batch(Vec::new(), encoder.clone(), 2, |_| {}).await.unwrap();
        assert_eq!(summary, BatchSummary::default());
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    }

    struct BrokenEncoder;

    #[async_trait::async_trait]
    impl Encoder for BrokenEncoder {
        fn name(&self) -> &str {
            "broken"
        }

        async fn encode(&self, _job: &Job) -> Result<EncodeStatus, TranscodeError> {
            Err(TranscodeError::EncoderNotFound(PathBuf::from("ffmpeg")))
        }
    }

    /// Writes a partial output and stalls; inputs named `*fatal*` error out
    /// quickly instead.
    #[derive(Default)]
    struct StallingEncoder {
        seen: Mutex<Vec<PathBuf>>,
    }

    #[async_trait::async_trait]
    impl Encoder for StallingEncoder {
        fn name(&self) -> &str {
            "stalling"
        }

        async fn encode(&self, job: &Job) -> Result<EncodeStatus, TranscodeError> {
            self.seen.lock().unwrap().push(job.input.clone());
            let name = job.input.file_name().unwrap().to_string_lossy().into_owned();
            if name.contains("fatal") {
                tokio::time::sleep(Duration::from_millis(20)).await;
                return Err(TranscodeError::EncoderNotFound(PathBuf::from("ffmpeg")));
            }

            std::fs::write(&job.output, b"partial")?;
            tokio::time::sleep(Duration::from_millis(200)).await;
            if name.contains("corrupt") {
                Ok(EncodeStatus::Failed(Failure::Exit(Some(1))))
            } else {
                std::fs::write(&job.output, b"alac")?;
                Ok(EncodeStatus::Completed)
            }
        }
    }

    #[tokio::test]
    async fn abort_leaves_no_partial_outputs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let jobs = jobs_for(
            input.path(),
            output.path(),
            &["a-corrupt.flac", "b-fatal.flac", "c.flac"],
        );
        let encoder = Arc::new(StallingEncoder::default());

        let err = run_batch(jobs, encoder.clone(), 2, |_| {}).await.unwrap_err();

        assert!(matches!(err, TranscodeError::EncoderNotFound(_)));
        assert!(!output.path().join("a-corrupt.m4a").exists());
        assert!(!output.path().join("b-fatal.m4a").exists());
        assert!(!output.path().join("c.m4a").exists());
        assert!(!encoder.seen.lock().unwrap().contains(&input.path().join("c.flac")));
    }

    #[tokio::test]
    async fn running_jobs_finish_after_abort() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let jobs = jobs_for(input.path(), output.path(), &["a.flac", "b-fatal.flac"]);

        let mut finished = Vec::new();
        let err = run_batch(jobs, Arc::new(StallingEncoder::default()), 2, |event| {
            if let ProgressEvent::Finished { job, outcome } = event {
                finished.push((job.index, outcome));
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, TranscodeError::EncoderNotFound(_)));
        assert_eq!(finished, vec![(0, JobOutcome::Succeeded)]);
        assert_eq!(std::fs::read(output.path().join("a.m4a")).unwrap(), b"alac");
    }

    #[tokio::test]
    async fn fatal_encoder_error_aborts_batch() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let jobs = jobs_for(input.path(), output.path(), &["a.flac", "b.flac"]);

        let err = run_batch(jobs, Arc::new(BrokenEncoder), 1, |_| {}).await.unwrap_err();
        assert!(matches!(err, TranscodeError::EncoderNotFound(_)));
    }
}
