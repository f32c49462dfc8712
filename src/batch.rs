//
// batch.rs
// Image-Tools-rs
//
// Owns the batch worker pool: submits one job per image found by the walker and waits, with a bound, for them to finish.
//

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam::channel::{self, RecvTimeoutError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::config::BatchConfig;
use crate::engine::ImageTransformEngine;
use crate::error::{BatchError, ProcessError};
use crate::models::{BatchReport, FileOutcome};
use crate::operation::OperationRequest;
use crate::walker::{DirectoryWalker, ImageFileCandidate};

type JobResult = (PathBuf, Result<FileOutcome, ProcessError>);

/// Runs one operation over a directory tree on a fixed-size pool.
///
/// The pool is created by [`BatchDispatcher::new`] and torn down when [`BatchDispatcher::run`]
/// returns. Jobs share nothing mutable; each one reports back over a channel.
pub struct BatchDispatcher {
    pool: ThreadPool,
    workers: usize,
    engine: Arc<ImageTransformEngine>,
    token: CancellationToken,
    completion_timeout: Duration,
}

impl BatchDispatcher {
    pub fn new(
        operation: OperationRequest,
        config: &BatchConfig,
        token: CancellationToken,
    ) -> Result<Self, BatchError> {
        let workers = config.batch_workers();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("batch-{i}"))
            // A panicking job only loses its own file.
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("job panicked: {message}");
            })
            .build()?;

        Ok(Self {
            pool,
            workers,
            engine: Arc::new(ImageTransformEngine::new(operation, config, token.clone())),
            token,
            completion_timeout: config.completion_timeout,
        })
    }

    /// Walk `root`, submit a job per image, and wait for the submitted jobs.
    ///
    /// Submission stops as soon as cancellation is observed. Jobs already submitted still
    /// run; they skip themselves if they start after cancellation. When the wait exceeds
    /// the completion timeout, jobs that have not started yet are turned into no-ops and the
    /// stragglers are reported as abandoned.
    pub fn run(self, root: &Path, recursive: bool) -> BatchReport {
        let candidates = DirectoryWalker::new(root, recursive, self.token.clone());
        self.dispatch(root, recursive, candidates)
    }

    fn dispatch<I>(self, root: &Path, recursive: bool, candidates: I) -> BatchReport
    where
        I: IntoIterator<Item = ImageFileCandidate>,
    {
        let mut report = BatchReport::new(self.engine.operation().to_string(), root, self.workers);
        info!(
            "Processing {} | operation: {} | recursive: {} | workers: {}",
            root.display(),
            self.engine.operation(),
            recursive,
            self.workers
        );

        let abort = Arc::new(AtomicBool::new(false));
        let (result_tx, result_rx) = channel::unbounded::<JobResult>();

        for candidate in candidates {
            let engine = Arc::clone(&self.engine);
            let abort = Arc::clone(&abort);
            let result_tx = result_tx.clone();
            self.pool.spawn(move || {
                let outcome = if abort.load(Ordering::Acquire) {
                    Ok(FileOutcome::Skipped)
                } else {
                    engine.process(&candidate)
                };
                let _ = result_tx.send((candidate.into_path(), outcome));
            });
            report.submitted += 1;
        }
        drop(result_tx);
        debug!("submitted {} job(s)", report.submitted);

        // An unrepresentable deadline means waiting without a bound.
        let deadline = Instant::now().checked_add(self.completion_timeout);
        while report.completed() < report.submitted {
            let received = match deadline {
                Some(deadline) => result_rx.recv_deadline(deadline),
                None => result_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((path, outcome)) => record(&mut report, path, outcome),
                Err(RecvTimeoutError::Timeout) => {
                    abort.store(true, Ordering::Release);
                    report.timed_out = true;
                    report.abandoned = report.submitted - report.completed();
                    warn!(
                        "completion wait of {:?} expired, abandoning {} job(s)",
                        self.completion_timeout, report.abandoned
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Every sender is gone, so the missing jobs panicked before reporting.
                    let lost = report.submitted - report.completed();
                    report.failed += lost;
                    error!("{lost} job(s) ended without reporting a result");
                    break;
                }
            }
        }

        report.cancelled = self.token.is_cancelled();
        if report.cancelled {
            warn!("run cancelled after {} submitted job(s)", report.submitted);
        }
        report.finished_at = Some(Utc::now());
        info!(
            "Done: {} processed, {} skipped, {} failed, {} abandoned",
            report.processed, report.skipped, report.failed, report.abandoned
        );
        // Dropping the pool does not wait for jobs still running.
        report
    }
}

fn record(report: &mut BatchReport, path: PathBuf, outcome: Result<FileOutcome, ProcessError>) {
    match outcome {
        Ok(FileOutcome::Processed) => {
            report.processed += 1;
            debug!("Processed {}", path.display());
        }
        Ok(FileOutcome::Skipped) => report.skipped += 1,
        Err(e) => {
            error!("Error in {}: {e}", path.display());
            report.record_failure(path, e.to_string());
        }
    }
}
