//! # Executor Module
//!
//! Esegue un `JobPlan` con concorrenza limitata e semantica fail-fast.
//!
//! ## Flusso di esecuzione:
//! 1. **Validazione**: ogni path del piano deve stare sotto la root di destinazione
//! 2. **Conferma**: con eliminazioni in piano (e senza `assume_yes`) elenca i file
//!    e chiede conferma; `n`/vuoto termina senza modifiche
//! 3. **Eliminazioni**: sequenziali, prima di qualsiasi job di creazione
//! 4. **Pool**: i job di creazione partono in ordine, limitati da un semaforo
//!    dimensionato su `workers`
//!
//! ## Cancellazione:
//! - L'executor possiede un `CancellationToken` di shutdown (`cancel()`)
//! - Ogni run usa un token figlio che il primo job fallito cancella
//!   prima di rilasciare il proprio permesso
//! - Il dispatcher smette di sottomettere job, ogni task ricontrolla il token
//!   prima di partire; i job già in corso finiscono e il loro esito è scartato
//! - Solo il primo fallimento viene riportato
//!
//! ## Esempio:
//! ```rust,ignore
//! let executor = Arc::new(Executor::for_options(options));
//! let handle = executor.cancel_handle();
//! tokio::spawn(async move { tokio::signal::ctrl_c().await.ok(); handle.cancel(); });
//! let report = executor.execute(plan).await?;
//! ```

use crate::config::RunOptions;
use crate::encoder::ExternalEncoder;
use crate::error::MirrorError;
use crate::mirror::backend::{Backend, DryRunBackend, LocalBackend};
use crate::mirror::confirm::{confirm_deletion, Prompt, StdinPrompt};
use crate::mirror::job::{Job, JobPlan};
use crate::mirror::progress_tracker::ProgressTracker;
use crate::progress::RunStats;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The failure that ended a run
#[derive(Debug)]
pub struct JobFailure {
    /// Description of the failing job
    pub job: String,
    pub error: MirrorError,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.job, self.error)
    }
}

/// Final state of a run
#[derive(Debug)]
pub enum RunStatus {
    Completed,
    Cancelled,
    AbortedByUser,
    Failed(JobFailure),
}

impl RunStatus {
    /// Process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Failed(_) => 1,
            RunStatus::AbortedByUser => 2,
            RunStatus::Cancelled => 130,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// Status plus what got done before the run ended
#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    pub stats: RunStats,
}

impl RunReport {
    fn without_changes(status: RunStatus) -> Self {
        Self { status, stats: RunStats::new() }
    }
}

/// Runs job plans
pub struct Executor {
    options: Arc<RunOptions>,
    backend: Arc<dyn Backend>,
    prompt: Mutex<Box<dyn Prompt>>,
    shutdown: CancellationToken,
    show_progress: bool,
}

impl Executor {
    /// Executor using `backend`; dry runs always use [`DryRunBackend`]
    pub fn new(options: RunOptions, backend: Arc<dyn Backend>) -> Self {
        let backend: Arc<dyn Backend> = if options.dry_run {
            Arc::new(DryRunBackend)
        } else {
            backend
        };

        Self {
            options: Arc::new(options),
            backend,
            prompt: Mutex::new(Box::new(StdinPrompt)),
            shutdown: CancellationToken::new(),
            show_progress: false,
        }
    }

    /// Executor encoding with the external tools
    pub fn for_options(options: RunOptions) -> Self {
        Self::new(options, Arc::new(LocalBackend::new(Arc::new(ExternalEncoder::new()))))
    }

    /// Replace the terminal prompt used for the deletion confirmation
    pub fn with_prompt(mut self, prompt: impl Prompt + 'static) -> Self {
        self.prompt = Mutex::new(Box::new(prompt));
        self
    }

    pub fn with_progress(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Request cancellation of the current (or next) run
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.shutdown.cancel();
    }

    /// Token whose cancellation stops the executor; safe to use from any task
    pub fn cancel_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the plan: confirmation, deletions, then the creation pool
    pub async fn execute(&self, plan: JobPlan) -> Result<RunReport, MirrorError> {
        if let Err(error) = plan.validate() {
            error!("Internal invariant violated, refusing to run the plan: {}", error);
            return Ok(RunReport::without_changes(RunStatus::Failed(JobFailure {
                job: "plan validation".to_string(),
                error,
            })));
        }

        if self.shutdown.is_cancelled() {
            return Ok(RunReport::without_changes(RunStatus::Cancelled));
        }

        if plan.is_empty() {
            info!("Nothing to do, destination is up to date");
            return Ok(RunReport::without_changes(RunStatus::Completed));
        }

        if !plan.deletions.is_empty() && !self.options.assume_yes && !self.options.dry_run {
            for job in &plan.deletions {
                println!("Marked for deletion: {}", job.destination().display());
            }

            let mut prompt = self.prompt.lock().await;
            let confirmed = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(RunReport::without_changes(RunStatus::Cancelled));
                }
                answer = confirm_deletion(&mut **prompt) => answer?,
            };

            if !confirmed {
                info!("Aborted by user, nothing was changed");
                return Ok(RunReport::without_changes(RunStatus::AbortedByUser));
            }
        }

        let tracker = ProgressTracker::new(plan.len(), self.show_progress);

        let status = match self.run_deletions(&plan.deletions, &tracker).await {
            Some(status) => status,
            None => self.run_creations(plan.creations, &tracker).await,
        };

        let stats = tracker.get_stats().await;
        if status.is_completed() {
            tracker.finish(&stats.format_summary());
        } else {
            tracker.abandon(&stats.format_summary());
        }
        info!("{}", stats.format_summary());

        Ok(RunReport { status, stats })
    }

    /// Sequential deletions; `Some` when the run must stop here
    async fn run_deletions(&self, jobs: &[Job], tracker: &ProgressTracker) -> Option<RunStatus> {
        for job in jobs {
            if self.shutdown.is_cancelled() {
                warn!("Cancelled before all deletions were done");
                return Some(RunStatus::Cancelled);
            }

            match job.execute(self.backend.as_ref(), &self.options).await {
                Ok(kind) => tracker.record(job, kind).await,
                Err(error) => {
                    log_failure(&job.to_string(), &error);
                    return Some(RunStatus::Failed(JobFailure { job: job.to_string(), error }));
                }
            }
        }
        None
    }

    /// Bounded concurrent execution of encode/copy jobs
    async fn run_creations(&self, jobs: Vec<Job>, tracker: &ProgressTracker) -> RunStatus {
        let run_token = self.shutdown.child_token();
        let first_failure: Arc<Mutex<Option<JobFailure>>> = Arc::new(Mutex::new(None));
        let workers = self.options.effective_workers();
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut in_flight = FuturesUnordered::new();
        let total = jobs.len();

        debug!("Running {} jobs on {} workers", total, workers);

        for job in jobs {
            let permit = tokio::select! {
                biased;
                _ = run_token.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            if run_token.is_cancelled() {
                break;
            }

            let backend = self.backend.clone();
            let options = self.options.clone();
            let token = run_token.clone();
            let failure = first_failure.clone();
            let tracker = tracker.clone();

            in_flight.push(tokio::spawn(async move {
                // Released only after a failure has cancelled the token
                let _permit = permit;
                if token.is_cancelled() {
                    return;
                }

                let outcome = AssertUnwindSafe(job.execute(backend.as_ref(), &options))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(kind)) => {
                        if !token.is_cancelled() {
                            tracker.record(&job, kind).await;
                        }
                    }
                    Ok(Err(error)) => record_failure(&token, &failure, job.to_string(), error).await,
                    Err(panic) => {
                        let error = MirrorError::InvariantViolation(format!(
                            "job panicked: {}",
                            panic_message(panic.as_ref())
                        ));
                        record_failure(&token, &failure, job.to_string(), error).await;
                    }
                }
            }));
        }

        let submitted = in_flight.len();
        if submitted < total {
            info!("{} pending jobs were not started", total - submitted);
        }

        while let Some(joined) = in_flight.next().await {
            if let Err(join_error) = joined {
                let error = MirrorError::InvariantViolation(format!("job task did not complete: {}", join_error));
                record_failure(&run_token, &first_failure, "worker task".to_string(), error).await;
            }
        }

        let failure = first_failure.lock().await.take();
        match failure {
            Some(failure) => RunStatus::Failed(failure),
            None if run_token.is_cancelled() => {
                warn!("Run cancelled, running jobs have finished");
                RunStatus::Cancelled
            }
            None => RunStatus::Completed,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

/// Keep the first failure of a run and cancel it; later failures are only debug-logged
async fn record_failure(
    token: &CancellationToken,
    slot: &Mutex<Option<JobFailure>>,
    job: String,
    error: MirrorError,
) {
    let mut slot = slot.lock().await;
    if slot.is_some() || token.is_cancelled() {
        debug!("Ignoring failure after cancellation: {}: {}", job, error);
        return;
    }

    log_failure(&job, &error);
    warn!("Stopping pending jobs and finishing running jobs...");
    *slot = Some(JobFailure { job, error });
    token.cancel();
}

fn log_failure(job: &str, error: &MirrorError) {
    if error.is_invariant_violation() {
        error!("Internal error (invariant violation) in {}: {}", job, error);
    } else {
        error!("{}\n{}", job, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::confirm::ScriptedPrompt;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Backend recording calls, failing or cancelling on chosen paths
    #[derive(Default)]
    struct RecordingBackend {
        calls: StdMutex<Vec<String>>,
        fail_on: Option<PathBuf>,
        panic_on: Option<PathBuf>,
        cancel_on: Option<(PathBuf, CancellationToken)>,
        delay: Duration,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl RecordingBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        async fn act(&self, verb: &str, path: &Path) -> Result<(), MirrorError> {
            self.calls.lock().unwrap().push(format!("{} {}", verb, path.display()));

            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);

            if let Some((ref cancel_path, ref token)) = self.cancel_on {
                if cancel_path == path {
                    token.cancel();
                }
            }
            if self.panic_on.as_deref() == Some(path) {
                panic!("backend crashed on {}", path.display());
            }
            if self.fail_on.as_deref() == Some(path) {
                return Err(MirrorError::ToolFailed {
                    command: format!("{} {}", verb, path.display()),
                    code: Some(1),
                    stderr: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        async fn ensure_parent_dirs(&self, _path: &Path) -> Result<(), MirrorError> {
            Ok(())
        }

        async fn encode(&self, _source: &Path, destination: &Path, _options: &RunOptions) -> Result<(), MirrorError> {
            self.act("encode", destination).await
        }

        async fn copy_file(&self, _source: &Path, destination: &Path) -> Result<(), MirrorError> {
            self.act("copy", destination).await
        }

        async fn delete_file(&self, path: &Path) -> Result<(), MirrorError> {
            self.act("delete", path).await
        }
    }

    fn encode_job(n: usize) -> Job {
        Job::Encode {
            source: PathBuf::from(format!("/src/{}.flac", n)),
            destination: PathBuf::from(format!("/dst/{}.ogg", n)),
        }
    }

    fn plan_of(creations: Vec<Job>, deletions: Vec<Job>) -> JobPlan {
        JobPlan {
            destination_root: PathBuf::from("/dst"),
            creations,
            deletions,
        }
    }

    fn options(workers: usize) -> RunOptions {
        RunOptions { workers: Some(workers), ..Default::default() }
    }

    #[tokio::test]
    async fn test_fail_fast_stops_submitting() {
        let backend = Arc::new(RecordingBackend {
            fail_on: Some(PathBuf::from("/dst/3.ogg")),
            ..Default::default()
        });
        let executor = Executor::new(options(1), backend.clone());
        let plan = plan_of((1..=5).map(encode_job).collect(), Vec::new());

        let report = executor.execute(plan).await.unwrap();

        match report.status {
            RunStatus::Failed(failure) => {
                assert!(failure.job.contains("/src/3.flac"));
                assert!(failure.error.to_string().contains("boom"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(
            backend.calls(),
            vec!["encode /dst/1.ogg", "encode /dst/2.ogg", "encode /dst/3.ogg"]
        );
        assert_eq!(report.stats.encoded, 2);
    }

    #[tokio::test]
    async fn test_panicking_job_stops_submitting() {
        let backend = Arc::new(RecordingBackend {
            panic_on: Some(PathBuf::from("/dst/1.ogg")),
            ..Default::default()
        });
        let executor = Executor::new(options(1), backend.clone());
        let plan = plan_of((1..=5).map(encode_job).collect(), Vec::new());

        let report = executor.execute(plan).await.unwrap();

        match report.status {
            RunStatus::Failed(failure) => {
                assert!(failure.error.is_invariant_violation());
                assert!(failure.error.to_string().contains("backend crashed on /dst/1.ogg"));
                assert!(failure.job.contains("/src/1.flac"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(backend.calls(), vec!["encode /dst/1.ogg"]);
        assert_eq!(report.stats.total(), 0);
    }

    #[tokio::test]
    async fn test_parallel_failure_reports_once() {
        let backend = Arc::new(RecordingBackend {
            fail_on: Some(PathBuf::from("/dst/3.ogg")),
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let executor = Executor::new(options(3), backend.clone());
        let plan = plan_of((1..=5).map(encode_job).collect(), Vec::new());

        let report = executor.execute(plan).await.unwrap();

        assert_eq!(report.status.exit_code(), 1);
        assert!(backend.calls().len() <= 5);
        assert!(backend.calls().contains(&"encode /dst/3.ogg".to_string()));
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let placeholder = Arc::new(RecordingBackend::default());
        let executor = Executor::new(options(1), placeholder);
        let backend = Arc::new(RecordingBackend {
            cancel_on: Some((PathBuf::from("/dst/2.ogg"), executor.cancel_handle())),
            ..Default::default()
        });
        let executor = Executor { backend: backend.clone(), ..executor };

        let plan = plan_of((1..=4).map(encode_job).collect(), Vec::new());
        let report = executor.execute(plan).await.unwrap();

        assert!(matches!(report.status, RunStatus::Cancelled));
        assert_eq!(report.status.exit_code(), 130);
        assert_eq!(backend.calls(), vec!["encode /dst/1.ogg", "encode /dst/2.ogg"]);
        // Outcomes after cancellation are discarded
        assert_eq!(report.stats.encoded, 1);
    }

    #[tokio::test]
    async fn test_failure_after_cancellation_is_not_reported() {
        let placeholder = Arc::new(RecordingBackend::default());
        let executor = Executor::new(options(1), placeholder);
        let backend = Arc::new(RecordingBackend {
            cancel_on: Some((PathBuf::from("/dst/1.ogg"), executor.cancel_handle())),
            fail_on: Some(PathBuf::from("/dst/1.ogg")),
            ..Default::default()
        });
        let executor = Executor { backend: backend.clone(), ..executor };

        let report = executor.execute(plan_of(vec![encode_job(1), encode_job(2)], Vec::new())).await.unwrap();
        assert!(matches!(report.status, RunStatus::Cancelled));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let backend = Arc::new(RecordingBackend {
            delay: Duration::from_millis(15),
            ..Default::default()
        });
        let executor = Executor::new(options(2), backend.clone());
        let plan = plan_of((1..=6).map(encode_job).collect(), Vec::new());

        let report = executor.execute(plan).await.unwrap();

        assert!(report.status.is_completed());
        assert_eq!(report.stats.encoded, 6);
        assert_eq!(backend.calls().len(), 6);
        assert!(backend.max_running.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_deletions_run_before_creations() {
        let backend = Arc::new(RecordingBackend::default());
        let opts = RunOptions { assume_yes: true, ..options(4) };
        let executor = Executor::new(opts, backend.clone());
        let plan = plan_of(
            vec![encode_job(1), encode_job(2)],
            vec![
                Job::Delete { target: PathBuf::from("/dst/orphan.ogg") },
                Job::Delete { target: PathBuf::from("/dst/old/x.ogg") },
            ],
        );

        let report = executor.execute(plan).await.unwrap();

        assert!(report.status.is_completed());
        let calls = backend.calls();
        assert_eq!(calls[0], "delete /dst/orphan.ogg");
        assert_eq!(calls[1], "delete /dst/old/x.ogg");
        assert_eq!(calls.len(), 4);
        assert_eq!(report.stats.deleted, 2);
        assert_eq!(report.stats.encoded, 2);
    }

    #[tokio::test]
    async fn test_declined_confirmation_aborts_without_side_effects() {
        let backend = Arc::new(RecordingBackend::default());
        let executor = Executor::new(options(2), backend.clone()).with_prompt(ScriptedPrompt::new(["n"]));
        let plan = plan_of(
            vec![encode_job(1)],
            vec![Job::Delete { target: PathBuf::from("/dst/orphan.ogg") }],
        );

        let report = executor.execute(plan).await.unwrap();

        assert!(matches!(report.status, RunStatus::AbortedByUser));
        assert_eq!(report.status.exit_code(), 2);
        assert!(backend.calls().is_empty());
    }

    /// Prompt that waits forever, like a user who never answers
    struct SilentPrompt;

    #[async_trait]
    impl Prompt for SilentPrompt {
        async fn ask(&mut self, _question: &str) -> std::io::Result<Option<String>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_confirmation() {
        let backend = Arc::new(RecordingBackend::default());
        let executor = Executor::new(options(1), backend.clone()).with_prompt(SilentPrompt);
        let handle = executor.cancel_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });
        let plan = plan_of(
            vec![encode_job(1)],
            vec![Job::Delete { target: PathBuf::from("/dst/orphan.ogg") }],
        );

        let report = tokio::time::timeout(Duration::from_secs(5), executor.execute(plan))
            .await
            .expect("cancellation must interrupt the prompt")
            .unwrap();

        assert!(matches!(report.status, RunStatus::Cancelled));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_failure_prevents_creations() {
        let backend = Arc::new(RecordingBackend {
            fail_on: Some(PathBuf::from("/dst/a.ogg")),
            ..Default::default()
        });
        let executor = Executor::new(options(2), backend.clone()).with_prompt(ScriptedPrompt::new(["y"]));
        let plan = plan_of(
            vec![encode_job(1)],
            vec![
                Job::Delete { target: PathBuf::from("/dst/a.ogg") },
                Job::Delete { target: PathBuf::from("/dst/b.ogg") },
            ],
        );

        let report = executor.execute(plan).await.unwrap();

        assert!(matches!(report.status, RunStatus::Failed(_)));
        assert_eq!(backend.calls(), vec!["delete /dst/a.ogg"]);
    }

    #[tokio::test]
    async fn test_invalid_plan_runs_nothing() {
        let backend = Arc::new(RecordingBackend::default());
        let executor = Executor::new(RunOptions { assume_yes: true, ..options(1) }, backend.clone());
        let plan = plan_of(
            vec![encode_job(1)],
            vec![Job::Delete { target: PathBuf::from("/etc/passwd") }],
        );

        let report = executor.execute(plan).await.unwrap();

        match report.status {
            RunStatus::Failed(failure) => assert!(failure.error.is_invariant_violation()),
            other => panic!("expected invariant failure, got {:?}", other),
        }
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let backend = Arc::new(RecordingBackend::default());
        let executor = Executor::new(options(1), backend.clone());
        executor.cancel();

        let report = executor.execute(plan_of(vec![encode_job(1)], Vec::new())).await.unwrap();
        assert!(matches!(report.status, RunStatus::Cancelled));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_replaces_backend() {
        let backend = Arc::new(RecordingBackend::default());
        let opts = RunOptions { dry_run: true, ..options(2) };
        let executor = Executor::new(opts, backend.clone());
        let plan = plan_of(
            vec![encode_job(1), Job::Copy {
                source: PathBuf::from("/src/cover.jpg"),
                destination: PathBuf::from("/dst/cover.jpg"),
            }],
            vec![Job::Delete { target: PathBuf::from("/dst/orphan.ogg") }],
        );

        let report = executor.execute(plan).await.unwrap();

        assert!(report.status.is_completed());
        assert_eq!(report.stats.total(), 3);
        assert!(backend.calls().is_empty());
    }
}
