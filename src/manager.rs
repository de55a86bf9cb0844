use std::ffi::OsString;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AnimatorConfig;
use crate::error::AnimatorError;
use crate::pipeline::{FallbackChain, PipelineRunner, Tier};
use crate::state_machine::{Job, JobStatus, JobTicket, StateMachine, Transition};
use crate::storage::StorageClient;
use crate::store::JobStore;

/// Knobs for a [`JobManager`], usually taken from [`AnimatorConfig`].
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub tiers: Vec<Tier>,
    pub max_concurrent_jobs: usize,
    pub reject_duplicate_ids: bool,
}

impl From<&AnimatorConfig> for ManagerSettings {
    fn from(config: &AnimatorConfig) -> Self {
        Self {
            tiers: config.tiers.clone(),
            max_concurrent_jobs: config.max_concurrent_jobs,
            reject_duplicate_ids: config.reject_duplicate_ids,
        }
    }
}

/// Accepts animation requests and drives each job to a terminal state in
/// the background.
///
/// Every job runs as its own task, but only `max_concurrent_jobs` of them
/// may be past the `pending` state at once. All job state lives in the
/// [`JobStore`]; the manager keeps none of it in memory.
pub struct JobManager<S, C, R> {
    inner: Arc<Inner<S, C, R>>,
}

impl<S, C, R> Clone for JobManager<S, C, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S, C, R> {
    store: S,
    storage: C,
    chain: FallbackChain<R>,
    tiers: Vec<Tier>,
    permits: Semaphore,
    tracker: TaskTracker,
    cancel: CancellationToken,
    reject_duplicate_ids: bool,
}

impl<S, C, R> JobManager<S, C, R>
where
    S: JobStore,
    C: StorageClient,
    R: PipelineRunner,
{
    pub fn new(store: S, storage: C, runner: R, settings: ManagerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                storage,
                chain: FallbackChain::new(runner),
                tiers: settings.tiers,
                permits: Semaphore::new(settings.max_concurrent_jobs.max(1)),
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
                reject_duplicate_ids: settings.reject_duplicate_ids,
            }),
        }
    }

    /// Persist a new pending job for `image_url` and start processing it.
    /// Returns without waiting for processing.
    pub async fn create_job(&self, image_url: &str) -> Result<JobTicket, AnimatorError> {
        validate_image_url(image_url)?;
        let job = Job::new(image_url.to_string());
        self.inner.store.put(&job).await?;
        Ok(self.spawn(job))
    }

    /// Like [`create_job`](Self::create_job) with a caller-chosen id.
    ///
    /// An existing record with the same id is overwritten unless the manager
    /// was configured to reject duplicates, in which case the existence check
    /// and the write happen atomically in the store.
    pub async fn create_job_with_id(
        &self,
        job_id: &str,
        image_url: &str,
    ) -> Result<JobTicket, AnimatorError> {
        if job_id.trim().is_empty() {
            return Err(AnimatorError::InvalidRequest("job id must not be empty".into()));
        }
        validate_image_url(image_url)?;

        let job = Job::with_id(job_id.to_string(), image_url.to_string());
        if self.inner.reject_duplicate_ids {
            if !self.inner.store.put_if_absent(&job).await? {
                return Err(AnimatorError::DuplicateJob(job.id));
            }
        } else {
            self.inner.store.put(&job).await?;
        }
        Ok(self.spawn(job))
    }

    /// Current persisted state of `job_id`.
    pub async fn get_job_status(&self, job_id: &str) -> Result<Job, AnimatorError> {
        self.inner
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| AnimatorError::NotFound(job_id.to_string()))
    }

    /// Token cancelled by [`shutdown`](Self::shutdown); ingress loops can
    /// watch it to stop accepting work.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Wait for every spawned job to reach a terminal state.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Cancel in-flight jobs (they are recorded as failed) and wait for them.
    pub async fn shutdown(&self) {
        info!(in_flight = self.inner.tracker.len(), "shutting down job manager");
        self.inner.cancel.cancel();
        self.drain().await;
    }

    // `job` must already be persisted.
    fn spawn(&self, job: Job) -> JobTicket {
        info!(job_id = %job.id, original_url = %job.original_url, "job accepted");

        let ticket = JobTicket::from(&job);
        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(async move {
            inner.process_animation(&job.id, &job.original_url).await;
        });
        ticket
    }
}

impl<S, C, R> Inner<S, C, R>
where
    S: JobStore,
    C: StorageClient,
    R: PipelineRunner,
{
    /// Drive one job to `completed` or `failed`. Never returns an error:
    /// every failure is recorded on the job itself.
    ///
    /// The worker only touches the record it was spawned for. If the id was
    /// resubmitted in the meantime, the newer record is left to its own
    /// worker.
    #[instrument(skip(self, image_url))]
    async fn process_animation(&self, job_id: &str, image_url: &str) {
        let mut owner = Owner::submitted(image_url);
        let _permit = tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!("cancelled while waiting for a worker slot");
                self.mark_failed(job_id, &owner).await;
                return;
            }
            permit = self.permits.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.mark_failed(job_id, &owner).await;
                    return;
                }
            },
        };

        let mut scratch = ScratchFiles::default();
        match self.run_to_completion(job_id, &mut owner, &mut scratch).await {
            Ok(Some(job)) => {
                info!(animated_url = ?job.animated_url, "animation job completed");
            }
            Ok(None) => {
                debug!("job record missing or taken over, abandoning");
            }
            Err(err) => {
                error!(error = %err, "animation processing failed");
                self.mark_failed(job_id, &owner).await;
            }
        }
        scratch.release().await;
    }

    // `Ok(None)` when the record is gone, already started, or replaced by a
    // newer submission of the same id.
    async fn run_to_completion(
        &self,
        job_id: &str,
        owner: &mut Owner<'_>,
        scratch: &mut ScratchFiles,
    ) -> Result<Option<Job>, AnimatorError> {
        let Some(mut job) = self.store.get(job_id).await? else {
            return Ok(None);
        };
        if job.status != JobStatus::Pending || !owner.matches(&job) {
            debug!(status = %job.status, "record is not waiting for this worker");
            return Ok(None);
        }
        StateMachine::apply(&mut job, Transition::Start)?;
        self.store.put(&job).await?;
        owner.claimed(&job);

        let input = cancellable(&self.cancel, self.storage.download(owner.image_url))
            .await?
            .map_err(AnimatorError::DownloadFailed)?;
        scratch.track(&input);
        let output = output_path_for(&input);
        scratch.track(&output);
        info!(input = %input.display(), "source image downloaded");

        let success = self
            .chain
            .run(&input, &output, &self.tiers, &self.cancel)
            .await?;
        debug!(tier = %success.tier, bytes = success.output_bytes, "artifact ready");

        let file_name = format!("animated_{job_id}.mp4");
        let animated_url = cancellable(&self.cancel, self.storage.upload(&output, &file_name))
            .await?
            .map_err(AnimatorError::UploadFailed)?;

        match self.store.get(job_id).await? {
            Some(current) if current.status == JobStatus::Processing && owner.matches(&current) => {}
            current => {
                warn!(
                    status = ?current.map(|j| j.status),
                    %animated_url,
                    "record changed while processing, discarding result"
                );
                return Ok(None);
            }
        }
        StateMachine::apply(&mut job, Transition::Complete { animated_url })?;
        self.store.put(&job).await?;
        Ok(Some(job))
    }

    async fn mark_failed(&self, job_id: &str, owner: &Owner<'_>) {
        if let Err(err) = self.record_failure(job_id, owner).await {
            error!(error = %err, "could not record job failure");
        }
    }

    async fn record_failure(&self, job_id: &str, owner: &Owner<'_>) -> Result<(), AnimatorError> {
        let Some(mut job) = self.store.get(job_id).await? else {
            return Ok(());
        };
        if job.status.is_terminal() {
            warn!(status = %job.status, "job already terminal, not marking failed");
            return Ok(());
        }
        if !owner.matches(&job) {
            warn!(status = %job.status, "record belongs to a newer submission, not marking failed");
            return Ok(());
        }
        StateMachine::apply(&mut job, Transition::Fail)?;
        self.store.put(&job).await
    }
}

/// The record a worker was spawned for. Before the claim it is known by its
/// source URL only; once claimed, also by its creation time.
struct Owner<'a> {
    image_url: &'a str,
    created_at: Option<DateTime<Utc>>,
}

impl<'a> Owner<'a> {
    fn submitted(image_url: &'a str) -> Self {
        Self {
            image_url,
            created_at: None,
        }
    }

    fn claimed(&mut self, job: &Job) {
        self.created_at = Some(job.created_at);
    }

    fn matches(&self, job: &Job) -> bool {
        job.original_url == self.image_url
            && self.created_at.is_none_or(|at| at == job.created_at)
    }
}

fn validate_image_url(image_url: &str) -> Result<(), AnimatorError> {
    if image_url.trim().is_empty() {
        return Err(AnimatorError::InvalidRequest("image url must not be empty".into()));
    }
    Ok(())
}

/// The pipelines write their artifact next to the input: `<input>.mp4`.
fn output_path_for(input: &Path) -> PathBuf {
    let mut raw = OsString::from(input.as_os_str());
    raw.push(".mp4");
    PathBuf::from(raw)
}

async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, AnimatorError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AnimatorError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Local files owned by one job. Removed by [`release`](Self::release), or
/// on drop if the task unwinds first. Removal failures are logged only.
#[derive(Default)]
struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    fn track(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }

    async fn release(mut self) {
        for path in std::mem::take(&mut self.paths) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed temporary file"),
                Err(e) => log_cleanup_error(&path, &e),
            }
        }
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(e) = std::fs::remove_file(&path) {
                log_cleanup_error(&path, &e);
            }
        }
    }
}

fn log_cleanup_error(path: &Path, err: &std::io::Error) {
    if err.kind() == ErrorKind::NotFound {
        debug!(path = %path.display(), "temporary file already gone");
    } else {
        warn!(path = %path.display(), error = %err, "failed to remove temporary file");
    }
}
