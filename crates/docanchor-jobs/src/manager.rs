//! # Job Manager
//!
//! Owns the job table and runs every job on its own task.
//!
//! ## Lifecycle
//!
//! 1. `execute_within_job` registers a `Pending` job, links it to its
//!    parent, spawns the work and returns `(JobId, JobCompletion)`
//!    without waiting.
//! 2. The job moves to `Running`. Its work runs until it returns, or
//!    until the manager is cancelled, in which case the work is aborted
//!    and the job fails with `Cancelled`.
//! 3. After successful work the job waits for every child it spawned.
//!    The first failed child fails the parent with `ChildFailed`.
//! 4. The terminal status is written once, published on the job's status
//!    watch, and sent on the completion channel.
//!
//! ## Concurrency
//!
//! The job table is a `DashMap`; every mutation of an entry happens under
//! that entry's shard lock and no lock is held across an `.await`.
//! Terminal entries are never modified again.
//!
//! ## Retention
//!
//! Terminal jobs stay queryable for [`DEFAULT_JOB_RETENTION_SECS`] after
//! they finish. Older ones are pruned whenever a new job is registered, or
//! explicitly through [`JobManager::prune_finished`].

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::{oneshot, watch};
use tracing::Instrument;

use docanchor_core::IssuerId;

use crate::error::JobError;
use crate::job::{Job, JobId, JobStatus, TaskRecord, TaskStatus};

struct JobEntry {
    job: Job,
    status_tx: watch::Sender<JobStatus>,
}

struct Inner {
    jobs: DashMap<JobId, JobEntry>,
    cancel_tx: watch::Sender<bool>,
    span: tracing::Span,
    retention: Option<TimeDelta>,
}

/// Seconds a terminal job is kept in the table by default.
pub const DEFAULT_JOB_RETENTION_SECS: i64 = 3600;

/// Runs jobs and tracks their state. Cheap to clone.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.inner.jobs.len())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl JobManager {
    pub fn new() -> Self {
        Self::with_span(tracing::info_span!("jobs"))
    }

    /// Create a manager whose job spans are children of `span`.
    pub fn with_span(span: tracing::Span) -> Self {
        Self::build(span, Some(TimeDelta::seconds(DEFAULT_JOB_RETENTION_SECS)))
    }

    /// Keep terminal jobs for `retention`, or forever with `None`.
    pub fn with_retention(retention: Option<TimeDelta>) -> Self {
        Self::build(tracing::info_span!("jobs"), retention)
    }

    fn build(span: tracing::Span, retention: Option<TimeDelta>) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                jobs: DashMap::new(),
                cancel_tx,
                span,
                retention,
            }),
        }
    }

    /// Start `work` as a new job and return immediately.
    ///
    /// `parent`, when given, must be a known job; the new job is recorded
    /// as its child and the parent will not succeed until it finishes.
    pub fn execute_within_job<F, Fut>(
        &self,
        owner: IssuerId,
        parent: Option<JobId>,
        description: impl Into<String>,
        work: F,
    ) -> Result<(JobId, JobCompletion), JobError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| JobError::NoRuntime)?;
        let description = description.into();
        if let Some(retention) = self.inner.retention {
            self.prune_finished(retention);
        }
        let job = Job::new(owner, parent, description.clone());
        let job_id = job.id;

        if let Some(parent_id) = parent {
            let mut entry = self
                .inner
                .jobs
                .get_mut(&parent_id)
                .ok_or(JobError::NotFound(parent_id))?;
            entry.job.children.push(job_id);
        }

        let (status_tx, _) = watch::channel(JobStatus::Pending);
        self.inner.jobs.insert(job_id, JobEntry { job, status_tx });

        let (done_tx, done_rx) = oneshot::channel();
        let ctx = JobContext {
            manager: self.clone(),
            job_id,
            owner,
        };
        let manager = self.clone();
        let span = tracing::info_span!(
            parent: &self.inner.span,
            "job",
            job = %job_id,
            description = %description,
        );
        runtime.spawn(
            async move {
                let result = manager.run(job_id, ctx, work).await;
                // The caller may have dropped its completion handle.
                let _ = done_tx.send(result);
            }
            .instrument(span),
        );

        Ok((
            job_id,
            JobCompletion {
                job_id,
                rx: done_rx,
            },
        ))
    }

    async fn run<F, Fut>(&self, job_id: JobId, ctx: JobContext, work: F) -> Result<(), JobError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.set_running(job_id);
        tracing::debug!("job started");

        let mut cancel = self.inner.cancel_tx.subscribe();
        let mut handle = tokio::spawn(work(ctx).in_current_span());
        let mut outcome = tokio::select! {
            joined = &mut handle => match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(JobError::Work(format!("job panicked: {e}"))),
                Err(_) => Err(JobError::Aborted(job_id)),
            },
            _ = cancelled(&mut cancel) => {
                handle.abort();
                // Wait until the work is dropped so its guards have run.
                let _ = (&mut handle).await;
                Err(JobError::Cancelled(job_id))
            }
        };

        if outcome.is_ok() {
            outcome = self.await_children(job_id, &mut cancel).await;
        }
        self.finish(job_id, &outcome);
        outcome
    }

    async fn await_children(
        &self,
        job_id: JobId,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), JobError> {
        let children = self
            .inner
            .jobs
            .get(&job_id)
            .map(|e| e.job.children.clone())
            .unwrap_or_default();

        for child in children {
            let Some(mut rx) = self.subscribe(child) else {
                continue;
            };
            let status = tokio::select! {
                status = wait_terminal(&mut rx) => status,
                _ = cancelled(cancel) => return Err(JobError::Cancelled(job_id)),
            };
            if status == JobStatus::Failed {
                let reason = self
                    .get(child)
                    .and_then(|j| j.error)
                    .unwrap_or_else(|| "unknown failure".to_string());
                return Err(JobError::ChildFailed { child, reason });
            }
        }
        Ok(())
    }

    fn set_running(&self, job_id: JobId) {
        if let Some(mut entry) = self.inner.jobs.get_mut(&job_id) {
            if entry.job.status == JobStatus::Pending {
                entry.job.status = JobStatus::Running;
                entry.status_tx.send_replace(JobStatus::Running);
            }
        }
    }

    fn finish(&self, job_id: JobId, outcome: &Result<(), JobError>) {
        let status = if outcome.is_ok() {
            JobStatus::Success
        } else {
            JobStatus::Failed
        };
        if let Some(mut entry) = self.inner.jobs.get_mut(&job_id) {
            if entry.job.status.is_terminal() {
                return;
            }
            entry.job.status = status;
            entry.job.error = outcome.as_ref().err().map(|e| e.to_string());
            entry.job.finished_at = Some(Utc::now());
            entry.status_tx.send_replace(status);
        }
        match outcome {
            Ok(()) => tracing::info!("job succeeded"),
            Err(e) => tracing::error!(error = %e, "job failed"),
        }
    }

    fn start_task(&self, job_id: JobId, name: String) -> Option<usize> {
        let mut entry = self.inner.jobs.get_mut(&job_id)?;
        if entry.job.status.is_terminal() {
            return None;
        }
        tracing::debug!(task = %name, "task started");
        entry.job.tasks.push(TaskRecord {
            name,
            status: TaskStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        });
        Some(entry.job.tasks.len() - 1)
    }

    fn finish_task(&self, job_id: JobId, index: usize, error: Option<String>) {
        let Some(mut entry) = self.inner.jobs.get_mut(&job_id) else {
            return;
        };
        if entry.job.status.is_terminal() {
            return;
        }
        if let Some(task) = entry.job.tasks.get_mut(index) {
            task.status = if error.is_some() {
                TaskStatus::Failed
            } else {
                TaskStatus::Success
            };
            task.error = error;
            task.finished_at = Some(Utc::now());
        }
    }

    // ---- queries ----

    /// Snapshot of a job.
    pub fn get(&self, job_id: JobId) -> Option<Job> {
        self.inner.jobs.get(&job_id).map(|e| e.job.clone())
    }

    pub fn status(&self, job_id: JobId) -> Option<JobStatus> {
        self.inner.jobs.get(&job_id).map(|e| e.job.status)
    }

    /// Watch a job's status transitions.
    pub fn subscribe(&self, job_id: JobId) -> Option<watch::Receiver<JobStatus>> {
        self.inner.jobs.get(&job_id).map(|e| e.status_tx.subscribe())
    }

    /// Wait by id until a job is terminal, bounded by `timeout`.
    pub async fn wait_for(&self, job_id: JobId, timeout: Duration) -> Result<JobStatus, JobError> {
        let mut rx = self.subscribe(job_id).ok_or(JobError::NotFound(job_id))?;
        tokio::time::timeout(timeout, wait_terminal(&mut rx))
            .await
            .map_err(|_| JobError::Timeout {
                job: job_id,
                timeout,
            })
    }

    /// All jobs started on behalf of `owner`.
    pub fn jobs_for_owner(&self, owner: &IssuerId) -> Vec<Job> {
        self.inner
            .jobs
            .iter()
            .filter(|e| e.job.owner == *owner)
            .map(|e| e.job.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Drop terminal jobs that finished at least `older_than` ago.
    /// Children of a job that is still running are kept so the parent can
    /// read their outcome. Returns how many were removed.
    pub fn prune_finished(&self, older_than: TimeDelta) -> usize {
        let cutoff = Utc::now() - older_than;
        let live: HashSet<JobId> = self
            .inner
            .jobs
            .iter()
            .filter(|e| !e.job.status.is_terminal())
            .map(|e| *e.key())
            .collect();
        let before = self.inner.jobs.len();
        self.inner.jobs.retain(|_, entry| {
            let job = &entry.job;
            let expired = job.status.is_terminal() && job.finished_at.is_some_and(|t| t <= cutoff);
            let awaited = job.parent.is_some_and(|p| live.contains(&p));
            !expired || awaited
        });
        let pruned = before.saturating_sub(self.inner.jobs.len());
        if pruned > 0 {
            tracing::debug!(parent: &self.inner.span, pruned, "pruned finished jobs");
        }
        pruned
    }

    pub fn is_empty(&self) -> bool {
        self.inner.jobs.is_empty()
    }

    // ---- cancellation ----

    /// Cancel the governing context. Every job that is not yet terminal
    /// fails with `Cancelled`, and new jobs fail as soon as they start.
    pub fn cancel_all(&self) {
        tracing::warn!(parent: &self.inner.span, "cancelling all jobs");
        self.inner.cancel_tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel_tx.borrow()
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

async fn wait_terminal(rx: &mut watch::Receiver<JobStatus>) -> JobStatus {
    loop {
        let status = *rx.borrow_and_update();
        if status.is_terminal() {
            return status;
        }
        if rx.changed().await.is_err() {
            return JobStatus::Failed;
        }
    }
}

// ---------------------------------------------------------------------------
// JobContext
// ---------------------------------------------------------------------------

/// Handle given to a job's work.
#[derive(Clone)]
pub struct JobContext {
    manager: JobManager,
    job_id: JobId,
    owner: IssuerId,
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("owner", &self.owner)
            .finish()
    }
}

impl JobContext {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn owner(&self) -> IssuerId {
        self.owner
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    pub fn is_cancelled(&self) -> bool {
        self.manager.is_cancelled()
    }

    /// Start a child job. A failed child fails this job.
    pub fn spawn_child<F, Fut>(
        &self,
        description: impl Into<String>,
        work: F,
    ) -> Result<(JobId, JobCompletion), JobError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.manager
            .execute_within_job(self.owner, Some(self.job_id), description, work)
    }

    /// Run `fut` as a named sub-task recorded on this job.
    pub async fn run_task<T, E, Fut>(&self, name: impl Into<String>, fut: Fut) -> Result<T, E>
    where
        E: std::fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let index = self.manager.start_task(self.job_id, name.into());
        let result = fut.await;
        if let Some(index) = index {
            self.manager.finish_task(
                self.job_id,
                index,
                result.as_ref().err().map(|e| e.to_string()),
            );
        }
        result
    }
}

// ---------------------------------------------------------------------------
// JobCompletion
// ---------------------------------------------------------------------------

/// Read-once completion signal of a job.
///
/// Waiting consumes the handle, so the terminal result can be read at
/// most once. Other observers use [`JobManager::wait_for`].
#[derive(Debug)]
pub struct JobCompletion {
    job_id: JobId,
    rx: oneshot::Receiver<Result<(), JobError>>,
}

impl JobCompletion {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub async fn wait(self) -> Result<(), JobError> {
        let job_id = self.job_id;
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(JobError::Aborted(job_id)),
        }
    }

    /// Wait at most `timeout`. On timeout the job keeps running.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<(), JobError> {
        let job = self.job_id;
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| JobError::Timeout { job, timeout })?
    }
}
