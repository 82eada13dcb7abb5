//! Bounded-concurrency job queue
//!
//! Jobs are kept in submission order. After every lifecycle change
//! (submit, completion, reset, removal, limit change) the queue promotes the
//! oldest `PREPARE` jobs until `limit` jobs are running. Each running job
//! owns one OS thread; the job thread never touches queue state except
//! through [`Inner::report_progress`] and [`Inner::complete`].

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use tokio::sync::broadcast;

use crate::error::{ErrorKind, Result, TranscodeError};
use crate::pipeline::TranscodeOutcome;

use super::cancel::CancellationToken;
use super::events::JobEvent;
use super::job::{JobError, JobId, JobRequest, JobSnapshot, JobStatus, QueueSummary};
use super::runner::{JobContext, JobRunner};

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 1024;

struct JobRecord {
    id: JobId,
    request: JobRequest,
    status: JobStatus,
    progress: f64,
    error: Option<JobError>,
    attempts: u32,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    /// Being removed; never promoted or reset again
    removing: bool,
}

impl JobRecord {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            input: self.request.input.clone(),
            output: self.request.output.clone(),
            status: self.status,
            progress: self.progress,
            error: self.error.clone(),
            attempts: self.attempts,
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn fail(&mut self, error: JobError) {
        self.status = JobStatus::Fail;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }
}

struct QueueState {
    jobs: Vec<JobRecord>,
    limit: usize,
    shutting_down: bool,
}

impl QueueState {
    fn running(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Ing)
            .count()
    }

    fn find(&self, id: JobId) -> Result<&JobRecord> {
        self.jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or(TranscodeError::JobNotFound(id))
    }

    fn find_mut(&mut self, id: JobId) -> Result<&mut JobRecord> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(TranscodeError::JobNotFound(id))
    }

    fn output_in_use(&self, path: &Path) -> bool {
        self.jobs
            .iter()
            .any(|j| j.status == JobStatus::Ing && j.request.output == path)
    }
}

struct Inner {
    state: Mutex<QueueState>,
    changed: Condvar,
    runner: Arc<dyn JobRunner>,
    events: broadcast::Sender<JobEvent>,
}

impl Inner {
    fn publish(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Promote queued jobs into free slots. Called with the state locked.
    fn schedule(self: &Arc<Self>, state: &mut QueueState) {
        if state.shutting_down {
            return;
        }
        while state.running() < state.limit {
            let Some(pos) = state
                .jobs
                .iter()
                .position(|j| j.status == JobStatus::Prepare && !j.removing)
            else {
                break;
            };

            let output = state.jobs[pos].request.output.clone();
            if output.exists() || state.output_in_use(&output) {
                let job = &mut state.jobs[pos];
                let error = JobError::from(&TranscodeError::DuplicateOutput(output));
                tracing::warn!(job = %job.id, "{}", error.message);
                job.fail(error.clone());
                self.publish(JobEvent::Failed { id: job.id, error });
                continue;
            }

            self.start(state, pos);
        }
        self.changed.notify_all();
    }

    fn start(self: &Arc<Self>, state: &mut QueueState, pos: usize) {
        let job = &mut state.jobs[pos];
        let id = job.id;
        job.status = JobStatus::Ing;
        job.progress = 0.0;
        job.error = None;
        job.attempts += 1;
        job.started_at = Some(Utc::now());
        job.finished_at = None;
        job.cancel = CancellationToken::new();

        let weak = Arc::downgrade(self);
        let progress_weak = weak.clone();
        let ctx = JobContext::new(
            id,
            job.cancel.clone(),
            Arc::new(move |fraction| {
                if let Some(inner) = progress_weak.upgrade() {
                    inner.report_progress(id, fraction);
                }
            }),
        );
        let request = job.request.clone();
        let runner = Arc::clone(&self.runner);

        let spawned = std::thread::Builder::new()
            .name(format!("transq-job-{}", id))
            .spawn(move || run_job(weak, runner, request, ctx));

        match spawned {
            Ok(handle) => {
                // A previous run's thread has already reported; let it go.
                job.handle = Some(handle);
                tracing::info!(job = %id, attempt = job.attempts, input = ?job.request.input, "job started");
                self.publish(JobEvent::Started {
                    id,
                    attempt: job.attempts,
                });
            }
            Err(e) => {
                let error = JobError::new(ErrorKind::Internal, format!("cannot spawn job thread: {}", e));
                tracing::error!(job = %id, "{}", error.message);
                job.fail(error.clone());
                self.publish(JobEvent::Failed { id, error });
            }
        }
    }

    fn report_progress(&self, id: JobId, fraction: f64) {
        let mut state = self.state.lock();
        if let Ok(job) = state.find_mut(id) {
            if job.status == JobStatus::Ing {
                job.progress = fraction;
                self.publish(JobEvent::Progress { id, fraction });
            }
        }
    }

    /// Record the result of a job thread and refill the slot.
    fn complete(self: &Arc<Self>, id: JobId, result: std::thread::Result<Result<TranscodeOutcome>>) {
        let mut state = self.state.lock();
        let Ok(job) = state.find_mut(id) else {
            return;
        };
        let event = match result {
            Ok(Ok(TranscodeOutcome::Completed(stats))) => {
                job.status = JobStatus::Succ;
                job.progress = 1.0;
                job.finished_at = Some(Utc::now());
                tracing::info!(
                    job = %id,
                    video_frames = stats.video_frames,
                    audio_samples = stats.audio_samples,
                    "job succeeded"
                );
                JobEvent::Succeeded { id }
            }
            Ok(Ok(TranscodeOutcome::Cancelled)) | Ok(Err(TranscodeError::Cancelled)) => {
                job.fail(JobError::cancelled());
                tracing::info!(job = %id, "job cancelled");
                JobEvent::Cancelled { id }
            }
            Ok(Err(e)) => {
                let error = JobError::from(&e);
                tracing::warn!(job = %id, kind = %error.kind, "job failed: {}", error.message);
                job.fail(error.clone());
                JobEvent::Failed { id, error }
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                let error = JobError::new(ErrorKind::Internal, format!("job panicked: {}", message));
                tracing::error!(job = %id, "{}", error.message);
                job.fail(error.clone());
                JobEvent::Failed { id, error }
            }
        };
        self.publish(event);
        self.schedule(&mut state);
    }
}

fn run_job(
    inner: Weak<Inner>,
    runner: Arc<dyn JobRunner>,
    request: JobRequest,
    ctx: JobContext,
) {
    let id = ctx.id();
    let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run(&request, &ctx)));
    if let Some(inner) = inner.upgrade() {
        inner.complete(id, result);
    }
}

/// Runs transcode jobs with at most `limit` executing at once.
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn JobRunner>, limit: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    jobs: Vec::new(),
                    limit: limit.max(1),
                    shutting_down: false,
                }),
                changed: Condvar::new(),
                runner,
                events,
            }),
        }
    }

    /// Queue a job; it starts as soon as a slot is free.
    pub fn submit(&self, request: JobRequest) -> Result<JobId> {
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            return Err(TranscodeError::InvalidState("scheduler is shut down".into()));
        }
        let id = JobId::new();
        tracing::debug!(job = %id, input = ?request.input, output = ?request.output, "job submitted");
        state.jobs.push(JobRecord {
            id,
            request,
            status: JobStatus::Prepare,
            progress: 0.0,
            error: None,
            attempts: 0,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            cancel: CancellationToken::new(),
            handle: None,
            removing: false,
        });
        self.inner.publish(JobEvent::Submitted { id });
        self.inner.schedule(&mut state);
        Ok(id)
    }

    /// Change the number of concurrently running jobs (minimum 1).
    ///
    /// Lowering the limit never stops running jobs; the queue drains down to
    /// the new limit as they finish.
    pub fn set_concurrency_limit(&self, limit: usize) {
        let mut state = self.inner.state.lock();
        state.limit = limit.max(1);
        tracing::debug!(limit = state.limit, "concurrency limit changed");
        self.inner.schedule(&mut state);
    }

    pub fn concurrency_limit(&self) -> usize {
        self.inner.state.lock().limit
    }

    /// Request cancellation.
    ///
    /// A running job stops at its next cancellation check and ends as
    /// `FAIL` with a cancelled error; a queued job fails immediately.
    pub fn cancel(&self, id: JobId) -> Result<()> {
        let mut state = self.inner.state.lock();
        let job = state.find_mut(id)?;
        match job.status {
            JobStatus::Ing => {
                job.cancel.cancel();
                tracing::debug!(job = %id, "cancellation requested");
            }
            JobStatus::Prepare => {
                job.fail(JobError::cancelled());
                self.inner.publish(JobEvent::Cancelled { id });
                self.inner.changed.notify_all();
            }
            status => {
                return Err(TranscodeError::InvalidState(format!(
                    "job {} is {}, nothing to cancel",
                    id, status
                )))
            }
        }
        Ok(())
    }

    /// Cancel every queued and running job.
    pub fn cancel_all(&self) {
        let mut state = self.inner.state.lock();
        for job in state.jobs.iter_mut() {
            match job.status {
                JobStatus::Ing => job.cancel.cancel(),
                JobStatus::Prepare => {
                    job.fail(JobError::cancelled());
                    self.inner.publish(JobEvent::Cancelled { id: job.id });
                }
                _ => {}
            }
        }
        self.inner.changed.notify_all();
    }

    /// Remove a job. A running job is cancelled and its thread joined first.
    pub fn remove(&self, id: JobId) -> Result<JobSnapshot> {
        let handle = {
            let mut state = self.inner.state.lock();
            let job = state.find_mut(id)?;
            if job.removing {
                return Err(TranscodeError::InvalidState(format!(
                    "job {} is already being removed",
                    id
                )));
            }
            job.removing = true;
            if job.status == JobStatus::Ing {
                job.cancel.cancel();
            }
            job.handle.take()
        };

        if let Some(handle) = handle {
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                tracing::warn!(job = %id, "job thread panicked outside the runner");
            }
        }

        let mut state = self.inner.state.lock();
        let pos = state
            .jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or(TranscodeError::JobNotFound(id))?;
        let job = state.jobs.remove(pos);
        tracing::debug!(job = %id, status = %job.status, "job removed");
        self.inner.publish(JobEvent::Removed { id });
        self.inner.schedule(&mut state);
        Ok(job.snapshot())
    }

    /// Put a failed job back in the queue.
    pub fn reset(&self, id: JobId) -> Result<()> {
        let mut state = self.inner.state.lock();
        let job = state.find_mut(id)?;
        if job.status != JobStatus::Fail || job.removing {
            return Err(TranscodeError::InvalidState(format!(
                "job {} is {}, only failed jobs can be reset",
                id, job.status
            )));
        }
        reset_record(job);
        self.inner.publish(JobEvent::Reset { id });
        self.inner.schedule(&mut state);
        Ok(())
    }

    /// Put every failed job back in the queue. Returns how many were reset.
    pub fn reset_failed(&self) -> usize {
        let mut state = self.inner.state.lock();
        let mut reset = Vec::new();
        for job in state.jobs.iter_mut() {
            if job.status == JobStatus::Fail && !job.removing {
                reset_record(job);
                reset.push(job.id);
            }
        }
        for id in &reset {
            self.inner.publish(JobEvent::Reset { id: *id });
        }
        self.inner.schedule(&mut state);
        reset.len()
    }

    pub fn status(&self, id: JobId) -> Result<JobStatus> {
        Ok(self.inner.state.lock().find(id)?.status)
    }

    pub fn snapshot(&self, id: JobId) -> Result<JobSnapshot> {
        Ok(self.inner.state.lock().find(id)?.snapshot())
    }

    /// All jobs in submission order
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.inner
            .state
            .lock()
            .jobs
            .iter()
            .map(JobRecord::snapshot)
            .collect()
    }

    pub fn summary(&self) -> QueueSummary {
        let state = self.inner.state.lock();
        let mut summary = QueueSummary::default();
        for job in &state.jobs {
            summary.count(job.status);
        }
        summary
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Block until no job is queued or running, or `timeout` elapses.
    ///
    /// Returns `true` when the queue is idle.
    pub fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.inner.state.lock();
        loop {
            let busy = state
                .jobs
                .iter()
                .any(|j| matches!(j.status, JobStatus::Prepare | JobStatus::Ing));
            if !busy {
                return true;
            }
            match deadline {
                None => self.inner.changed.wait(&mut state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.inner.changed.wait_for(&mut state, deadline - now);
                }
            }
        }
    }

    /// Stop promoting jobs, cancel running ones and join their threads.
    ///
    /// Queued jobs stay `PREPARE`. Idempotent.
    pub fn shutdown(&self) {
        let handles: Vec<_> = {
            let mut state = self.inner.state.lock();
            if !state.shutting_down {
                tracing::debug!(running = state.running(), "scheduler shutting down");
            }
            state.shutting_down = true;
            state
                .jobs
                .iter_mut()
                .filter_map(|job| {
                    if job.status == JobStatus::Ing {
                        job.cancel.cancel();
                    }
                    job.handle.take()
                })
                .collect()
        };
        for handle in handles {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
        self.inner.changed.notify_all();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reset_record(job: &mut JobRecord) {
    job.status = JobStatus::Prepare;
    job.progress = 0.0;
    job.error = None;
    job.started_at = None;
    job.finished_at = None;
}
