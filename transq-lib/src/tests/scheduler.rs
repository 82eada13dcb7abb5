//! Scheduler scenarios with a controllable runner

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::TranscodeParams;
use crate::error::{CodecError, ErrorKind, Result};
use crate::pipeline::{TranscodeOptions, TranscodeOutcome, TranscodeStats};
use crate::scheduler::{
    JobContext, JobEvent, JobId, JobRequest, JobRunner, JobStatus, Scheduler, TranscodeRunner,
};

use super::fixtures::{MockBackend, SourceSpec, VideoSpec};

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct GateState {
    running: usize,
    max_running: usize,
    started: Vec<PathBuf>,
    released: HashSet<PathBuf>,
}

/// Runner whose jobs block until released.
///
/// Inputs named `fail*` end with a codec error, `panic*` panic.
#[derive(Default)]
struct GatedRunner {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl GatedRunner {
    fn release(&self, input: &Path) {
        self.state.lock().released.insert(input.to_path_buf());
        self.changed.notify_all();
    }

    fn max_running(&self) -> usize {
        self.state.lock().max_running
    }

    fn starts_of(&self, input: &Path) -> usize {
        self.state
            .lock()
            .started
            .iter()
            .filter(|p| p.as_path() == input)
            .count()
    }
}

impl JobRunner for GatedRunner {
    fn run(&self, request: &JobRequest, ctx: &JobContext) -> Result<TranscodeOutcome> {
        let mut state = self.state.lock();
        state.running += 1;
        state.max_running = state.max_running.max(state.running);
        state.started.push(request.input.clone());
        self.changed.notify_all();

        let outcome = loop {
            if ctx.cancel().is_cancelled() {
                break None;
            }
            if state.released.contains(&request.input) {
                break Some(());
            }
            self.changed
                .wait_for(&mut state, Duration::from_millis(5));
        };
        state.running -= 1;
        drop(state);

        let name = request
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match outcome {
            None => Ok(TranscodeOutcome::Cancelled),
            Some(()) if name.starts_with("fail") => Err(CodecError::Send("boom".into()).into()),
            Some(()) if name.starts_with("panic") => panic!("runner exploded"),
            Some(()) => {
                ctx.report_progress(1.0);
                Ok(TranscodeOutcome::Completed(TranscodeStats::default()))
            }
        }
    }
}

fn input(name: &str) -> PathBuf {
    PathBuf::from(format!("/in/{}.mov", name))
}

fn request(dir: &tempfile::TempDir, name: &str) -> JobRequest {
    JobRequest::new(
        input(name),
        dir.path().join(format!("{}.mp4", name)),
        TranscodeParams::default(),
    )
}

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn statuses(scheduler: &Scheduler, ids: &[JobId]) -> Vec<JobStatus> {
    ids.iter().map(|id| scheduler.status(*id).unwrap()).collect()
}

fn count(statuses: &[JobStatus], status: JobStatus) -> usize {
    statuses.iter().filter(|s| **s == status).count()
}

#[test]
fn test_five_jobs_two_slots() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 2);
    let dir = tempfile::tempdir().unwrap();
    let names = ["a", "b", "c", "d", "e"];
    let ids: Vec<JobId> = names
        .iter()
        .map(|n| scheduler.submit(request(&dir, n)).unwrap())
        .collect();

    use JobStatus::*;
    assert_eq!(statuses(&scheduler, &ids), vec![Ing, Ing, Prepare, Prepare, Prepare]);

    runner.release(&input("a"));
    wait_until(|| scheduler.status(ids[0]).unwrap() == Succ);
    wait_until(|| scheduler.status(ids[2]).unwrap() == Ing);
    let now = statuses(&scheduler, &ids);
    assert_eq!(count(&now, Ing), 2);
    assert_eq!(count(&now, Prepare), 2);
    assert_eq!(now[3], Prepare, "promotion is FIFO");

    for name in &names[1..] {
        runner.release(&input(name));
    }
    assert!(scheduler.wait_idle(Some(TIMEOUT)));
    assert_eq!(count(&statuses(&scheduler, &ids), Succ), 5);
    assert!(runner.max_running() <= 2);

    let summary = scheduler.summary();
    assert_eq!(summary.total, 5);
    assert_eq!(summary.succeeded, 5);
    assert!(summary.is_idle());
}

#[test]
fn test_cancel_running_job_frees_slot() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 1);
    let mut events = scheduler.subscribe();
    let dir = tempfile::tempdir().unwrap();
    let first = scheduler.submit(request(&dir, "first")).unwrap();
    let second = scheduler.submit(request(&dir, "second")).unwrap();
    assert_eq!(scheduler.status(second).unwrap(), JobStatus::Prepare);

    scheduler.cancel(first).unwrap();
    wait_until(|| scheduler.status(first).unwrap() == JobStatus::Fail);
    wait_until(|| scheduler.status(second).unwrap() == JobStatus::Ing);

    let snapshot = scheduler.snapshot(first).unwrap();
    assert_eq!(snapshot.error.unwrap().kind, ErrorKind::Cancelled);
    assert!(snapshot.finished_at.is_some());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&JobEvent::Cancelled { id: first }));
    assert!(seen.contains(&JobEvent::Started {
        id: second,
        attempt: 1
    }));

    runner.release(&input("second"));
    assert!(scheduler.wait_idle(Some(TIMEOUT)));
}

#[test]
fn test_cancel_queued_job() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 1);
    let dir = tempfile::tempdir().unwrap();
    let first = scheduler.submit(request(&dir, "first")).unwrap();
    let queued = scheduler.submit(request(&dir, "queued")).unwrap();

    scheduler.cancel(queued).unwrap();
    assert_eq!(scheduler.status(queued).unwrap(), JobStatus::Fail);
    assert_eq!(scheduler.status(first).unwrap(), JobStatus::Ing);
    assert!(scheduler.cancel(queued).is_err(), "already terminal");

    runner.release(&input("first"));
    assert!(scheduler.wait_idle(Some(TIMEOUT)));
    assert_eq!(runner.starts_of(&input("queued")), 0);
}

#[test]
fn test_remove_running_job() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 1);
    let dir = tempfile::tempdir().unwrap();
    let first = scheduler.submit(request(&dir, "first")).unwrap();
    let second = scheduler.submit(request(&dir, "second")).unwrap();

    let removed = scheduler.remove(first).unwrap();
    assert_eq!(removed.status, JobStatus::Fail);
    assert!(scheduler.status(first).is_err());
    assert_eq!(scheduler.jobs().len(), 1);
    wait_until(|| scheduler.status(second).unwrap() == JobStatus::Ing);

    runner.release(&input("second"));
    assert!(scheduler.wait_idle(Some(TIMEOUT)));
    scheduler.remove(second).unwrap();
    assert!(scheduler.jobs().is_empty());
}

#[test]
fn test_reset_failed_job_runs_again() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 2);
    let dir = tempfile::tempdir().unwrap();
    let bad = scheduler.submit(request(&dir, "fail-once")).unwrap();
    let good = scheduler.submit(request(&dir, "good")).unwrap();

    runner.release(&input("fail-once"));
    runner.release(&input("good"));
    assert!(scheduler.wait_idle(Some(TIMEOUT)));

    let snapshot = scheduler.snapshot(bad).unwrap();
    assert_eq!(snapshot.status, JobStatus::Fail);
    assert_eq!(snapshot.error.as_ref().unwrap().kind, ErrorKind::Codec);
    assert!(scheduler.reset(good).is_err(), "only failed jobs reset");

    scheduler.reset(bad).unwrap();
    assert!(scheduler.wait_idle(Some(TIMEOUT)));
    let snapshot = scheduler.snapshot(bad).unwrap();
    assert_eq!(snapshot.attempts, 2);
    assert_eq!(runner.starts_of(&input("fail-once")), 2);

    assert_eq!(scheduler.reset_failed(), 1);
    assert!(scheduler.wait_idle(Some(TIMEOUT)));
    assert_eq!(scheduler.snapshot(bad).unwrap().attempts, 3);
}

#[test]
fn test_limit_changes() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 1);
    let dir = tempfile::tempdir().unwrap();
    let ids: Vec<JobId> = ["x", "y", "z"]
        .iter()
        .map(|n| scheduler.submit(request(&dir, n)).unwrap())
        .collect();
    assert_eq!(count(&statuses(&scheduler, &ids), JobStatus::Ing), 1);

    scheduler.set_concurrency_limit(3);
    assert_eq!(count(&statuses(&scheduler, &ids), JobStatus::Ing), 3);

    // Lowering the limit lets running jobs finish
    scheduler.set_concurrency_limit(0);
    assert_eq!(scheduler.concurrency_limit(), 1);
    assert_eq!(count(&statuses(&scheduler, &ids), JobStatus::Ing), 3);

    for name in ["x", "y", "z"] {
        runner.release(&input(name));
    }
    assert!(scheduler.wait_idle(Some(TIMEOUT)));
}

#[test]
fn test_duplicate_output_fails_before_start() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 2);
    let dir = tempfile::tempdir().unwrap();

    let existing = request(&dir, "exists");
    std::fs::write(&existing.output, b"").unwrap();
    let id = scheduler.submit(existing).unwrap();
    let snapshot = scheduler.snapshot(id).unwrap();
    assert_eq!(snapshot.status, JobStatus::Fail);
    assert_eq!(snapshot.error.unwrap().kind, ErrorKind::DuplicateOutput);
    assert_eq!(snapshot.attempts, 0);

    // Two queued jobs writing the same file: the second one is refused
    let first = scheduler.submit(request(&dir, "same")).unwrap();
    let mut clash = request(&dir, "other");
    clash.output = dir.path().join("same.mp4");
    let second = scheduler.submit(clash).unwrap();
    assert_eq!(scheduler.status(first).unwrap(), JobStatus::Ing);
    assert_eq!(scheduler.status(second).unwrap(), JobStatus::Fail);

    runner.release(&input("same"));
    assert!(scheduler.wait_idle(Some(TIMEOUT)));
    assert_eq!(runner.starts_of(&input("exists")), 0);
}

#[test]
fn test_panicking_job_fails_and_queue_continues() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 1);
    let dir = tempfile::tempdir().unwrap();
    let bad = scheduler.submit(request(&dir, "panic")).unwrap();
    let next = scheduler.submit(request(&dir, "next")).unwrap();

    runner.release(&input("panic"));
    runner.release(&input("next"));
    assert!(scheduler.wait_idle(Some(TIMEOUT)));

    let snapshot = scheduler.snapshot(bad).unwrap();
    assert_eq!(snapshot.status, JobStatus::Fail);
    let error = snapshot.error.unwrap();
    assert_eq!(error.kind, ErrorKind::Internal);
    assert!(error.message.contains("runner exploded"));
    assert_eq!(scheduler.status(next).unwrap(), JobStatus::Succ);
}

#[test]
fn test_shutdown_cancels_running_jobs() {
    let runner = Arc::new(GatedRunner::default());
    let scheduler = Scheduler::new(runner.clone(), 1);
    let dir = tempfile::tempdir().unwrap();
    let running = scheduler.submit(request(&dir, "running")).unwrap();
    let queued = scheduler.submit(request(&dir, "queued")).unwrap();

    scheduler.shutdown();
    assert_eq!(scheduler.status(running).unwrap(), JobStatus::Fail);
    assert_eq!(scheduler.status(queued).unwrap(), JobStatus::Prepare);
    assert!(scheduler.submit(request(&dir, "late")).is_err());
}

#[test]
fn test_transcode_runner() {
    let backend = Arc::new(MockBackend::new());
    backend.add_source("/in/clip.mov", SourceSpec::video_only(VideoSpec::default()));
    let options = TranscodeOptions {
        round_pause_ms: 0,
        ..TranscodeOptions::default()
    };
    let scheduler = Scheduler::new(Arc::new(TranscodeRunner::new(backend.clone(), options)), 2);
    let mut events = scheduler.subscribe();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("clip.mp4");

    let id = scheduler
        .submit(JobRequest::new("/in/clip.mov", &output, TranscodeParams::default()))
        .unwrap();
    assert!(scheduler.wait_idle(Some(TIMEOUT)));

    let snapshot = scheduler.snapshot(id).unwrap();
    assert_eq!(snapshot.status, JobStatus::Succ);
    assert_eq!(snapshot.progress, 1.0);
    assert!(output.exists());

    let mut progress = 0;
    let mut succeeded = false;
    while let Ok(event) = events.try_recv() {
        match event {
            JobEvent::Progress { fraction, .. } => {
                assert!((0.0..=1.0).contains(&fraction));
                progress += 1;
            }
            JobEvent::Succeeded { id: done } => succeeded = done == id,
            _ => {}
        }
    }
    assert!(progress > 0);
    assert!(succeeded);
}
