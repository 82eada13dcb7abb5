//! Bounded-concurrency job scheduler
//!
//! [`Scheduler`] keeps every submitted job, runs at most `limit` of them at
//! once on dedicated threads and reports lifecycle changes as [`JobEvent`]s
//! on a broadcast channel.

mod cancel;
mod events;
mod job;
mod queue;
mod runner;

pub use cancel::CancellationToken;
pub use events::JobEvent;
pub use job::{JobError, JobId, JobRequest, JobSnapshot, JobStatus, QueueSummary};
pub use queue::Scheduler;
pub use runner::{JobContext, JobRunner, ProgressFn, TranscodeRunner};
