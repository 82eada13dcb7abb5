//! What a job thread actually executes

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::media::MediaBackend;
use crate::pipeline::{TranscodeOptions, TranscodeOutcome, Transcoder};

use super::cancel::CancellationToken;
use super::job::{JobId, JobRequest};

/// Executes one job to completion on the calling thread.
///
/// Implementations must poll `ctx.cancel()` regularly and return
/// `Ok(TranscodeOutcome::Cancelled)` (or `Err(Cancelled)`) once it is set.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, request: &JobRequest, ctx: &JobContext) -> Result<TranscodeOutcome>;
}

/// Progress sink installed by the scheduler
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Per-run handle given to a [`JobRunner`]
#[derive(Clone)]
pub struct JobContext {
    id: JobId,
    cancel: CancellationToken,
    progress: ProgressFn,
}

impl JobContext {
    pub fn new(id: JobId, cancel: CancellationToken, progress: ProgressFn) -> Self {
        Self {
            id,
            cancel,
            progress,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Report completion in `[0, 1]`; out-of-range values are clamped.
    pub fn report_progress(&self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        (self.progress)(fraction)
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("id", &self.id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Runs jobs through the transcode pipeline.
pub struct TranscodeRunner {
    backend: Arc<dyn MediaBackend>,
    options: TranscodeOptions,
}

impl TranscodeRunner {
    pub fn new(backend: Arc<dyn MediaBackend>, options: TranscodeOptions) -> Self {
        Self { backend, options }
    }
}

impl JobRunner for TranscodeRunner {
    fn run(&self, request: &JobRequest, ctx: &JobContext) -> Result<TranscodeOutcome> {
        let transcoder = Transcoder::new(self.backend.as_ref(), self.options.clone());
        transcoder.run(
            &request.input,
            &request.output,
            &request.params,
            ctx.cancel(),
            &mut |fraction| ctx.report_progress(fraction),
        )
    }
}
