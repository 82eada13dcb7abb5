//! Batch media transcoding core
//!
//! - [`pipeline::Transcoder`] turns one input file into one output file,
//!   interleaving a constant-frame-rate video track with a re-blocked audio
//!   track.
//! - [`scheduler::Scheduler`] runs many transcodes with a bounded number of
//!   concurrent jobs, cancellation and retry.
//!
//! All media access goes through [`media::MediaBackend`]. The FFmpeg backend
//! is available with the `ffmpeg` feature.

pub mod codec;
pub mod config;
pub mod error;
pub mod extract;
pub mod media;
pub mod naming;
pub mod pipeline;
pub mod scheduler;
pub mod transform;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_utils;

#[cfg(test)]
pub(crate) mod tests;

pub use codec::params::{AudioCodec, ContainerFormat, VideoCodec};
pub use config::{AudioParams, ThreadParams, TranscodeParams, VideoParams};
pub use error::{CodecError, ErrorKind, Result, TranscodeError};
pub use naming::{resolve_output_path, DEFAULT_NAME_TEMPLATE};
pub use pipeline::{TranscodeOptions, TranscodeOutcome, TranscodeStats, Transcoder};
pub use scheduler::{
    CancellationToken, JobError, JobEvent, JobId, JobRequest, JobSnapshot, JobStatus,
    QueueSummary, Scheduler, TranscodeRunner,
};

#[cfg(feature = "ffmpeg")]
pub use ffmpeg_utils::{init, install_log_filter, version_info as ffmpeg_version_info, FfmpegBackend};
