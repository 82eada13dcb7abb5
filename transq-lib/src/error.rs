use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::scheduler::JobId;

/// Main error type for the transcoding core
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The source could not be opened or probed, or the output could not be created
    #[error("Failed to open {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// An error originating from a decoder, encoder or converter session
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// A requested frame could not be reached in the source stream
    #[error("Seek failed: {0}")]
    Seek(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing to the output container failed
    #[error("Muxing error: {0}")]
    Mux(String),

    /// Reading from an opened source failed
    #[error("Demuxing error: {0}")]
    Demux(String),

    /// The output path already exists; it is never overwritten
    #[error("Output file already exists: {0:?}")]
    DuplicateOutput(PathBuf),

    /// Invalid or unsupported transcode parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Neither a video nor an audio stream can be produced for this job
    #[error("Nothing to transcode in {0:?}: no enabled stream present in source")]
    NoStreams(PathBuf),

    /// The job was cancelled cooperatively
    #[error("Cancelled")]
    Cancelled,

    /// Unknown job id passed to the scheduler
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// A scheduler operation is not valid in the job's current state
    #[error("Invalid job state: {0}")]
    InvalidState(String),
}

/// Errors raised by codec sessions and sample/pixel converters
#[derive(Error, Debug)]
pub enum CodecError {
    /// No encoder registered under the requested name
    #[error("Encoder not found: {0}")]
    EncoderNotFound(String),

    /// No decoder for the source codec
    #[error("Decoder not found: {0}")]
    DecoderNotFound(String),

    /// The session could not be configured or opened
    #[error("Failed to open codec: {0}")]
    Open(String),

    /// Submitting input to a session failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Fetching output from a session failed
    #[error("Receive failed: {0}")]
    Receive(String),

    /// Sample format / rate / layout conversion failed
    #[error("Resampling failed: {0}")]
    Resample(String),

    /// Picture scaling or pixel-format conversion failed
    #[error("Scaling failed: {0}")]
    Scale(String),

    /// The session neither accepts input nor produces output
    #[error("{0} session stalled: input refused and no output pending")]
    Stalled(String),

    /// Operation not allowed in the adapter's current state
    #[error("Invalid codec state: {0}")]
    InvalidState(String),
}

/// Coarse classification of a failure, carried in job descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Open,
    Codec,
    Seek,
    Io,
    DuplicateOutput,
    Config,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Open => "open",
            ErrorKind::Codec => "codec",
            ErrorKind::Seek => "seek",
            ErrorKind::Io => "io",
            ErrorKind::DuplicateOutput => "duplicate_output",
            ErrorKind::Config => "config",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl TranscodeError {
    /// Classify this error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscodeError::Open { .. } => ErrorKind::Open,
            TranscodeError::Codec(_) => ErrorKind::Codec,
            TranscodeError::Seek(_) => ErrorKind::Seek,
            TranscodeError::Io(_) | TranscodeError::Mux(_) | TranscodeError::Demux(_) => {
                ErrorKind::Io
            }
            TranscodeError::DuplicateOutput(_) => ErrorKind::DuplicateOutput,
            TranscodeError::Config(_) | TranscodeError::NoStreams(_) => ErrorKind::Config,
            TranscodeError::Cancelled => ErrorKind::Cancelled,
            TranscodeError::JobNotFound(_) | TranscodeError::InvalidState(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        TranscodeError::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TranscodeError>;
