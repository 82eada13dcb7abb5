//! Container and codec collaborators
//!
//! The pipeline never touches a media library directly. It talks to a
//! [`MediaBackend`], which opens demuxers, muxers, codec sessions and
//! converters. The FFmpeg implementation lives in `ffmpeg_utils` (feature
//! `ffmpeg`); tests use an in-memory backend.

use std::path::Path;

use crate::codec::params::{AudioEncoderSpec, ContainerFormat, EncoderInfo, VideoEncoderSpec};
use crate::codec::BoxedSession;
use crate::error::Result;
use crate::transform::{FrameScaler, SampleConverter};

use super::format::AudioFormat;
use super::frame::{AudioFrame, VideoFrame, VideoShape};
use super::packet::Packet;
use super::rational::Rational;
use super::stream::{CodecParameters, MediaKind, StreamInfo};

pub type VideoDecoder = BoxedSession<Packet, VideoFrame>;
pub type AudioDecoder = BoxedSession<Packet, AudioFrame>;
pub type VideoEncoder = BoxedSession<VideoFrame, Packet>;
pub type AudioEncoder = BoxedSession<AudioFrame, Packet>;

/// An opened source container
pub trait Demuxer: Send {
    /// Streams, indexed by `StreamInfo::index`
    fn streams(&self) -> &[StreamInfo];

    /// The stream the container considers the default of `kind`.
    fn best_stream(&self, kind: MediaKind) -> Option<usize> {
        self.streams()
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.index)
    }

    /// Container duration in seconds, when known
    fn duration_secs(&self) -> Option<f64>;

    /// Next packet in file order; `None` at end of file.
    fn read(&mut self) -> Result<Option<Packet>>;

    /// Position the reader on the last keyframe of `stream` at or before `ts`
    /// (in that stream's time base).
    fn seek(&mut self, stream: usize, ts: i64) -> Result<()>;
}

/// An output container being written
pub trait Muxer: Send {
    /// Declare an output stream; `time_base` is the encoder's, the muxer may
    /// pick a different one at header time.
    fn add_stream(&mut self, params: &CodecParameters, time_base: Rational) -> Result<usize>;

    /// Whether encoders must emit global headers (extradata) for this container.
    fn needs_global_header(&self) -> bool;

    fn write_header(&mut self) -> Result<()>;

    /// Time base chosen for `stream`; final only after `write_header`.
    fn time_base(&self, stream: usize) -> Option<Rational>;

    /// Write one packet already expressed in the stream's muxer time base.
    fn write_packet(&mut self, packet: Packet) -> Result<()>;

    fn write_trailer(&mut self) -> Result<()>;
}

/// Factory for everything the pipeline needs from a media library
pub trait MediaBackend: Send + Sync {
    fn open_input(&self, path: &Path) -> Result<Box<dyn Demuxer>>;

    /// Create the output file and its container context.
    fn open_output(&self, path: &Path, container: ContainerFormat) -> Result<Box<dyn Muxer>>;

    fn open_video_decoder(&self, stream: &StreamInfo, threads: usize) -> Result<VideoDecoder>;

    fn open_audio_decoder(&self, stream: &StreamInfo, threads: usize) -> Result<AudioDecoder>;

    fn open_video_encoder(
        &self,
        spec: &VideoEncoderSpec,
        global_header: bool,
    ) -> Result<(VideoEncoder, EncoderInfo)>;

    fn open_audio_encoder(
        &self,
        spec: &AudioEncoderSpec,
        global_header: bool,
    ) -> Result<(AudioEncoder, EncoderInfo)>;

    fn open_resampler(&self, from: AudioFormat, to: AudioFormat)
        -> Result<Box<dyn SampleConverter>>;

    fn open_scaler(&self, from: VideoShape, to: VideoShape) -> Result<Box<dyn FrameScaler>>;
}
