//! Transcode orchestration
//!
//! A [`Transcoder`] runs one input → output job. The video track samples the
//! source at a constant output frame rate through the frame extractor, the
//! audio track decodes the source sequentially and re-blocks it for the
//! encoder. Both tracks advance in rounds against a shared time ceiling so
//! neither runs more than one quantum ahead of the other in the output file.

mod audio;
mod output;
mod video;
mod writer;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::params::{
    audio_encoder_spec, video_encoder_spec, AudioEncoderSpec, AudioRequest, EncoderInfo,
    VideoEncoderSpec, VideoRequest,
};
use crate::codec::CodecAdapter;
use crate::config::TranscodeParams;
use crate::error::{CodecError, Result, TranscodeError};
use crate::extract::{frame_count, FrameExtractor};
use crate::media::{
    AudioFormat, ChannelLayout, Demuxer, MediaBackend, MediaKind, PixelFormat, Rational,
    StreamInfo, VideoShape,
};
use crate::scheduler::CancellationToken;
use crate::transform::{AudioResampler, VideoScaler};

use audio::AudioTrack;
use output::PartialOutput;
use video::VideoTrack;
use writer::PacketWriter;

/// Largest denominator used when turning a configured frame rate into a rational
const FPS_MAX_DEN: i32 = 1001;

/// Orchestrator tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeOptions {
    /// Output time added to the interleave ceiling every round
    pub round_quantum_secs: f64,

    /// Pause between the video and audio phase of a round
    pub round_pause_ms: u64,

    /// Forward distance (seconds) the extractor decodes through instead of seeking
    pub seek_threshold_secs: f64,

    /// Leave an unfinished output file in place after a failure or cancel
    pub keep_partial_output: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            round_quantum_secs: 0.5,
            round_pause_ms: 5,
            seek_threshold_secs: 3.0,
            keep_partial_output: false,
        }
    }
}

/// Counters for a finished transcode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeStats {
    pub video_frames: u64,
    pub audio_samples: u64,
    pub packets_written: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeOutcome {
    Completed(TranscodeStats),
    /// Stopped on request; no trailer was written
    Cancelled,
}

/// Source streams picked for the job
struct SourcePlan {
    video: Option<StreamInfo>,
    audio: Option<StreamInfo>,
    container_secs: Option<f64>,
}

/// Runs single transcodes against a media backend.
pub struct Transcoder<'a> {
    backend: &'a dyn MediaBackend,
    options: TranscodeOptions,
}

impl<'a> Transcoder<'a> {
    pub fn new(backend: &'a dyn MediaBackend, options: TranscodeOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// Transcode `input` into `output`.
    ///
    /// `progress` receives values in `[0, 1]` once per round. A cancelled run
    /// returns `Ok(TranscodeOutcome::Cancelled)`; every other failure is an
    /// error. Unless `keep_partial_output` is set, an unfinished output file
    /// is removed.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        params: &TranscodeParams,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(f64),
    ) -> Result<TranscodeOutcome> {
        tracing::info!(input = ?input, output = ?output, "transcode starting");
        match self.transcode(input, output, params, cancel, progress) {
            Ok(stats) => {
                tracing::info!(
                    output = ?output,
                    video_frames = stats.video_frames,
                    audio_samples = stats.audio_samples,
                    packets = stats.packets_written,
                    "transcode complete"
                );
                Ok(TranscodeOutcome::Completed(stats))
            }
            Err(TranscodeError::Cancelled) => {
                tracing::info!(output = ?output, "transcode cancelled");
                Ok(TranscodeOutcome::Cancelled)
            }
            Err(e) => {
                tracing::warn!(output = ?output, "transcode failed: {}", e);
                Err(e)
            }
        }
    }

    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        params: &TranscodeParams,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(f64),
    ) -> Result<TranscodeStats> {
        if output.exists() {
            return Err(TranscodeError::DuplicateOutput(output.to_path_buf()));
        }
        params.validate()?;
        cancel.check()?;

        let backend = self.backend;
        let probe = backend.open_input(input)?;
        let plan = select_streams(probe.as_ref(), params);
        if plan.video.is_none() && plan.audio.is_none() {
            return Err(TranscodeError::NoStreams(input.to_path_buf()));
        }

        // The extractor seeks, so each track reads through its own demuxer.
        let mut probe = Some(probe);
        let video_input = match plan.video {
            Some(_) => probe.take(),
            None => None,
        };
        let audio_input = match (plan.audio.as_ref(), probe.take()) {
            (Some(_), Some(demuxer)) => Some(demuxer),
            (Some(_), None) => Some(backend.open_input(input)?),
            (None, _) => None,
        };

        let video_spec = plan
            .video
            .as_ref()
            .map(|stream| build_video_spec(stream, params))
            .transpose()?;
        let audio_spec = plan
            .audio
            .as_ref()
            .map(|stream| build_audio_spec(stream, params));

        let video_decoder = match plan.video.as_ref() {
            Some(stream) => Some(backend.open_video_decoder(stream, params.threads.decode)?),
            None => None,
        };
        let audio_decoder = match plan.audio.as_ref() {
            Some(stream) => Some(backend.open_audio_decoder(stream, params.threads.decode)?),
            None => None,
        };
        cancel.check()?;

        // Declared before the writer so the file is removed after the muxer closes.
        let guard = PartialOutput::new(output, self.options.keep_partial_output);
        let mut writer = PacketWriter::new(backend.open_output(output, params.container)?);
        let global_header = writer.needs_global_header();

        let mut video = match (plan.video, video_spec, video_input, video_decoder) {
            (Some(stream), Some(spec), Some(demuxer), Some(decoder)) => {
                let (encoder, info) = backend.open_video_encoder(&spec, global_header)?;
                check_time_base(&info, "video")?;
                let out_stream = writer.add_stream(&info.parameters, info.time_base)?;
                let total = frame_count(&stream, plan.container_secs, spec.frame_rate);
                tracing::debug!(
                    encoder = spec.encoder_name,
                    size = %format!("{}x{}", spec.width, spec.height),
                    pixel_format = %spec.pixel_format,
                    fps = %spec.frame_rate,
                    frames = total,
                    "video track configured"
                );
                let target = VideoShape {
                    width: spec.width,
                    height: spec.height,
                    format: spec.pixel_format,
                };
                let extractor = FrameExtractor::new(
                    demuxer,
                    stream,
                    decoder,
                    self.options.seek_threshold_secs,
                );
                Some(VideoTrack::new(
                    extractor,
                    VideoScaler::new(target),
                    CodecAdapter::new(encoder),
                    spec.frame_rate,
                    info.time_base,
                    total,
                    out_stream,
                ))
            }
            _ => None,
        };

        let mut audio = match (plan.audio, audio_spec, audio_input, audio_decoder) {
            (Some(stream), Some(spec), Some(demuxer), Some(decoder)) => {
                let (encoder, info) = backend.open_audio_encoder(&spec, global_header)?;
                check_time_base(&info, "audio")?;
                let out_stream = writer.add_stream(&info.parameters, info.time_base)?;
                let target = AudioFormat {
                    sample_format: spec.sample_format,
                    layout: spec.layout,
                    rate: spec.sample_rate,
                };
                tracing::debug!(
                    encoder = spec.encoder_name,
                    target = %target,
                    frame_size = ?info.frame_size,
                    "audio track configured"
                );
                let duration = stream.duration_secs().or(plan.container_secs);
                Some(AudioTrack::new(
                    demuxer,
                    stream.index,
                    CodecAdapter::new(decoder),
                    AudioResampler::new(target, info.frame_size),
                    CodecAdapter::new(encoder),
                    info.time_base,
                    out_stream,
                    duration,
                ))
            }
            _ => None,
        };

        writer.write_header()?;

        let quantum = if self.options.round_quantum_secs > 0.0 {
            self.options.round_quantum_secs
        } else {
            TranscodeOptions::default().round_quantum_secs
        };
        let pause = Duration::from_millis(self.options.round_pause_ms);
        let mut ceiling = 0.0;
        let mut rounds = 0u64;

        loop {
            cancel.check()?;
            let video_done = video.as_ref().map_or(true, |v| v.is_exhausted());
            let audio_done = audio.as_ref().map_or(true, |a| a.is_exhausted());
            if video_done && audio_done {
                break;
            }

            if let Some(track) = video.as_mut().filter(|v| !v.is_exhausted()) {
                track.run_until(ceiling, &mut writer, backend, cancel)?;
            }
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
            if let Some(track) = audio.as_mut().filter(|a| !a.is_exhausted()) {
                track.run_until(ceiling, &mut writer, backend, cancel)?;
            }

            progress(overall_progress(video.as_ref(), audio.as_ref()));
            ceiling += quantum;
            rounds += 1;
        }
        tracing::debug!(rounds, ceiling, "interleave finished");

        let mut stats = TranscodeStats::default();
        if let Some(track) = video.as_mut() {
            if track.frames_produced() == 0 {
                return Err(TranscodeError::Seek(
                    "no video frame could be produced".into(),
                ));
            }
            track.finish(&mut writer, cancel)?;
            stats.video_frames = track.frames_produced();
        }
        if let Some(track) = audio.as_mut() {
            track.finish(&mut writer, backend, cancel)?;
            stats.audio_samples = track.samples_emitted();
        }
        cancel.check()?;

        writer.write_trailer()?;
        stats.packets_written = writer.packets_written();
        drop(writer);
        guard.commit();
        progress(1.0);
        Ok(stats)
    }
}

/// Pick the source streams the job will read.
fn select_streams(demuxer: &dyn Demuxer, params: &TranscodeParams) -> SourcePlan {
    let find = |kind: MediaKind| {
        demuxer
            .best_stream(kind)
            .and_then(|index| demuxer.streams().iter().find(|s| s.index == index))
            .cloned()
    };

    let video = if params.video.enabled {
        let stream = find(MediaKind::Video);
        if stream.is_none() {
            tracing::info!("source has no video stream, skipping video");
        }
        stream
    } else {
        None
    };
    let audio = if params.audio.enabled {
        let stream = find(MediaKind::Audio);
        if stream.is_none() {
            tracing::info!("source has no audio stream, skipping audio");
        }
        stream
    } else {
        None
    };

    SourcePlan {
        video,
        audio,
        container_secs: demuxer.duration_secs(),
    }
}

/// Resolve "keep source" settings and build the video encoder config.
fn build_video_spec(stream: &StreamInfo, params: &TranscodeParams) -> Result<VideoEncoderSpec> {
    let vp = &params.video;
    let (width, height) = if vp.width > 0 && vp.height > 0 {
        (vp.width, vp.height)
    } else {
        (stream.params.width, stream.params.height)
    };
    if width == 0 || height == 0 {
        return Err(TranscodeError::Config(format!(
            "cannot determine output size for stream {}",
            stream.index
        )));
    }
    let pixel_format = vp
        .pixel_format
        .or(stream.params.pixel_format)
        .unwrap_or(PixelFormat::Yuv420p);
    let frame_rate = Rational::approximate(vp.fps, FPS_MAX_DEN)
        .ok_or_else(|| TranscodeError::Config(format!("invalid frame rate {}", vp.fps)))?;

    let request = VideoRequest {
        width,
        height,
        pixel_format,
        frame_rate,
        crf: vp.crf,
        threads: params.threads.encode,
    };
    Ok(video_encoder_spec(vp.codec, &request))
}

/// Resolve "keep source" settings and build the audio encoder config.
fn build_audio_spec(stream: &StreamInfo, params: &TranscodeParams) -> AudioEncoderSpec {
    let ap = &params.audio;
    let layout = ap
        .channel_layout
        .or(stream.params.layout)
        .unwrap_or(ChannelLayout::STEREO);
    let sample_rate = ap
        .sample_rate
        .or(Some(stream.params.sample_rate).filter(|r| *r > 0))
        .unwrap_or(48_000);
    let request = AudioRequest {
        sample_rate,
        layout,
        source_format: stream.params.sample_format,
        threads: params.threads.encode,
    };
    audio_encoder_spec(ap.codec, &request)
}

fn check_time_base(info: &EncoderInfo, kind: &str) -> Result<()> {
    if !info.time_base.is_positive() {
        return Err(CodecError::Open(format!(
            "{} encoder reported invalid time base {}",
            kind, info.time_base
        ))
        .into());
    }
    Ok(())
}

/// Slowest enabled track; audio with an unknown length does not count.
fn overall_progress(video: Option<&VideoTrack>, audio: Option<&AudioTrack>) -> f64 {
    let parts = [
        video.map(|v| v.progress()),
        audio.and_then(|a| a.progress()),
    ];
    parts
        .iter()
        .flatten()
        .copied()
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.min(p))))
        .unwrap_or(0.0)
}
