//! [`MediaBackend`] implemented on top of the FFmpeg libraries

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::codec::params::{AudioEncoderSpec, ContainerFormat, EncoderInfo, VideoEncoderSpec};
use crate::error::{CodecError, Result};
use crate::media::{
    AudioDecoder, AudioEncoder, AudioFormat, Demuxer, MediaBackend, MediaKind, Muxer, StreamInfo,
    VideoDecoder, VideoEncoder, VideoShape,
};
use crate::transform::{FrameScaler, SampleConverter};

use super::codec::Session;
use super::convert;
use super::helpers;
use super::input::FfmpegDemuxer;
use super::output::FfmpegMuxer;
use super::swr::SwrConverter;
use super::sws::SwsScaler;

/// Opens everything through libavformat / libavcodec.
///
/// Call [`crate::ffmpeg_utils::init`] once before using it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }

    /// Whether this FFmpeg build has an encoder called `name`.
    pub fn has_encoder(name: &str) -> bool {
        ffmpeg::encoder::find_by_name(name).is_some()
    }

    fn decoder_context(stream: &StreamInfo, threads: usize) -> Result<ffmpeg::codec::Context> {
        let params = convert::codec_parameters_to(&stream.params, stream.kind)
            .map_err(CodecError::DecoderNotFound)?;
        let mut context = ffmpeg::codec::Context::from_parameters(params).map_err(|e| {
            CodecError::DecoderNotFound(format!(
                "Failed to create codec context for stream {}: {}",
                stream.index, e
            ))
        })?;
        helpers::set_thread_count(&mut context, threads);
        helpers::set_packet_time_base(&mut context, convert::rational_to(stream.time_base));
        Ok(context)
    }

    fn find_encoder(name: &str) -> Result<ffmpeg::Codec> {
        ffmpeg::encoder::find_by_name(name)
            .ok_or_else(|| CodecError::EncoderNotFound(format!("{} (not in this FFmpeg build)", name)).into())
    }

    fn encoder_options(options: &[(&'static str, String)]) -> ffmpeg::Dictionary<'static> {
        let mut dict = ffmpeg::Dictionary::new();
        for (key, value) in options {
            dict.set(key, value);
        }
        dict
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_input(&self, path: &Path) -> Result<Box<dyn Demuxer>> {
        Ok(Box::new(FfmpegDemuxer::open(path)?))
    }

    fn open_output(&self, path: &Path, container: ContainerFormat) -> Result<Box<dyn Muxer>> {
        Ok(Box::new(FfmpegMuxer::create(path, container)?))
    }

    fn open_video_decoder(&self, stream: &StreamInfo, threads: usize) -> Result<VideoDecoder> {
        if stream.kind != MediaKind::Video {
            return Err(CodecError::DecoderNotFound(format!("stream {} is not video", stream.index)).into());
        }
        let decoder = Self::decoder_context(stream, threads)?
            .decoder()
            .video()
            .map_err(|e| {
                CodecError::DecoderNotFound(format!(
                    "Failed to open video decoder for stream {}: {}",
                    stream.index, e
                ))
            })?;
        let label = format!("{} decoder", stream.params.codec_name);
        Ok(Box::new(Session::new(decoder, label)))
    }

    fn open_audio_decoder(&self, stream: &StreamInfo, threads: usize) -> Result<AudioDecoder> {
        if stream.kind != MediaKind::Audio {
            return Err(CodecError::DecoderNotFound(format!("stream {} is not audio", stream.index)).into());
        }
        let decoder = Self::decoder_context(stream, threads)?
            .decoder()
            .audio()
            .map_err(|e| {
                CodecError::DecoderNotFound(format!(
                    "Failed to open audio decoder for stream {}: {}",
                    stream.index, e
                ))
            })?;
        let label = format!("{} decoder", stream.params.codec_name);
        Ok(Box::new(Session::new(decoder, label)))
    }

    fn open_video_encoder(
        &self,
        spec: &VideoEncoderSpec,
        global_header: bool,
    ) -> Result<(VideoEncoder, EncoderInfo)> {
        let codec = Self::find_encoder(spec.encoder_name)?;

        // Build and configure the context BEFORE opening
        let mut context = ffmpeg::codec::Context::new_with_codec(codec);
        helpers::set_thread_count(&mut context, spec.threads);
        if global_header {
            helpers::set_global_header(&mut context);
        }
        if let Some(q) = spec.qscale {
            helpers::set_qscale(&mut context, q);
        }

        let mut video_enc = context.encoder().video().map_err(|e| {
            CodecError::Open(format!("Cannot get video encoder handle: {}", e))
        })?;
        video_enc.set_width(spec.width);
        video_enc.set_height(spec.height);
        video_enc.set_format(convert::pixel_to(spec.pixel_format));
        video_enc.set_time_base(convert::rational_to(spec.time_base));
        video_enc.set_frame_rate(Some(convert::rational_to(spec.frame_rate)));
        if let Some(bit_rate) = spec.bit_rate {
            video_enc.set_bit_rate(bit_rate as usize);
        }

        let encoder = video_enc
            .open_as_with(codec, Self::encoder_options(&spec.options))
            .map_err(|e| CodecError::Open(format!("Failed to open {}: {}", spec.encoder_name, e)))?;

        let params = helpers::encoder_codec_parameters(&encoder).map_err(CodecError::Open)?;
        let info = EncoderInfo {
            time_base: spec.time_base,
            frame_size: None,
            parameters: convert::codec_parameters_from(&params),
        };

        tracing::debug!(
            encoder = spec.encoder_name,
            width = spec.width,
            height = spec.height,
            pixel_format = %spec.pixel_format,
            "opened video encoder"
        );

        let label = format!("{} encoder", spec.encoder_name);
        Ok((Box::new(Session::new(encoder, label)), info))
    }

    fn open_audio_encoder(
        &self,
        spec: &AudioEncoderSpec,
        global_header: bool,
    ) -> Result<(AudioEncoder, EncoderInfo)> {
        let codec = Self::find_encoder(spec.encoder_name)?;

        let mut context = ffmpeg::codec::Context::new_with_codec(codec);
        helpers::set_thread_count(&mut context, spec.threads);
        if global_header {
            helpers::set_global_header(&mut context);
        }

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            CodecError::Open(format!("Cannot get audio encoder handle: {}", e))
        })?;
        audio_enc.set_rate(spec.sample_rate as i32);
        audio_enc.set_format(convert::sample_to(spec.sample_format));
        audio_enc.set_channel_layout(convert::layout_to(spec.layout));
        audio_enc.set_time_base(convert::rational_to(spec.time_base));
        if let Some(bit_rate) = spec.bit_rate {
            audio_enc.set_bit_rate(bit_rate as usize);
        }

        let encoder = audio_enc
            .open_as_with(codec, Self::encoder_options(&spec.options))
            .map_err(|e| CodecError::Open(format!("Failed to open {}: {}", spec.encoder_name, e)))?;

        let frame_size = helpers::codec_frame_size(&encoder);
        let params = helpers::encoder_codec_parameters(&encoder).map_err(CodecError::Open)?;
        let info = EncoderInfo {
            time_base: spec.time_base,
            frame_size: (frame_size > 0).then_some(frame_size),
            parameters: convert::codec_parameters_from(&params),
        };

        tracing::debug!(
            encoder = spec.encoder_name,
            sample_rate = spec.sample_rate,
            layout = %spec.layout,
            frame_size,
            "opened audio encoder"
        );

        let label = format!("{} encoder", spec.encoder_name);
        Ok((Box::new(Session::new(encoder, label)), info))
    }

    fn open_resampler(
        &self,
        from: AudioFormat,
        to: AudioFormat,
    ) -> Result<Box<dyn SampleConverter>> {
        Ok(Box::new(SwrConverter::new(from, to)?))
    }

    fn open_scaler(&self, from: VideoShape, to: VideoShape) -> Result<Box<dyn FrameScaler>> {
        Ok(Box::new(SwsScaler::new(from, to)?))
    }
}
