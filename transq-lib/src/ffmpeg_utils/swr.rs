//! Sample conversion through libswresample

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;

use crate::error::CodecError;
use crate::media::{AudioFormat, AudioFrame};
use crate::transform::SampleConverter;

use super::convert;

/// Converter wrapping FFmpeg's `SwrContext`
pub struct SwrConverter {
    context: resampling::Context,
    from: AudioFormat,
    to: AudioFormat,
}

// SAFETY: the SwrContext is owned exclusively and only used through `&mut self`.
unsafe impl Send for SwrConverter {}

impl SwrConverter {
    pub fn new(from: AudioFormat, to: AudioFormat) -> Result<Self, CodecError> {
        let context = resampling::Context::get(
            convert::sample_to(from.sample_format),
            convert::layout_to(from.layout),
            from.rate,
            convert::sample_to(to.sample_format),
            convert::layout_to(to.layout),
            to.rate,
        )
        .map_err(|e| {
            CodecError::Resample(format!(
                "Failed to create resampling context {} -> {}: {}",
                from, to, e
            ))
        })?;
        Ok(Self { context, from, to })
    }

    fn output(&self, out: &ffmpeg::frame::Audio) -> Result<Option<AudioFrame>, CodecError> {
        if out.samples() == 0 {
            return Ok(None);
        }
        let mut frame = convert::audio_frame_from(out)?;
        frame.layout = self.to.layout;
        frame.rate = self.to.rate;
        frame.pts = None;
        Ok(Some(frame))
    }
}

impl SampleConverter for SwrConverter {
    fn convert(&mut self, frame: &AudioFrame) -> Result<Option<AudioFrame>, CodecError> {
        if frame.audio_format() != self.from {
            return Err(CodecError::Resample(format!(
                "converter expects {}, got {}",
                self.from,
                frame.audio_format()
            )));
        }
        let input = convert::audio_frame_to(frame);
        // swr_convert_frame allocates the output buffer from the context
        // configuration; the output frame must start out empty.
        let mut out = ffmpeg::frame::Audio::empty();
        self.context
            .run(&input, &mut out)
            .map_err(|e| CodecError::Resample(format!("Resampling error: {}", e)))?;
        self.output(&out)
    }

    fn flush(&mut self) -> Result<Option<AudioFrame>, CodecError> {
        let mut out = ffmpeg::frame::Audio::empty();
        match self.context.flush(&mut out) {
            Ok(_) => self.output(&out),
            Err(e) => {
                // Passthrough contexts have nothing buffered and report an error
                tracing::debug!("Resampler flush returned non-fatal error: {}", e);
                Ok(None)
            }
        }
    }
}
