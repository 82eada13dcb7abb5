//! Picture conversion through libswscale

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::scaling;

use crate::error::CodecError;
use crate::media::{VideoFrame, VideoShape};
use crate::transform::FrameScaler;

use super::convert;

/// Scaler wrapping FFmpeg's `SwsContext`
pub struct SwsScaler {
    context: scaling::Context,
}

// SAFETY: the SwsContext is owned exclusively and only used through `&mut self`.
unsafe impl Send for SwsScaler {}

impl SwsScaler {
    pub fn new(from: VideoShape, to: VideoShape) -> Result<Self, CodecError> {
        let context = scaling::Context::get(
            convert::pixel_to(from.format),
            from.width,
            from.height,
            convert::pixel_to(to.format),
            to.width,
            to.height,
            scaling::Flags::BICUBIC,
        )
        .map_err(|e| {
            CodecError::Scale(format!(
                "Failed to create scaling context {}x{} {} -> {}x{} {}: {}",
                from.width, from.height, from.format, to.width, to.height, to.format, e
            ))
        })?;
        Ok(Self { context })
    }
}

impl FrameScaler for SwsScaler {
    fn scale(&mut self, frame: &VideoFrame) -> Result<VideoFrame, CodecError> {
        let input = convert::video_frame_to(frame);
        let mut out = ffmpeg::frame::Video::empty();
        self.context
            .run(&input, &mut out)
            .map_err(|e| CodecError::Scale(format!("scale video frame: {}", e)))?;
        let mut scaled = convert::video_frame_from(&out)?;
        scaled.pts = frame.pts;
        Ok(scaled)
    }
}
