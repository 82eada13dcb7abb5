//! Picture scaling and pixel-format conversion

use crate::error::{CodecError, Result};
use crate::media::{MediaBackend, VideoFrame, VideoShape};

/// Backend picture converter. Stateless per frame: one picture in, one out.
pub trait FrameScaler: Send {
    fn scale(&mut self, frame: &VideoFrame) -> std::result::Result<VideoFrame, CodecError>;
}

/// Converts decoded pictures to the encoder's size and pixel format.
///
/// Pictures already in the target shape pass through untouched. The backend
/// scaler is opened on the first picture that needs it and reopened if the
/// source shape changes.
pub struct VideoScaler {
    target: VideoShape,
    active: Option<(VideoShape, Box<dyn FrameScaler>)>,
}

impl VideoScaler {
    pub fn new(target: VideoShape) -> Self {
        Self {
            target,
            active: None,
        }
    }

    pub fn target(&self) -> VideoShape {
        self.target
    }

    pub fn scale(&mut self, frame: &VideoFrame, backend: &dyn MediaBackend) -> Result<VideoFrame> {
        let shape = frame.shape();
        if shape == self.target {
            return Ok(frame.clone());
        }

        let reopen = match &self.active {
            Some((from, _)) => *from != shape,
            None => true,
        };
        if reopen {
            tracing::debug!(
                from = ?shape,
                to = ?self.target,
                "opening scaler"
            );
            let scaler = backend.open_scaler(shape, self.target)?;
            self.active = Some((shape, scaler));
        }

        let (_, scaler) = self
            .active
            .as_mut()
            .ok_or_else(|| CodecError::Scale("scaler not available".into()))?;
        let mut out = scaler.scale(frame)?;
        if out.shape() != self.target {
            return Err(CodecError::Scale(format!(
                "scaler produced {:?}, expected {:?}",
                out.shape(),
                self.target
            ))
            .into());
        }
        out.pts = frame.pts;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PixelFormat;
    use crate::tests::fixtures::MockBackend;

    fn shape(width: u32, height: u32, format: PixelFormat) -> VideoShape {
        VideoShape {
            width,
            height,
            format,
        }
    }

    #[test]
    fn test_matching_frame_passes_through() {
        let backend = MockBackend::new();
        let mut scaler = VideoScaler::new(shape(16, 16, PixelFormat::Yuv420p));
        let mut frame = VideoFrame::blank(16, 16, PixelFormat::Yuv420p);
        frame.pts = Some(3);
        let out = scaler.scale(&frame, &backend).unwrap();
        assert_eq!(out.pts, Some(3));
        assert_eq!(backend.stats().scalers(), 0);
    }

    #[test]
    fn test_scaler_reused_until_shape_changes() {
        let backend = MockBackend::new();
        let target = shape(8, 8, PixelFormat::Yuv420p);
        let mut scaler = VideoScaler::new(target);

        for pts in 0..3 {
            let mut frame = VideoFrame::blank(32, 16, PixelFormat::Yuv420p);
            frame.pts = Some(pts);
            let out = scaler.scale(&frame, &backend).unwrap();
            assert_eq!(out.shape(), target);
            assert_eq!(out.pts, Some(pts));
        }
        assert_eq!(backend.stats().scalers(), 1);

        let frame = VideoFrame::blank(32, 16, PixelFormat::Rgb24);
        scaler.scale(&frame, &backend).unwrap();
        assert_eq!(backend.stats().scalers(), 2);
    }
}
