//! Decoded pictures and PCM buffers

use bytes::Bytes;

use super::format::{AudioFormat, ChannelLayout, PixelFormat, SampleFormat};

/// One plane of a picture: `data` holds `lines` rows of `stride` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub data: Bytes,
    pub stride: usize,
}

/// A decoded picture
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub pts: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub planes: Vec<Plane>,
}

impl VideoFrame {
    /// Allocate a zeroed picture with tightly packed rows.
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = (0..format.planes())
            .map(|i| {
                let (stride, lines) = format.plane_geometry(i, width, height);
                Plane {
                    data: Bytes::from(vec![0u8; stride * lines]),
                    stride,
                }
            })
            .collect();
        Self {
            pts: None,
            width,
            height,
            format,
            planes,
        }
    }

    pub fn shape(&self) -> VideoShape {
        VideoShape {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

/// Dimensions and pixel format of a picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoShape {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// A block of decoded PCM samples.
///
/// Planar formats carry one plane per channel, packed formats a single
/// interleaved plane. Planes hold exactly `samples` samples with no padding.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub pts: Option<i64>,
    pub format: SampleFormat,
    pub layout: ChannelLayout,
    pub rate: u32,
    pub samples: usize,
    pub planes: Vec<Bytes>,
}

impl AudioFrame {
    /// Allocate `samples` samples of silence.
    pub fn silence(format: AudioFormat, samples: usize) -> Self {
        let planes = (0..plane_count(format.sample_format, format.layout))
            .map(|_| {
                Bytes::from(vec![
                    0u8;
                    plane_bytes(format.sample_format, format.layout, samples)
                ])
            })
            .collect();
        Self {
            pts: None,
            format: format.sample_format,
            layout: format.layout,
            rate: format.rate,
            samples,
            planes,
        }
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::new(self.format, self.layout, self.rate)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.rate == 0 {
            return 0.0;
        }
        self.samples as f64 / self.rate as f64
    }
}

/// Number of data planes for a PCM layout.
pub fn plane_count(format: SampleFormat, layout: ChannelLayout) -> usize {
    if format.is_planar() {
        layout.channels as usize
    } else {
        1
    }
}

/// Bytes per plane for `samples` samples.
pub fn plane_bytes(format: SampleFormat, layout: ChannelLayout, samples: usize) -> usize {
    let per_sample = if format.is_planar() {
        format.bytes_per_sample()
    } else {
        format.bytes_per_sample() * layout.channels as usize
    };
    per_sample * samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_video_frame_planes() {
        let frame = VideoFrame::blank(16, 8, PixelFormat::Yuv420p);
        assert_eq!(frame.planes.len(), 3);
        assert_eq!(frame.planes[0].data.len(), 128);
        assert_eq!(frame.planes[1].data.len(), 32);
        assert_eq!(frame.planes[2].stride, 8);
    }

    #[test]
    fn test_silence_layouts() {
        let planar = AudioFrame::silence(
            AudioFormat::new(SampleFormat::Fltp, ChannelLayout::STEREO, 48000),
            1024,
        );
        assert_eq!(planar.planes.len(), 2);
        assert_eq!(planar.planes[0].len(), 4096);

        let packed = AudioFrame::silence(
            AudioFormat::new(SampleFormat::S16, ChannelLayout::STEREO, 44100),
            441,
        );
        assert_eq!(packed.planes.len(), 1);
        assert_eq!(packed.planes[0].len(), 441 * 4);
        assert!((packed.duration_secs() - 0.01).abs() < 1e-9);
    }
}
