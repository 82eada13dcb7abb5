//! Stream descriptors

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::format::{ChannelLayout, PixelFormat, SampleFormat};
use super::rational::Rational;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Other,
}

/// Codec configuration of a stream, as probed from a source or produced by
/// an opened encoder.
#[derive(Debug, Clone, Default)]
pub struct CodecParameters {
    /// Short codec name (`h264`, `aac`, ...)
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: Option<PixelFormat>,
    pub sample_format: Option<SampleFormat>,
    pub sample_rate: u32,
    pub layout: Option<ChannelLayout>,
    /// Samples per audio frame, when fixed
    pub frame_size: Option<usize>,
    pub bit_rate: u64,
    pub profile: Option<i32>,
    /// Bytes per coded audio block (PCM/ADPCM style codecs)
    pub block_align: u32,
    pub bits_per_coded_sample: u32,
    /// Codec-private setup data (SPS/PPS, AudioSpecificConfig, ...)
    pub extradata: Bytes,
}

/// Immutable description of one source or output stream
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: MediaKind,
    pub params: CodecParameters,
    pub time_base: Rational,
    /// Duration in `time_base` units
    pub duration: Option<i64>,
    /// First timestamp in `time_base` units
    pub start_time: Option<i64>,
    pub avg_frame_rate: Option<Rational>,
}

impl StreamInfo {
    /// Stream start, treating unknown as zero.
    pub fn start_ts(&self) -> i64 {
        self.start_time.unwrap_or(0)
    }

    /// Duration in seconds when known and positive.
    pub fn duration_secs(&self) -> Option<f64> {
        let d = self.duration?;
        if d <= 0 || !self.time_base.is_positive() {
            return None;
        }
        Some(d as f64 * self.time_base.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_stream(duration: Option<i64>) -> StreamInfo {
        StreamInfo {
            index: 0,
            kind: MediaKind::Video,
            params: CodecParameters {
                codec_name: "h264".into(),
                width: 1920,
                height: 1080,
                pixel_format: Some(PixelFormat::Yuv420p),
                ..Default::default()
            },
            time_base: Rational::new(1, 12800),
            duration,
            start_time: None,
            avg_frame_rate: Some(Rational::new(25, 1)),
        }
    }

    #[test]
    fn test_duration_secs() {
        assert_eq!(video_stream(Some(128000)).duration_secs(), Some(10.0));
        assert_eq!(video_stream(Some(0)).duration_secs(), None);
        assert_eq!(video_stream(None).duration_secs(), None);
        assert_eq!(video_stream(None).start_ts(), 0);
    }
}
