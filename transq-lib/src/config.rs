//! Per-job transcode configuration

use serde::{Deserialize, Serialize};

use crate::codec::params::{AudioCodec, ContainerFormat, VideoCodec};
use crate::error::{Result, TranscodeError};
use crate::media::{ChannelLayout, PixelFormat};

/// Highest accepted decode/encode thread count
pub const MAX_THREADS: usize = 10;

/// Highest accepted output frame rate
pub const MAX_FPS: f64 = 1000.0;

/// Video output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoParams {
    /// Produce a video track
    pub enabled: bool,

    pub codec: VideoCodec,

    /// Output pixel format; `None` keeps the source format
    pub pixel_format: Option<PixelFormat>,

    /// Output width, 0 keeps the source width
    pub width: u32,

    /// Output height, 0 keeps the source height
    pub height: u32,

    /// Constant output frame rate
    pub fps: f64,

    /// Constant rate factor, 0 (best) to 51
    pub crf: u8,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            enabled: true,
            codec: VideoCodec::H264,
            pixel_format: Some(PixelFormat::Yuv420p),
            width: 0,
            height: 0,
            fps: 30.0,
            crf: 18,
        }
    }
}

/// Audio output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioParams {
    /// Produce an audio track (when the source has one)
    pub enabled: bool,

    pub codec: AudioCodec,

    /// Output channel layout; `None` keeps the source layout
    pub channel_layout: Option<ChannelLayout>,

    /// Output sample rate; `None` keeps the source rate
    pub sample_rate: Option<u32>,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            enabled: true,
            codec: AudioCodec::Aac,
            channel_layout: None,
            sample_rate: None,
        }
    }
}

/// Codec threading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadParams {
    pub decode: usize,
    pub encode: usize,
}

impl Default for ThreadParams {
    fn default() -> Self {
        Self {
            decode: 4,
            encode: 4,
        }
    }
}

/// Everything a job needs to know about its output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeParams {
    pub container: ContainerFormat,
    pub video: VideoParams,
    pub audio: AudioParams,
    pub threads: ThreadParams,
}

impl TranscodeParams {
    /// Reject settings no encoder could honour.
    pub fn validate(&self) -> Result<()> {
        if !self.video.enabled && !self.audio.enabled {
            return Err(TranscodeError::Config(
                "both video and audio are disabled".into(),
            ));
        }

        if self.video.enabled {
            let fps = self.video.fps;
            if !fps.is_finite() || fps <= 0.0 || fps > MAX_FPS {
                return Err(TranscodeError::Config(format!(
                    "frame rate {} out of range (0, {}]",
                    fps, MAX_FPS
                )));
            }
            if self.video.crf > 51 {
                return Err(TranscodeError::Config(format!(
                    "crf {} out of range 0..=51",
                    self.video.crf
                )));
            }
            if (self.video.width == 0) != (self.video.height == 0) {
                return Err(TranscodeError::Config(
                    "width and height must both be set or both be 0".into(),
                ));
            }
            if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
                return Err(TranscodeError::Config(format!(
                    "output size {}x{} must be even",
                    self.video.width, self.video.height
                )));
            }
            if !self.container.supports_video(self.video.codec) {
                return Err(TranscodeError::Config(format!(
                    "{} cannot carry {} video",
                    self.container, self.video.codec
                )));
            }
        }

        if self.audio.enabled {
            if let Some(rate) = self.audio.sample_rate {
                if !(8_000..=192_000).contains(&rate) {
                    return Err(TranscodeError::Config(format!(
                        "sample rate {} out of range 8000..=192000",
                        rate
                    )));
                }
            }
            if !self.container.supports_audio(self.audio.codec) {
                return Err(TranscodeError::Config(format!(
                    "{} cannot carry {} audio",
                    self.container, self.audio.codec
                )));
            }
        }

        for (name, n) in [
            ("decode", self.threads.decode),
            ("encode", self.threads.encode),
        ] {
            if n == 0 || n > MAX_THREADS {
                return Err(TranscodeError::Config(format!(
                    "{} threads {} out of range 1..={}",
                    name, n, MAX_THREADS
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = TranscodeParams::default();
        params.validate().unwrap();
        assert_eq!(params.container, ContainerFormat::Mp4);
        assert_eq!(params.video.codec, VideoCodec::H264);
        assert_eq!(params.audio.codec, AudioCodec::Aac);
        assert!(params.audio.sample_rate.is_none());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut params = TranscodeParams::default();
        params.video.crf = 52;
        assert!(params.validate().is_err());

        let mut params = TranscodeParams::default();
        params.video.fps = f64::NAN;
        assert!(params.validate().is_err());

        let mut params = TranscodeParams::default();
        params.threads.encode = 11;
        assert!(params.validate().is_err());

        let mut params = TranscodeParams::default();
        params.video.width = 1280;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_both_tracks_disabled() {
        let mut params = TranscodeParams::default();
        params.video.enabled = false;
        params.audio.enabled = false;
        assert!(matches!(params.validate(), Err(TranscodeError::Config(_))));
    }

    #[test]
    fn test_disabled_track_is_not_checked() {
        let mut params = TranscodeParams::default();
        params.video.enabled = false;
        params.video.fps = 0.0;
        params.validate().unwrap();
    }

    #[test]
    fn test_container_compatibility() {
        let mut params = TranscodeParams::default();
        params.container = ContainerFormat::Webm;
        assert!(params.validate().is_err());
        params.video.codec = VideoCodec::Vp9;
        params.audio.codec = AudioCodec::Opus;
        params.validate().unwrap();
    }

    #[test]
    fn test_deserialize_partial_json() {
        let params: TranscodeParams =
            serde_json::from_str(r#"{"video": {"codec": "vp9", "crf": 30}, "container": "mkv"}"#)
                .unwrap();
        assert_eq!(params.video.codec, VideoCodec::Vp9);
        assert_eq!(params.video.crf, 30);
        assert_eq!(params.video.fps, 30.0);
        assert_eq!(params.container, ContainerFormat::Mkv);
        assert!(params.audio.enabled);
    }
}
