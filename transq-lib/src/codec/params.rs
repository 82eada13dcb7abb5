//! Encoder parameter selection
//!
//! Maps the user-facing codec choice to a concrete encoder configuration.
//! Each codec has one builder function in a lookup table; the builders pick
//! the encoder, a supported pixel/sample format and the quality options.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::media::{ChannelLayout, CodecParameters, PixelFormat, Rational, SampleFormat};

/// Output video codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
    Vp8,
    Vp9,
    Mjpeg,
    Png,
    Prores,
}

impl VideoCodec {
    pub const ALL: &'static [VideoCodec] = &[
        VideoCodec::H264,
        VideoCodec::H265,
        VideoCodec::Vp8,
        VideoCodec::Vp9,
        VideoCodec::Mjpeg,
        VideoCodec::Png,
        VideoCodec::Prores,
    ];

    /// Human-readable name, as shown in generated file names
    pub fn display_name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "H.264",
            VideoCodec::H265 => "H.265",
            VideoCodec::Vp8 => "VP8",
            VideoCodec::Vp9 => "VP9",
            VideoCodec::Mjpeg => "MJPEG",
            VideoCodec::Png => "PNG",
            VideoCodec::Prores => "ProRes",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "h.264" | "avc" => Ok(VideoCodec::H264),
            "h265" | "h.265" | "hevc" => Ok(VideoCodec::H265),
            "vp8" => Ok(VideoCodec::Vp8),
            "vp9" => Ok(VideoCodec::Vp9),
            "mjpeg" => Ok(VideoCodec::Mjpeg),
            "png" => Ok(VideoCodec::Png),
            "prores" => Ok(VideoCodec::Prores),
            _ => Err(format!("unknown video codec '{}'", s)),
        }
    }
}

/// Output audio codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Opus,
    Mp3,
    Flac,
    #[serde(rename = "pcm_s16le")]
    Pcm16le,
    #[serde(rename = "pcm_s32le")]
    Pcm32le,
}

impl AudioCodec {
    pub const ALL: &'static [AudioCodec] = &[
        AudioCodec::Aac,
        AudioCodec::Opus,
        AudioCodec::Mp3,
        AudioCodec::Flac,
        AudioCodec::Pcm16le,
        AudioCodec::Pcm32le,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "AAC",
            AudioCodec::Opus => "Opus",
            AudioCodec::Mp3 => "MP3",
            AudioCodec::Flac => "FLAC",
            AudioCodec::Pcm16le => "PCM_S16LE",
            AudioCodec::Pcm32le => "PCM_S32LE",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AudioCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aac" => Ok(AudioCodec::Aac),
            "opus" => Ok(AudioCodec::Opus),
            "mp3" => Ok(AudioCodec::Mp3),
            "flac" => Ok(AudioCodec::Flac),
            "pcm_s16le" | "pcm16le" => Ok(AudioCodec::Pcm16le),
            "pcm_s32le" | "pcm32le" => Ok(AudioCodec::Pcm32le),
            _ => Err(format!("unknown audio codec '{}'", s)),
        }
    }
}

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Mov,
    Mkv,
    Avi,
    Webm,
}

impl ContainerFormat {
    /// File name suffix
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Mkv => "mkv",
            ContainerFormat::Avi => "avi",
            ContainerFormat::Webm => "webm",
        }
    }

    /// FFmpeg muxer short name
    pub fn muxer_name(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mov => "mov",
            ContainerFormat::Mkv => "matroska",
            ContainerFormat::Avi => "avi",
            ContainerFormat::Webm => "webm",
        }
    }

    pub fn supports_video(&self, codec: VideoCodec) -> bool {
        use VideoCodec::*;
        match self {
            ContainerFormat::Mp4 => matches!(codec, H264 | H265 | Vp9 | Mjpeg | Png),
            ContainerFormat::Mov => matches!(codec, H264 | H265 | Mjpeg | Png | Prores),
            ContainerFormat::Mkv => true,
            ContainerFormat::Avi => matches!(codec, H264 | H265 | Mjpeg | Png),
            ContainerFormat::Webm => matches!(codec, Vp8 | Vp9),
        }
    }

    pub fn supports_audio(&self, codec: AudioCodec) -> bool {
        use AudioCodec::*;
        match self {
            ContainerFormat::Mp4 => matches!(codec, Aac | Opus | Mp3 | Flac),
            ContainerFormat::Mov => matches!(codec, Aac | Mp3 | Pcm16le | Pcm32le),
            ContainerFormat::Mkv => true,
            ContainerFormat::Avi => matches!(codec, Aac | Mp3 | Pcm16le | Pcm32le),
            ContainerFormat::Webm => matches!(codec, Opus),
        }
    }
}

impl Default for ContainerFormat {
    fn default() -> Self {
        ContainerFormat::Mp4
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ContainerFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp4" => Ok(ContainerFormat::Mp4),
            "mov" => Ok(ContainerFormat::Mov),
            "mkv" | "matroska" => Ok(ContainerFormat::Mkv),
            "avi" => Ok(ContainerFormat::Avi),
            "webm" => Ok(ContainerFormat::Webm),
            _ => Err(format!("unknown container format '{}'", s)),
        }
    }
}

/// Resolved video settings an encoder is built from
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub width: u32,
    pub height: u32,
    /// Requested format; the builder falls back when the encoder cannot take it
    pub pixel_format: PixelFormat,
    pub frame_rate: Rational,
    pub crf: u8,
    pub threads: usize,
}

/// Everything needed to open a video encoder
#[derive(Debug, Clone)]
pub struct VideoEncoderSpec {
    pub codec: VideoCodec,
    pub encoder_name: &'static str,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// One tick per output frame
    pub time_base: Rational,
    pub frame_rate: Rational,
    pub bit_rate: Option<u64>,
    /// Fixed quantizer scale (`-q:v`), for encoders without CRF
    pub qscale: Option<i32>,
    pub options: Vec<(&'static str, String)>,
    pub threads: usize,
}

/// Resolved audio settings an encoder is built from
#[derive(Debug, Clone)]
pub struct AudioRequest {
    pub sample_rate: u32,
    pub layout: ChannelLayout,
    /// Decoded sample format, used to avoid a conversion when the encoder accepts it
    pub source_format: Option<SampleFormat>,
    pub threads: usize,
}

/// Everything needed to open an audio encoder
#[derive(Debug, Clone)]
pub struct AudioEncoderSpec {
    pub codec: AudioCodec,
    pub encoder_name: &'static str,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub layout: ChannelLayout,
    /// `1 / sample_rate`
    pub time_base: Rational,
    pub bit_rate: Option<u64>,
    pub options: Vec<(&'static str, String)>,
    pub threads: usize,
}

/// What an opened encoder reports back
#[derive(Debug, Clone)]
pub struct EncoderInfo {
    /// Time base of the packets the encoder emits
    pub time_base: Rational,
    /// Samples per input frame; `None` when the encoder takes any size
    pub frame_size: Option<usize>,
    /// Parameters for the output stream, including extradata
    pub parameters: CodecParameters,
}

type VideoBuilder = fn(&VideoRequest) -> VideoEncoderSpec;
type AudioBuilder = fn(&AudioRequest) -> AudioEncoderSpec;

const VIDEO_BUILDERS: &[(VideoCodec, VideoBuilder)] = &[
    (VideoCodec::H264, build_h264),
    (VideoCodec::H265, build_h265),
    (VideoCodec::Vp8, build_vp8),
    (VideoCodec::Vp9, build_vp9),
    (VideoCodec::Mjpeg, build_mjpeg),
    (VideoCodec::Png, build_png),
    (VideoCodec::Prores, build_prores),
];

const AUDIO_BUILDERS: &[(AudioCodec, AudioBuilder)] = &[
    (AudioCodec::Aac, build_aac),
    (AudioCodec::Opus, build_opus),
    (AudioCodec::Mp3, build_mp3),
    (AudioCodec::Flac, build_flac),
    (AudioCodec::Pcm16le, build_pcm_s16le),
    (AudioCodec::Pcm32le, build_pcm_s32le),
];

/// Build the encoder configuration for `codec`.
pub fn video_encoder_spec(codec: VideoCodec, req: &VideoRequest) -> VideoEncoderSpec {
    let builder = VIDEO_BUILDERS
        .iter()
        .find(|(c, _)| *c == codec)
        .map(|(_, b)| *b)
        .unwrap_or(build_h264);
    builder(req)
}

/// Build the encoder configuration for `codec`.
pub fn audio_encoder_spec(codec: AudioCodec, req: &AudioRequest) -> AudioEncoderSpec {
    let builder = AUDIO_BUILDERS
        .iter()
        .find(|(c, _)| *c == codec)
        .map(|(_, b)| *b)
        .unwrap_or(build_aac);
    builder(req)
}

/// Pixel formats each video encoder accepts, preferred first.
pub fn supported_pixel_formats(codec: VideoCodec) -> &'static [PixelFormat] {
    use PixelFormat::*;
    match codec {
        VideoCodec::H264 => &[Yuv420p, Yuvj420p, Yuv422p, Yuv444p, Nv12, Yuv420p10le],
        VideoCodec::H265 => &[Yuv420p, Yuv422p, Yuv444p, Yuv420p10le, Yuv422p10le],
        VideoCodec::Vp8 => &[Yuv420p],
        VideoCodec::Vp9 => &[Yuv420p, Yuv422p, Yuv444p, Yuv420p10le],
        VideoCodec::Mjpeg => &[Yuvj420p, Yuvj422p, Yuvj444p],
        VideoCodec::Png => &[Rgb24, Rgba, Gray],
        VideoCodec::Prores => &[Yuv422p10le, Yuv444p10le],
    }
}

fn pick_pixel_format(codec: VideoCodec, requested: PixelFormat) -> PixelFormat {
    let supported = supported_pixel_formats(codec);
    if supported.contains(&requested) {
        return requested;
    }
    let fallback = supported[0];
    tracing::warn!(
        codec = %codec,
        requested = %requested,
        using = %fallback,
        "pixel format not supported by encoder, falling back"
    );
    fallback
}

fn base_video(codec: VideoCodec, encoder_name: &'static str, req: &VideoRequest) -> VideoEncoderSpec {
    VideoEncoderSpec {
        codec,
        encoder_name,
        width: req.width,
        height: req.height,
        pixel_format: pick_pixel_format(codec, req.pixel_format),
        time_base: req.frame_rate.invert(),
        frame_rate: req.frame_rate,
        bit_rate: None,
        qscale: None,
        options: Vec::new(),
        threads: req.threads,
    }
}

fn build_h264(req: &VideoRequest) -> VideoEncoderSpec {
    let mut spec = base_video(VideoCodec::H264, "libx264", req);
    spec.options.push(("crf", req.crf.to_string()));
    spec.options.push(("preset", "medium".to_string()));
    spec
}

fn build_h265(req: &VideoRequest) -> VideoEncoderSpec {
    let mut spec = base_video(VideoCodec::H265, "libx265", req);
    spec.options.push(("crf", req.crf.to_string()));
    spec.options.push(("preset", "medium".to_string()));
    spec
}

/// libvpx accepts crf in 4..=63
fn vpx_crf(crf: u8) -> String {
    crf.clamp(4, 63).to_string()
}

fn build_vp8(req: &VideoRequest) -> VideoEncoderSpec {
    let mut spec = base_video(VideoCodec::Vp8, "libvpx", req);
    // VP8 treats crf as a quality floor under a bitrate ceiling
    spec.bit_rate = Some(2_000_000);
    spec.options.push(("crf", vpx_crf(req.crf)));
    spec
}

fn build_vp9(req: &VideoRequest) -> VideoEncoderSpec {
    let mut spec = base_video(VideoCodec::Vp9, "libvpx-vp9", req);
    // bitrate 0 selects constant-quality mode
    spec.bit_rate = Some(0);
    spec.options.push(("crf", vpx_crf(req.crf)));
    spec.options.push(("row-mt", "1".to_string()));
    spec
}

/// Map crf 0..=51 onto the MJPEG quantizer range 2..=31.
pub fn mjpeg_qscale(crf: u8) -> i32 {
    2 + (crf.min(51) as i32 * 29 + 25) / 51
}

fn build_mjpeg(req: &VideoRequest) -> VideoEncoderSpec {
    let mut spec = base_video(VideoCodec::Mjpeg, "mjpeg", req);
    spec.qscale = Some(mjpeg_qscale(req.crf));
    spec
}

fn build_png(req: &VideoRequest) -> VideoEncoderSpec {
    base_video(VideoCodec::Png, "png", req)
}

fn build_prores(req: &VideoRequest) -> VideoEncoderSpec {
    let mut spec = base_video(VideoCodec::Prores, "prores_ks", req);
    let profile = if spec.pixel_format == PixelFormat::Yuv444p10le {
        "4444"
    } else {
        "standard"
    };
    spec.options.push(("profile", profile.to_string()));
    spec
}

/// Recommended lossy bitrate for a given channel count.
pub fn get_recommended_bitrate(channels: u16) -> u64 {
    match channels {
        1 => 64_000,
        2 => 128_000,
        6 => 384_000,
        8 => 512_000,
        _ => 128_000,
    }
}

/// Nearest entry of `rates` to `wanted`.
fn nearest_rate(wanted: u32, rates: &[u32]) -> u32 {
    rates
        .iter()
        .copied()
        .min_by_key(|r| (*r as i64 - wanted as i64).abs())
        .unwrap_or(wanted)
}

fn pick_sample_format(source: Option<SampleFormat>, supported: &[SampleFormat]) -> SampleFormat {
    match source {
        Some(fmt) if supported.contains(&fmt) => fmt,
        _ => supported[0],
    }
}

fn base_audio(
    codec: AudioCodec,
    encoder_name: &'static str,
    sample_format: SampleFormat,
    sample_rate: u32,
    layout: ChannelLayout,
    req: &AudioRequest,
) -> AudioEncoderSpec {
    AudioEncoderSpec {
        codec,
        encoder_name,
        sample_format,
        sample_rate,
        layout,
        time_base: Rational::new(1, sample_rate as i32),
        bit_rate: None,
        options: Vec::new(),
        threads: req.threads,
    }
}

fn build_aac(req: &AudioRequest) -> AudioEncoderSpec {
    const RATES: &[u32] = &[
        96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
    ];
    let rate = nearest_rate(req.sample_rate, RATES);
    let mut spec = base_audio(AudioCodec::Aac, "aac", SampleFormat::Fltp, rate, req.layout, req);
    spec.bit_rate = Some(get_recommended_bitrate(req.layout.channels));
    spec
}

fn build_opus(req: &AudioRequest) -> AudioEncoderSpec {
    const RATES: &[u32] = &[48000, 24000, 16000, 12000, 8000];
    let rate = nearest_rate(req.sample_rate, RATES);
    let format = pick_sample_format(req.source_format, &[SampleFormat::Flt, SampleFormat::S16]);
    // libopus only maps up to 8 channels, and mono/stereo without a mapping family
    let layout = if req.layout.channels > 8 {
        ChannelLayout::SURROUND_7_1
    } else {
        req.layout
    };
    let mut spec = base_audio(AudioCodec::Opus, "libopus", format, rate, layout, req);
    spec.bit_rate = Some(48_000 * layout.channels as u64);
    if layout.channels > 2 {
        spec.options.push(("mapping_family", "1".to_string()));
    }
    spec
}

fn build_mp3(req: &AudioRequest) -> AudioEncoderSpec {
    const RATES: &[u32] = &[48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000];
    let rate = nearest_rate(req.sample_rate, RATES);
    let format = pick_sample_format(
        req.source_format,
        &[SampleFormat::Fltp, SampleFormat::S16p, SampleFormat::S32p],
    );
    let layout = if req.layout.channels >= 2 {
        ChannelLayout::STEREO
    } else {
        ChannelLayout::MONO
    };
    let mut spec = base_audio(AudioCodec::Mp3, "libmp3lame", format, rate, layout, req);
    spec.bit_rate = Some(if layout.channels == 1 { 128_000 } else { 192_000 });
    spec
}

fn build_flac(req: &AudioRequest) -> AudioEncoderSpec {
    let format = pick_sample_format(req.source_format, &[SampleFormat::S32, SampleFormat::S16]);
    let format = match req.source_format {
        Some(SampleFormat::S16 | SampleFormat::S16p | SampleFormat::U8 | SampleFormat::U8p) => {
            SampleFormat::S16
        }
        _ => format,
    };
    base_audio(AudioCodec::Flac, "flac", format, req.sample_rate, req.layout, req)
}

fn build_pcm_s16le(req: &AudioRequest) -> AudioEncoderSpec {
    base_audio(
        AudioCodec::Pcm16le,
        "pcm_s16le",
        SampleFormat::S16,
        req.sample_rate,
        req.layout,
        req,
    )
}

fn build_pcm_s32le(req: &AudioRequest) -> AudioEncoderSpec {
    base_audio(
        AudioCodec::Pcm32le,
        "pcm_s32le",
        SampleFormat::S32,
        req.sample_rate,
        req.layout,
        req,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_req(pixel_format: PixelFormat) -> VideoRequest {
        VideoRequest {
            width: 1280,
            height: 720,
            pixel_format,
            frame_rate: Rational::new(30, 1),
            crf: 18,
            threads: 4,
        }
    }

    fn audio_req(rate: u32, layout: ChannelLayout, source: Option<SampleFormat>) -> AudioRequest {
        AudioRequest {
            sample_rate: rate,
            layout,
            source_format: source,
            threads: 1,
        }
    }

    fn option<'a>(spec: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        spec.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_every_codec_has_a_builder() {
        for codec in VideoCodec::ALL {
            assert!(VIDEO_BUILDERS.iter().any(|(c, _)| c == codec), "{codec}");
        }
        for codec in AudioCodec::ALL {
            assert!(AUDIO_BUILDERS.iter().any(|(c, _)| c == codec), "{codec}");
        }
    }

    #[test]
    fn test_h264_builder() {
        let spec = video_encoder_spec(VideoCodec::H264, &video_req(PixelFormat::Yuv420p));
        assert_eq!(spec.encoder_name, "libx264");
        assert_eq!(spec.pixel_format, PixelFormat::Yuv420p);
        assert_eq!(spec.time_base, Rational::new(1, 30));
        assert_eq!(option(&spec.options, "crf"), Some("18"));
        assert_eq!(option(&spec.options, "preset"), Some("medium"));
    }

    #[test]
    fn test_h265_builder() {
        let spec = video_encoder_spec(VideoCodec::H265, &video_req(PixelFormat::Yuv422p10le));
        assert_eq!(spec.encoder_name, "libx265");
        assert_eq!(spec.pixel_format, PixelFormat::Yuv422p10le);
        assert_eq!(option(&spec.options, "crf"), Some("18"));
    }

    #[test]
    fn test_vpx_builders() {
        let mut req = video_req(PixelFormat::Yuv444p);
        req.crf = 0;
        let vp8 = video_encoder_spec(VideoCodec::Vp8, &req);
        assert_eq!(vp8.encoder_name, "libvpx");
        assert_eq!(vp8.pixel_format, PixelFormat::Yuv420p, "vp8 is 4:2:0 only");
        assert_eq!(option(&vp8.options, "crf"), Some("4"));
        assert!(vp8.bit_rate.unwrap_or(0) > 0);

        let vp9 = video_encoder_spec(VideoCodec::Vp9, &req);
        assert_eq!(vp9.encoder_name, "libvpx-vp9");
        assert_eq!(vp9.pixel_format, PixelFormat::Yuv444p);
        assert_eq!(vp9.bit_rate, Some(0));
    }

    #[test]
    fn test_mjpeg_builder() {
        let spec = video_encoder_spec(VideoCodec::Mjpeg, &video_req(PixelFormat::Yuv420p));
        assert_eq!(spec.encoder_name, "mjpeg");
        assert_eq!(spec.pixel_format, PixelFormat::Yuvj420p);
        assert_eq!(spec.qscale, Some(mjpeg_qscale(18)));
        assert_eq!(mjpeg_qscale(0), 2);
        assert_eq!(mjpeg_qscale(51), 31);
    }

    #[test]
    fn test_png_and_prores_builders() {
        let png = video_encoder_spec(VideoCodec::Png, &video_req(PixelFormat::Rgba));
        assert_eq!(png.encoder_name, "png");
        assert_eq!(png.pixel_format, PixelFormat::Rgba);
        assert!(png.options.is_empty());

        let prores = video_encoder_spec(VideoCodec::Prores, &video_req(PixelFormat::Yuv420p));
        assert_eq!(prores.encoder_name, "prores_ks");
        assert_eq!(prores.pixel_format, PixelFormat::Yuv422p10le);
        assert_eq!(option(&prores.options, "profile"), Some("standard"));
    }

    #[test]
    fn test_ntsc_time_base() {
        let mut req = video_req(PixelFormat::Yuv420p);
        req.frame_rate = Rational::new(30000, 1001);
        let spec = video_encoder_spec(VideoCodec::H264, &req);
        assert_eq!(spec.time_base, Rational::new(1001, 30000));
    }

    #[test]
    fn test_aac_builder() {
        let spec = audio_encoder_spec(
            AudioCodec::Aac,
            &audio_req(44100, ChannelLayout::SURROUND_5_1, Some(SampleFormat::S16)),
        );
        assert_eq!(spec.encoder_name, "aac");
        assert_eq!(spec.sample_format, SampleFormat::Fltp);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bit_rate, Some(384_000));
        assert_eq!(spec.time_base, Rational::new(1, 44100));
    }

    #[test]
    fn test_opus_builder_resamples_to_supported_rate() {
        let spec = audio_encoder_spec(
            AudioCodec::Opus,
            &audio_req(44100, ChannelLayout::STEREO, Some(SampleFormat::Fltp)),
        );
        assert_eq!(spec.encoder_name, "libopus");
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.sample_format, SampleFormat::Flt);
        assert_eq!(spec.bit_rate, Some(96_000));
    }

    #[test]
    fn test_mp3_builder_downmixes_surround() {
        let spec = audio_encoder_spec(
            AudioCodec::Mp3,
            &audio_req(96000, ChannelLayout::SURROUND_5_1, Some(SampleFormat::S16p)),
        );
        assert_eq!(spec.encoder_name, "libmp3lame");
        assert_eq!(spec.layout, ChannelLayout::STEREO);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.sample_format, SampleFormat::S16p);
    }

    #[test]
    fn test_lossless_builders() {
        let flac = audio_encoder_spec(
            AudioCodec::Flac,
            &audio_req(48000, ChannelLayout::STEREO, Some(SampleFormat::S16p)),
        );
        assert_eq!(flac.sample_format, SampleFormat::S16);
        let flac = audio_encoder_spec(
            AudioCodec::Flac,
            &audio_req(48000, ChannelLayout::STEREO, Some(SampleFormat::Fltp)),
        );
        assert_eq!(flac.sample_format, SampleFormat::S32);

        let pcm16 = audio_encoder_spec(
            AudioCodec::Pcm16le,
            &audio_req(22050, ChannelLayout::MONO, None),
        );
        assert_eq!(pcm16.encoder_name, "pcm_s16le");
        assert_eq!(pcm16.sample_format, SampleFormat::S16);
        assert_eq!(pcm16.sample_rate, 22050);

        let pcm32 = audio_encoder_spec(
            AudioCodec::Pcm32le,
            &audio_req(48000, ChannelLayout::STEREO, None),
        );
        assert_eq!(pcm32.sample_format, SampleFormat::S32);
    }

    #[test]
    fn test_get_recommended_bitrate() {
        assert_eq!(get_recommended_bitrate(1), 64_000);
        assert_eq!(get_recommended_bitrate(2), 128_000);
        assert_eq!(get_recommended_bitrate(6), 384_000);
        assert_eq!(get_recommended_bitrate(8), 512_000);
        assert_eq!(get_recommended_bitrate(4), 128_000);
    }

    #[test]
    fn test_container_support() {
        assert!(ContainerFormat::Webm.supports_video(VideoCodec::Vp9));
        assert!(!ContainerFormat::Webm.supports_video(VideoCodec::H264));
        assert!(!ContainerFormat::Webm.supports_audio(AudioCodec::Aac));
        assert!(ContainerFormat::Mov.supports_video(VideoCodec::Prores));
        assert!(!ContainerFormat::Mp4.supports_audio(AudioCodec::Pcm16le));
        assert!(ContainerFormat::Mkv.supports_audio(AudioCodec::Pcm32le));
        assert_eq!(ContainerFormat::Mkv.muxer_name(), "matroska");
        assert_eq!("MKV".parse::<ContainerFormat>(), Ok(ContainerFormat::Mkv));
    }

    #[test]
    fn test_codec_names_round_trip_through_parse() {
        for codec in VideoCodec::ALL {
            assert_eq!(codec.display_name().parse::<VideoCodec>(), Ok(*codec));
        }
        for codec in AudioCodec::ALL {
            assert_eq!(codec.display_name().parse::<AudioCodec>(), Ok(*codec));
        }
    }
}
