//! Pixel formats, sample formats and channel layouts
//!
//! Backend-neutral descriptions of raw picture and PCM layouts. Names follow
//! the FFmpeg spelling so configuration files read the same as `ffmpeg -pix_fmts`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw picture layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Yuv420p,
    Yuvj420p,
    Yuv422p,
    Yuvj422p,
    Yuv444p,
    Yuvj444p,
    Yuv420p10le,
    Yuv422p10le,
    Yuv444p10le,
    Nv12,
    Rgb24,
    Bgr24,
    Rgba,
    Gray,
}

impl PixelFormat {
    pub const ALL: &'static [PixelFormat] = &[
        PixelFormat::Yuv420p,
        PixelFormat::Yuvj420p,
        PixelFormat::Yuv422p,
        PixelFormat::Yuvj422p,
        PixelFormat::Yuv444p,
        PixelFormat::Yuvj444p,
        PixelFormat::Yuv420p10le,
        PixelFormat::Yuv422p10le,
        PixelFormat::Yuv444p10le,
        PixelFormat::Nv12,
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Rgba,
        PixelFormat::Gray,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuvj420p => "yuvj420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuvj422p => "yuvj422p",
            PixelFormat::Yuv444p => "yuv444p",
            PixelFormat::Yuvj444p => "yuvj444p",
            PixelFormat::Yuv420p10le => "yuv420p10le",
            PixelFormat::Yuv422p10le => "yuv422p10le",
            PixelFormat::Yuv444p10le => "yuv444p10le",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Gray => "gray",
        }
    }

    /// Number of data planes.
    pub fn planes(&self) -> usize {
        match self {
            PixelFormat::Nv12 => 2,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Rgba | PixelFormat::Gray => 1,
            _ => 3,
        }
    }

    /// Bytes per line and number of lines for `plane` of a `width`x`height` picture.
    pub fn plane_geometry(&self, plane: usize, width: u32, height: u32) -> (usize, usize) {
        let (w, h) = (width as usize, height as usize);
        let half_w = w.div_ceil(2);
        let half_h = h.div_ceil(2);
        match (self, plane) {
            (PixelFormat::Rgb24 | PixelFormat::Bgr24, _) => (w * 3, h),
            (PixelFormat::Rgba, _) => (w * 4, h),
            (PixelFormat::Gray, _) => (w, h),
            (PixelFormat::Nv12, 0) => (w, h),
            (PixelFormat::Nv12, _) => (half_w * 2, half_h),
            (PixelFormat::Yuv420p | PixelFormat::Yuvj420p, 0) => (w, h),
            (PixelFormat::Yuv420p | PixelFormat::Yuvj420p, _) => (half_w, half_h),
            (PixelFormat::Yuv422p | PixelFormat::Yuvj422p, 0) => (w, h),
            (PixelFormat::Yuv422p | PixelFormat::Yuvj422p, _) => (half_w, h),
            (PixelFormat::Yuv444p | PixelFormat::Yuvj444p, _) => (w, h),
            (PixelFormat::Yuv420p10le, 0) => (w * 2, h),
            (PixelFormat::Yuv420p10le, _) => (half_w * 2, half_h),
            (PixelFormat::Yuv422p10le, 0) => (w * 2, h),
            (PixelFormat::Yuv422p10le, _) => (half_w * 2, h),
            (PixelFormat::Yuv444p10le, _) => (w * 2, h),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        PixelFormat::ALL
            .iter()
            .copied()
            .find(|p| p.name() == lower)
            .ok_or_else(|| format!("unknown pixel format '{}'", s))
    }
}

/// PCM sample layout. The `*p` variants are planar (one plane per channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    Flt,
    Dbl,
    U8p,
    S16p,
    S32p,
    Fltp,
    Dblp,
}

impl SampleFormat {
    pub fn name(&self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::Flt => "flt",
            SampleFormat::Dbl => "dbl",
            SampleFormat::U8p => "u8p",
            SampleFormat::S16p => "s16p",
            SampleFormat::S32p => "s32p",
            SampleFormat::Fltp => "fltp",
            SampleFormat::Dblp => "dblp",
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::U8p => 1,
            SampleFormat::S16 | SampleFormat::S16p => 2,
            SampleFormat::S32 | SampleFormat::S32p | SampleFormat::Flt | SampleFormat::Fltp => 4,
            SampleFormat::Dbl | SampleFormat::Dblp => 8,
        }
    }

    pub fn is_planar(&self) -> bool {
        matches!(
            self,
            SampleFormat::U8p
                | SampleFormat::S16p
                | SampleFormat::S32p
                | SampleFormat::Fltp
                | SampleFormat::Dblp
        )
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Speaker arrangement: channel count plus the FFmpeg-compatible channel mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelLayout {
    pub channels: u16,
    pub mask: u64,
}

impl ChannelLayout {
    pub const MONO: ChannelLayout = ChannelLayout::new(1, 0x4);
    pub const STEREO: ChannelLayout = ChannelLayout::new(2, 0x3);
    pub const SURROUND: ChannelLayout = ChannelLayout::new(3, 0x7);
    pub const QUAD: ChannelLayout = ChannelLayout::new(4, 0x33);
    pub const SURROUND_5_1: ChannelLayout = ChannelLayout::new(6, 0x60f);
    pub const SURROUND_7_1: ChannelLayout = ChannelLayout::new(8, 0x63f);

    const NAMED: &'static [(&'static str, ChannelLayout)] = &[
        ("mono", ChannelLayout::MONO),
        ("stereo", ChannelLayout::STEREO),
        ("3.0", ChannelLayout::SURROUND),
        ("quad", ChannelLayout::QUAD),
        ("5.1", ChannelLayout::SURROUND_5_1),
        ("7.1", ChannelLayout::SURROUND_7_1),
    ];

    pub const fn new(channels: u16, mask: u64) -> Self {
        Self { channels, mask }
    }

    /// Conventional layout for a bare channel count.
    pub fn default_for(channels: u16) -> Self {
        Self::NAMED
            .iter()
            .map(|(_, l)| *l)
            .find(|l| l.channels == channels)
            .unwrap_or(Self::new(channels, 0))
    }

    pub fn name(&self) -> String {
        Self::NAMED
            .iter()
            .find(|(_, l)| l == self)
            .map(|(n, _)| n.to_string())
            .unwrap_or_else(|| format!("{}c", self.channels))
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for ChannelLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some((_, layout)) = Self::NAMED.iter().find(|(n, _)| *n == lower) {
            return Ok(*layout);
        }
        match lower.strip_suffix('c').map(str::parse::<u16>) {
            Some(Ok(n)) if n > 0 => Ok(Self::default_for(n)),
            _ => Err(format!("unknown channel layout '{}'", s)),
        }
    }
}

impl TryFrom<String> for ChannelLayout {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelLayout> for String {
    fn from(value: ChannelLayout) -> Self {
        value.name()
    }
}

/// Sample format, channel layout and rate of a PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_format: SampleFormat,
    pub layout: ChannelLayout,
    pub rate: u32,
}

impl AudioFormat {
    pub fn new(sample_format: SampleFormat, layout: ChannelLayout, rate: u32) -> Self {
        Self {
            sample_format,
            layout,
            rate,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}Hz", self.sample_format, self.layout, self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_parse() {
        assert_eq!("YUV420P".parse::<PixelFormat>(), Ok(PixelFormat::Yuv420p));
        assert_eq!("yuv422p10le".parse::<PixelFormat>(), Ok(PixelFormat::Yuv422p10le));
        assert!("yuv411p".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_plane_geometry_odd_dimensions() {
        let fmt = PixelFormat::Yuv420p;
        assert_eq!(fmt.plane_geometry(0, 15, 9), (15, 9));
        assert_eq!(fmt.plane_geometry(1, 15, 9), (8, 5));
        assert_eq!(PixelFormat::Rgba.plane_geometry(0, 4, 2), (16, 2));
    }

    #[test]
    fn test_channel_layout_names() {
        assert_eq!("stereo".parse::<ChannelLayout>(), Ok(ChannelLayout::STEREO));
        assert_eq!("5.1".parse::<ChannelLayout>(), Ok(ChannelLayout::SURROUND_5_1));
        assert_eq!("2c".parse::<ChannelLayout>(), Ok(ChannelLayout::STEREO));
        assert_eq!(ChannelLayout::default_for(5).name(), "5c");
        assert!("surround-ish".parse::<ChannelLayout>().is_err());
    }

    #[test]
    fn test_channel_layout_serde() {
        let json = serde_json::to_string(&ChannelLayout::SURROUND_5_1).unwrap();
        assert_eq!(json, "\"5.1\"");
        let back: ChannelLayout = serde_json::from_str("\"mono\"").unwrap();
        assert_eq!(back, ChannelLayout::MONO);
    }

    #[test]
    fn test_sample_format_props() {
        assert!(SampleFormat::Fltp.is_planar());
        assert!(!SampleFormat::S16.is_planar());
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::Dblp.bytes_per_sample(), 8);
    }
}
