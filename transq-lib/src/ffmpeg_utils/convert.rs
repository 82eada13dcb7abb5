//! Conversions between FFmpeg types and the crate's media model

use bytes::Bytes;
use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::{sample::Type as SampleType, Pixel, Sample};
use ffmpeg_next::util::channel_layout::ChannelLayout as FfLayout;

use crate::error::CodecError;
use crate::media::frame::{plane_bytes, plane_count};
use crate::media::{
    AudioFrame, ChannelLayout, CodecParameters, MediaKind, Packet, PixelFormat, Plane, Rational,
    SampleFormat, SideData, SideDataKind, StreamInfo, VideoFrame,
};

use super::helpers;

// ── Scalars ──────────────────────────────────────────────────────────────────

pub fn rational_from(r: ffmpeg::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

pub fn rational_to(r: Rational) -> ffmpeg::Rational {
    ffmpeg::Rational::new(r.num, r.den)
}

pub fn pixel_to(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuvj420p => Pixel::YUVJ420P,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuvj422p => Pixel::YUVJ422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Yuvj444p => Pixel::YUVJ444P,
        PixelFormat::Yuv420p10le => Pixel::YUV420P10LE,
        PixelFormat::Yuv422p10le => Pixel::YUV422P10LE,
        PixelFormat::Yuv444p10le => Pixel::YUV444P10LE,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Gray => Pixel::GRAY8,
    }
}

pub fn pixel_from(format: Pixel) -> Option<PixelFormat> {
    PixelFormat::ALL
        .iter()
        .copied()
        .find(|p| pixel_to(*p) == format)
}

/// Map a raw `AVPixelFormat` value without transmuting it.
pub fn pixel_from_raw(raw: i32) -> Option<PixelFormat> {
    PixelFormat::ALL
        .iter()
        .copied()
        .find(|p| ffmpeg::ffi::AVPixelFormat::from(pixel_to(*p)) as i32 == raw)
}

const SAMPLE_FORMATS: &[SampleFormat] = &[
    SampleFormat::U8,
    SampleFormat::S16,
    SampleFormat::S32,
    SampleFormat::Flt,
    SampleFormat::Dbl,
    SampleFormat::U8p,
    SampleFormat::S16p,
    SampleFormat::S32p,
    SampleFormat::Fltp,
    SampleFormat::Dblp,
];

pub fn sample_to(format: SampleFormat) -> Sample {
    match format {
        SampleFormat::U8 => Sample::U8(SampleType::Packed),
        SampleFormat::S16 => Sample::I16(SampleType::Packed),
        SampleFormat::S32 => Sample::I32(SampleType::Packed),
        SampleFormat::Flt => Sample::F32(SampleType::Packed),
        SampleFormat::Dbl => Sample::F64(SampleType::Packed),
        SampleFormat::U8p => Sample::U8(SampleType::Planar),
        SampleFormat::S16p => Sample::I16(SampleType::Planar),
        SampleFormat::S32p => Sample::I32(SampleType::Planar),
        SampleFormat::Fltp => Sample::F32(SampleType::Planar),
        SampleFormat::Dblp => Sample::F64(SampleType::Planar),
    }
}

pub fn sample_from(format: Sample) -> Option<SampleFormat> {
    SAMPLE_FORMATS
        .iter()
        .copied()
        .find(|s| sample_to(*s) == format)
}

/// Map a raw `AVSampleFormat` value without transmuting it.
pub fn sample_from_raw(raw: i32) -> Option<SampleFormat> {
    SAMPLE_FORMATS
        .iter()
        .copied()
        .find(|s| ffmpeg::ffi::AVSampleFormat::from(sample_to(*s)) as i32 == raw)
}

pub fn layout_to(layout: ChannelLayout) -> FfLayout {
    if layout.mask != 0 {
        FfLayout::from_bits_truncate(layout.mask)
    } else {
        FfLayout::default(layout.channels as i32)
    }
}

pub fn layout_from(layout: FfLayout, channels: u16) -> ChannelLayout {
    let mask = layout.bits();
    if mask == 0 {
        ChannelLayout::default_for(channels)
    } else {
        ChannelLayout::new(mask.count_ones() as u16, mask)
    }
}

fn kind_from(medium: ffmpeg::media::Type) -> MediaKind {
    match medium {
        ffmpeg::media::Type::Video => MediaKind::Video,
        ffmpeg::media::Type::Audio => MediaKind::Audio,
        ffmpeg::media::Type::Subtitle => MediaKind::Subtitle,
        ffmpeg::media::Type::Data => MediaKind::Data,
        _ => MediaKind::Other,
    }
}

pub fn media_type_to(kind: MediaKind) -> ffmpeg::media::Type {
    match kind {
        MediaKind::Video => ffmpeg::media::Type::Video,
        MediaKind::Audio => ffmpeg::media::Type::Audio,
        MediaKind::Subtitle => ffmpeg::media::Type::Subtitle,
        MediaKind::Data => ffmpeg::media::Type::Data,
        MediaKind::Other => ffmpeg::media::Type::Unknown,
    }
}

fn known_ts(ts: i64) -> Option<i64> {
    (ts != ffmpeg::ffi::AV_NOPTS_VALUE).then_some(ts)
}

// ── Streams ──────────────────────────────────────────────────────────────────

pub fn codec_parameters_from(params: &ffmpeg::codec::Parameters) -> CodecParameters {
    let kind = kind_from(params.medium());
    let raw_format = helpers::codec_params_format(params);
    let channels = helpers::codec_params_channels(params);
    let profile = helpers::codec_params_profile(params);
    let frame_size = helpers::codec_params_frame_size(params);
    CodecParameters {
        codec_name: params.id().name().to_string(),
        width: helpers::codec_params_width(params),
        height: helpers::codec_params_height(params),
        pixel_format: (kind == MediaKind::Video)
            .then(|| pixel_from_raw(raw_format))
            .flatten(),
        sample_format: (kind == MediaKind::Audio)
            .then(|| sample_from_raw(raw_format))
            .flatten(),
        sample_rate: helpers::codec_params_sample_rate(params),
        layout: (channels > 0).then(|| {
            let mask = helpers::codec_params_channel_mask(params);
            if mask == 0 {
                ChannelLayout::default_for(channels)
            } else {
                ChannelLayout::new(channels, mask)
            }
        }),
        frame_size: (frame_size > 0).then_some(frame_size),
        bit_rate: helpers::codec_params_bit_rate(params),
        profile: (profile != ffmpeg::ffi::AV_PROFILE_UNKNOWN).then_some(profile),
        block_align: helpers::codec_params_block_align(params),
        bits_per_coded_sample: helpers::codec_params_bits_per_coded_sample(params),
        extradata: Bytes::from(helpers::codec_params_extradata(params)),
    }
}

/// Build `AVCodecParameters` for a stream of `kind`.
pub fn codec_parameters_to(
    params: &CodecParameters,
    kind: MediaKind,
) -> Result<ffmpeg::codec::Parameters, String> {
    let format = match kind {
        MediaKind::Video => params
            .pixel_format
            .map(|p| ffmpeg::ffi::AVPixelFormat::from(pixel_to(p)) as i32),
        MediaKind::Audio => params
            .sample_format
            .map(|s| ffmpeg::ffi::AVSampleFormat::from(sample_to(s)) as i32),
        _ => None,
    };
    helpers::codec_parameters_from(params, media_type_to(kind), format.unwrap_or(-1))
}

pub fn stream_info_from(stream: &ffmpeg::format::stream::Stream) -> StreamInfo {
    let params = stream.parameters();
    let rate = stream.avg_frame_rate();
    StreamInfo {
        index: stream.index(),
        kind: kind_from(params.medium()),
        params: codec_parameters_from(&params),
        time_base: rational_from(stream.time_base()),
        duration: known_ts(stream.duration()).filter(|d| *d > 0),
        start_time: known_ts(stream.start_time()),
        avg_frame_rate: (rate.numerator() > 0 && rate.denominator() > 0)
            .then(|| rational_from(rate)),
    }
}

/// Kind of `params`, used when a muxer stream is declared.
pub fn kind_of(params: &CodecParameters) -> MediaKind {
    if params.sample_rate > 0 || params.sample_format.is_some() {
        MediaKind::Audio
    } else {
        MediaKind::Video
    }
}

// ── Packets ──────────────────────────────────────────────────────────────────

const SIDE_DATA_KINDS: &[(SideDataKind, ffmpeg::ffi::AVPacketSideDataType)] = &[
    (
        SideDataKind::Palette,
        ffmpeg::ffi::AVPacketSideDataType::AV_PKT_DATA_PALETTE,
    ),
    (
        SideDataKind::NewExtradata,
        ffmpeg::ffi::AVPacketSideDataType::AV_PKT_DATA_NEW_EXTRADATA,
    ),
    (
        SideDataKind::SkipSamples,
        ffmpeg::ffi::AVPacketSideDataType::AV_PKT_DATA_SKIP_SAMPLES,
    ),
    (
        SideDataKind::DisplayMatrix,
        ffmpeg::ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX,
    ),
];

pub fn packet_from(pkt: &ffmpeg::Packet) -> Packet {
    let side_data = pkt
        .side_data()
        .filter_map(|sd| {
            let raw = ffmpeg::ffi::AVPacketSideDataType::from(sd.kind());
            SIDE_DATA_KINDS
                .iter()
                .find(|(_, t)| *t == raw)
                .map(|(kind, _)| SideData {
                    kind: *kind,
                    data: Bytes::copy_from_slice(sd.data()),
                })
        })
        .collect();
    Packet {
        stream_index: pkt.stream(),
        pts: pkt.pts(),
        dts: pkt.dts(),
        duration: pkt.duration(),
        data: Bytes::copy_from_slice(pkt.data().unwrap_or(&[])),
        side_data,
        key: pkt.is_key(),
    }
}

pub fn packet_to(pkt: &Packet) -> Result<ffmpeg::Packet, CodecError> {
    let mut out = ffmpeg::Packet::copy(&pkt.data);
    out.set_stream(pkt.stream_index);
    out.set_pts(pkt.pts);
    out.set_dts(pkt.dts);
    out.set_duration(pkt.duration);
    if pkt.key {
        out.set_flags(ffmpeg::packet::Flags::KEY);
    }
    for sd in &pkt.side_data {
        let kind = SIDE_DATA_KINDS
            .iter()
            .find(|(k, _)| *k == sd.kind)
            .map(|(_, t)| *t);
        let Some(kind) = kind else { continue };
        // SAFETY: `av_packet_new_side_data` returns a buffer of exactly
        // `sd.data.len()` writable bytes owned by the packet, or null.
        unsafe {
            let dst = ffmpeg::ffi::av_packet_new_side_data(out.as_mut_ptr(), kind, sd.data.len());
            if dst.is_null() {
                return Err(CodecError::Send("out of memory attaching side data".into()));
            }
            std::ptr::copy_nonoverlapping(sd.data.as_ptr(), dst, sd.data.len());
        }
    }
    Ok(out)
}

// ── Frames ───────────────────────────────────────────────────────────────────

pub fn video_frame_from(frame: &ffmpeg::frame::Video) -> Result<VideoFrame, CodecError> {
    let format = pixel_from(frame.format()).ok_or_else(|| {
        CodecError::Receive(format!("unsupported pixel format {:?}", frame.format()))
    })?;
    let (width, height) = (frame.width(), frame.height());
    let planes = (0..format.planes())
        .map(|i| {
            let (row, lines) = format.plane_geometry(i, width, height);
            let stride = frame.stride(i);
            let src = frame.data(i);
            let mut data = Vec::with_capacity(row * lines);
            for line in 0..lines {
                let start = line * stride;
                data.extend_from_slice(&src[start..start + row]);
            }
            Plane {
                data: Bytes::from(data),
                stride: row,
            }
        })
        .collect();
    Ok(VideoFrame {
        pts: frame.pts(),
        width,
        height,
        format,
        planes,
    })
}

pub fn video_frame_to(frame: &VideoFrame) -> ffmpeg::frame::Video {
    let mut out = ffmpeg::frame::Video::new(pixel_to(frame.format), frame.width, frame.height);
    for (i, plane) in frame.planes.iter().enumerate() {
        let (row, lines) = frame.format.plane_geometry(i, frame.width, frame.height);
        let dst_stride = out.stride(i);
        let dst = out.data_mut(i);
        for line in 0..lines {
            let src = &plane.data[line * plane.stride..line * plane.stride + row];
            dst[line * dst_stride..line * dst_stride + row].copy_from_slice(src);
        }
    }
    out.set_pts(frame.pts);
    out
}

pub fn audio_frame_from(frame: &ffmpeg::frame::Audio) -> Result<AudioFrame, CodecError> {
    let format = sample_from(frame.format()).ok_or_else(|| {
        CodecError::Receive(format!("unsupported sample format {:?}", frame.format()))
    })?;
    let layout = layout_from(frame.channel_layout(), frame.channels());
    let samples = frame.samples();
    let bytes = plane_bytes(format, layout, samples);
    let planes = (0..plane_count(format, layout))
        .map(|i| {
            let src = helpers::audio_plane_data(frame, i);
            Bytes::copy_from_slice(&src[..bytes.min(src.len())])
        })
        .collect();
    Ok(AudioFrame {
        pts: frame.pts(),
        format,
        layout,
        rate: frame.rate(),
        samples,
        planes,
    })
}

pub fn audio_frame_to(frame: &AudioFrame) -> ffmpeg::frame::Audio {
    let mut out =
        ffmpeg::frame::Audio::new(sample_to(frame.format), frame.samples, layout_to(frame.layout));
    out.set_rate(frame.rate);
    out.set_pts(frame.pts);
    for (i, plane) in frame.planes.iter().enumerate() {
        let dst = helpers::audio_plane_data_mut(&mut out, i);
        let n = plane.len().min(dst.len());
        dst[..n].copy_from_slice(&plane[..n]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_mapping_is_bijective() {
        for p in PixelFormat::ALL {
            assert_eq!(pixel_from(pixel_to(*p)), Some(*p));
            let raw = ffmpeg::ffi::AVPixelFormat::from(pixel_to(*p)) as i32;
            assert_eq!(pixel_from_raw(raw), Some(*p));
        }
        assert_eq!(pixel_from(Pixel::YUV410P), None);
    }

    #[test]
    fn test_sample_mapping() {
        for s in SAMPLE_FORMATS {
            assert_eq!(sample_from(sample_to(*s)), Some(*s));
        }
        assert_eq!(sample_to(SampleFormat::Fltp), Sample::F32(SampleType::Planar));
    }

    #[test]
    fn test_audio_frame_copy_keeps_samples() {
        let mut frame = AudioFrame::silence(
            crate::media::AudioFormat::new(SampleFormat::S16, ChannelLayout::STEREO, 48000),
            32,
        );
        frame.planes[0] = Bytes::from((0..128u8).collect::<Vec<_>>());
        frame.pts = Some(96);
        let back = audio_frame_from(&audio_frame_to(&frame)).unwrap();
        assert_eq!(back.samples, 32);
        assert_eq!(back.layout, ChannelLayout::STEREO);
        assert_eq!(back.planes[0], frame.planes[0]);
        assert_eq!(back.pts, Some(96));
    }

    #[test]
    fn test_video_frame_copy_strips_padding() {
        let frame = VideoFrame::blank(18, 10, PixelFormat::Yuv420p);
        let back = video_frame_from(&video_frame_to(&frame)).unwrap();
        assert_eq!(back.planes[0].stride, 18);
        assert_eq!(back.planes[1].data.len(), 9 * 5);
    }
}
