//! Safe wrappers around FFmpeg FFI calls.
//!
//! Every function in this module is `pub` and **safe** to call. All `unsafe`
//! blocks are contained here with explicit safety arguments. Callers outside
//! this module should never need to write `unsafe` for routine FFmpeg access.

use std::ffi::CString;

use ffmpeg_next as ffmpeg;

use crate::media::CodecParameters;

// ── Codec-parameter field accessors ─────────────────────────────────────────

/// Read `sample_rate` from an `AVCodecParameters` struct.
///
/// `ffmpeg-next` does not expose this field through a safe accessor.
pub fn codec_params_sample_rate(params: &ffmpeg::codec::Parameters) -> u32 {
    // SAFETY: `params.as_ptr()` returns a valid non-null pointer for the
    // lifetime of `params`. `sample_rate` is a plain i32 field.
    unsafe { (*params.as_ptr()).sample_rate.max(0) as u32 }
}

/// Read `ch_layout.nb_channels` from an `AVCodecParameters` struct.
pub fn codec_params_channels(params: &ffmpeg::codec::Parameters) -> u16 {
    // SAFETY: same as `codec_params_sample_rate`.
    unsafe { (*params.as_ptr()).ch_layout.nb_channels.max(0) as u16 }
}

/// Channel mask of a native-order layout, `0` for unspecified or custom orders.
pub fn codec_params_channel_mask(params: &ffmpeg::codec::Parameters) -> u64 {
    // SAFETY: the `u` union holds `mask` exactly when the order is native,
    // which is checked before reading it.
    unsafe {
        let layout = &(*params.as_ptr()).ch_layout;
        if layout.order == ffmpeg::ffi::AVChannelOrder::AV_CHANNEL_ORDER_NATIVE {
            layout.u.mask
        } else {
            0
        }
    }
}

pub fn codec_params_width(params: &ffmpeg::codec::Parameters) -> u32 {
    unsafe { (*params.as_ptr()).width.max(0) as u32 }
}

pub fn codec_params_height(params: &ffmpeg::codec::Parameters) -> u32 {
    unsafe { (*params.as_ptr()).height.max(0) as u32 }
}

/// Raw `format` field: an `AVPixelFormat` for video, an `AVSampleFormat` for audio.
pub fn codec_params_format(params: &ffmpeg::codec::Parameters) -> i32 {
    unsafe { (*params.as_ptr()).format }
}

pub fn codec_params_profile(params: &ffmpeg::codec::Parameters) -> i32 {
    unsafe { (*params.as_ptr()).profile }
}

pub fn codec_params_bit_rate(params: &ffmpeg::codec::Parameters) -> u64 {
    unsafe { (*params.as_ptr()).bit_rate.max(0) as u64 }
}

pub fn codec_params_frame_size(params: &ffmpeg::codec::Parameters) -> usize {
    unsafe { (*params.as_ptr()).frame_size.max(0) as usize }
}

pub fn codec_params_block_align(params: &ffmpeg::codec::Parameters) -> u32 {
    unsafe { (*params.as_ptr()).block_align.max(0) as u32 }
}

pub fn codec_params_bits_per_coded_sample(params: &ffmpeg::codec::Parameters) -> u32 {
    unsafe { (*params.as_ptr()).bits_per_coded_sample.max(0) as u32 }
}

/// Copy of the codec-private extradata, empty when absent.
pub fn codec_params_extradata(params: &ffmpeg::codec::Parameters) -> Vec<u8> {
    // SAFETY: `extradata` points to `extradata_size` readable bytes whenever
    // it is non-null; both fields are owned by `params`.
    unsafe {
        let p = params.as_ptr();
        if (*p).extradata.is_null() || (*p).extradata_size <= 0 {
            return Vec::new();
        }
        std::slice::from_raw_parts((*p).extradata, (*p).extradata_size as usize).to_vec()
    }
}

/// Look up a codec id by its short name (`h264`, `aac`, ...).
pub fn codec_id_by_name(name: &str) -> Option<ffmpeg::codec::Id> {
    let cname = CString::new(name).ok()?;
    // SAFETY: `avcodec_descriptor_get_by_name` reads a static table and
    // returns either null or a pointer to a static descriptor.
    unsafe {
        let desc = ffmpeg::ffi::avcodec_descriptor_get_by_name(cname.as_ptr());
        if desc.is_null() {
            None
        } else {
            Some(ffmpeg::codec::Id::from((*desc).id))
        }
    }
}

/// Build `AVCodecParameters` from the crate's description of a stream.
///
/// `format` is the raw pixel or sample format value. Fails only when the
/// codec name is unknown or allocation fails.
pub fn codec_parameters_from(
    src: &CodecParameters,
    media: ffmpeg::media::Type,
    format: i32,
) -> Result<ffmpeg::codec::Parameters, String> {
    let id = codec_id_by_name(&src.codec_name)
        .ok_or_else(|| format!("unknown codec '{}'", src.codec_name))?;
    let mut params = ffmpeg::codec::Parameters::new();

    // SAFETY: `params` owns a freshly allocated AVCodecParameters. Extradata
    // is allocated with `av_mallocz` plus the required input padding, which
    // is what `avcodec_parameters_free` expects to release.
    unsafe {
        let p = params.as_mut_ptr();
        (*p).codec_type = media.into();
        (*p).codec_id = id.into();
        (*p).format = format;
        (*p).bit_rate = src.bit_rate as i64;
        (*p).profile = src.profile.unwrap_or(ffmpeg::ffi::AV_PROFILE_UNKNOWN);
        (*p).block_align = src.block_align as i32;
        (*p).bits_per_coded_sample = src.bits_per_coded_sample as i32;
        match media {
            ffmpeg::media::Type::Video => {
                (*p).width = src.width as i32;
                (*p).height = src.height as i32;
            }
            ffmpeg::media::Type::Audio => {
                (*p).sample_rate = src.sample_rate as i32;
                (*p).frame_size = src.frame_size.unwrap_or(0) as i32;
                if let Some(layout) = src.layout {
                    if layout.mask != 0 {
                        ffmpeg::ffi::av_channel_layout_from_mask(&mut (*p).ch_layout, layout.mask);
                    } else {
                        ffmpeg::ffi::av_channel_layout_default(
                            &mut (*p).ch_layout,
                            layout.channels as i32,
                        );
                    }
                }
            }
            _ => {}
        }
        if !src.extradata.is_empty() {
            let size = src.extradata.len();
            let buf = ffmpeg::ffi::av_mallocz(size + ffmpeg::ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize)
                as *mut u8;
            if buf.is_null() {
                return Err("out of memory copying extradata".into());
            }
            std::ptr::copy_nonoverlapping(src.extradata.as_ptr(), buf, size);
            (*p).extradata = buf;
            (*p).extradata_size = size as i32;
        }
    }
    Ok(params)
}

/// Allocate a fresh `AVCodecParameters`, copy an opened encoder context into
/// it, and return it as a safe `ffmpeg::codec::Parameters`.
pub fn encoder_codec_parameters(
    ctx: &ffmpeg::codec::Context,
) -> Result<ffmpeg::codec::Parameters, String> {
    use std::rc::Rc;
    // SAFETY: the allocation is checked for null before use.
    // `avcodec_parameters_from_context` copies fields from a valid, open
    // encoder context; `ctx` is borrowed for the duration of the call.
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        if params.is_null() {
            return Err("avcodec_parameters_alloc failed".into());
        }
        let ret = ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        let wrapped = ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>);
        if ret < 0 {
            return Err(format!("avcodec_parameters_from_context: {}", ffmpeg::Error::from(ret)));
        }
        Ok(wrapped)
    }
}

/// Zero out `codec_tag` on the `AVCodecParameters` attached to an output
/// stream, so the muxer picks the correct tag for the target container.
///
/// Must be called after `out_stream.set_parameters(...)` and before
/// `write_header`.
pub fn stream_reset_codec_tag(out_stream: &mut ffmpeg::format::stream::StreamMut) {
    // SAFETY: `out_stream.as_mut_ptr()` is valid for the lifetime of the
    // stream. `codecpar` is set by `set_parameters` and is non-null.
    unsafe {
        (*(*out_stream.as_mut_ptr()).codecpar).codec_tag = 0;
    }
}

// ── Codec context flags ──────────────────────────────────────────────────────

/// Ask the encoder to put its headers in extradata instead of every keyframe.
///
/// Must be called before the encoder is opened.
pub fn set_global_header(ctx: &mut ffmpeg::codec::Context) {
    // SAFETY: `flags` is a plain int field of a context that is not yet open.
    unsafe {
        (*ctx.as_mut_ptr()).flags |= ffmpeg::ffi::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
    }
}

/// Fixed quantizer encoding (`-q:v`).
pub fn set_qscale(ctx: &mut ffmpeg::codec::Context, qscale: i32) {
    // SAFETY: as for `set_global_header`.
    unsafe {
        let c = ctx.as_mut_ptr();
        (*c).flags |= ffmpeg::ffi::AV_CODEC_FLAG_QSCALE as i32;
        (*c).global_quality = qscale * ffmpeg::ffi::FF_QP2LAMBDA as i32;
    }
}

/// Worker threads for a codec context that is not yet open; `0` lets FFmpeg decide.
pub fn set_thread_count(ctx: &mut ffmpeg::codec::Context, threads: usize) {
    // SAFETY: as for `set_global_header`.
    unsafe {
        (*ctx.as_mut_ptr()).thread_count = threads as i32;
    }
}

/// Time base of the packets a decoder will be fed.
pub fn set_packet_time_base(ctx: &mut ffmpeg::codec::Context, time_base: ffmpeg::Rational) {
    // SAFETY: as for `set_global_header`.
    unsafe {
        (*ctx.as_mut_ptr()).pkt_timebase = time_base.into();
    }
}

/// Encoder frame size, `0` when the encoder accepts any number of samples.
pub fn codec_frame_size(ctx: &ffmpeg::codec::Context) -> usize {
    // SAFETY: plain int field of a live context.
    unsafe {
        let c = ctx.as_ptr();
        let variable = !(*c).codec.is_null()
            && ((*(*c).codec).capabilities & ffmpeg::ffi::AV_CODEC_CAP_VARIABLE_FRAME_SIZE as i32)
                != 0;
        if variable {
            0
        } else {
            (*c).frame_size.max(0) as usize
        }
    }
}

/// Discard everything buffered inside a decoder (after a seek).
pub fn flush_codec_buffers(ctx: &mut ffmpeg::codec::Context) {
    // SAFETY: `avcodec_flush_buffers` is valid on any opened codec context.
    unsafe { ffmpeg::ffi::avcodec_flush_buffers(ctx.as_mut_ptr()) }
}

// ── Demuxer seek ─────────────────────────────────────────────────────────────

/// Seek `stream` to the last keyframe at or before `ts` (stream time base).
pub fn seek_stream_backward(
    input: &mut ffmpeg::format::context::Input,
    stream: usize,
    ts: i64,
) -> Result<(), ffmpeg::Error> {
    // SAFETY: `input.as_mut_ptr()` is a valid, open format context and
    // `stream` was taken from its stream list.
    let ret = unsafe {
        ffmpeg::ffi::av_seek_frame(
            input.as_mut_ptr(),
            stream as i32,
            ts,
            ffmpeg::ffi::AVSEEK_FLAG_BACKWARD as i32,
        )
    };
    if ret < 0 {
        Err(ffmpeg::Error::from(ret))
    } else {
        Ok(())
    }
}

// ── Audio plane access ───────────────────────────────────────────────────────

/// Extract an audio plane slice from an `AVFrame`.
///
/// Works around `ffmpeg-next`'s `Audio::data(index)`, which stops counting
/// planes if `linesize[1] == 0`. Planar audio frames often only populate
/// `linesize[0]` to represent the size of *every* plane.
pub fn audio_plane_data(frame: &ffmpeg::util::frame::Audio, index: usize) -> &[u8] {
    unsafe {
        let f = frame.as_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        if frame.format().is_planar() {
            if index >= channels {
                return &[];
            }
        } else if index > 0 {
            return &[];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &[];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &[];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts(plane_ptr, size)
    }
}

/// Mutable version of `audio_plane_data`.
pub fn audio_plane_data_mut(frame: &mut ffmpeg::util::frame::Audio, index: usize) -> &mut [u8] {
    unsafe {
        let f = frame.as_mut_ptr();
        let channels = (*f).ch_layout.nb_channels as usize;

        if frame.format().is_planar() {
            if index >= channels {
                return &mut [];
            }
        } else if index > 0 {
            return &mut [];
        }

        let ptrs = (*f).extended_data;
        if ptrs.is_null() {
            return &mut [];
        }

        let plane_ptr = *ptrs.add(index);
        if plane_ptr.is_null() {
            return &mut [];
        }

        let size = (*f).linesize[0] as usize;
        std::slice::from_raw_parts_mut(plane_ptr, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_id_by_name() {
        assert_eq!(codec_id_by_name("h264"), Some(ffmpeg::codec::Id::H264));
        assert_eq!(codec_id_by_name("aac"), Some(ffmpeg::codec::Id::AAC));
        assert_eq!(codec_id_by_name("no-such-codec"), None);
    }

    #[test]
    fn test_codec_parameters_round_trip_fields() {
        let src = CodecParameters {
            codec_name: "aac".into(),
            sample_rate: 48000,
            layout: Some(crate::media::ChannelLayout::STEREO),
            frame_size: Some(1024),
            extradata: bytes::Bytes::from_static(&[0x11, 0x90]),
            ..Default::default()
        };
        let params = codec_parameters_from(&src, ffmpeg::media::Type::Audio, -1).unwrap();
        assert_eq!(params.id(), ffmpeg::codec::Id::AAC);
        assert_eq!(codec_params_sample_rate(&params), 48000);
        assert_eq!(codec_params_channels(&params), 2);
        assert_eq!(codec_params_channel_mask(&params), 0x3);
        assert_eq!(codec_params_frame_size(&params), 1024);
        assert_eq!(codec_params_extradata(&params), vec![0x11, 0x90]);
    }
}
