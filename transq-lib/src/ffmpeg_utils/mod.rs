//! FFmpeg-backed media backend
//!
//! This module handles:
//! - FFmpeg initialization and log filtering
//! - Demuxing and muxing through libavformat
//! - Decoder/encoder sessions, the sample converter and the picture scaler
//! - Conversion between FFmpeg types and the crate's media model

pub mod backend;
pub mod codec;
pub mod convert;
pub mod helpers;
pub mod input;
pub mod output;
pub mod swr;
pub mod sws;

pub use backend::FfmpegBackend;
pub use ffmpeg_next as ffmpeg;

use crate::error::{Result, TranscodeError};

/// Initialize the FFmpeg library.
///
/// Call once at startup before opening any input or output.
pub fn init() -> Result<()> {
    ffmpeg::init()
        .map_err(|e| TranscodeError::Config(format!("ffmpeg::init() failed: {}", e)))?;

    tracing::info!("FFmpeg initialized");

    Ok(())
}

/// Install a custom FFmpeg log callback that suppresses known-noisy messages.
///
/// **Safety & Ordering:** Must be called after `init()` and before any job
/// thread starts, because altering the global log callback is not thread-safe.
pub fn install_log_filter() {
    // SAFETY: both functions modify global FFmpeg state and are safe to call
    // after `ffmpeg::init()`. They are called once at startup before the
    // scheduler spawns job threads.
    unsafe {
        ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_WARNING as i32);
        ffmpeg_next::ffi::av_log_set_callback(Some(ffmpeg_log_callback));
    }
}

/// Messages emitted for every seek or flush that carry no useful information.
const SUPPRESSED_MESSAGES: &[&str] = &[
    "starts with a nonzero dts",
    "Could not update timestamps for skipped samples",
    "Could not update timestamps for discarded samples",
    "Error parsing Opus packet header",
    "Queue input is backward in time",
    "More than 1000 frames duplicated",
];

unsafe extern "C" fn ffmpeg_log_callback(
    avcl: *mut std::ffi::c_void,
    level: std::ffi::c_int,
    fmt: *const std::ffi::c_char,
    vl: ffmpeg_next::ffi::va_list,
) {
    use std::ffi::CStr;

    if level > unsafe { ffmpeg_next::ffi::av_log_get_level() } {
        return;
    }

    let mut buf = [0 as std::ffi::c_char; 1024];
    let mut print_prefix: std::ffi::c_int = 1;
    ffmpeg_next::ffi::av_log_format_line(
        avcl,
        level,
        fmt,
        vl,
        buf.as_mut_ptr(),
        buf.len() as std::ffi::c_int,
        &mut print_prefix,
    );

    let msg = CStr::from_ptr(buf.as_ptr()).to_string_lossy();

    if SUPPRESSED_MESSAGES.iter().any(|s| msg.contains(s)) {
        return;
    }

    if level <= ffmpeg_next::ffi::AV_LOG_ERROR as i32 {
        tracing::error!(target: "ffmpeg", "{}", msg.trim_end());
    } else {
        tracing::warn!(target: "ffmpeg", "{}", msg.trim_end());
    }
}

/// Version of the linked libavcodec, as `major.minor.micro`.
pub fn version_info() -> String {
    // SAFETY: `avcodec_version` only reads a compile-time constant.
    let v = unsafe { ffmpeg::ffi::avcodec_version() };
    format!(
        "libavcodec {}.{}.{}",
        v >> 16,
        (v >> 8) & 0xff,
        v & 0xff
    )
}
