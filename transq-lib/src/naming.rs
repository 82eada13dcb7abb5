//! Output file naming
//!
//! Output names come from a template with `${variable}` placeholders:
//!
//! - `${origin_file_name}`: input file name without extension
//! - `${output_video_codec}`: output video codec (`H.264`, `VP9`, ...)
//! - `${output_audio_codec}`: output audio codec (`AAC`, `Opus`, ...)
//! - `${video_pixelfmt}`: output pixel format, or the source's when kept
//!
//! Unknown placeholders are left untouched.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::TranscodeParams;
use crate::error::Result;
use crate::media::{MediaBackend, MediaKind, PixelFormat};

pub const DEFAULT_NAME_TEMPLATE: &str =
    "${origin_file_name}_${output_video_codec}_${video_pixelfmt}_${output_audio_codec}";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([a-z_]+)\}").unwrap())
}

fn simplify_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Expand `template` into a bare file name (no directory, no extension).
///
/// `source_pixel_format` fills `${video_pixelfmt}` when the job keeps the
/// source format.
pub fn render_name(
    template: &str,
    input: &Path,
    params: &TranscodeParams,
    source_pixel_format: Option<PixelFormat>,
) -> String {
    let origin = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pixel_format = params
        .video
        .pixel_format
        .or(source_pixel_format)
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let template = simplify_whitespace(template);
    let name = placeholder_re().replace_all(&template, |caps: &Captures| match &caps[1] {
        "origin_file_name" => origin.clone(),
        "output_video_codec" => params.video.codec.display_name().to_string(),
        "output_audio_codec" => params.audio.codec.display_name().to_string(),
        "video_pixelfmt" => pixel_format.clone(),
        _ => caps[0].to_string(),
    });

    name.replace('/', "_")
        .replace("H.265", "265")
        .replace("H.264", "264")
}

/// Full output path: `dir/<rendered name>.<container extension>`.
pub fn output_path(
    dir: &Path,
    template: &str,
    input: &Path,
    params: &TranscodeParams,
    source_pixel_format: Option<PixelFormat>,
) -> PathBuf {
    let name = render_name(template, input, params, source_pixel_format);
    dir.join(format!("{}.{}", name, params.container.extension()))
}

/// Like [`output_path`], probing the input for its pixel format when the
/// job keeps the source format.
pub fn resolve_output_path(
    backend: &dyn MediaBackend,
    dir: &Path,
    template: &str,
    input: &Path,
    params: &TranscodeParams,
) -> Result<PathBuf> {
    let needs_probe =
        params.video.pixel_format.is_none() && template.contains("${video_pixelfmt}");
    let source_pixel_format = if needs_probe {
        let demuxer = backend.open_input(input)?;
        demuxer
            .best_stream(MediaKind::Video)
            .and_then(|index| demuxer.streams().iter().find(|s| s.index == index))
            .and_then(|s| s.params.pixel_format)
    } else {
        None
    };
    Ok(output_path(dir, template, input, params, source_pixel_format))
}
