//! Output containers written through libavformat

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::codec::params::ContainerFormat;
use crate::error::{Result, TranscodeError};
use crate::media::{CodecParameters, Muxer, Packet, Rational};

use super::convert;
use super::helpers;

/// Output file opened with a fixed container format
pub struct FfmpegMuxer {
    output: ffmpeg::format::context::Output,
    path: PathBuf,
    header_written: bool,
}

// SAFETY: see `FfmpegDemuxer`; the context is only reachable through `&mut self`.
unsafe impl Send for FfmpegMuxer {}

impl FfmpegMuxer {
    /// Create `path` and its container context.
    pub fn create(path: &Path, container: ContainerFormat) -> Result<Self> {
        let output = ffmpeg::format::output_as(&path, container.muxer_name())
            .map_err(|e| TranscodeError::open(path, e))?;
        tracing::debug!(path = %path.display(), container = %container, "opened output");
        Ok(Self {
            output,
            path: path.to_path_buf(),
            header_written: false,
        })
    }

    fn mux_error(&self, what: &str, e: impl std::fmt::Display) -> TranscodeError {
        TranscodeError::Mux(format!("{}: {}: {}", self.path.display(), what, e))
    }
}

impl Muxer for FfmpegMuxer {
    fn add_stream(&mut self, params: &CodecParameters, time_base: Rational) -> Result<usize> {
        let kind = convert::kind_of(params);
        let av_params = convert::codec_parameters_to(params, kind)
            .map_err(|e| self.mux_error("add_stream", e))?;

        let mut out_stream = self
            .output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| TranscodeError::Mux(format!("add_stream: {}", e)))?;
        out_stream.set_parameters(av_params);
        helpers::stream_reset_codec_tag(&mut out_stream);
        out_stream.set_time_base(convert::rational_to(time_base));
        let index = out_stream.index();

        tracing::debug!(
            stream = index,
            codec = %params.codec_name,
            time_base = %time_base,
            "added output stream"
        );
        Ok(index)
    }

    fn needs_global_header(&self) -> bool {
        self.output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER)
    }

    fn write_header(&mut self) -> Result<()> {
        self.output
            .write_header()
            .map_err(|e| self.mux_error("write_header", e))?;
        self.header_written = true;
        Ok(())
    }

    fn time_base(&self, stream: usize) -> Option<Rational> {
        self.output
            .stream(stream)
            .map(|s| convert::rational_from(s.time_base()))
    }

    fn write_packet(&mut self, packet: Packet) -> Result<()> {
        let pkt = convert::packet_to(&packet)?;
        pkt.write_interleaved(&mut self.output)
            .map_err(|e| self.mux_error("write_interleaved", e))
    }

    fn write_trailer(&mut self) -> Result<()> {
        if !self.header_written {
            return Err(self.mux_error("write_trailer", "header was never written"));
        }
        self.output
            .write_trailer()
            .map_err(|e| self.mux_error("write_trailer", e))
    }
}
