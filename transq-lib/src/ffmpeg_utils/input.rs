//! Source containers read through libavformat

use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use crate::error::{Result, TranscodeError};
use crate::media::{Demuxer, MediaKind, Packet, StreamInfo};

use super::convert;
use super::helpers;

/// A packet read that failed after the source was opened
fn read_error(path: &Path, e: ffmpeg::Error) -> TranscodeError {
    TranscodeError::Demux(format!("{}: read error: {}", path.display(), e))
}

/// An opened source file
pub struct FfmpegDemuxer {
    inner: ffmpeg::format::context::Input,
    source_path: PathBuf,
    streams: Vec<StreamInfo>,
}

// SAFETY: the format context is only touched through `&mut self`, so it is
// never used from two threads at once. libavformat contexts have no thread
// affinity.
unsafe impl Send for FfmpegDemuxer {}

impl FfmpegDemuxer {
    /// Open and probe a media file.
    pub fn open(path: &Path) -> Result<Self> {
        let inner = ffmpeg::format::input(&path).map_err(|e| TranscodeError::open(path, e))?;
        let streams = inner
            .streams()
            .map(|s| convert::stream_info_from(&s))
            .collect::<Vec<_>>();

        tracing::debug!(
            path = %path.display(),
            streams = streams.len(),
            format = inner.format().name(),
            "opened input"
        );

        Ok(Self {
            inner,
            source_path: path.to_path_buf(),
            streams,
        })
    }
}

impl Demuxer for FfmpegDemuxer {
    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn best_stream(&self, kind: MediaKind) -> Option<usize> {
        let medium = convert::media_type_to(kind);
        self.inner
            .streams()
            .best(medium)
            .map(|s| s.index())
            .or_else(|| self.streams.iter().find(|s| s.kind == kind).map(|s| s.index))
    }

    fn duration_secs(&self) -> Option<f64> {
        let d = self.inner.duration();
        (d > 0).then(|| d as f64 / ffmpeg::ffi::AV_TIME_BASE as f64)
    }

    fn read(&mut self) -> Result<Option<Packet>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.inner) {
            Ok(()) => Ok(Some(convert::packet_from(&packet))),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(read_error(&self.source_path, e)),
        }
    }

    fn seek(&mut self, stream: usize, ts: i64) -> Result<()> {
        helpers::seek_stream_backward(&mut self.inner, stream, ts).map_err(|e| {
            TranscodeError::Seek(format!(
                "{}: stream {} to {}: {}",
                self.source_path.display(),
                stream,
                ts,
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_read_failure_is_io_not_open() {
        let err = read_error(Path::new("/media/broken.mkv"), ffmpeg::Error::InvalidData);
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(matches!(err, TranscodeError::Demux(_)));
        assert!(err.to_string().contains("/media/broken.mkv"));
    }
}
