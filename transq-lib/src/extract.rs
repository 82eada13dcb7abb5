//! Frame-accurate video sampling
//!
//! The output runs at a constant frame rate `F` that is unrelated to the
//! source's. Output frame `i` shows the first source frame whose
//! presentation time is at or after `i / F`. [`FrameExtractor`] finds that
//! frame by decoding forward from the current position when the target is
//! close, and by seeking to the preceding keyframe otherwise. When the output
//! rate is higher than the source rate the same source frame is handed out
//! again without decoding.

use std::collections::VecDeque;

use crate::codec::CodecAdapter;
use crate::error::{Result, TranscodeError};
use crate::media::{Demuxer, Packet, Rational, StreamInfo, VideoDecoder, VideoFrame};
use crate::scheduler::CancellationToken;

/// Number of output frames for a source of the given duration.
///
/// `ceil(duration * fps)`, computed exactly from the stream duration when the
/// stream has one, else from the container duration. Unknown, zero or
/// negative durations produce a single frame.
pub fn frame_count(stream: &StreamInfo, container_secs: Option<f64>, fps: Rational) -> u64 {
    if !fps.is_positive() {
        return 1;
    }
    if let Some(d) = stream.duration.filter(|d| *d > 0) {
        if stream.time_base.is_positive() {
            let num = d as i128 * stream.time_base.num as i128 * fps.num as i128;
            let den = stream.time_base.den as i128 * fps.den as i128;
            let n = (num + den - 1) / den;
            return n.clamp(1, u64::MAX as i128) as u64;
        }
    }
    match container_secs {
        Some(secs) if secs.is_finite() && secs > 0.0 => {
            let n = (secs * fps.as_f64() - 1e-9).ceil();
            if n < 1.0 {
                1
            } else {
                n as u64
            }
        }
        _ => 1,
    }
}

/// Random-access frame source over one video stream
pub struct FrameExtractor {
    demuxer: Box<dyn Demuxer>,
    stream: StreamInfo,
    decoder: CodecAdapter<Packet, VideoFrame>,
    pending: VecDeque<VideoFrame>,
    current: Option<VideoFrame>,
    /// `current` is the first frame at or after any target in `(floor, current.pts]`
    floor: i64,
    /// Demuxer reached end of file and the decoder was flushed
    input_done: bool,
    /// Largest forward jump (stream time base) handled by decoding instead of seeking
    seek_threshold: i64,
    seeks: u64,
}

impl FrameExtractor {
    pub fn new(
        demuxer: Box<dyn Demuxer>,
        stream: StreamInfo,
        decoder: VideoDecoder,
        seek_threshold_secs: f64,
    ) -> Self {
        let seek_threshold = if stream.time_base.is_positive() && seek_threshold_secs > 0.0 {
            (seek_threshold_secs / stream.time_base.as_f64()).round() as i64
        } else {
            0
        };
        Self {
            demuxer,
            stream,
            decoder: CodecAdapter::new(decoder),
            pending: VecDeque::new(),
            current: None,
            floor: i64::MIN,
            input_done: false,
            seek_threshold,
            seeks: 0,
        }
    }

    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    /// Number of seeks performed so far
    pub fn seek_count(&self) -> u64 {
        self.seeks
    }

    /// Source timestamp of output frame `index` at `fps`.
    pub fn target_ts(&self, index: u64, fps: Rational) -> i64 {
        let offset = crate::media::rescale_ts(index as i64, fps.invert(), self.stream.time_base);
        self.stream.start_ts().saturating_add(offset)
    }

    /// Source frame for output frame `index` at `fps`.
    pub fn frame_for_index(
        &mut self,
        index: u64,
        fps: Rational,
        cancel: &CancellationToken,
    ) -> Result<&VideoFrame> {
        let target = self.target_ts(index, fps);
        self.frame_at(target, cancel)
    }

    /// First frame with presentation time `>= target` (stream time base).
    ///
    /// Fails with [`TranscodeError::Seek`] when the stream ends before such a
    /// frame exists.
    pub fn frame_at(&mut self, target: i64, cancel: &CancellationToken) -> Result<&VideoFrame> {
        cancel.check()?;

        let current_pts = self.current.as_ref().and_then(|f| f.pts);
        if let Some(pts) = current_pts {
            if self.floor < target && target <= pts {
                return self.current_frame();
            }
        }

        let decode_forward = match current_pts {
            Some(pts) => target > pts && target - pts <= self.seek_threshold,
            None => {
                !self.input_done
                    && self.seeks == 0
                    && target.saturating_sub(self.stream.start_ts()) <= self.seek_threshold
            }
        };
        // Frames flushed out of the decoder at end of file are still queued
        let past_the_end = self.input_done
            && self.pending.is_empty()
            && current_pts.is_some_and(|pts| target > pts);

        if past_the_end {
            return Err(TranscodeError::Seek(format!(
                "stream {} ended before ts {}",
                self.stream.index, target
            )));
        }

        let mut floor_for_first = i64::MIN;
        if !decode_forward {
            self.seek_to(target)?;
            floor_for_first = target.saturating_sub(1);
        }

        let mut prev = self.current.as_ref().and_then(|f| f.pts);
        loop {
            cancel.check()?;
            let frame = match self.next_frame(cancel)? {
                Some(frame) => frame,
                None => {
                    return Err(TranscodeError::Seek(format!(
                        "stream {} ended before ts {}",
                        self.stream.index, target
                    )))
                }
            };
            let Some(pts) = frame.pts else {
                tracing::trace!(stream = self.stream.index, "skipping frame without timestamp");
                continue;
            };

            self.floor = prev.unwrap_or(floor_for_first);
            prev = Some(pts);
            self.current = Some(frame);
            if pts >= target {
                return self.current_frame();
            }
        }
    }

    fn current_frame(&self) -> Result<&VideoFrame> {
        self.current
            .as_ref()
            .ok_or_else(|| TranscodeError::Seek("no decoded frame".into()))
    }

    fn seek_to(&mut self, target: i64) -> Result<()> {
        tracing::debug!(
            stream = self.stream.index,
            target,
            current = ?self.current.as_ref().and_then(|f| f.pts),
            "seeking"
        );
        self.demuxer
            .seek(self.stream.index, target)
            .map_err(|e| match e {
                TranscodeError::Seek(_) | TranscodeError::Cancelled => e,
                other => TranscodeError::Seek(other.to_string()),
            })?;
        self.decoder.reset()?;
        self.pending.clear();
        self.current = None;
        self.floor = i64::MIN;
        self.input_done = false;
        self.seeks += 1;
        Ok(())
    }

    /// Next decoded frame in presentation order; `None` at end of stream.
    fn next_frame(&mut self, cancel: &CancellationToken) -> Result<Option<VideoFrame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            if self.input_done {
                return Ok(None);
            }
            cancel.check()?;

            let pending = &mut self.pending;
            match self.demuxer.read()? {
                Some(packet) if packet.stream_index == self.stream.index => {
                    self.decoder.push(&packet, &mut |frame| {
                        pending.push_back(frame);
                        Ok(())
                    })?;
                }
                Some(_) => {}
                None => {
                    self.decoder.finish(&mut |frame| {
                        pending.push_back(frame);
                        Ok(())
                    })?;
                    self.input_done = true;
                }
            }
        }
    }

    /// Flush the decoder (discarding its tail) and release it.
    pub fn finish(&mut self, cancel: &CancellationToken) -> Result<()> {
        if !self.input_done {
            self.decoder.finish(&mut |_| cancel.check())?;
            self.input_done = true;
        }
        self.pending.clear();
        self.decoder.close();
        Ok(())
    }
}
