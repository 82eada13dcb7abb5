//! Video sub-pipeline: sample → scale → encode

use crate::codec::CodecAdapter;
use crate::error::{Result, TranscodeError};
use crate::extract::FrameExtractor;
use crate::media::{rescale_ts, MediaBackend, Packet, Rational, VideoFrame};
use crate::scheduler::CancellationToken;
use crate::transform::VideoScaler;

use super::writer::PacketWriter;

pub(crate) struct VideoTrack {
    extractor: FrameExtractor,
    scaler: VideoScaler,
    encoder: CodecAdapter<VideoFrame, Packet>,
    fps: Rational,
    /// Time base of the encoder, normally `1 / fps`
    encoder_tb: Rational,
    total_frames: u64,
    next_frame: u64,
    out_stream: usize,
    exhausted: bool,
}

impl VideoTrack {
    pub(crate) fn new(
        extractor: FrameExtractor,
        scaler: VideoScaler,
        encoder: CodecAdapter<VideoFrame, Packet>,
        fps: Rational,
        encoder_tb: Rational,
        total_frames: u64,
        out_stream: usize,
    ) -> Self {
        Self {
            extractor,
            scaler,
            encoder,
            fps,
            encoder_tb,
            total_frames,
            next_frame: 0,
            out_stream,
            exhausted: false,
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn frames_produced(&self) -> u64 {
        self.next_frame
    }

    pub(crate) fn progress(&self) -> f64 {
        if self.exhausted {
            return 1.0;
        }
        (self.next_frame as f64 / self.total_frames.max(1) as f64).clamp(0.0, 1.0)
    }

    /// Output time of frame `index` in seconds
    fn frame_time(&self, index: u64) -> f64 {
        index as f64 / self.fps.as_f64()
    }

    /// Encode every pending output frame whose time is at or before `ceiling` seconds.
    pub(crate) fn run_until(
        &mut self,
        ceiling: f64,
        writer: &mut PacketWriter,
        backend: &dyn MediaBackend,
        cancel: &CancellationToken,
    ) -> Result<()> {
        while !self.exhausted && self.frame_time(self.next_frame) <= ceiling + 1e-9 {
            cancel.check()?;
            if self.next_frame >= self.total_frames {
                self.exhausted = true;
                break;
            }

            let source = match self
                .extractor
                .frame_for_index(self.next_frame, self.fps, cancel)
            {
                Ok(frame) => frame,
                Err(TranscodeError::Seek(reason)) => {
                    tracing::debug!(
                        frame = self.next_frame,
                        total = self.total_frames,
                        "video source exhausted: {}",
                        reason
                    );
                    self.exhausted = true;
                    break;
                }
                Err(e) => return Err(e),
            };

            let mut picture = self.scaler.scale(source, backend)?;
            picture.pts = Some(rescale_ts(
                self.next_frame as i64,
                self.fps.invert(),
                self.encoder_tb,
            ));

            let stream = self.out_stream;
            self.encoder.push(&picture, &mut |packet| {
                cancel.check()?;
                writer.write(stream, packet)
            })?;
            self.next_frame += 1;
        }
        if self.next_frame >= self.total_frames {
            self.exhausted = true;
        }
        Ok(())
    }

    /// Flush decoder and encoder; remaining packets go to `writer`.
    ///
    /// The token is checked before every tail packet is written.
    pub(crate) fn finish(
        &mut self,
        writer: &mut PacketWriter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.extractor.finish(cancel)?;
        let stream = self.out_stream;
        let tail = self.encoder.finish(&mut |packet| {
            cancel.check()?;
            writer.write(stream, packet)
        })?;
        tracing::debug!(
            frames = self.next_frame,
            seeks = self.extractor.seek_count(),
            tail,
            "video track finished"
        );
        self.encoder.close();
        Ok(())
    }
}
