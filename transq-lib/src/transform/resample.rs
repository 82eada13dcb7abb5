//! Audio format conversion and frame-size chunking
//!
//! Decoded audio arrives in whatever format, layout and rate the source has
//! and in whatever block sizes the decoder produces. Encoders want one fixed
//! format and (usually) a fixed number of samples per frame. The
//! [`AudioResampler`] converts through a backend [`SampleConverter`] into an
//! [`AudioFifo`] and hands out chunks of exactly the encoder frame size; the
//! remainder carries over to the next call. After [`AudioResampler::flush`]
//! the final partial chunk is released instead of being dropped.

use bytes::BytesMut;

use crate::error::{CodecError, Result};
use crate::media::frame::{plane_bytes, plane_count};
use crate::media::{AudioFormat, AudioFrame, MediaBackend};

/// Chunk size used when the encoder accepts any frame size
pub const DEFAULT_CHUNK_SAMPLES: usize = 1024;

/// Maximum flush calls before giving up on a converter's delay line
const MAX_FLUSH_ROUNDS: usize = 16;

/// Backend sample converter (format, layout and rate)
pub trait SampleConverter: Send {
    /// Convert one input block. May return `None` while the converter buffers.
    fn convert(&mut self, frame: &AudioFrame) -> std::result::Result<Option<AudioFrame>, CodecError>;

    /// Return buffered output; `None` once the delay line is empty.
    fn flush(&mut self) -> std::result::Result<Option<AudioFrame>, CodecError>;
}

/// First-in first-out sample buffer in a single format
pub struct AudioFifo {
    format: AudioFormat,
    planes: Vec<BytesMut>,
    samples: usize,
}

impl AudioFifo {
    pub fn new(format: AudioFormat) -> Self {
        let planes = (0..plane_count(format.sample_format, format.layout))
            .map(|_| BytesMut::new())
            .collect();
        Self {
            format,
            planes,
            samples: 0,
        }
    }

    /// Buffered samples per channel
    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn push(&mut self, frame: &AudioFrame) -> std::result::Result<(), CodecError> {
        if frame.audio_format() != self.format {
            return Err(CodecError::Resample(format!(
                "fifo holds {}, got {}",
                self.format,
                frame.audio_format()
            )));
        }
        let bytes = plane_bytes(self.format.sample_format, self.format.layout, frame.samples);
        if frame.planes.len() != self.planes.len()
            || frame.planes.iter().any(|p| p.len() < bytes)
        {
            return Err(CodecError::Resample(format!(
                "frame of {} samples has short or missing planes",
                frame.samples
            )));
        }
        for (dst, src) in self.planes.iter_mut().zip(&frame.planes) {
            dst.extend_from_slice(&src[..bytes]);
        }
        self.samples += frame.samples;
        Ok(())
    }

    /// Remove up to `max` samples from the front; `None` when empty.
    pub fn pop(&mut self, max: usize) -> Option<AudioFrame> {
        let take = max.min(self.samples);
        if take == 0 {
            return None;
        }
        let bytes = plane_bytes(self.format.sample_format, self.format.layout, take);
        let planes = self
            .planes
            .iter_mut()
            .map(|p| p.split_to(bytes).freeze())
            .collect();
        self.samples -= take;
        Some(AudioFrame {
            pts: None,
            format: self.format.sample_format,
            layout: self.format.layout,
            rate: self.format.rate,
            samples: take,
            planes,
        })
    }
}

/// Converts decoded audio to the encoder format and re-blocks it into
/// encoder-sized chunks.
pub struct AudioResampler {
    target: AudioFormat,
    chunk: usize,
    source: Option<AudioFormat>,
    converter: Option<Box<dyn SampleConverter>>,
    fifo: AudioFifo,
    flushed: bool,
}

impl AudioResampler {
    /// `frame_size` is the encoder's fixed frame size, `None` for variable.
    pub fn new(target: AudioFormat, frame_size: Option<usize>) -> Self {
        let chunk = match frame_size {
            Some(n) if n > 0 => n,
            _ => DEFAULT_CHUNK_SAMPLES,
        };
        Self {
            target,
            chunk,
            source: None,
            converter: None,
            fifo: AudioFifo::new(target),
            flushed: false,
        }
    }

    pub fn target(&self) -> AudioFormat {
        self.target
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk
    }

    /// Samples waiting in the FIFO
    pub fn buffered(&self) -> usize {
        self.fifo.len()
    }

    /// True when no conversion is applied (source already matches the target).
    pub fn is_passthrough(&self) -> bool {
        self.source.is_some() && self.converter.is_none()
    }

    /// Convert one decoded frame and queue the result.
    ///
    /// The converter is created lazily from the first frame, and recreated if
    /// the decoded format changes mid-stream.
    pub fn push(&mut self, frame: &AudioFrame, backend: &dyn MediaBackend) -> Result<()> {
        if self.flushed {
            return Err(CodecError::InvalidState("resampler input after flush".into()).into());
        }

        let format = frame.audio_format();
        if self.source != Some(format) {
            if self.source.is_some() {
                tracing::debug!(from = ?self.source, to = %format, "decoded audio format changed");
                self.drain_converter()?;
            }
            self.converter = if format == self.target {
                None
            } else {
                Some(backend.open_resampler(format, self.target)?)
            };
            tracing::debug!(
                source = %format,
                target = %self.target,
                passthrough = self.converter.is_none(),
                "audio resampler configured"
            );
            self.source = Some(format);
        }

        match self.converter.as_mut() {
            None => self.fifo.push(frame)?,
            Some(converter) => {
                if let Some(out) = converter.convert(frame)? {
                    self.fifo.push(&out)?;
                }
            }
        }
        Ok(())
    }

    fn drain_converter(&mut self) -> Result<()> {
        if let Some(converter) = self.converter.as_mut() {
            for _ in 0..MAX_FLUSH_ROUNDS {
                match converter.flush()? {
                    Some(out) if out.samples > 0 => self.fifo.push(&out)?,
                    _ => break,
                }
            }
        }
        Ok(())
    }

    /// Release the converter's delay line. After this, [`Self::next_chunk`]
    /// also returns the final short chunk.
    pub fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.drain_converter()?;
        self.flushed = true;
        Ok(())
    }

    /// Next full chunk, or the final partial chunk once flushed.
    pub fn next_chunk(&mut self) -> Option<AudioFrame> {
        if self.fifo.len() >= self.chunk || (self.flushed && !self.fifo.is_empty()) {
            return self.fifo.pop(self.chunk);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ChannelLayout, SampleFormat};
    use crate::tests::fixtures::{s16_tone, MockBackend};

    fn fltp_stereo(rate: u32) -> AudioFormat {
        AudioFormat::new(SampleFormat::Fltp, ChannelLayout::STEREO, rate)
    }

    #[test]
    fn test_fifo_push_pop() {
        let format = fltp_stereo(48000);
        let mut fifo = AudioFifo::new(format);
        fifo.push(&AudioFrame::silence(format, 700)).unwrap();
        fifo.push(&AudioFrame::silence(format, 700)).unwrap();
        assert_eq!(fifo.len(), 1400);

        let chunk = fifo.pop(1024).unwrap();
        assert_eq!(chunk.samples, 1024);
        assert_eq!(chunk.planes[1].len(), 1024 * 4);
        assert_eq!(fifo.len(), 376);
        assert_eq!(fifo.pop(1024).unwrap().samples, 376);
        assert!(fifo.pop(1024).is_none());
    }

    #[test]
    fn test_fifo_rejects_other_format() {
        let mut fifo = AudioFifo::new(fltp_stereo(48000));
        let err = fifo.push(&AudioFrame::silence(fltp_stereo(44100), 10));
        assert!(err.is_err());
    }

    #[test]
    fn test_passthrough_only_chunks() {
        let backend = MockBackend::new();
        let format = fltp_stereo(44100);
        let mut resampler = AudioResampler::new(format, Some(1024));
        resampler
            .push(&AudioFrame::silence(format, 1500), &backend)
            .unwrap();
        assert!(resampler.is_passthrough());
        assert_eq!(backend.stats().converters(), 0);

        assert_eq!(resampler.next_chunk().unwrap().samples, 1024);
        assert!(resampler.next_chunk().is_none(), "476 samples carried over");
        resampler
            .push(&AudioFrame::silence(format, 600), &backend)
            .unwrap();
        assert_eq!(resampler.next_chunk().unwrap().samples, 1024);
        assert_eq!(resampler.buffered(), 52);
    }

    #[test]
    fn test_conversion_conserves_samples() {
        let backend = MockBackend::new().with_resampler_delay(37);
        let target = fltp_stereo(44100);
        let mut resampler = AudioResampler::new(target, Some(1152));

        let sizes = [1000usize, 17, 4096, 333, 1152, 2];
        let total_in: usize = sizes.iter().sum();
        let mut total_out = 0;
        for n in sizes {
            resampler.push(&s16_tone(44100, n), &backend).unwrap();
            while let Some(chunk) = resampler.next_chunk() {
                assert_eq!(chunk.samples, 1152, "only full chunks before flush");
                assert_eq!(chunk.format, SampleFormat::Fltp);
                total_out += chunk.samples;
            }
        }
        resampler.flush().unwrap();
        let mut last = None;
        while let Some(chunk) = resampler.next_chunk() {
            total_out += chunk.samples;
            last = Some(chunk.samples);
        }
        assert_eq!(total_out, total_in);
        assert_eq!(last, Some(total_in % 1152));
        assert_eq!(backend.stats().converters(), 1);
    }

    #[test]
    fn test_variable_frame_size_uses_default_chunk() {
        let resampler = AudioResampler::new(fltp_stereo(48000), None);
        assert_eq!(resampler.chunk_size(), DEFAULT_CHUNK_SAMPLES);
        let resampler = AudioResampler::new(fltp_stereo(48000), Some(0));
        assert_eq!(resampler.chunk_size(), DEFAULT_CHUNK_SAMPLES);
    }

    #[test]
    fn test_push_after_flush_fails() {
        let backend = MockBackend::new();
        let format = fltp_stereo(48000);
        let mut resampler = AudioResampler::new(format, Some(1024));
        resampler.flush().unwrap();
        assert!(resampler
            .push(&AudioFrame::silence(format, 10), &backend)
            .is_err());
    }
}
