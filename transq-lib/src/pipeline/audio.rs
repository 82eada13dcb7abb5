//! Audio sub-pipeline: demux → decode → resample → encode
//!
//! Output timestamps come from the number of samples handed to the encoder,
//! not from source packet timestamps, so the encoded track is gapless.

use crate::codec::CodecAdapter;
use crate::error::Result;
use crate::media::{rescale_ts, AudioFrame, Demuxer, MediaBackend, Packet, Rational};
use crate::scheduler::CancellationToken;
use crate::transform::AudioResampler;

use super::writer::PacketWriter;

pub(crate) struct AudioTrack {
    demuxer: Box<dyn Demuxer>,
    source_stream: usize,
    decoder: CodecAdapter<Packet, AudioFrame>,
    resampler: AudioResampler,
    encoder: CodecAdapter<AudioFrame, Packet>,
    encoder_tb: Rational,
    out_stream: usize,
    samples_emitted: u64,
    source_duration_secs: Option<f64>,
    exhausted: bool,
}

impl AudioTrack {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        demuxer: Box<dyn Demuxer>,
        source_stream: usize,
        decoder: CodecAdapter<Packet, AudioFrame>,
        resampler: AudioResampler,
        encoder: CodecAdapter<AudioFrame, Packet>,
        encoder_tb: Rational,
        out_stream: usize,
        source_duration_secs: Option<f64>,
    ) -> Self {
        Self {
            demuxer,
            source_stream,
            decoder,
            resampler,
            encoder,
            encoder_tb,
            out_stream,
            samples_emitted: 0,
            source_duration_secs,
            exhausted: false,
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn samples_emitted(&self) -> u64 {
        self.samples_emitted
    }

    /// Seconds of audio handed to the encoder so far
    pub(crate) fn emitted_secs(&self) -> f64 {
        self.samples_emitted as f64 / self.resampler.target().rate.max(1) as f64
    }

    /// Fraction of the source encoded, `None` when the source length is unknown.
    pub(crate) fn progress(&self) -> Option<f64> {
        if self.exhausted {
            return Some(1.0);
        }
        let total = self.source_duration_secs.filter(|d| *d > 0.0)?;
        Some((self.emitted_secs() / total).clamp(0.0, 1.0))
    }

    /// Pull and encode source audio until more than `ceiling` seconds have
    /// been emitted or the source ends.
    pub(crate) fn run_until(
        &mut self,
        ceiling: f64,
        writer: &mut PacketWriter,
        backend: &dyn MediaBackend,
        cancel: &CancellationToken,
    ) -> Result<()> {
        while !self.exhausted && self.emitted_secs() <= ceiling {
            cancel.check()?;
            let packet = match self.demuxer.read()? {
                Some(packet) => packet,
                None => {
                    tracing::debug!(
                        samples = self.samples_emitted,
                        "audio source reached end of file"
                    );
                    self.exhausted = true;
                    break;
                }
            };
            if packet.stream_index != self.source_stream {
                continue;
            }

            let mut decoded = Vec::new();
            self.decoder.push(&packet, &mut |frame| {
                decoded.push(frame);
                Ok(())
            })?;
            for frame in &decoded {
                cancel.check()?;
                self.resampler.push(frame, backend)?;
            }
            self.encode_ready(writer, cancel)?;
        }
        Ok(())
    }

    /// Encode every chunk the resampler has ready.
    fn encode_ready(&mut self, writer: &mut PacketWriter, cancel: &CancellationToken) -> Result<()> {
        let sample_tb = Rational::new(1, self.resampler.target().rate.max(1) as i32);
        let stream = self.out_stream;
        while let Some(mut chunk) = self.resampler.next_chunk() {
            cancel.check()?;
            chunk.pts = Some(rescale_ts(
                self.samples_emitted as i64,
                sample_tb,
                self.encoder_tb,
            ));
            self.samples_emitted += chunk.samples as u64;
            self.encoder.push(&chunk, &mut |packet| {
                cancel.check()?;
                writer.write(stream, packet)
            })?;
        }
        Ok(())
    }

    /// Flush decoder, resampler and encoder in that order.
    pub(crate) fn finish(
        &mut self,
        writer: &mut PacketWriter,
        backend: &dyn MediaBackend,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut decoded = Vec::new();
        self.decoder.finish(&mut |frame| {
            cancel.check()?;
            decoded.push(frame);
            Ok(())
        })?;
        self.decoder.close();
        for frame in &decoded {
            cancel.check()?;
            self.resampler.push(frame, backend)?;
        }

        self.resampler.flush()?;
        self.encode_ready(writer, cancel)?;

        let stream = self.out_stream;
        let tail = self.encoder.finish(&mut |packet| {
            cancel.check()?;
            writer.write(stream, packet)
        })?;
        tracing::debug!(
            samples = self.samples_emitted,
            seconds = self.emitted_secs(),
            tail,
            "audio track finished"
        );
        self.encoder.close();
        self.exhausted = true;
        Ok(())
    }
}
