//! Packet writer in front of the muxer
//!
//! Encoders emit packets in their own time base; the container picks its
//! own per-stream time base when the header is written. The writer rescales
//! between the two and keeps each stream's DTS non-decreasing.

use crate::error::{Result, TranscodeError};
use crate::media::{CodecParameters, Muxer, Packet, Rational};

struct OutputStream {
    /// Time base packets arrive in
    encoder_tb: Rational,
    /// Time base the container expects, known after the header
    muxer_tb: Rational,
    last_dts: Option<i64>,
    packets: u64,
    clamped: u64,
}

pub(crate) struct PacketWriter {
    muxer: Box<dyn Muxer>,
    streams: Vec<OutputStream>,
    header_written: bool,
    trailer_written: bool,
}

impl PacketWriter {
    pub(crate) fn new(muxer: Box<dyn Muxer>) -> Self {
        Self {
            muxer,
            streams: Vec::new(),
            header_written: false,
            trailer_written: false,
        }
    }

    pub(crate) fn needs_global_header(&self) -> bool {
        self.muxer.needs_global_header()
    }

    /// Declare an output stream fed with packets in `encoder_tb`.
    pub(crate) fn add_stream(
        &mut self,
        params: &CodecParameters,
        encoder_tb: Rational,
    ) -> Result<usize> {
        if self.header_written {
            return Err(TranscodeError::Mux("stream added after header".into()));
        }
        let index = self.muxer.add_stream(params, encoder_tb)?;
        if index != self.streams.len() {
            return Err(TranscodeError::Mux(format!(
                "muxer assigned stream index {} (expected {})",
                index,
                self.streams.len()
            )));
        }
        self.streams.push(OutputStream {
            encoder_tb,
            muxer_tb: encoder_tb,
            last_dts: None,
            packets: 0,
            clamped: 0,
        });
        Ok(index)
    }

    /// Write the container header and pick up the final stream time bases.
    pub(crate) fn write_header(&mut self) -> Result<()> {
        self.muxer.write_header()?;
        for (index, stream) in self.streams.iter_mut().enumerate() {
            if let Some(tb) = self.muxer.time_base(index) {
                if tb.is_positive() {
                    stream.muxer_tb = tb;
                }
            }
            tracing::debug!(
                stream = index,
                encoder_tb = %stream.encoder_tb,
                muxer_tb = %stream.muxer_tb,
                "output stream ready"
            );
        }
        self.header_written = true;
        Ok(())
    }

    /// Rescale an encoded packet into the muxer time base and write it.
    pub(crate) fn write(&mut self, stream_index: usize, mut packet: Packet) -> Result<()> {
        if !self.header_written || self.trailer_written {
            return Err(TranscodeError::Mux(
                "packet written outside header/trailer".into(),
            ));
        }
        let stream = self
            .streams
            .get_mut(stream_index)
            .ok_or_else(|| TranscodeError::Mux(format!("no output stream {}", stream_index)))?;

        packet.stream_index = stream_index;
        packet.rescale_ts(stream.encoder_tb, stream.muxer_tb);
        if packet.dts.is_none() {
            packet.dts = packet.pts;
        }

        if let (Some(dts), Some(last)) = (packet.dts, stream.last_dts) {
            if dts < last {
                stream.clamped += 1;
                tracing::warn!(
                    stream = stream_index,
                    dts,
                    last,
                    "non-monotonic DTS, clamping"
                );
                packet.dts = Some(last);
            }
        }
        if let (Some(pts), Some(dts)) = (packet.pts, packet.dts) {
            if pts < dts {
                packet.pts = Some(dts);
            }
        }
        if packet.dts.is_some() {
            stream.last_dts = packet.dts;
        }
        stream.packets += 1;

        self.muxer.write_packet(packet)
    }

    pub(crate) fn write_trailer(&mut self) -> Result<()> {
        if self.trailer_written {
            return Ok(());
        }
        self.muxer.write_trailer()?;
        self.trailer_written = true;
        for (index, stream) in self.streams.iter().enumerate() {
            tracing::debug!(
                stream = index,
                packets = stream.packets,
                clamped = stream.clamped,
                "output stream finished"
            );
        }
        Ok(())
    }

    pub(crate) fn packets_written(&self) -> u64 {
        self.streams.iter().map(|s| s.packets).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{MuxLog, RecordingMuxer};
    use std::sync::Arc;

    fn writer_with_log() -> (PacketWriter, Arc<parking_lot::Mutex<MuxLog>>) {
        let muxer = RecordingMuxer::new(Rational::new(1, 90000), Rational::new(1, 1000));
        let log = muxer.log();
        (PacketWriter::new(Box::new(muxer)), log)
    }

    fn packet(pts: i64, dts: i64) -> Packet {
        let mut p = Packet::new(0, vec![1u8, 2, 3]);
        p.pts = Some(pts);
        p.dts = Some(dts);
        p.duration = 1;
        p
    }

    #[test]
    fn test_rescales_into_muxer_time_base() {
        let (mut writer, log) = writer_with_log();
        let params = CodecParameters {
            codec_name: "h264".into(),
            ..Default::default()
        };
        writer.add_stream(&params, Rational::new(1, 30)).unwrap();
        writer.write_header().unwrap();
        writer.write(0, packet(2, 1)).unwrap();
        writer.write_trailer().unwrap();

        let log = log.lock();
        assert_eq!(log.packets.len(), 1);
        assert_eq!(log.packets[0].pts, Some(6000));
        assert_eq!(log.packets[0].dts, Some(3000));
        assert_eq!(log.packets[0].duration, 3000);
        assert!(log.trailer_written);
    }

    #[test]
    fn test_clamps_backwards_dts() {
        let (mut writer, log) = writer_with_log();
        writer
            .add_stream(&CodecParameters::default(), Rational::new(1, 90000))
            .unwrap();
        writer.write_header().unwrap();
        writer.write(0, packet(100, 100)).unwrap();
        writer.write(0, packet(90, 90)).unwrap();
        writer.write(0, packet(200, 150)).unwrap();

        let log = log.lock();
        let dts: Vec<_> = log.packets.iter().map(|p| p.dts.unwrap()).collect();
        assert_eq!(dts, vec![100, 100, 150]);
        assert!(log.packets.iter().all(|p| p.pts >= p.dts));
    }

    #[test]
    fn test_rejects_packets_before_header() {
        let (mut writer, _log) = writer_with_log();
        writer
            .add_stream(&CodecParameters::default(), Rational::new(1, 30))
            .unwrap();
        assert!(writer.write(0, packet(0, 0)).is_err());
    }
}
