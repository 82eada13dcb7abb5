//! Compressed packets

use bytes::Bytes;

use super::rational::{rescale_opt, rescale_ts, Rational};

/// Kind of auxiliary data attached to a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideDataKind {
    Palette,
    NewExtradata,
    SkipSamples,
    DisplayMatrix,
}

/// Auxiliary data attached to a packet (palette updates, skip-samples hints, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideData {
    pub kind: SideDataKind,
    pub data: Bytes,
}

/// One compressed unit of a single stream.
///
/// Timestamps are expressed in the time base of whichever stage produced the
/// packet: the source stream for demuxed packets, the encoder for encoded ones.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub data: Bytes,
    pub side_data: Vec<SideData>,
    pub key: bool,
}

impl Packet {
    pub fn new(stream_index: usize, data: impl Into<Bytes>) -> Self {
        Self {
            stream_index,
            data: data.into(),
            ..Default::default()
        }
    }

    /// Presentation time, falling back to the decode time.
    pub fn best_ts(&self) -> Option<i64> {
        self.pts.or(self.dts)
    }

    /// Convert pts, dts and duration from `from` to `to`.
    pub fn rescale_ts(&mut self, from: Rational, to: Rational) {
        self.pts = rescale_opt(self.pts, from, to);
        self.dts = rescale_opt(self.dts, from, to);
        if self.duration > 0 {
            self.duration = rescale_ts(self.duration, from, to);
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
