//! Decoder and encoder sessions backed by `AVCodecContext`
//!
//! FFmpeg's send/receive API maps directly onto [`CodecSession`]:
//! `EAGAIN` on send means "drain first", `EAGAIN` on receive means "feed
//! more", and `EOF` on receive ends the stream after a flush.

use ffmpeg_next as ffmpeg;

use crate::codec::{CodecSession, Received, SendStatus};
use crate::error::CodecError;
use crate::media::{AudioFrame, Packet, VideoFrame};

use super::convert;
use super::helpers;

fn is_again(e: &ffmpeg::Error) -> bool {
    matches!(e, ffmpeg::Error::Other { errno } if *errno == ffmpeg::error::EAGAIN)
}

fn send_status(
    result: Result<(), ffmpeg::Error>,
    label: &str,
    eof: bool,
) -> Result<SendStatus, CodecError> {
    match result {
        Ok(()) => Ok(SendStatus::Accepted),
        Err(ref e) if is_again(e) => Ok(SendStatus::Again),
        // Flushing an already flushed session is not an error
        Err(ffmpeg::Error::Eof) if eof => Ok(SendStatus::Accepted),
        Err(e) => Err(CodecError::Send(format!("{}: {}", label, e))),
    }
}

fn receive_status<T>(
    result: Result<(), ffmpeg::Error>,
    label: &str,
    convert: impl FnOnce() -> Result<T, CodecError>,
) -> Result<Received<T>, CodecError> {
    match result {
        Ok(()) => Ok(Received::Item(convert()?)),
        Err(ref e) if is_again(e) => Ok(Received::Again),
        Err(ffmpeg::Error::Eof) => Ok(Received::Eof),
        Err(e) => Err(CodecError::Receive(format!("{}: {}", label, e))),
    }
}

/// Session wrapper shared by all four kinds.
///
/// `C` is the opened `ffmpeg-next` coder.
pub struct Session<C> {
    coder: C,
    label: String,
}

// SAFETY: the codec context is created by this module with no shared owner
// (`Context::from_parameters` / `new_with_codec` leave the owner empty) and
// is only reachable through `&mut self`. libavcodec contexts may move
// between threads as long as they are not used concurrently.
unsafe impl<C> Send for Session<C> {}

impl<C> Session<C> {
    pub fn new(coder: C, label: impl Into<String>) -> Self {
        Self {
            coder,
            label: label.into(),
        }
    }
}

pub type VideoDecoderSession = Session<ffmpeg::decoder::Video>;
pub type AudioDecoderSession = Session<ffmpeg::decoder::Audio>;
pub type VideoEncoderSession = Session<ffmpeg::encoder::Video>;
pub type AudioEncoderSession = Session<ffmpeg::encoder::Audio>;

/// Send a demuxed packet to a decoder.
///
/// `AVERROR_INVALIDDATA` is treated as non-fatal: corrupt packets are
/// skipped instead of failing the whole job.
fn decode_send(
    decoder: &mut ffmpeg::decoder::Opened,
    input: Option<&Packet>,
    label: &str,
) -> Result<SendStatus, CodecError> {
    match input {
        Some(packet) => {
            let pkt = convert::packet_to(packet)?;
            match decoder.send_packet(&pkt) {
                Err(ffmpeg::Error::InvalidData) => {
                    tracing::debug!(codec = %label, "send_packet: skipping invalid packet");
                    Ok(SendStatus::Accepted)
                }
                other => send_status(other, label, false),
            }
        }
        None => send_status(decoder.send_eof(), label, true),
    }
}

impl CodecSession for VideoDecoderSession {
    type Input = Packet;
    type Output = VideoFrame;

    fn send(&mut self, input: Option<&Packet>) -> Result<SendStatus, CodecError> {
        decode_send(&mut self.coder, input, &self.label)
    }

    fn receive(&mut self) -> Result<Received<VideoFrame>, CodecError> {
        let mut frame = ffmpeg::frame::Video::empty();
        let result = self.coder.receive_frame(&mut frame);
        receive_status(result, &self.label, || {
            let mut out = convert::video_frame_from(&frame)?;
            out.pts = frame.timestamp().or(frame.pts());
            Ok(out)
        })
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        helpers::flush_codec_buffers(&mut self.coder);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

impl CodecSession for AudioDecoderSession {
    type Input = Packet;
    type Output = AudioFrame;

    fn send(&mut self, input: Option<&Packet>) -> Result<SendStatus, CodecError> {
        decode_send(&mut self.coder, input, &self.label)
    }

    fn receive(&mut self) -> Result<Received<AudioFrame>, CodecError> {
        let mut frame = ffmpeg::frame::Audio::empty();
        let result = self.coder.receive_frame(&mut frame);
        receive_status(result, &self.label, || {
            let mut out = convert::audio_frame_from(&frame)?;
            out.pts = frame.timestamp().or(frame.pts());
            Ok(out)
        })
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        helpers::flush_codec_buffers(&mut self.coder);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

fn encode_receive(
    encoder: &mut ffmpeg::encoder::Encoder,
    label: &str,
) -> Result<Received<Packet>, CodecError> {
    let mut packet = ffmpeg::Packet::empty();
    let result = encoder.receive_packet(&mut packet);
    receive_status(result, label, || Ok(convert::packet_from(&packet)))
}

impl CodecSession for VideoEncoderSession {
    type Input = VideoFrame;
    type Output = Packet;

    fn send(&mut self, input: Option<&VideoFrame>) -> Result<SendStatus, CodecError> {
        match input {
            Some(frame) => {
                let frame = convert::video_frame_to(frame);
                send_status(self.coder.send_frame(&frame), &self.label, false)
            }
            None => send_status(self.coder.send_eof(), &self.label, true),
        }
    }

    fn receive(&mut self) -> Result<Received<Packet>, CodecError> {
        encode_receive(&mut self.coder, &self.label)
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        helpers::flush_codec_buffers(&mut self.coder);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

impl CodecSession for AudioEncoderSession {
    type Input = AudioFrame;
    type Output = Packet;

    fn send(&mut self, input: Option<&AudioFrame>) -> Result<SendStatus, CodecError> {
        match input {
            Some(frame) => {
                let frame = convert::audio_frame_to(frame);
                send_status(self.coder.send_frame(&frame), &self.label, false)
            }
            None => send_status(self.coder.send_eof(), &self.label, true),
        }
    }

    fn receive(&mut self) -> Result<Received<Packet>, CodecError> {
        encode_receive(&mut self.coder, &self.label)
    }

    fn reset(&mut self) -> Result<(), CodecError> {
        helpers::flush_codec_buffers(&mut self.coder);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
