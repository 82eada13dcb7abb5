//! Media data model
//!
//! Packets, frames, stream descriptors and time bases moving through the
//! pipeline, plus the collaborator traits the pipeline is written against.

pub mod format;
pub mod frame;
pub mod io;
pub mod packet;
pub mod rational;
pub mod stream;

pub use format::{AudioFormat, ChannelLayout, PixelFormat, SampleFormat};
pub use frame::{AudioFrame, Plane, VideoFrame, VideoShape};
pub use io::{
    AudioDecoder, AudioEncoder, Demuxer, MediaBackend, Muxer, VideoDecoder, VideoEncoder,
};
pub use packet::{Packet, SideData, SideDataKind};
pub use rational::{compare_ts, rescale_ts, Rational};
pub use stream::{CodecParameters, MediaKind, StreamInfo};
