//! Raw-media transforms between decoders and encoders

pub mod resample;
pub mod scale;

pub use resample::{AudioFifo, AudioResampler, SampleConverter, DEFAULT_CHUNK_SAMPLES};
pub use scale::{FrameScaler, VideoScaler};
