//! Raw PCM to codec frame conversion.
//!
//! [`FrameEncoder`] pulls exactly one frame worth of s16le stereo PCM from the
//! capture process's stdout and hands it whole to a streaming codec. A chunk
//! that comes up short is dropped instead of being padded or completed later.
//! Reads from a slow producer are accumulated until the frame is full, and
//! only end of stream produces a short chunk.

use crate::constants::{FRAME_SIZE, MAX_BITRATE, MIN_BITRATE, SAMPLES_PER_FRAME};
use crate::error::Result;
use std::io::{ErrorKind, Read};

/// A stateful encoder turning one frame of interleaved PCM into one packet.
pub trait FrameCodec: Send {
    fn encode(&mut self, pcm: &[u8]) -> Result<Vec<u8>>;
}

/// Builds a codec for a pipeline.
pub trait CodecFactory: Send + Sync {
    fn make(&self, bitrate: i32) -> Result<Box<dyn FrameCodec>>;
}

/// Clamps a requested bitrate into the range the codec accepts.
pub fn clamp_bitrate(bitrate: i32) -> i32 {
    bitrate.clamp(MIN_BITRATE, MAX_BITRATE)
}

/// Fixed frame parameters plus the bitrate, immutable after construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderState {
    pub frame_byte_size: usize,
    pub samples_per_frame: usize,
    pub bitrate: i32,
}

impl EncoderState {
    pub fn new(bitrate: i32) -> Self {
        EncoderState {
            frame_byte_size: FRAME_SIZE,
            samples_per_frame: SAMPLES_PER_FRAME,
            bitrate: clamp_bitrate(bitrate),
        }
    }
}

pub struct FrameEncoder {
    state: EncoderState,
    reader: Box<dyn Read + Send>,
    codec: Box<dyn FrameCodec>,
    buf: Vec<u8>,
    exhausted: bool,
    frames_read: u64,
}

impl FrameEncoder {
    pub fn new(state: EncoderState, reader: Box<dyn Read + Send>, codec: Box<dyn FrameCodec>) -> Self {
        Self {
            buf: vec![0; state.frame_byte_size],
            state,
            reader,
            codec,
            exhausted: false,
            frames_read: 0,
        }
    }

    pub fn state(&self) -> EncoderState {
        self.state
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Next encoded frame, or `None` once the stream has ended or a torn
    /// chunk was seen. `None` is sticky.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.exhausted {
            return None;
        }

        let filled = match read_full(&mut self.reader, &mut self.buf) {
            Ok(filled) => filled,
            Err(e) => {
                warn!("Capture stream read failed: {e}");
                self.exhausted = true;
                return None;
            }
        };

        if filled != self.state.frame_byte_size {
            if filled == 0 {
                debug!("Capture stream reached end of stream");
            } else {
                warn!(
                    "Dropping torn frame of {filled} bytes (expected {})",
                    self.state.frame_byte_size
                );
            }
            self.exhausted = true;
            return None;
        }

        self.frames_read += 1;
        trace!("Read frame {} ({filled} bytes)", self.frames_read);

        match self.codec.encode(&self.buf) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Failed to encode frame {}: {e}", self.frames_read);
                None
            }
        }
    }
}

/// Reads until `buf` is full or the stream ends. Returns bytes read.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

#[cfg(feature = "opus")]
pub use self::opus::{OpusCodec, OpusCodecFactory};

#[cfg(feature = "opus")]
mod opus {
    use super::{clamp_bitrate, CodecFactory, FrameCodec};
    use crate::constants::{FRAME_SIZE, MAX_PACKET_SIZE};
    use crate::error::{PipelineError, Result};
    use audiopus::coder::Encoder;
    use audiopus::{Application, Bitrate, Channels, SampleRate};
    use byteorder::{ByteOrder, LittleEndian};

    /// Opus encoder for 48 kHz stereo voice transport.
    pub struct OpusCodec {
        encoder: Encoder,
        samples: Vec<i16>,
        packet: Vec<u8>,
    }

    impl OpusCodec {
        pub fn new(bitrate: i32) -> Result<Self> {
            let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
                .map_err(encoder_error)?;
            encoder
                .set_bitrate(Bitrate::BitsPerSecond(clamp_bitrate(bitrate)))
                .map_err(encoder_error)?;

            Ok(Self {
                encoder,
                samples: vec![0; FRAME_SIZE / 2],
                packet: vec![0; MAX_PACKET_SIZE],
            })
        }
    }

    impl FrameCodec for OpusCodec {
        fn encode(&mut self, pcm: &[u8]) -> Result<Vec<u8>> {
            self.samples.resize(pcm.len() / 2, 0);
            LittleEndian::read_i16_into(pcm, &mut self.samples);

            let len = self
                .encoder
                .encode(&self.samples, &mut self.packet)
                .map_err(encoder_error)?;

            Ok(self.packet[..len].to_vec())
        }
    }

    #[derive(Clone, Copy, Debug, Default)]
    pub struct OpusCodecFactory;

    impl CodecFactory for OpusCodecFactory {
        fn make(&self, bitrate: i32) -> Result<Box<dyn FrameCodec>> {
            Ok(Box::new(OpusCodec::new(bitrate)?))
        }
    }

    fn encoder_error(e: audiopus::Error) -> PipelineError {
        PipelineError::Encoder {
            message: e.to_string(),
        }
    }
}
