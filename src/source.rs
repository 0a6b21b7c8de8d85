//! Pull-based frame source consumed by the voice transport.
//!
//! The transport calls `read` once per frame interval on its own thread. An
//! empty result means no frame is available right now.

use crate::pipeline::AudioPipeline;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use std::sync::Arc;

pub trait FrameSource: Send + Sync {
    /// One encoded frame, or empty bytes.
    fn read(&self) -> Vec<u8>;

    /// Whether `read` returns codec frames rather than raw PCM.
    fn is_encoded_format(&self) -> bool;

    /// Releases everything the source holds.
    fn cleanup(&self);
}

impl FrameSource for AudioPipeline {
    fn read(&self) -> Vec<u8> {
        AudioPipeline::read(self).unwrap_or_default()
    }

    fn is_encoded_format(&self) -> bool {
        true
    }

    fn cleanup(&self) {
        self.close();
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Arc<T> {
    fn read(&self) -> Vec<u8> {
        (**self).read()
    }

    fn is_encoded_format(&self) -> bool {
        (**self).is_encoded_format()
    }

    fn cleanup(&self) {
        (**self).cleanup()
    }
}

/// Writes frames from `source` to `output` until it runs dry, each frame
/// prefixed with its length as a little endian `i16`. Returns the number of
/// frames written.
pub fn write_packets<S, W>(source: &S, output: &mut W) -> std::io::Result<u64>
where
    S: FrameSource + ?Sized,
    W: Write,
{
    let mut frames = 0;

    loop {
        let frame = source.read();
        if frame.is_empty() {
            break;
        }

        output.write_i16::<LittleEndian>(frame.len() as i16)?;
        output.write_all(&frame)?;
        frames += 1;
    }

    output.flush()?;
    Ok(frames)
}
