// Audio format shared by the decoder, the capture process and the encoder
pub const SAMPLE_RATE: u32 = 48000; // 48 kHz sample rate
pub const BIT_DEPTH: u16 = 16; // 16 bits per sample
pub const CHANNELS: u16 = 2; // Stereo channel

/// Duration of one encoded frame in milliseconds.
pub const FRAME_LENGTH_MS: u32 = 20;

/// Samples per channel in one frame (960 at 48 kHz).
pub const SAMPLES_PER_FRAME: usize = (SAMPLE_RATE / 1000 * FRAME_LENGTH_MS) as usize;

/// Raw PCM bytes making up one frame (3840 for s16 stereo).
pub const FRAME_SIZE: usize = SAMPLES_PER_FRAME * CHANNELS as usize * (BIT_DEPTH as usize / 8);

/// Host audio server volume scale, 65535 being 100%.
pub const MIN_VOLUME: u16 = 0;
pub const MAX_VOLUME: u16 = 65535;

/// Volume change applied by a single "Vol +" / "Vol -" press.
pub const VOLUME_STEP: i64 = 10240;

/// Seek distances in seconds for the small and large skip buttons.
pub const SEEK_STEP_SECS: i64 = 5;
pub const SEEK_STEP_LARGE_SECS: i64 = 15;

/// Low shelf equalizer used for the bass boost toggle.
pub const BASS_BOOST_FILTER: &str = "equalizer=f=60:t=h:w=50:g=10";

/// Opus bitrate bounds in bits per second.
pub const MIN_BITRATE: i32 = 16_000;
pub const MAX_BITRATE: i32 = 512_000;
pub const DEFAULT_BITRATE: i32 = 128_000;

/// Upper bound on the size of one encoded packet.
pub const MAX_PACKET_SIZE: usize = 4000;
