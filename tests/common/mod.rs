//! Test infrastructure for mpv-voice-rs integration tests.
//!
//! Provides fake collaborators that stand in for `pactl`, the decoder and
//! capture processes, the control socket and the codec, so pipelines can be
//! driven without a host audio server.

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub use mpv_voice_rs::constants::FRAME_SIZE;
pub use mpv_voice_rs::control::{ControlChannel, ControlEndpoint, PlaybackControlState, PlayerCommand};
pub use mpv_voice_rs::encoder::{CodecFactory, FrameCodec};
pub use mpv_voice_rs::error::{PipelineError, Result};
pub use mpv_voice_rs::pipeline::{AudioPipeline, Backend, OpenOptions, PipelineState};
pub use mpv_voice_rs::process::{ManagedProcess, Output, ProcessState, ProcessSupervisor};
pub use mpv_voice_rs::session::{ControlAction, ControlReply, PlayerSession, SessionError};
pub use mpv_voice_rs::sink::{SinkHandle, SinkManager};
pub use mpv_voice_rs::source::FrameSource;

/// Size of every frame the fake codec emits.
pub const FAKE_PACKET_SIZE: usize = 16;

/// Sink manager counting create/destroy calls and recording volume requests.
#[derive(Default)]
pub struct FakeSinkManager {
    pub created: Mutex<Vec<String>>,
    pub destroyed: Mutex<Vec<SinkHandle>>,
    pub volumes: Mutex<Vec<u16>>,
    pub fail_create: AtomicBool,
    pub fail_volume: AtomicBool,
}

impl FakeSinkManager {
    pub fn create_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.lock().unwrap().len()
    }
}

impl SinkManager for FakeSinkManager {
    fn create(&self, name: &str) -> Result<SinkHandle> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PipelineError::SinkRegistration {
                message: "module-null-sink rejected".to_string(),
            });
        }

        let mut created = self.created.lock().unwrap();
        created.push(name.to_string());

        Ok(SinkHandle {
            name: name.to_string(),
            module_id: created.len() as u32,
        })
    }

    fn destroy(&self, handle: &SinkHandle) {
        self.destroyed.lock().unwrap().push(handle.clone());
    }

    fn set_volume(&self, _handle: &SinkHandle, level: u16) -> Result<()> {
        self.volumes.lock().unwrap().push(level);

        if self.fail_volume.load(Ordering::SeqCst) {
            return Err(PipelineError::SinkVolume {
                message: "set-sink-volume failed".to_string(),
            });
        }

        Ok(())
    }
}

/// Observable state of one fake process, shared with the test.
#[derive(Default)]
pub struct ProcessProbe {
    pub argv: Vec<String>,
    pub kills: AtomicUsize,
    pub exit_code: Mutex<Option<i32>>,
}

impl ProcessProbe {
    /// Makes the process report itself as exited with `code`.
    pub fn exit(&self, code: i32) {
        *self.exit_code.lock().unwrap() = Some(code);
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

struct FakeProcess {
    probe: Arc<ProcessProbe>,
    stdout: Option<Box<dyn Read + Send>>,
}

impl ManagedProcess for FakeProcess {
    fn id(&self) -> u32 {
        4242
    }

    fn poll(&mut self) -> ProcessState {
        if self.probe.kill_count() > 0 {
            return ProcessState::Exited(None);
        }

        match *self.probe.exit_code.lock().unwrap() {
            Some(code) => ProcessState::Exited(Some(code)),
            None => ProcessState::Running,
        }
    }

    fn kill(&mut self) {
        self.probe.kills.fetch_add(1, Ordering::SeqCst);
    }

    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout.take()
    }
}

/// Reader that counts how many times it was asked for data.
pub struct CountingReader {
    inner: Cursor<Vec<u8>>,
    reads: Arc<AtomicUsize>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(buf)
    }
}

/// Supervisor handing out fake processes. The process spawned with a piped
/// stdout (the capture process) reads from `capture_data`.
#[derive(Default)]
pub struct FakeSupervisor {
    pub spawned: Mutex<Vec<Arc<ProcessProbe>>>,
    pub capture_data: Mutex<Vec<u8>>,
    pub capture_reads: Arc<AtomicUsize>,
    /// Spawn call index (0 = decoder, 1 = capture) that fails
    pub fail_at: Mutex<Option<usize>>,
}

impl FakeSupervisor {
    pub fn decoder(&self) -> Arc<ProcessProbe> {
        self.spawned.lock().unwrap()[0].clone()
    }

    pub fn capture(&self) -> Arc<ProcessProbe> {
        self.spawned.lock().unwrap()[1].clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    pub fn total_kills(&self) -> usize {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .map(|probe| probe.kill_count())
            .sum()
    }
}

impl ProcessSupervisor for FakeSupervisor {
    fn spawn(&self, argv: &[String], output: Output) -> Result<Box<dyn ManagedProcess>> {
        let mut spawned = self.spawned.lock().unwrap();

        if *self.fail_at.lock().unwrap() == Some(spawned.len()) {
            return Err(PipelineError::ProcessSpawn {
                program: argv[0].clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }

        let probe = Arc::new(ProcessProbe {
            argv: argv.to_vec(),
            ..ProcessProbe::default()
        });
        spawned.push(probe.clone());

        let stdout = match output {
            Output::Piped => Some(Box::new(CountingReader {
                inner: Cursor::new(self.capture_data.lock().unwrap().clone()),
                reads: self.capture_reads.clone(),
            }) as Box<dyn Read + Send>),
            Output::Discard => None,
        };

        Ok(Box::new(FakeProcess { probe, stdout }))
    }
}

/// Control channel recording every line it is asked to send.
#[derive(Default)]
pub struct FakeControlChannel {
    pub sent: Mutex<Vec<(PathBuf, String)>>,
    pub refuse: AtomicBool,
}

impl FakeControlChannel {
    pub fn commands(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }
}

impl ControlChannel for FakeControlChannel {
    fn send(&self, endpoint: &ControlEndpoint, command: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((endpoint.path.clone(), command.to_string()));

        if self.refuse.load(Ordering::SeqCst) {
            return Err(PipelineError::ControlChannel {
                endpoint: endpoint.path.clone(),
                message: "Connection refused".to_string(),
            });
        }

        Ok(())
    }
}

/// Codec emitting fixed-size frames and recording the chunk sizes it saw.
#[derive(Default)]
pub struct FakeCodecFactory {
    pub bitrates: Mutex<Vec<i32>>,
    pub chunks: Arc<Mutex<Vec<usize>>>,
    pub fail: AtomicBool,
}

struct FakeCodec {
    chunks: Arc<Mutex<Vec<usize>>>,
}

impl FrameCodec for FakeCodec {
    fn encode(&mut self, pcm: &[u8]) -> Result<Vec<u8>> {
        self.chunks.lock().unwrap().push(pcm.len());
        Ok(pcm[..FAKE_PACKET_SIZE].to_vec())
    }
}

impl CodecFactory for FakeCodecFactory {
    fn make(&self, bitrate: i32) -> Result<Box<dyn FrameCodec>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::Encoder {
                message: "unsupported bitrate".to_string(),
            });
        }

        self.bitrates.lock().unwrap().push(bitrate);
        Ok(Box::new(FakeCodec {
            chunks: self.chunks.clone(),
        }))
    }
}

/// All fakes of one test, plus the backend wired to them.
#[derive(Default)]
pub struct Fakes {
    pub sinks: Arc<FakeSinkManager>,
    pub supervisor: Arc<FakeSupervisor>,
    pub control: Arc<FakeControlChannel>,
    pub codecs: Arc<FakeCodecFactory>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fakes whose capture process yields `frames` full PCM frames.
    pub fn with_frames(frames: usize) -> Self {
        let fakes = Self::new();
        fakes.set_capture_data(pcm_frames(frames));
        fakes
    }

    pub fn set_capture_data(&self, data: Vec<u8>) {
        *self.supervisor.capture_data.lock().unwrap() = data;
    }

    pub fn backend(&self) -> Backend {
        Backend {
            sinks: self.sinks.clone(),
            supervisor: self.supervisor.clone(),
            control: self.control.clone(),
            codecs: self.codecs.clone(),
        }
    }

    /// Opens a pipeline on `track.mp3` at 128 kbps.
    pub fn open(&self) -> AudioPipeline {
        AudioPipeline::start(self.backend(), &test_options()).expect("Failed to open pipeline")
    }
}

pub fn test_options() -> OpenOptions {
    OpenOptions::new("track.mp3", 128_000)
}

/// `count` frames of PCM where frame `n` is filled with byte `n + 1`.
pub fn pcm_frames(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|n| std::iter::repeat((n + 1) as u8).take(FRAME_SIZE))
        .collect()
}
