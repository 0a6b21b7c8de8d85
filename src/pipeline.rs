//! Pull-based audio pipeline.
//!
//! One pipeline owns a virtual sink, a decoder process playing into it, a
//! capture process recording its monitor, and an encoder turning the capture
//! output into codec frames. The four are created together by [`AudioPipeline::open`]
//! and torn down together by [`AudioPipeline::close`].
//!
//! `read` is driven by the playback framework's thread while control calls
//! arrive concurrently from the UI. The frame path and the control path hold
//! separate locks so a blocking pipe read never delays a command, and `close`
//! can kill the processes (unblocking the read) without waiting for it.

use crate::control::{
    validate_command, ControlChannel, ControlEndpoint, PlaybackControlState, PlayerCommand,
    UnixControlChannel,
};
use crate::encoder::{CodecFactory, EncoderState, FrameEncoder};
use crate::error::{PipelineError, Result};
use crate::names::ResourceNames;
use crate::process::{
    capture_args, decoder_args, ExecutablePaths, Output, ProcessGuard, ProcessState,
    ProcessSupervisor, SystemSupervisor,
};
use crate::sink::{PactlSinkManager, SinkGuard, SinkManager};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Unopened,
    Opening,
    Open,
    Closed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Unopened => "unopened",
            PipelineState::Opening => "opening",
            PipelineState::Open => "open",
            PipelineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// External collaborators of a pipeline.
#[derive(Clone)]
pub struct Backend {
    pub sinks: Arc<dyn SinkManager>,
    pub supervisor: Arc<dyn ProcessSupervisor>,
    pub control: Arc<dyn ControlChannel>,
    pub codecs: Arc<dyn CodecFactory>,
}

impl Backend {
    /// Host backend: `pactl`, OS processes, Unix sockets and Opus.
    #[cfg(feature = "opus")]
    pub fn system(executables: &ExecutablePaths) -> Self {
        Backend {
            sinks: Arc::new(PactlSinkManager::new(executables.pactl.clone())),
            supervisor: Arc::new(SystemSupervisor),
            control: Arc::new(UnixControlChannel),
            codecs: Arc::new(crate::encoder::OpusCodecFactory),
        }
    }
}

/// Parameters of [`AudioPipeline::open`].
#[derive(Clone, Debug)]
pub struct OpenOptions {
    /// File path or URL handed to the decoder.
    pub source: String,
    /// Codec bitrate in bits per second.
    pub bitrate: i32,
    pub executables: ExecutablePaths,
    pub sink_prefix: String,
    pub socket_dir: PathBuf,
}

impl OpenOptions {
    pub fn new(source: impl Into<String>, bitrate: i32) -> Self {
        OpenOptions {
            source: source.into(),
            bitrate,
            executables: ExecutablePaths::default(),
            sink_prefix: "discord".to_string(),
            socket_dir: std::env::temp_dir(),
        }
    }
}

/// The decoder and capture processes of an open pipeline.
struct ProcessPair {
    decoder: ProcessGuard,
    capture: ProcessGuard,
}

impl ProcessPair {
    /// Liveness of both processes; logs the first one found exited.
    fn upstream_alive(&mut self) -> bool {
        for process in [&mut self.decoder, &mut self.capture] {
            if let ProcessState::Exited(code) = process.poll() {
                match code {
                    Some(code) => info!("{} process exited with code {code}", process.label()),
                    None => info!("{} process was terminated by a signal", process.label()),
                }
                return false;
            }
        }
        true
    }

    fn kill(mut self) {
        self.decoder.kill();
        self.capture.kill();
    }
}

/// Everything `open` acquires, before it is handed to the pipeline's locks.
struct Acquired {
    processes: ProcessPair,
    sink: SinkGuard,
    endpoint: ControlEndpoint,
    encoder: FrameEncoder,
}

pub struct AudioPipeline {
    backend: Backend,
    state: Mutex<PipelineState>,
    processes: Mutex<Option<ProcessPair>>,
    sink: Mutex<Option<SinkGuard>>,
    endpoint: Mutex<Option<ControlEndpoint>>,
    frames: Mutex<Option<FrameEncoder>>,
    playback: Mutex<PlaybackControlState>,
}

/// Locks a mutex, recovering the data if another holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AudioPipeline {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            state: Mutex::new(PipelineState::Unopened),
            processes: Mutex::new(None),
            sink: Mutex::new(None),
            endpoint: Mutex::new(None),
            frames: Mutex::new(None),
            playback: Mutex::new(PlaybackControlState::default()),
        }
    }

    /// Creates a pipeline and opens it in one step.
    pub fn start(backend: Backend, options: &OpenOptions) -> Result<Self> {
        let pipeline = Self::new(backend);
        pipeline.open(options)?;
        Ok(pipeline)
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    /// Acquires sink, decoder, capture and encoder in that order.
    ///
    /// A sink failure leaves the pipeline `Unopened` with nothing started. A
    /// later failure releases everything acquired so far and leaves the
    /// pipeline `Closed`.
    pub fn open(&self, options: &OpenOptions) -> Result<()> {
        {
            let mut state = lock(&self.state);
            if *state != PipelineState::Unopened {
                return Err(PipelineError::AlreadyOpened {
                    state: state.to_string(),
                });
            }
            *state = PipelineState::Opening;
        }

        let names = ResourceNames::allocate(&options.sink_prefix, &options.socket_dir);
        info!("Opening pipeline for {} (sink {})", options.source, names.sink_name);

        let sink = match SinkGuard::create(self.backend.sinks.clone(), &names.sink_name) {
            Ok(sink) => sink,
            Err(e) => {
                error!("Could not create sink {}: {e}", names.sink_name);
                *lock(&self.state) = PipelineState::Unopened;
                return Err(e);
            }
        };

        match self.acquire(options, &names, sink) {
            Ok(acquired) => {
                *lock(&self.processes) = Some(acquired.processes);
                *lock(&self.sink) = Some(acquired.sink);
                *lock(&self.endpoint) = Some(acquired.endpoint);
                *lock(&self.frames) = Some(acquired.encoder);
                *lock(&self.state) = PipelineState::Open;
                info!("Pipeline for {} is open", options.source);
                Ok(())
            }
            Err(e) => {
                error!("Failed to open pipeline for {}: {e}", options.source);
                ControlEndpoint::new(names.endpoint_path).discard();
                self.close();
                Err(e)
            }
        }
    }

    /// Steps after sink creation. Anything acquired here, the sink included,
    /// is released by its guard if a later step fails.
    fn acquire(&self, options: &OpenOptions, names: &ResourceNames, sink: SinkGuard) -> Result<Acquired> {
        let endpoint = ControlEndpoint::new(names.endpoint_path.clone());
        let monitor = match sink.handle() {
            Some(handle) => handle.monitor_name(),
            None => format!("{}.monitor", names.sink_name),
        };

        let decoder_argv = decoder_args(
            &options.executables.decoder,
            &options.source,
            &names.sink_name,
            &endpoint.path,
        );
        let decoder = ProcessGuard::new(
            "decoder",
            self.backend.supervisor.spawn(&decoder_argv, Output::Discard)?,
        );

        let capture_argv = capture_args(&options.executables.capture, &monitor);
        let mut capture = ProcessGuard::new(
            "capture",
            self.backend.supervisor.spawn(&capture_argv, Output::Piped)?,
        );

        let reader = capture.take_stdout().ok_or_else(|| PipelineError::ProcessSpawn {
            program: options.executables.capture.clone(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout is not piped"),
        })?;

        let encoder_state = EncoderState::new(options.bitrate);
        let codec = self.backend.codecs.make(encoder_state.bitrate)?;

        Ok(Acquired {
            processes: ProcessPair { decoder, capture },
            sink,
            endpoint,
            encoder: FrameEncoder::new(encoder_state, reader, codec),
        })
    }

    /// Next encoded frame, or `None` when no audio is available: the pipeline
    /// is not open, either process has exited, or the capture stream ended or
    /// produced a torn chunk. `None` does not close the pipeline.
    pub fn read(&self) -> Option<Vec<u8>> {
        if !lock(&self.processes).as_mut()?.upstream_alive() {
            return None;
        }

        lock(&self.frames).as_mut()?.next_frame()
    }

    /// Translates `command` into the decoder's syntax and sends it. Toggles
    /// update [`PlaybackControlState`] first, so the shadow flips even when the
    /// send fails.
    pub fn send_command(&self, command: PlayerCommand) -> Result<()> {
        let endpoint = self.endpoint()?;
        let line = lock(&self.playback).apply(&command);
        validate_command(&line)?;

        self.backend.control.send(&endpoint, &line).inspect_err(|e| {
            warn!("Control command {line:?} failed: {e}");
        })
    }

    /// Sends a raw command line to the decoder.
    pub fn send_raw(&self, command: &str) -> Result<()> {
        self.send_command(PlayerCommand::Raw(command.to_string()))
    }

    pub fn playback_state(&self) -> PlaybackControlState {
        lock(&self.playback).clone()
    }

    /// Sets the sink volume, clamped to the server's scale. Returns the level
    /// stored, which `volume` reports even if the server call failed.
    pub fn set_volume(&self, level: i64) -> Result<u16> {
        let mut sink = lock(&self.sink);
        let sink = sink.as_mut().ok_or_else(|| self.not_open())?;
        sink.set_volume(level)
    }

    /// Adjusts the cached volume by `delta`.
    pub fn step_volume(&self, delta: i64) -> Result<u16> {
        let mut sink = lock(&self.sink);
        let sink = sink.as_mut().ok_or_else(|| self.not_open())?;
        let current = sink.volume() as i64;
        sink.set_volume(current + delta)
    }

    pub fn volume(&self) -> Result<u16> {
        lock(&self.sink)
            .as_ref()
            .map(|sink| sink.volume())
            .ok_or_else(|| self.not_open())
    }

    /// Kills both processes, removes the sink and drops the encoder. Safe to
    /// call in any state and any number of times.
    pub fn close(&self) {
        let processes = lock(&self.processes).take();
        let was_open = processes.is_some();

        // Killing the capture process ends any read blocked on its stdout,
        // so the frame lock is only taken afterwards
        if let Some(processes) = processes {
            processes.kill();
        }

        if let Some(mut sink) = lock(&self.sink).take() {
            sink.release();
        }

        if let Some(endpoint) = lock(&self.endpoint).take() {
            endpoint.discard();
        }

        let encoder = lock(&self.frames).take();
        drop(encoder);

        *lock(&self.state) = PipelineState::Closed;

        if was_open {
            info!("Pipeline closed");
        }
    }

    fn endpoint(&self) -> Result<ControlEndpoint> {
        if self.state() != PipelineState::Open {
            return Err(self.not_open());
        }

        lock(&self.endpoint).clone().ok_or_else(|| self.not_open())
    }

    fn not_open(&self) -> PipelineError {
        PipelineError::NotOpen {
            state: self.state().to_string(),
        }
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.close();
    }
}
