//! Decoder and capture process supervision.
//!
//! Processes are started with piped stdout where the pipeline needs to read
//! it and are stopped with a forceful kill. There is no graceful shutdown and
//! no retry on a failed spawn.

use crate::constants::{CHANNELS, SAMPLE_RATE};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Liveness of a supervised process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exit code, `None` when the process was terminated by a signal.
    Exited(Option<i32>),
}

/// Which stdout handling a spawned process needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    /// Stdout is read by the pipeline.
    Piped,
    /// Stdout is discarded.
    Discard,
}

pub trait ManagedProcess: Send {
    fn id(&self) -> u32;

    /// Non-blocking liveness check.
    fn poll(&mut self) -> ProcessState;

    /// Sends a forceful terminate signal and reaps the process. There is no
    /// graceful shutdown.
    fn kill(&mut self);

    /// Takes the piped stdout. Returns `None` after the first call, or if the
    /// process was spawned with [`Output::Discard`].
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;
}

pub trait ProcessSupervisor: Send + Sync {
    /// Starts `argv[0]` with the remaining arguments.
    fn spawn(&self, argv: &[String], output: Output) -> Result<Box<dyn ManagedProcess>>;
}

/// Supervisor for real operating system processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemSupervisor;

impl ProcessSupervisor for SystemSupervisor {
    fn spawn(&self, argv: &[String], output: Output) -> Result<Box<dyn ManagedProcess>> {
        let (program, args) = argv.split_first().ok_or_else(|| PipelineError::ProcessSpawn {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
        })?;

        debug!("Spawning {}", argv.join(" "));

        let stdout = match output {
            Output::Piped => Stdio::piped(),
            Output::Discard => Stdio::null(),
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .spawn()
            .map_err(|source| PipelineError::ProcessSpawn {
                program: program.clone(),
                source,
            })?;

        info!("Started {program} (pid {})", child.id());

        Ok(Box::new(SystemProcess {
            program: program.clone(),
            child,
        }))
    }
}

struct SystemProcess {
    program: String,
    child: Child,
}

impl ManagedProcess for SystemProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn poll(&mut self) -> ProcessState {
        match self.child.try_wait() {
            Ok(Some(status)) => ProcessState::Exited(status.code()),
            Ok(None) => ProcessState::Running,
            Err(e) => {
                warn!("Could not poll {} (pid {}): {e}", self.program, self.id());
                ProcessState::Exited(None)
            }
        }
    }

    fn kill(&mut self) {
        // Already exited processes report InvalidInput, which is fine
        if let Err(e) = self.child.kill() {
            if e.kind() != std::io::ErrorKind::InvalidInput {
                error!("Failed to kill {} (pid {}): {e}", self.program, self.id());
            }
        }
        // SIGKILL cannot be ignored, so this returns promptly
        if let Err(e) = self.child.wait() {
            error!("Failed to reap {} (pid {}): {e}", self.program, self.id());
        }
    }

    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as Box<dyn Read + Send>)
    }
}

/// Unique ownership of a spawned process. Killed exactly once, on
/// [`ProcessGuard::kill`] or on drop.
pub struct ProcessGuard {
    label: &'static str,
    process: Box<dyn ManagedProcess>,
    killed: bool,
}

impl ProcessGuard {
    pub fn new(label: &'static str, process: Box<dyn ManagedProcess>) -> Self {
        Self {
            label,
            process,
            killed: false,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn poll(&mut self) -> ProcessState {
        self.process.poll()
    }

    pub fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.process.take_stdout()
    }

    pub fn kill(&mut self) {
        if !self.killed {
            self.killed = true;
            debug!("Killing {} (pid {})", self.label, self.process.id());
            self.process.kill();
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Paths of the external executables the pipeline drives.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutablePaths {
    pub decoder: String,
    pub capture: String,
    pub pactl: String,
}

impl Default for ExecutablePaths {
    fn default() -> Self {
        ExecutablePaths {
            decoder: "/usr/bin/mpv".to_string(),
            capture: "/usr/bin/parecord".to_string(),
            pactl: "pactl".to_string(),
        }
    }
}

/// Decoder invocation: no caching, no video, fixed s16 48 kHz stereo output
/// into `sink_name`, commands accepted on `endpoint`.
pub fn decoder_args(decoder: &str, source: &str, sink_name: &str, endpoint: &Path) -> Vec<String> {
    vec![
        decoder.to_string(),
        "--msg-level=all=error".to_string(),
        "--no-cache".to_string(),
        "--no-cache-pause".to_string(),
        "--demuxer-readahead-secs=0".to_string(),
        "--no-video".to_string(),
        "--no-audio-display".to_string(),
        format!("--input-ipc-server={}", endpoint.display()),
        "--ao=pulse".to_string(),
        format!("--audio-device=pulse/{sink_name}"),
        "--audio-format=s16".to_string(),
        format!("--audio-samplerate={SAMPLE_RATE}"),
        "--audio-channels=stereo".to_string(),
        source.to_string(),
    ]
}

/// Capture invocation: raw s16le at the decoder's rate and channel count,
/// recorded from `monitor`.
pub fn capture_args(capture: &str, monitor: &str) -> Vec<String> {
    vec![
        capture.to_string(),
        "-r".to_string(),
        "--raw".to_string(),
        format!("--rate={SAMPLE_RATE}"),
        format!("--channels={CHANNELS}"),
        "--format=s16le".to_string(),
        format!("--device={monitor}"),
    ]
}
