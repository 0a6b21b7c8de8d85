//! Out-of-band control of the decoder.
//!
//! Every command is a single UTF-8 line written over a fresh connection to the
//! decoder's IPC socket. Nothing is read back and no connection outlives one
//! command, so the control plane holds no state tied to the decoder's
//! lifetime besides the socket path.

use crate::constants::BASS_BOOST_FILTER;
use crate::error::{PipelineError, Result};
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// Address of a decoder's command interface. Valid only while that decoder
/// is alive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlEndpoint {
    pub path: PathBuf,
}

impl ControlEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Removes a socket file the killed decoder left behind.
    pub fn discard(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed control socket {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove control socket {:?}: {e}", self.path),
        }
    }
}

pub trait ControlChannel: Send + Sync {
    /// Delivers one command line. Fails if the endpoint is missing or refuses
    /// the connection.
    fn send(&self, endpoint: &ControlEndpoint, command: &str) -> Result<()>;
}

/// Rejects commands that would be split into several protocol lines.
pub fn validate_command(command: &str) -> Result<()> {
    if command.contains('\n') || command.contains('\r') {
        return Err(PipelineError::InvalidCommand {
            command: command.to_string(),
        });
    }

    Ok(())
}

/// One-shot sender over a Unix domain socket.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnixControlChannel;

impl ControlChannel for UnixControlChannel {
    fn send(&self, endpoint: &ControlEndpoint, command: &str) -> Result<()> {
        validate_command(command)?;

        let channel_error = |path: &Path, e: std::io::Error| PipelineError::ControlChannel {
            endpoint: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut stream =
            UnixStream::connect(&endpoint.path).map_err(|e| channel_error(&endpoint.path, e))?;

        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');

        stream
            .write_all(line.as_bytes())
            .map_err(|e| channel_error(&endpoint.path, e))?;

        debug!("Sent control command {command:?}");

        Ok(())
    }
}

/// High level playback intents understood by the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Relative seek in seconds, negative seeks backwards
    Seek(i64),

    TogglePause,

    SpeedUp,

    SpeedDown,

    /// Flips looping of the current file
    ToggleLoop,

    /// Flips the bass boost equalizer
    ToggleBassBoost,

    /// Stops the decoder
    Quit,

    /// Passed to the decoder verbatim
    Raw(String),
}

/// Local mirror of what has been sent to the decoder for toggle commands.
///
/// Not reconciled with the decoder, which has no query protocol here. It
/// flips before the command is sent, whether or not the send succeeds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackControlState {
    pub looping: bool,
    pub bass_boost_enabled: bool,
    pub filter_expression: String,
}

impl Default for PlaybackControlState {
    fn default() -> Self {
        PlaybackControlState {
            looping: false,
            bass_boost_enabled: false,
            filter_expression: BASS_BOOST_FILTER.to_string(),
        }
    }
}

impl PlaybackControlState {
    /// Applies `command` to the shadow state and returns the decoder command
    /// line that expresses it.
    pub fn apply(&mut self, command: &PlayerCommand) -> String {
        match command {
            PlayerCommand::Seek(secs) => format!("seek {secs}"),
            PlayerCommand::TogglePause => "keypress space".to_string(),
            PlayerCommand::SpeedUp => "keypress }".to_string(),
            PlayerCommand::SpeedDown => "keypress {".to_string(),
            PlayerCommand::ToggleLoop => {
                self.looping = !self.looping;
                if self.looping {
                    "set loop-file inf".to_string()
                } else {
                    "set loop-file no".to_string()
                }
            }
            PlayerCommand::ToggleBassBoost => {
                self.bass_boost_enabled = !self.bass_boost_enabled;
                if self.bass_boost_enabled {
                    format!("af set {}", self.filter_expression)
                } else {
                    format!("af remove {}", self.filter_expression)
                }
            }
            PlayerCommand::Quit => "quit".to_string(),
            PlayerCommand::Raw(raw) => raw.clone(),
        }
    }

    pub fn loop_label(&self) -> String {
        format!("Loop: {}", on_off(self.looping))
    }

    pub fn bass_boost_label(&self) -> String {
        format!("Bass Boost: {}", on_off(self.bass_boost_enabled))
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
