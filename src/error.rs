//! Error types for the audio pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The host audio server refused the virtual sink, or `pactl` could not
    /// be run at all. Fatal to `open`.
    #[error("Failed to register virtual sink: {message}")]
    SinkRegistration { message: String },

    #[error("Failed to set sink volume: {message}")]
    SinkVolume { message: String },

    /// An external process could not be started. Fatal to `open`.
    #[error("Failed to spawn {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The decoder control endpoint is missing or refused the connection.
    /// Never affects the frame path.
    #[error("Control channel {endpoint:?} unavailable: {message}")]
    ControlChannel { endpoint: PathBuf, message: String },

    #[error("Control command must be a single line: {command:?}")]
    InvalidCommand { command: String },

    #[error("Encoder error: {message}")]
    Encoder { message: String },

    #[error("Pipeline is not open (state: {state})")]
    NotOpen { state: String },

    #[error("Pipeline was already opened (state: {state})")]
    AlreadyOpened { state: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
