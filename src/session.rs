//! Glue between a control surface and the current pipeline.
//!
//! A session holds at most one pipeline. Control actions issued while no
//! pipeline is playing get an explicit [`SessionError::NotConnected`] rather
//! than a protocol error from a missing socket.

use crate::constants::{SEEK_STEP_LARGE_SECS, SEEK_STEP_SECS, VOLUME_STEP};
use crate::control::{PlaybackControlState, PlayerCommand};
use crate::error::PipelineError;
use crate::pipeline::{AudioPipeline, Backend, OpenOptions, PipelineState};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not Connected")]
    NotConnected,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// The player controls offered to users.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlAction {
    SeekBackLarge,
    SeekBack,
    PlayPause,
    SeekForward,
    SeekForwardLarge,
    Stop,
    VolumeUp,
    VolumeDown,
    SpeedDown,
    SpeedUp,
    ToggleLoop,
    ToggleBassBoost,
    Seek(i64),
    SetVolume(i64),
    Raw(String),
}

impl ControlAction {
    /// Button caption, toggles showing their current shadow state.
    pub fn label(&self, state: &PlaybackControlState) -> String {
        match self {
            ControlAction::SeekBackLarge => "<<".to_string(),
            ControlAction::SeekBack => "<".to_string(),
            ControlAction::PlayPause => "Play/Pause".to_string(),
            ControlAction::SeekForward => ">".to_string(),
            ControlAction::SeekForwardLarge => ">>".to_string(),
            ControlAction::Stop => "Stop".to_string(),
            ControlAction::VolumeUp => "Vol +".to_string(),
            ControlAction::VolumeDown => "Vol -".to_string(),
            ControlAction::SpeedDown => "Spd -".to_string(),
            ControlAction::SpeedUp => "Spd +".to_string(),
            ControlAction::ToggleLoop => state.loop_label(),
            ControlAction::ToggleBassBoost => state.bass_boost_label(),
            ControlAction::Seek(secs) => format!("Seek {secs}"),
            ControlAction::SetVolume(level) => format!("Vol {level}"),
            ControlAction::Raw(command) => command.clone(),
        }
    }

    /// Decoder intent behind this action, `None` for volume actions.
    fn command(&self) -> Option<PlayerCommand> {
        let command = match self {
            ControlAction::SeekBackLarge => PlayerCommand::Seek(-SEEK_STEP_LARGE_SECS),
            ControlAction::SeekBack => PlayerCommand::Seek(-SEEK_STEP_SECS),
            ControlAction::PlayPause => PlayerCommand::TogglePause,
            ControlAction::SeekForward => PlayerCommand::Seek(SEEK_STEP_SECS),
            ControlAction::SeekForwardLarge => PlayerCommand::Seek(SEEK_STEP_LARGE_SECS),
            ControlAction::Stop => PlayerCommand::Quit,
            ControlAction::SpeedDown => PlayerCommand::SpeedDown,
            ControlAction::SpeedUp => PlayerCommand::SpeedUp,
            ControlAction::ToggleLoop => PlayerCommand::ToggleLoop,
            ControlAction::ToggleBassBoost => PlayerCommand::ToggleBassBoost,
            ControlAction::Seek(secs) => PlayerCommand::Seek(*secs),
            ControlAction::Raw(command) => PlayerCommand::Raw(command.clone()),
            ControlAction::VolumeUp | ControlAction::VolumeDown | ControlAction::SetVolume(_) => {
                return None
            }
        };
        Some(command)
    }

    /// Every button of the player view, in display order.
    pub fn buttons() -> Vec<ControlAction> {
        vec![
            ControlAction::SeekBackLarge,
            ControlAction::SeekBack,
            ControlAction::PlayPause,
            ControlAction::SeekForward,
            ControlAction::SeekForwardLarge,
            ControlAction::Stop,
            ControlAction::VolumeUp,
            ControlAction::VolumeDown,
            ControlAction::SpeedDown,
            ControlAction::SpeedUp,
            ControlAction::ToggleLoop,
            ControlAction::ToggleBassBoost,
        ]
    }
}

/// Outcome of a successful control action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlReply {
    /// Command delivered, nothing to show
    Done,
    /// Toggle delivered; the button should now read `label`
    Relabel { label: String },
    /// Cached sink volume after the change
    Volume(u16),
    /// Player stopped; the control view should be removed
    Stopped,
}

pub struct PlayerSession {
    backend: Backend,
    current: Mutex<Option<Arc<AudioPipeline>>>,
}

impl PlayerSession {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            current: Mutex::new(None),
        }
    }

    /// Opens a pipeline for `options`, closing whatever was playing before.
    pub fn play(&self, options: &OpenOptions) -> Result<Arc<AudioPipeline>, SessionError> {
        self.stop();

        let pipeline = Arc::new(AudioPipeline::start(self.backend.clone(), options)?);
        *self.lock() = Some(pipeline.clone());

        Ok(pipeline)
    }

    /// Closes the current pipeline, if any.
    pub fn stop(&self) {
        let previous = self.lock().take();
        if let Some(pipeline) = previous {
            pipeline.close();
        }
    }

    pub fn current(&self) -> Option<Arc<AudioPipeline>> {
        self.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current()
            .is_some_and(|pipeline| pipeline.state() == PipelineState::Open)
    }

    pub fn apply(&self, action: &ControlAction) -> Result<ControlReply, SessionError> {
        let pipeline = self
            .current()
            .filter(|pipeline| pipeline.state() == PipelineState::Open)
            .ok_or(SessionError::NotConnected)?;

        match action {
            ControlAction::VolumeUp => Ok(ControlReply::Volume(pipeline.step_volume(VOLUME_STEP)?)),
            ControlAction::VolumeDown => {
                Ok(ControlReply::Volume(pipeline.step_volume(-VOLUME_STEP)?))
            }
            ControlAction::SetVolume(level) => Ok(ControlReply::Volume(pipeline.set_volume(*level)?)),
            _ => {
                let Some(command) = action.command() else {
                    return Ok(ControlReply::Done);
                };
                pipeline.send_command(command)?;

                Ok(match action {
                    ControlAction::ToggleLoop | ControlAction::ToggleBassBoost => {
                        ControlReply::Relabel {
                            label: action.label(&pipeline.playback_state()),
                        }
                    }
                    ControlAction::Stop => ControlReply::Stopped,
                    _ => ControlReply::Done,
                })
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<AudioPipeline>>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
