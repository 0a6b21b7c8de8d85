//! Virtual audio sink on the host audio server.
//!
//! The decoder plays into a null sink and the capture process records from
//! that sink's monitor. All calls here shell out to `pactl` and block.

use crate::constants::{MAX_VOLUME, MIN_VOLUME};
use crate::error::{PipelineError, Result};
use std::process::Command;
use std::sync::Arc;

/// A registered sink, addressed by name for volume changes and by module id
/// for removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkHandle {
    pub name: String,
    pub module_id: u32,
}

impl SinkHandle {
    /// Source name of the read-only tap on this sink's output.
    pub fn monitor_name(&self) -> String {
        format!("{}.monitor", self.name)
    }
}

pub trait SinkManager: Send + Sync {
    /// Registers a new null sink called `name`.
    fn create(&self, name: &str) -> Result<SinkHandle>;

    /// Unregisters the sink. Failures are logged by the implementation.
    fn destroy(&self, handle: &SinkHandle);

    /// Sets the sink volume. `level` is already clamped by the caller.
    fn set_volume(&self, handle: &SinkHandle, level: u16) -> Result<()>;
}

/// Clamps an arbitrary requested level into the audio server's volume scale.
pub fn clamp_volume(level: i64) -> u16 {
    level.clamp(MIN_VOLUME as i64, MAX_VOLUME as i64) as u16
}

/// `SinkManager` backed by the `pactl` command line tool.
pub struct PactlSinkManager {
    pactl: String,
}

impl PactlSinkManager {
    pub fn new(pactl: impl Into<String>) -> Self {
        Self {
            pactl: pactl.into(),
        }
    }

    fn run(&self, args: &[&str]) -> std::io::Result<std::process::Output> {
        debug!("Running {} {}", self.pactl, args.join(" "));
        Command::new(&self.pactl).args(args).output()
    }
}

impl SinkManager for PactlSinkManager {
    fn create(&self, name: &str) -> Result<SinkHandle> {
        let sink_arg = format!("sink_name={name}");
        let output = self
            .run(&["load-module", "module-null-sink", &sink_arg])
            .map_err(|e| PipelineError::SinkRegistration {
                message: format!("could not run {}: {e}", self.pactl),
            })?;

        if !output.status.success() {
            return Err(PipelineError::SinkRegistration {
                message: format!(
                    "pactl exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let module_id = parse_module_id(&output.stdout)?;
        info!("Registered virtual sink {name} (module {module_id})");

        Ok(SinkHandle {
            name: name.to_string(),
            module_id,
        })
    }

    fn destroy(&self, handle: &SinkHandle) {
        let module_id = handle.module_id.to_string();
        match self.run(&["unload-module", &module_id]) {
            Ok(output) if output.status.success() => {
                info!("Unloaded virtual sink {}", handle.name);
            }
            Ok(output) => error!(
                "pactl failed to unload module {module_id} ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => error!("Could not run {} to unload module {module_id}: {e}", self.pactl),
        }
    }

    fn set_volume(&self, handle: &SinkHandle, level: u16) -> Result<()> {
        let level = level.to_string();
        let output = self
            .run(&["set-sink-volume", &handle.name, &level])
            .map_err(|e| PipelineError::SinkVolume {
                message: format!("could not run {}: {e}", self.pactl),
            })?;

        if !output.status.success() {
            return Err(PipelineError::SinkVolume {
                message: format!(
                    "pactl set-sink-volume {} {level} exited with {}",
                    handle.name, output.status
                ),
            });
        }

        Ok(())
    }
}

/// `pactl load-module` prints the new module's index on stdout.
pub(crate) fn parse_module_id(stdout: &[u8]) -> Result<u32> {
    let text = String::from_utf8_lossy(stdout);
    text.trim()
        .parse()
        .map_err(|_| PipelineError::SinkRegistration {
            message: format!("unexpected pactl output: {:?}", text.trim()),
        })
}

/// Exclusive ownership of a registered sink plus its cached volume.
///
/// The sink is unregistered exactly once, either by [`SinkGuard::release`] or
/// when the guard is dropped.
pub struct SinkGuard {
    manager: Arc<dyn SinkManager>,
    handle: Option<SinkHandle>,
    volume: u16,
}

impl SinkGuard {
    pub fn create(manager: Arc<dyn SinkManager>, name: &str) -> Result<Self> {
        let handle = manager.create(name)?;

        Ok(Self {
            manager,
            handle: Some(handle),
            volume: MAX_VOLUME,
        })
    }

    pub fn handle(&self) -> Option<&SinkHandle> {
        self.handle.as_ref()
    }

    /// Last requested volume, not re-queried from the server.
    pub fn volume(&self) -> u16 {
        self.volume
    }

    /// Clamps and caches `level`, then asks the server to apply it. The cache
    /// is updated even when the server call fails.
    pub fn set_volume(&mut self, level: i64) -> Result<u16> {
        let level = clamp_volume(level);
        self.volume = level;

        if let Some(handle) = &self.handle {
            self.manager.set_volume(handle, level)?;
        }

        Ok(level)
    }

    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.manager.destroy(&handle);
        }
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.release();
    }
}
