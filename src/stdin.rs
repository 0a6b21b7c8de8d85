//! Console control surface for the player binary.
//!
//! Each line typed on stdin is parsed into a [`ControlAction`] and applied to
//! the session while the frame pump keeps running.

use crate::session::{ControlAction, ControlReply, PlayerSession};
use std::sync::Arc;
use std::io::BufRead;

pub const HELP: &str = "Commands: << < p > >> | seek N | vol+ vol- | vol N | spd+ spd- | loop | bass | cmd TEXT | stop";

/// Parses one console line. Returns `None` for blank or unknown input.
pub fn parse_line(line: &str) -> Option<ControlAction> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let action = match (word, rest) {
        ("<<", "") => ControlAction::SeekBackLarge,
        ("<", "") => ControlAction::SeekBack,
        (">", "") => ControlAction::SeekForward,
        (">>", "") => ControlAction::SeekForwardLarge,
        ("p" | "pause" | "play", "") => ControlAction::PlayPause,
        ("stop" | "quit", "") => ControlAction::Stop,
        ("vol+" | "+", "") => ControlAction::VolumeUp,
        ("vol-" | "-", "") => ControlAction::VolumeDown,
        ("vol", level) => ControlAction::SetVolume(level.parse().ok()?),
        ("spd+" | "}", "") => ControlAction::SpeedUp,
        ("spd-" | "{", "") => ControlAction::SpeedDown,
        ("loop", "") => ControlAction::ToggleLoop,
        ("bass", "") => ControlAction::ToggleBassBoost,
        ("seek", secs) => ControlAction::Seek(secs.parse().ok()?),
        ("cmd", command) if !command.is_empty() => ControlAction::Raw(command.to_string()),
        _ => return None,
    };

    Some(action)
}

/// Reads control lines on a dedicated thread so a pending stdin read never
/// holds up runtime shutdown.
pub fn start(session: Arc<PlayerSession>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Error while reading stdin: {e}");
                        break;
                    }
                };

                let Some(action) = parse_line(&line) else {
                    if !line.trim().is_empty() {
                        warn!("Unknown command {:?}. {HELP}", line.trim());
                    }
                    continue;
                };

                match session.apply(&action) {
                    Ok(ControlReply::Done) => {}
                    Ok(ControlReply::Relabel { label }) => info!("{label}"),
                    Ok(ControlReply::Volume(level)) => info!("Volume: {level}"),
                    Ok(ControlReply::Stopped) => info!("[Player has stopped]"),
                    Err(e) => warn!("{e}"),
                }
            }
        })?;

    Ok(())
}
