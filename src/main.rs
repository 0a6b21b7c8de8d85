#[macro_use]
extern crate log;

use anyhow::{Context, Result};
use mpv_voice_rs::{
    config, pipeline::Backend, session::PlayerSession, source::write_packets, stdin,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let source = std::env::args()
        .nth(1)
        .context("Usage: mpv-voice-rs <file or url>")?;
    let config = config::load().await?;

    let session = Arc::new(PlayerSession::new(Backend::system(&config.executables)));

    let pipeline = {
        let session = session.clone();
        let options = config.open_options(&source);
        tokio::task::spawn_blocking(move || session.play(&options)).await??
    };

    if let Some(volume) = config.initial_volume {
        if let Err(e) = pipeline.set_volume(volume as i64) {
            warn!("Could not apply initial volume {volume}: {e}");
        }
    }

    stdin::start(session.clone()).context("Failed to start console control")?;
    info!("{}", stdin::HELP);

    let mut output = open_output(&config.output)?;
    let pump = tokio::task::spawn_blocking(move || write_packets(&pipeline, &mut output));

    tokio::select! {
        result = pump => {
            let frames = result?.context("Failed to write frames")?;
            info!("Playback finished after {frames} frames");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping playback");
        }
    }

    session.stop();

    Ok(())
}

fn open_output(path: &str) -> Result<BufWriter<Box<dyn Write + Send>>> {
    let output: Box<dyn Write + Send> = if path == "-" {
        Box::new(std::io::stdout())
    } else {
        Box::new(File::create(path).with_context(|| format!("Could not create {path}"))?)
    };

    Ok(BufWriter::new(output))
}
