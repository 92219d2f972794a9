//! Preso console runner
//!
//! Plays a presentation script with a headless avatar and a folder-backed
//! slide display, narrating through VOICEVOX. Playback is driven from stdin.

use anyhow::Context;
use preso_core::{list_media, PresoConfig, Script, TracingAvatar};
use preso_player::{FolderDisplay, PlayerEvent, PlayerResult, PresoPlayer};
use preso_voice::{default_output, Speaker, VoicevoxTts};
use std::{path::Path, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pause,
    Resume,
    Stop,
    Restart,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "p" => Some(Command::Pause),
        "r" => Some(Command::Resume),
        "s" => Some(Command::Stop),
        "R" => Some(Command::Restart),
        "q" => Some(Command::Quit),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[preso-console] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PresoConfig::load().context("load PresoConfig")?;
    let script = Arc::new(load_script(&config)?);
    let start_index = std::env::var("PRESO_START_INDEX")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0);
    let speaker_id = config.default_speaker_id;

    let tts = VoicevoxTts::from_config(&config).context("build VOICEVOX client")?;
    check_speaker(&tts, speaker_id).await;
    match list_media(&config.slides_dir) {
        Ok(files) => tracing::info!(dir = %config.slides_dir, files = files.len(), "slide library"),
        Err(e) => tracing::warn!(dir = %config.slides_dir, error = %e, "slide library unavailable"),
    }

    let player = Arc::new(PresoPlayer::new(
        Arc::new(TracingAvatar),
        Arc::new(FolderDisplay::from_config(&config)),
        Arc::new(tts),
        default_output(),
        &config,
    ));
    if let Some(events) = player.take_event_receiver() {
        tokio::spawn(print_events(events));
    }

    tracing::info!(
        title = %script.title,
        cues = script.cues.len(),
        start_index,
        speaker_id,
        "presentation starting"
    );
    println!("commands: p pause | r resume | s stop | R restart | q quit");

    let mut run = spawn_play(
        Arc::clone(&player),
        Arc::clone(&script),
        speaker_id,
        start_index,
        false,
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let finished = loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(Command::Pause) => { player.pause(); }
                    Some(Command::Resume) => { player.resume(); }
                    Some(Command::Stop) => { player.stop(); }
                    Some(Command::Restart) => {
                        run = spawn_play(
                            Arc::clone(&player),
                            Arc::clone(&script),
                            speaker_id,
                            0,
                            true,
                        );
                    }
                    Some(Command::Quit) => {
                        player.stop();
                        break None;
                    }
                    None if line.trim().is_empty() => {}
                    None => tracing::warn!(command = %line.trim(), "unknown command"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
            // without a terminal the presentation simply runs to its end
            finished = &mut run, if !stdin_open => break Some(finished),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; stopping presentation");
                player.stop();
                break None;
            }
        }
    };

    let finished = match finished {
        Some(finished) => finished,
        None => run.await,
    };
    report(finished)
}

fn load_script(config: &PresoConfig) -> anyhow::Result<Script> {
    let path = Path::new(&config.script_path);
    if !path.exists() {
        tracing::warn!(path = %path.display(), "script not found; playing the built-in demo");
        return Ok(Script::demo());
    }
    let script = Script::load(path).with_context(|| format!("load script {}", path.display()))?;
    script
        .validate()
        .with_context(|| format!("script {} cannot be played", path.display()))?;
    Ok(script)
}

async fn check_speaker(tts: &VoicevoxTts, speaker_id: u32) {
    let speakers = match tts.speakers().await {
        Ok(speakers) => speakers,
        Err(e) => {
            tracing::warn!(
                url = %tts.base_url,
                error = %e,
                "VOICEVOX unreachable; narration will be skipped"
            );
            Speaker::fallback()
        }
    };
    let style = speakers
        .iter()
        .flat_map(|s| s.styles.iter().map(move |style| (s, style)))
        .find(|(_, style)| style.id == speaker_id);
    match style {
        Some((speaker, style)) => {
            tracing::info!(
                speaker = %speaker.name,
                style = %style.name,
                speaker_id,
                "narration voice"
            )
        }
        None => tracing::warn!(speaker_id, "speaker id not offered by the engine"),
    }
}

fn spawn_play(
    player: Arc<PresoPlayer>,
    script: Arc<Script>,
    speaker_id: u32,
    start_index: usize,
    restart: bool,
) -> JoinHandle<PlayerResult<()>> {
    tokio::spawn(async move {
        if restart {
            player.restart(&script, speaker_id).await
        } else {
            player.play(&script, speaker_id, start_index).await
        }
    })
}

fn report(finished: Result<PlayerResult<()>, JoinError>) -> anyhow::Result<()> {
    match finished {
        Ok(Ok(())) => {
            tracing::info!("presentation ended");
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("presentation aborted"),
        Err(e) => Err(e).context("player task failed"),
    }
}

async fn print_events(mut events: mpsc::UnboundedReceiver<PlayerEvent>) {
    while let Some(event) = events.recv().await {
        println!("{}", describe(&event));
    }
}

fn describe(event: &PlayerEvent) -> String {
    match event {
        PlayerEvent::Started {
            timestamp,
            start_index,
            cue_count,
        } => format!(
            "[{}] started at cue {} of {}",
            timestamp.format("%H:%M:%S"),
            start_index + 1,
            cue_count
        ),
        PlayerEvent::CueStarted {
            timestamp,
            index,
            slide,
        } => format!(
            "[{}] cue {} (slide {})",
            timestamp.format("%H:%M:%S"),
            index + 1,
            slide
        ),
        PlayerEvent::Paused { timestamp } => format!("[{}] paused", timestamp.format("%H:%M:%S")),
        PlayerEvent::Resumed { timestamp } => format!("[{}] resumed", timestamp.format("%H:%M:%S")),
        PlayerEvent::Stopped { timestamp } => format!("[{}] stopped", timestamp.format("%H:%M:%S")),
        PlayerEvent::Finished { timestamp } => {
            format!("[{}] finished", timestamp.format("%H:%M:%S"))
        }
        PlayerEvent::Failed {
            timestamp,
            index,
            message,
        } => format!(
            "[{}] cue {} failed: {}",
            timestamp.format("%H:%M:%S"),
            index + 1,
            message
        ),
    }
}
