//! `yki-cli`: a terminal YKI (Finnish language) practice exam.
//!
//! Generates a mock test for the chosen level, walks through the four sections, and reads
//! listening scripts aloud through a speech synthesis service.

mod cli;
mod config;
mod logging;
mod ui;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::Receiver;
use gemini_client::{ContentGenerator, GeminiContent, GeminiSpeech};
use speech_player::decode::decode_payload;
use speech_player::device;
use speech_player::output::CpalOutput;
use speech_player::pcm::{PlayableAudioBuffer, materialize};
use speech_player::worker::{PlayerEvent, PlayerHandle, spawn_player};
use yki_types::{PlaybackState, TestLevel};

use crate::cli::{Args, Command};
use crate::config::AppConfig;

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_devices {
        logging::init_stderr();
        return device::list_devices(&cpal::default_host());
    }

    let cfg = AppConfig::from_args(&args)?;
    match &args.cmd {
        None => run_exam(&args, &cfg, None),
        Some(Command::Exam { level }) => run_exam(&args, &cfg, *level),
        Some(Command::Generate { level, out }) => {
            logging::init_stderr();
            generate(&args, &cfg, *level, out.as_deref())
        }
        Some(Command::Speak { text }) => {
            logging::init_stderr();
            speak(&args, &cfg, text)
        }
        Some(Command::Decode {
            input,
            channels,
            sample_rate,
        }) => {
            logging::init_stderr();
            decode(input, *channels, *sample_rate)
        }
    }
}

/// Speech worker bound to the configured output device.
fn start_player(args: &Args, cfg: &AppConfig) -> Result<(PlayerHandle, Receiver<PlayerEvent>)> {
    let gemini = config::gemini_config(args, cfg)?;
    let playback = config::playback_config(args, cfg);
    let format = playback.format;
    let (evt_tx, evt_rx) = crossbeam_channel::unbounded();
    let player = spawn_player(
        Arc::new(GeminiSpeech::new(&gemini)),
        move |on_complete| CpalOutput::open(&playback, on_complete),
        format,
        evt_tx,
    );
    Ok((player, evt_rx))
}

fn run_exam(args: &Args, cfg: &AppConfig, level: Option<TestLevel>) -> Result<()> {
    let log_rx = logging::init_channel();
    let gemini = config::gemini_config(args, cfg)?;
    let content: Arc<dyn ContentGenerator> = Arc::new(GeminiContent::new(&gemini));
    let (player, player_events) = start_player(args, cfg)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "exam started");
    ui::run_tui(content, player, player_events, level, log_rx)
}

fn generate(args: &Args, cfg: &AppConfig, level: TestLevel, out: Option<&Path>) -> Result<()> {
    let gemini = config::gemini_config(args, cfg)?;
    let test = GeminiContent::new(&gemini)
        .generate_test(level)
        .with_context(|| format!("generate {level} test"))?;
    let json = serde_json::to_string_pretty(&test).context("serialize test")?;
    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("write {:?}", path))?;
            tracing::info!(path = %path.display(), "test written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn speak(args: &Args, cfg: &AppConfig, text: &str) -> Result<()> {
    let (player, events) = start_player(args, cfg)?;
    player.play(text);
    let result = wait_until_done(&events);
    player.shutdown();
    result
}

/// Follow player events until the request has played out or failed.
fn wait_until_done(events: &Receiver<PlayerEvent>) -> Result<()> {
    let mut started = false;
    for ev in events.iter() {
        match ev {
            PlayerEvent::Failed {
                message, notice, ..
            } => bail!("{notice} ({message})"),
            PlayerEvent::Status(status) => match status.state {
                PlaybackState::Loading => started = true,
                PlaybackState::Playing => {
                    started = true;
                    tracing::info!(
                        duration_ms = status.duration_ms.unwrap_or(0),
                        device = status.device.as_deref().unwrap_or("-"),
                        "playing"
                    );
                }
                PlaybackState::Idle if started => return Ok(()),
                PlaybackState::Idle => {}
            },
        }
    }
    bail!("player exited before playback finished")
}

fn decode(input: &Path, channels: u16, sample_rate: u32) -> Result<()> {
    let payload =
        std::fs::read_to_string(input).with_context(|| format!("read payload {:?}", input))?;
    let bytes = decode_payload(&payload).context("decode base64 payload")?;
    let buffer = materialize(&bytes, sample_rate, channels).context("materialize PCM16")?;
    for line in buffer_stats(bytes.len(), &buffer) {
        println!("{line}");
    }
    Ok(())
}

fn buffer_stats(byte_len: usize, buffer: &PlayableAudioBuffer) -> Vec<String> {
    let mut lines = vec![
        format!("bytes: {byte_len}"),
        format!("sample rate: {} Hz", buffer.sample_rate()),
        format!("channels: {}", buffer.channel_count()),
        format!("frames: {}", buffer.frame_count()),
        format!("duration: {} ms", buffer.duration_ms()),
    ];
    for ch in 0..buffer.channel_count() {
        let samples = buffer.channel(ch).unwrap_or(&[]);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let rms = if samples.is_empty() {
            0.0
        } else {
            (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
        };
        lines.push(format!("ch{ch}: peak {peak:.4} rms {rms:.4}"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use yki_types::PlaybackStatus;

    fn status(state: PlaybackState) -> PlayerEvent {
        PlayerEvent::Status(PlaybackStatus {
            state,
            ..Default::default()
        })
    }

    #[test]
    fn wait_returns_after_playback_ends() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for state in [
            PlaybackState::Loading,
            PlaybackState::Playing,
            PlaybackState::Idle,
        ] {
            tx.send(status(state)).unwrap();
        }
        assert!(wait_until_done(&rx).is_ok());
    }

    #[test]
    fn wait_reports_failure_notice() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(status(PlaybackState::Loading)).unwrap();
        tx.send(PlayerEvent::Failed {
            token: 1,
            message: "no audio data in synthesis response".into(),
            notice: "Äänen generointi epäonnistui (ei audiodataa)".into(),
        })
        .unwrap();
        let err = wait_until_done(&rx).unwrap_err();
        assert!(err.to_string().starts_with("Äänen generointi epäonnistui"));
    }

    #[test]
    fn wait_errors_when_player_disappears() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(status(PlaybackState::Loading)).unwrap();
        drop(tx);
        assert!(wait_until_done(&rx).is_err());
    }

    #[test]
    fn stats_cover_each_channel() {
        let bytes = [0x00, 0x40, 0x00, 0xC0];
        let buffer = materialize(&bytes, 24_000, 2).unwrap();
        let lines = buffer_stats(bytes.len(), &buffer);
        assert!(lines.contains(&"frames: 1".to_string()));
        assert!(lines.contains(&"ch0: peak 0.5000 rms 0.5000".to_string()));
        assert!(lines.contains(&"ch1: peak 0.5000 rms 0.5000".to_string()));
    }
}
