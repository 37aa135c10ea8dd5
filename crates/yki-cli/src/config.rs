//! Configuration loading and resolution.
//!
//! The optional TOML file fills in whatever the command line leaves unset; built-in defaults
//! cover the rest.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use gemini_client::GeminiConfig;
use serde::Deserialize;
use speech_player::config::PlaybackConfig;
use speech_player::pcm::PcmFormat;

use crate::cli::Args;

/// Environment variables consulted for the API key, in order.
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Top-level config file schema.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub gemini: Option<GeminiSection>,
    pub audio: Option<AudioSection>,
}

/// `[gemini]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub content_model: Option<String>,
    pub speech_model: Option<String>,
    pub voice: Option<String>,
    /// Per-request timeout; unset waits indefinitely.
    pub timeout_secs: Option<u64>,
}

/// `[audio]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioSection {
    pub device: Option<String>,
    /// Rate of the synthesized PCM payload.
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub max_buffer_frames: Option<u32>,
    pub chunk_frames: Option<usize>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<AppConfig>(raw)?)
    }

    /// Load the file named on the command line, or use defaults.
    pub fn from_args(args: &Args) -> Result<Self> {
        match args.config.as_deref() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// Pick the API key: flag, then config file, then environment.
pub fn resolve_api_key(
    flag: Option<&str>,
    cfg: &AppConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    flag.and_then(non_empty)
        .or_else(|| {
            cfg.gemini
                .as_ref()
                .and_then(|g| g.api_key.as_deref())
                .and_then(non_empty)
        })
        .or_else(|| {
            API_KEY_VARS
                .iter()
                .find_map(|var| env(var).as_deref().and_then(non_empty))
        })
}

pub fn gemini_config(args: &Args, cfg: &AppConfig) -> Result<GeminiConfig> {
    let Some(api_key) = resolve_api_key(args.api_key.as_deref(), cfg, |var| {
        std::env::var(var).ok()
    }) else {
        bail!("no API key: pass --api-key, set [gemini] api_key, or export GEMINI_API_KEY");
    };
    Ok(apply_gemini_section(
        GeminiConfig::new(api_key),
        cfg.gemini.as_ref(),
    ))
}

fn apply_gemini_section(mut out: GeminiConfig, section: Option<&GeminiSection>) -> GeminiConfig {
    let Some(section) = section else {
        return out;
    };
    if let Some(url) = section.base_url.clone() {
        out.base_url = url;
    }
    if let Some(model) = section.content_model.clone() {
        out.content_model = model;
    }
    if let Some(model) = section.speech_model.clone() {
        out.speech_model = model;
    }
    if let Some(voice) = section.voice.clone() {
        out.voice = voice;
    }
    out.timeout = section.timeout_secs.map(Duration::from_secs);
    out
}

pub fn playback_config(args: &Args, cfg: &AppConfig) -> PlaybackConfig {
    let defaults = PlaybackConfig::default();
    let audio = cfg.audio.as_ref();
    PlaybackConfig {
        device: args
            .device
            .clone()
            .or_else(|| audio.and_then(|a| a.device.clone())),
        format: PcmFormat {
            sample_rate: audio
                .and_then(|a| a.sample_rate)
                .unwrap_or(defaults.format.sample_rate),
            channels: audio
                .and_then(|a| a.channels)
                .unwrap_or(defaults.format.channels),
        },
        chunk_frames: audio
            .and_then(|a| a.chunk_frames)
            .unwrap_or(defaults.chunk_frames),
        max_buffer_frames: audio
            .and_then(|a| a.max_buffer_frames)
            .unwrap_or(defaults.max_buffer_frames),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const SAMPLE: &str = r#"
        [gemini]
        api_key = "from-file"
        voice = "Puck"
        timeout_secs = 30

        [audio]
        device = "USB"
        max_buffer_frames = 2048
    "#;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["yki-cli"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn api_key_prefers_flag_then_file_then_env() {
        let cfg = AppConfig::parse(SAMPLE).unwrap();
        let env = |var: &str| (var == "API_KEY").then(|| "from-env".to_string());

        assert_eq!(
            resolve_api_key(Some("from-flag"), &cfg, env).as_deref(),
            Some("from-flag")
        );
        assert_eq!(resolve_api_key(None, &cfg, env).as_deref(), Some("from-file"));
        assert_eq!(
            resolve_api_key(None, &AppConfig::default(), env).as_deref(),
            Some("from-env")
        );
        assert_eq!(resolve_api_key(Some("  "), &AppConfig::default(), |_| None), None);
    }

    #[test]
    fn gemini_env_var_wins_over_generic() {
        let env = |var: &str| Some(format!("{var}-value"));
        assert_eq!(
            resolve_api_key(None, &AppConfig::default(), env).as_deref(),
            Some("GEMINI_API_KEY-value")
        );
    }

    #[test]
    fn gemini_section_overrides_defaults() {
        let cfg = AppConfig::parse(SAMPLE).unwrap();
        let out = apply_gemini_section(GeminiConfig::new("k"), cfg.gemini.as_ref());
        assert_eq!(out.voice, "Puck");
        assert_eq!(out.timeout, Some(Duration::from_secs(30)));
        assert_eq!(out.speech_model, gemini_client::config::DEFAULT_SPEECH_MODEL);
    }

    #[test]
    fn playback_flag_overrides_file() {
        let cfg = AppConfig::parse(SAMPLE).unwrap();
        let from_file = playback_config(&args(&[]), &cfg);
        assert_eq!(from_file.device.as_deref(), Some("USB"));
        assert_eq!(from_file.max_buffer_frames, 2048);
        assert_eq!(from_file.format, PcmFormat::SPEECH);

        let from_flag = playback_config(&args(&["--device", "Speakers"]), &cfg);
        assert_eq!(from_flag.device.as_deref(), Some("Speakers"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AppConfig::parse("[audio]\nrefill = 1\n").is_err());
    }
}
