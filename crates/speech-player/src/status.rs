use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use yki_types::{PlaybackEndReason, PlaybackState, PlaybackStatus};

const TEXT_PREVIEW_CHARS: usize = 60;

/// Status fields maintained by the playback controller.
#[derive(Debug, Default)]
pub struct PlayerStatusState {
    /// Preview of the text requested for synthesis.
    pub text: Option<String>,
    /// Output device name, once opened.
    pub device: Option<String>,
    /// Buffer sample rate in Hz.
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub duration_ms: Option<u64>,
    /// Rate the output device runs at.
    pub output_rate: Option<u32>,
    /// Counter updated by the output callback.
    pub played_frames: Option<Arc<AtomicU64>>,
    /// Why the last session ended.
    pub end_reason: Option<PlaybackEndReason>,
}

impl PlayerStatusState {
    /// Snapshot for status lines and events.
    pub fn snapshot(&self, state: PlaybackState, token: u64) -> PlaybackStatus {
        let elapsed_ms = match (self.played_frames.as_ref(), self.output_rate) {
            (Some(frames), Some(sr)) if sr > 0 => {
                let frames = frames.load(Ordering::Relaxed);
                Some(frames.saturating_mul(1000) / sr as u64)
            }
            _ => None,
        };
        let resample_to_hz = match (self.sample_rate, self.output_rate) {
            (Some(src), Some(dst)) if src != dst => Some(dst),
            _ => None,
        };
        PlaybackStatus {
            state,
            token,
            text: self.text.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            duration_ms: self.duration_ms,
            elapsed_ms,
            device: self.device.clone(),
            resample_to_hz,
            end_reason: self.end_reason,
        }
    }

    /// Reset per-request fields for a new synthesis request.
    pub fn begin_request(&mut self, text: &str) {
        self.clear_playback();
        self.text = Some(preview(text));
        self.end_reason = None;
    }

    /// Clear buffer-specific fields when playback ends. Keeps device and end reason.
    pub fn clear_playback(&mut self) {
        self.text = None;
        self.sample_rate = None;
        self.channels = None;
        self.duration_ms = None;
        self.output_rate = None;
        self.played_frames = None;
    }
}

fn preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= TEXT_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_elapsed_from_output_rate() {
        let state = PlayerStatusState {
            sample_rate: Some(24_000),
            output_rate: Some(48_000),
            played_frames: Some(Arc::new(AtomicU64::new(96_000))),
            ..Default::default()
        };
        let snap = state.snapshot(PlaybackState::Playing, 3);
        assert_eq!(snap.elapsed_ms, Some(2000));
        assert_eq!(snap.resample_to_hz, Some(48_000));
        assert_eq!(snap.token, 3);
    }

    #[test]
    fn clear_playback_keeps_device_and_end_reason() {
        let mut state = PlayerStatusState {
            text: Some("Hei".into()),
            device: Some("Speakers".into()),
            sample_rate: Some(24_000),
            played_frames: Some(Arc::new(AtomicU64::new(1))),
            end_reason: Some(PlaybackEndReason::Completed),
            ..Default::default()
        };
        state.clear_playback();
        assert!(state.text.is_none());
        assert!(state.sample_rate.is_none());
        assert!(state.played_frames.is_none());
        assert_eq!(state.device.as_deref(), Some("Speakers"));
        assert_eq!(state.end_reason, Some(PlaybackEndReason::Completed));
    }

    #[test]
    fn long_text_is_shortened() {
        let long = "sana ".repeat(40);
        let p = preview(&long);
        assert_eq!(p.chars().count(), TEXT_PREVIEW_CHARS + 1);
        assert!(p.ends_with('…'));
        assert_eq!(preview("  Hei  "), "Hei");
    }
}
