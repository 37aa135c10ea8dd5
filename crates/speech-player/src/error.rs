//! Error taxonomy for the speech pipeline.
//!
//! Every variant ends at the playback controller, which turns it into an idle state plus a
//! one-shot notice. None of them is fatal to the session.

use thiserror::Error;

/// The transport payload is not valid base64.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid base64 audio payload: {0}")]
pub struct DecodeError(#[from] pub base64::DecodeError);

/// The decoded bytes cannot be turned into a playable buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("sample rate must be positive")]
    InvalidSampleRate,
    #[error("channel count must be positive")]
    InvalidChannelCount,
    /// Fewer samples than one full frame.
    #[error("insufficient PCM data: {bytes} bytes for {channels} channel(s)")]
    InsufficientData { bytes: usize, channels: u16 },
    /// Per-channel sample planes hold no frames.
    #[error("no frames in {channels} channel plane(s)")]
    NoFrames { channels: usize },
    /// Per-channel sample planes disagree on length.
    #[error("channel {channel} has {frames} frames, expected {expected}")]
    MismatchedChannels {
        channel: usize,
        frames: usize,
        expected: usize,
    },
}

/// The synthesis service did not deliver audio.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// The response carried no inline audio, possibly text instead.
    #[error("no audio data in synthesis response")]
    NoAudio { text: Option<String> },
    /// The service answered with an error status.
    #[error("synthesis request failed (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("synthesis request failed: {0}")]
    Transport(String),
    #[error("unexpected synthesis response: {0}")]
    InvalidResponse(String),
}

/// The audio output could not be opened or driven.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("no output device: {0}")]
    NoDevice(String),
    #[error("unsupported output configuration: {0}")]
    UnsupportedConfig(String),
    #[error("output stream error: {0}")]
    Stream(String),
    #[error("resampling failed: {0}")]
    Resample(String),
}

/// Anything that ends a playback request early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Generation(#[from] GenerationFailure),
    #[error(transparent)]
    Output(#[from] OutputError),
}

impl PlaybackError {
    /// Finnish notice shown to the user for any playback failure.
    pub fn user_notice(&self) -> &'static str {
        match self {
            PlaybackError::Generation(GenerationFailure::NoAudio { .. }) => {
                "Äänen generointi epäonnistui (ei audiodataa)"
            }
            _ => "Virhe äänen toistossa.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_audio_has_specific_notice() {
        let err = PlaybackError::from(GenerationFailure::NoAudio { text: None });
        assert_eq!(err.user_notice(), "Äänen generointi epäonnistui (ei audiodataa)");
    }

    #[test]
    fn other_failures_share_generic_notice() {
        let err = PlaybackError::from(MaterializeError::InvalidChannelCount);
        assert_eq!(err.user_notice(), "Virhe äänen toistossa.");
        let err = PlaybackError::from(OutputError::NoDevice("none".into()));
        assert_eq!(err.user_notice(), "Virhe äänen toistossa.");
    }
}
