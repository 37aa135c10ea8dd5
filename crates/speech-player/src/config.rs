use crate::pcm::PcmFormat;

/// Playback tuning parameters shared by the resample and output stages.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Output device substring; `None` selects the host default.
    pub device: Option<String>,
    /// Format of the synthesized PCM payload.
    pub format: PcmFormat,
    /// Resampler chunk size in frames.
    pub chunk_frames: usize,
    /// Upper bound for a fixed device buffer size, in frames.
    pub max_buffer_frames: u32,
}

impl Default for PlaybackConfig {
    /// Defaults match the speech service output (24 kHz mono).
    fn default() -> Self {
        Self {
            device: None,
            format: PcmFormat::SPEECH,
            chunk_frames: 1024,
            max_buffer_frames: 4096,
        }
    }
}
