//! Offline resample stage.
//!
//! Uses Rubato to convert a whole [`PlayableAudioBuffer`] to the output device rate before
//! playback starts. Synthesized clips are short, so the buffer is processed in one pass on the
//! caller's thread instead of through a streaming queue. The output is trimmed to
//! `ceil(frames * ratio)` with the filter delay removed, so clip duration follows the rate ratio.

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    calculate_cutoff, Async, FixedAsync, Resampler, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::error::OutputError;
use crate::pcm::PlayableAudioBuffer;

/// Configuration for the resampler.
#[derive(Clone, Copy, Debug)]
pub struct ResampleConfig {
    /// Input chunk size in frames.
    pub chunk_frames: usize,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self { chunk_frames: 1024 }
    }
}

/// Resample `buffer` to `dst_rate`. Returns the input unchanged when the rates match.
pub fn resample_buffer(
    buffer: PlayableAudioBuffer,
    dst_rate: u32,
    cfg: ResampleConfig,
) -> Result<PlayableAudioBuffer, OutputError> {
    let src_rate = buffer.sample_rate();
    if dst_rate == 0 {
        return Err(OutputError::Resample("target rate must be positive".into()));
    }
    if src_rate == dst_rate {
        return Ok(buffer);
    }

    let channels = buffer.channel_count();
    let f_ratio = dst_rate as f64 / src_rate as f64;

    let sinc_len = 128;
    let oversampling_factor = 256;
    let interpolation = SincInterpolationType::Cubic;
    let window = WindowFunction::BlackmanHarris2;
    let f_cutoff = calculate_cutoff(sinc_len, window);

    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff,
        interpolation,
        oversampling_factor,
        window,
    };

    let chunk_in_frames = cfg.chunk_frames.max(1);
    let mut resampler = Async::<f32>::new_sinc(
        f_ratio,
        1.1,
        &params,
        chunk_in_frames,
        channels,
        FixedAsync::Input,
    )
    .map_err(|e| OutputError::Resample(format!("resampler init error: {e}")))?;

    let interleaved = buffer.interleaved();
    let total_frames = buffer.frame_count();
    let out_capacity = resampler.process_all_needed_output_len(total_frames);
    let mut out_interleaved = vec![0.0f32; channels * out_capacity];

    let input_adapter = InterleavedSlice::new(&interleaved[..], channels, total_frames)
        .map_err(|e| OutputError::Resample(format!("interleaved slice (input) error: {e}")))?;
    let mut output_adapter =
        InterleavedSlice::new_mut(&mut out_interleaved[..], channels, out_capacity).map_err(
            |e| OutputError::Resample(format!("interleaved slice (output) error: {e}")),
        )?;

    // Trims the resampler delay at the head and stops at the ratio-derived length.
    let (_nbr_in, nbr_out) = resampler
        .process_all_into_buffer(&input_adapter, &mut output_adapter, total_frames, None)
        .map_err(|e| OutputError::Resample(format!("resampler process error: {e}")))?;
    let produced = &out_interleaved[..nbr_out * channels];

    let frames_out = produced.len() / channels;
    let mut split = vec![Vec::with_capacity(frames_out); channels];
    for frame in produced.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            split[ch].push(*sample);
        }
    }

    tracing::debug!(
        from_hz = src_rate,
        to_hz = dst_rate,
        frames_in = total_frames,
        frames_out,
        "resampled speech buffer"
    );

    PlayableAudioBuffer::from_channels(dst_rate, split)
        .map_err(|e| OutputError::Resample(e.to_string()))
}
