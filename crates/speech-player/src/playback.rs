//! Playback stage (CPAL output stream).
//!
//! Builds a CPAL output stream over one in-memory [`PlayableAudioBuffer`].
//! The callback:
//! - copies frames straight from the buffer (no queue, no locks)
//! - applies basic channel mapping (mono↔stereo, best-effort otherwise)
//! - converts `f32` samples to the device sample format
//! - fires the completion hook exactly once when the buffer is exhausted

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use cpal::traits::DeviceTrait;

use crate::pcm::PlayableAudioBuffer;

/// Hooks wired into the output callback.
pub struct StreamHooks {
    /// Incremented by the number of output frames produced from the buffer.
    pub played_frames: Arc<AtomicU64>,
    /// Called once from the audio thread when the buffer has been fully consumed.
    pub on_finished: Box<dyn Fn() + Send + 'static>,
    /// Set when CPAL reports a stream error.
    pub errored: Arc<AtomicBool>,
}

/// Build a CPAL output stream that plays `buffer` from offset zero.
///
/// `buffer` must already be at the device sample rate.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    buffer: &PlayableAudioBuffer,
    hooks: StreamHooks,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, buffer, hooks),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, buffer, hooks),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, buffer, hooks),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, buffer, hooks),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: &PlayableAudioBuffer,
    hooks: StreamHooks,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let mut cursor = BufferCursor {
        pos: 0,
        src_channels: buffer.channel_count(),
        src: Arc::from(buffer.interleaved()),
    };

    let finished = AtomicBool::new(false);
    let StreamHooks {
        played_frames,
        on_finished,
        errored,
    } = hooks;

    let err_fn = move |err| {
        tracing::warn!("stream error: {err}");
        errored.store(true, Ordering::Relaxed);
    };

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let frames = data.len() / channels_out;
            let mut filled_frames = 0usize;

            for frame in 0..frames {
                if cursor.is_exhausted() {
                    for sample in &mut data[frame * channels_out..] {
                        *sample = <T as cpal::Sample>::from_sample::<f32>(0.0);
                    }
                    if !finished.swap(true, Ordering::AcqRel) {
                        on_finished();
                    }
                    break;
                }
                for ch in 0..channels_out {
                    let sample_f32 = next_sample_mapped(&mut cursor, channels_out, ch);
                    data[frame * channels_out + ch] =
                        <T as cpal::Sample>::from_sample::<f32>(sample_f32);
                }
                filled_frames += 1;
            }

            if filled_frames > 0 {
                played_frames.fetch_add(filled_frames as u64, Ordering::Relaxed);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Read position over the interleaved buffer owned by the callback.
struct BufferCursor {
    pos: usize,
    src_channels: usize,
    src: Arc<[f32]>,
}

impl BufferCursor {
    fn is_exhausted(&self) -> bool {
        self.pos >= self.src.len()
    }
}

/// Read one output sample for `dst_ch`, applying a simple channel mapping.
///
/// Mapping rules:
/// - mono → stereo: duplicate channel 0
/// - stereo → mono: average L/R
/// - stereo → stereo: pass-through
/// - other layouts: best-effort “clamp to available channels”
///
/// `cursor.pos` advances once per destination frame (after the last channel).
fn next_sample_mapped(cursor: &mut BufferCursor, dst_channels: usize, dst_ch: usize) -> f32 {
    if cursor.is_exhausted() {
        return 0.0;
    }

    let frame_start = cursor.pos;
    let get_src = |ch: usize, c: &BufferCursor| -> f32 {
        if ch < c.src_channels && frame_start + ch < c.src.len() {
            c.src[frame_start + ch]
        } else {
            0.0
        }
    };

    let out = match (cursor.src_channels, dst_channels) {
        (1, 1) => get_src(0, cursor),
        (2, 2) => get_src(dst_ch.min(1), cursor),
        (2, 1) => 0.5 * (get_src(0, cursor) + get_src(1, cursor)),
        (1, 2) => get_src(0, cursor),
        _ => get_src(dst_ch.min(cursor.src_channels.saturating_sub(1)), cursor),
    };

    if dst_ch + 1 == dst_channels {
        cursor.pos += cursor.src_channels;
    }
    out
}
