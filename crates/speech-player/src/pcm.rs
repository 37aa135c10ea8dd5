//! PCM16 materialize stage.
//!
//! Turns raw little-endian signed 16-bit PCM bytes into a [`PlayableAudioBuffer`]:
//! one `f32` array per channel, normalized by `1 / 32768`.
//!
//! ## Truncation rules
//! - a trailing odd byte is never interpreted
//! - samples that do not complete a frame are dropped
//! - zero complete frames is an error, not an empty buffer

use std::time::Duration;

use crate::error::MaterializeError;

/// Divisor mapping an `i16` sample onto `[-1.0, 1.0)`.
pub const PCM16_SCALE: f32 = 32768.0;

/// Sample format delivered by the speech synthesis service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    /// 24 kHz mono, as produced by the TTS model.
    pub const SPEECH: PcmFormat = PcmFormat {
        sample_rate: 24_000,
        channels: 1,
    };
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::SPEECH
    }
}

/// Channel-separated, normalized audio ready for an output device.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayableAudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PlayableAudioBuffer {
    /// Build a buffer from per-channel samples. All channels must have the same length.
    pub fn from_channels(
        sample_rate: u32,
        channels: Vec<Vec<f32>>,
    ) -> Result<Self, MaterializeError> {
        if sample_rate == 0 {
            return Err(MaterializeError::InvalidSampleRate);
        }
        let Some(first) = channels.first() else {
            return Err(MaterializeError::InvalidChannelCount);
        };
        let frames = first.len();
        if frames == 0 {
            return Err(MaterializeError::NoFrames {
                channels: channels.len(),
            });
        }
        if let Some((channel, plane)) = channels
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != frames)
        {
            return Err(MaterializeError::MismatchedChannels {
                channel,
                frames: plane.len(),
                expected: frames,
            });
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Samples of one channel.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.frame_count() as u64).saturating_mul(1000) / self.sample_rate as u64
    }

    /// Interleaved copy (`frame0[ch0], frame0[ch1], frame1[ch0], ...`) for the output stage.
    pub fn interleaved(&self) -> Vec<f32> {
        let channels = self.channel_count();
        let mut out = Vec::with_capacity(self.frame_count() * channels);
        for frame in 0..self.frame_count() {
            for ch in &self.channels {
                out.push(ch[frame]);
            }
        }
        out
    }
}

/// Normalize one PCM16 sample.
#[inline]
pub fn normalize(sample: i16) -> f32 {
    sample as f32 / PCM16_SCALE
}

/// Interpret `bytes` as interleaved PCM16 LE and build a playable buffer.
pub fn materialize(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<PlayableAudioBuffer, MaterializeError> {
    if sample_rate == 0 {
        return Err(MaterializeError::InvalidSampleRate);
    }
    if channels == 0 {
        return Err(MaterializeError::InvalidChannelCount);
    }

    let usable = bytes.len() - bytes.len() % 2;
    let samples: Vec<i16> = bytes[..usable]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let channel_count = channels as usize;
    let frame_count = samples.len() / channel_count;
    if frame_count == 0 {
        return Err(MaterializeError::InsufficientData {
            bytes: bytes.len(),
            channels,
        });
    }

    let mut out = vec![Vec::with_capacity(frame_count); channel_count];
    for (c, channel) in out.iter_mut().enumerate() {
        for f in 0..frame_count {
            channel.push(normalize(samples[f * channel_count + c]));
        }
    }

    Ok(PlayableAudioBuffer {
        sample_rate,
        channels: out,
    })
}

/// Materialize with a fixed [`PcmFormat`].
pub fn materialize_format(
    bytes: &[u8],
    format: PcmFormat,
) -> Result<PlayableAudioBuffer, MaterializeError> {
    materialize(bytes, format.sample_rate, format.channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn eight_bytes_mono_yields_four_frames() {
        let samples = [0i16, 1, -1, 16_384];
        let buf = materialize(&le_bytes(&samples), 24_000, 1).unwrap();
        assert_eq!(buf.channel_count(), 1);
        assert_eq!(buf.frame_count(), 4);
        assert_eq!(buf.sample_rate(), 24_000);
        let expected: Vec<f32> = samples.iter().map(|s| *s as f32 / 32768.0).collect();
        assert_eq!(buf.channel(0).unwrap(), expected.as_slice());
    }

    #[test]
    fn trailing_odd_byte_is_ignored() {
        let mut bytes = le_bytes(&[100, -200, 300, -400]);
        let even = materialize(&bytes, 24_000, 1).unwrap();
        bytes.push(0x7f);
        let odd = materialize(&bytes, 24_000, 1).unwrap();
        assert_eq!(even, odd);
    }

    #[test]
    fn normalization_endpoints() {
        assert_eq!(normalize(i16::MIN), -1.0);
        assert_eq!(normalize(0), 0.0);
        assert!((normalize(i16::MAX) - 0.999_969).abs() < 1e-6);
        assert!(normalize(-5) < normalize(5));
    }

    #[test]
    fn stereo_is_deinterleaved() {
        let bytes = le_bytes(&[1, 2, 3, 4, 5, 6]);
        let buf = materialize(&bytes, 48_000, 2).unwrap();
        assert_eq!(buf.frame_count(), 3);
        assert_eq!(buf.channel(0).unwrap(), &[normalize(1), normalize(3), normalize(5)]);
        assert_eq!(buf.channel(1).unwrap(), &[normalize(2), normalize(4), normalize(6)]);
        assert_eq!(buf.interleaved(), (1..=6).map(normalize).collect::<Vec<_>>());
    }

    #[test]
    fn incomplete_tail_frame_is_dropped() {
        let bytes = le_bytes(&[1, 2, 3, 4, 5]);
        let buf = materialize(&bytes, 24_000, 2).unwrap();
        assert_eq!(buf.frame_count(), 2);
    }

    #[test]
    fn frame_count_matches_sample_count_over_channels() {
        for channels in [1u16, 2, 3, 4, 6] {
            let samples: Vec<i16> = (0..(channels as i16 * 10)).collect();
            let buf = materialize(&le_bytes(&samples), 24_000, channels).unwrap();
            assert_eq!(buf.frame_count(), 10);
            assert_eq!(buf.channel_count(), channels as usize);
        }
    }

    #[test]
    fn empty_input_is_insufficient() {
        assert_eq!(
            materialize(&[], 24_000, 1),
            Err(MaterializeError::InsufficientData { bytes: 0, channels: 1 })
        );
        assert!(matches!(
            materialize(&[1], 24_000, 1),
            Err(MaterializeError::InsufficientData { .. })
        ));
        assert!(matches!(
            materialize(&le_bytes(&[1]), 24_000, 2),
            Err(MaterializeError::InsufficientData { .. })
        ));
    }

    #[test]
    fn channel_planes_must_agree_on_length() {
        let ragged = vec![vec![0.0; 4], vec![0.0; 4], vec![0.0; 3]];
        assert_eq!(
            PlayableAudioBuffer::from_channels(24_000, ragged),
            Err(MaterializeError::MismatchedChannels {
                channel: 2,
                frames: 3,
                expected: 4,
            })
        );
        assert_eq!(
            PlayableAudioBuffer::from_channels(24_000, vec![Vec::new(), Vec::new()]),
            Err(MaterializeError::NoFrames { channels: 2 })
        );
        assert_eq!(
            PlayableAudioBuffer::from_channels(24_000, Vec::new()),
            Err(MaterializeError::InvalidChannelCount)
        );
    }

    #[test]
    fn zero_rate_or_channels_rejected() {
        let bytes = le_bytes(&[1, 2]);
        assert_eq!(materialize(&bytes, 0, 1), Err(MaterializeError::InvalidSampleRate));
        assert_eq!(materialize(&bytes, 24_000, 0), Err(MaterializeError::InvalidChannelCount));
    }

    #[test]
    fn duration_uses_sample_rate() {
        let bytes = le_bytes(&vec![0i16; 48_000]);
        let buf = materialize_format(&bytes, PcmFormat::SPEECH).unwrap();
        assert_eq!(buf.duration_ms(), 2000);
        assert_eq!(buf.duration(), Duration::from_secs(2));
    }
}
