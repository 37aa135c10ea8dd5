//! Audio output seam.
//!
//! [`AudioOutput`] is the platform sink the playback controller drives: start one buffer,
//! stop it, report natural completion through a callback. [`OutputContext`] owns the single
//! session-lifetime output: created on first use, resumed when suspended, never torn down
//! while the session lives. [`CpalOutput`] is the CPAL implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cpal::traits::StreamTrait;

use crate::config::PlaybackConfig;
use crate::error::OutputError;
use crate::pcm::PlayableAudioBuffer;
use crate::resample::{ResampleConfig, resample_buffer};
use crate::{device, playback};

/// Completion hook: called with the session token once a buffer has been fully played.
pub type CompletionFn = Arc<dyn Fn(u64) + Send + Sync>;

/// A buffer that is currently being played.
pub struct ActivePlayback<H> {
    pub handle: H,
    /// Frames emitted by the output so far.
    pub played_frames: Arc<AtomicU64>,
    /// Rate the output runs at (differs from the buffer rate when resampled).
    pub output_rate: u32,
}

impl<H> ActivePlayback<H> {
    pub fn elapsed_ms(&self) -> u64 {
        if self.output_rate == 0 {
            return 0;
        }
        self.played_frames
            .load(Ordering::Relaxed)
            .saturating_mul(1000)
            / self.output_rate as u64
    }
}

/// Platform audio sink.
pub trait AudioOutput {
    type Handle;

    /// Whether the output needs [`AudioOutput::resume`] before it can start audio.
    fn is_suspended(&self) -> bool;

    fn resume(&mut self) -> Result<(), OutputError>;

    /// Start playing `buffer` at offset zero. Natural completion must be reported through the
    /// output's completion hook with `token`.
    fn start(
        &mut self,
        token: u64,
        buffer: PlayableAudioBuffer,
    ) -> Result<ActivePlayback<Self::Handle>, OutputError>;

    /// Halt output immediately.
    fn stop(&mut self, playback: ActivePlayback<Self::Handle>);

    fn device_name(&self) -> Option<String> {
        None
    }
}

type OpenFn<O> = Box<dyn FnMut() -> Result<O, OutputError>>;

/// Lazily-opened, session-lifetime audio output.
pub struct OutputContext<O> {
    open: OpenFn<O>,
    output: Option<O>,
}

impl<O: AudioOutput> OutputContext<O> {
    pub fn new(open: impl FnMut() -> Result<O, OutputError> + 'static) -> Self {
        Self {
            open: Box::new(open),
            output: None,
        }
    }

    /// Wrap an output that is already open.
    pub fn with_output(output: O) -> Self {
        Self {
            open: Box::new(|| Err(OutputError::NoDevice("output already consumed".into()))),
            output: Some(output),
        }
    }

    pub fn is_open(&self) -> bool {
        self.output.is_some()
    }

    /// Return the output, opening it on first use and resuming it if suspended.
    pub fn acquire(&mut self) -> Result<&mut O, OutputError> {
        let output = match self.output.take() {
            Some(output) => output,
            None => {
                let output = (self.open)()?;
                tracing::info!(
                    device = output.device_name().as_deref().unwrap_or("-"),
                    "audio output opened"
                );
                output
            }
        };
        let output = self.output.insert(output);
        if output.is_suspended() {
            tracing::info!("resuming suspended audio output");
            output.resume()?;
        }
        Ok(output)
    }

    /// The output, if it has been opened. Never opens or resumes.
    pub fn get_mut(&mut self) -> Option<&mut O> {
        self.output.as_mut()
    }

    pub fn get(&self) -> Option<&O> {
        self.output.as_ref()
    }
}

/// Stream kept alive for the duration of one playback.
pub struct CpalHandle {
    stream: cpal::Stream,
}

/// CPAL-backed output bound to one device and stream config.
///
/// A stream error marks the output suspended; [`AudioOutput::resume`] re-resolves the
/// device and config.
pub struct CpalOutput {
    cfg: PlaybackConfig,
    device: cpal::Device,
    device_name: String,
    sample_format: cpal::SampleFormat,
    stream_config: cpal::StreamConfig,
    suspended: Arc<AtomicBool>,
    on_complete: CompletionFn,
}

struct ResolvedDevice {
    device: cpal::Device,
    device_name: String,
    sample_format: cpal::SampleFormat,
    stream_config: cpal::StreamConfig,
}

impl CpalOutput {
    /// Open the configured device (or the host default).
    pub fn open(cfg: &PlaybackConfig, on_complete: CompletionFn) -> Result<Self, OutputError> {
        let resolved = resolve_device(cfg)?;
        Ok(Self {
            cfg: cfg.clone(),
            device: resolved.device,
            device_name: resolved.device_name,
            sample_format: resolved.sample_format,
            stream_config: resolved.stream_config,
            suspended: Arc::new(AtomicBool::new(false)),
            on_complete,
        })
    }

    pub fn output_rate(&self) -> u32 {
        self.stream_config.sample_rate
    }
}

fn resolve_device(cfg: &PlaybackConfig) -> Result<ResolvedDevice, OutputError> {
    let host = cpal::default_host();
    let device = device::pick_device(&host, cfg.device.as_deref())
        .map_err(|e| OutputError::NoDevice(format!("{e:#}")))?;
    let device_name = device::device_name(&device);
    let supported = device::pick_output_config(&device, Some(cfg.format.sample_rate))
        .map_err(|e| OutputError::UnsupportedConfig(format!("{e:#}")))?;
    let mut stream_config: cpal::StreamConfig = supported.config();
    if let Some(buffer_size) = device::pick_buffer_size(&supported, cfg.max_buffer_frames) {
        stream_config.buffer_size = buffer_size;
    }
    tracing::info!(
        device = %device_name,
        rate_hz = stream_config.sample_rate,
        channels = stream_config.channels,
        format = ?supported.sample_format(),
        "output device"
    );
    Ok(ResolvedDevice {
        device,
        device_name,
        sample_format: supported.sample_format(),
        stream_config,
    })
}

impl AudioOutput for CpalOutput {
    type Handle = CpalHandle;

    fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    fn resume(&mut self) -> Result<(), OutputError> {
        let resolved = resolve_device(&self.cfg)?;
        self.device = resolved.device;
        self.device_name = resolved.device_name;
        self.sample_format = resolved.sample_format;
        self.stream_config = resolved.stream_config;
        self.suspended.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn start(
        &mut self,
        token: u64,
        buffer: PlayableAudioBuffer,
    ) -> Result<ActivePlayback<CpalHandle>, OutputError> {
        let output_rate = self.output_rate();
        if buffer.sample_rate() != output_rate {
            tracing::info!(
                from_hz = buffer.sample_rate(),
                to_hz = output_rate,
                "resampling"
            );
        }
        let buffer = resample_buffer(
            buffer,
            output_rate,
            ResampleConfig {
                chunk_frames: self.cfg.chunk_frames,
            },
        )?;

        let played_frames = Arc::new(AtomicU64::new(0));
        let on_complete = self.on_complete.clone();
        let stream = playback::build_output_stream(
            &self.device,
            &self.stream_config,
            self.sample_format,
            &buffer,
            playback::StreamHooks {
                played_frames: played_frames.clone(),
                on_finished: Box::new(move || on_complete(token)),
                errored: self.suspended.clone(),
            },
        )
        .map_err(|e| OutputError::Stream(format!("{e:#}")))?;
        stream
            .play()
            .map_err(|e| OutputError::Stream(e.to_string()))?;

        Ok(ActivePlayback {
            handle: CpalHandle { stream },
            played_frames,
            output_rate,
        })
    }

    fn stop(&mut self, playback: ActivePlayback<CpalHandle>) {
        if let Err(e) = playback.handle.stream.pause() {
            tracing::debug!("stream pause on stop failed: {e}");
        }
    }

    fn device_name(&self) -> Option<String> {
        Some(self.device_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct NullOutput {
        suspended: bool,
        resumes: Rc<Cell<u32>>,
    }

    impl AudioOutput for NullOutput {
        type Handle = ();

        fn is_suspended(&self) -> bool {
            self.suspended
        }

        fn resume(&mut self) -> Result<(), OutputError> {
            self.suspended = false;
            self.resumes.set(self.resumes.get() + 1);
            Ok(())
        }

        fn start(
            &mut self,
            _token: u64,
            buffer: PlayableAudioBuffer,
        ) -> Result<ActivePlayback<()>, OutputError> {
            Ok(ActivePlayback {
                handle: (),
                played_frames: Arc::new(AtomicU64::new(0)),
                output_rate: buffer.sample_rate(),
            })
        }

        fn stop(&mut self, _playback: ActivePlayback<()>) {}
    }

    #[test]
    fn context_opens_once() {
        let opens = Rc::new(Cell::new(0));
        let resumes = Rc::new(Cell::new(0));
        let mut ctx = OutputContext::new({
            let opens = opens.clone();
            let resumes = resumes.clone();
            move || {
                opens.set(opens.get() + 1);
                Ok(NullOutput {
                    suspended: false,
                    resumes: resumes.clone(),
                })
            }
        });
        assert!(!ctx.is_open());
        ctx.acquire().unwrap();
        ctx.acquire().unwrap();
        assert!(ctx.is_open());
        assert_eq!(opens.get(), 1);
        assert_eq!(resumes.get(), 0);
    }

    #[test]
    fn suspended_output_is_resumed_on_acquire() {
        let resumes = Rc::new(Cell::new(0));
        let mut ctx = OutputContext::with_output(NullOutput {
            suspended: true,
            resumes: resumes.clone(),
        });
        let out = ctx.acquire().unwrap();
        assert!(!out.is_suspended());
        assert_eq!(resumes.get(), 1);
    }

    #[test]
    fn open_failure_leaves_context_closed() {
        let mut ctx: OutputContext<NullOutput> =
            OutputContext::new(|| Err(OutputError::NoDevice("none".into())));
        assert!(ctx.acquire().is_err());
        assert!(!ctx.is_open());
        assert!(ctx.get_mut().is_none());
    }

    #[test]
    fn elapsed_ms_uses_output_rate() {
        let playback = ActivePlayback {
            handle: (),
            played_frames: Arc::new(AtomicU64::new(48_000)),
            output_rate: 48_000,
        };
        assert_eq!(playback.elapsed_ms(), 1000);
    }
}
