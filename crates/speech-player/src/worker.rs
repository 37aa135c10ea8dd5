//! Speech playback worker.
//!
//! Owns the [`PlaybackController`] and the audio output on a dedicated thread. Synthesis runs
//! on short-lived helper threads that post their result back on an internal channel, so the
//! command loop never blocks on the network. The worker exits on [`PlayerHandle::shutdown`] or
//! once every handle has been dropped.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, select};
use yki_types::{PlaybackState, PlaybackStatus};

use crate::controller::{PlaybackController, SpeechRequest, ToggleOutcome};
use crate::error::{GenerationFailure, OutputError, PlaybackError};
use crate::output::{AudioOutput, CompletionFn, OutputContext};
use crate::pcm::PcmFormat;
use crate::synth::SpeechSynthesizer;

const STATUS_TICK: Duration = Duration::from_millis(250);

/// Commands accepted by the playback worker thread.
#[derive(Debug)]
pub enum PlayerCommand {
    /// The single play/stop control.
    Toggle { text: String },
    /// Always start fresh, stopping whatever is active.
    Play { text: String },
    Stop,
    Shutdown,
}

/// Reports posted back to the worker by synthesis threads and the output.
enum WorkerNotice {
    SpeechReady {
        token: u64,
        result: Result<String, GenerationFailure>,
    },
    Finished { token: u64 },
}

/// Events published by the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Status(PlaybackStatus),
    /// A request ended in an error. `notice` is the user-facing message.
    Failed {
        token: u64,
        message: String,
        notice: String,
    },
}

/// Handle for sending commands to the playback worker.
#[derive(Clone)]
pub struct PlayerHandle {
    cmd_tx: Sender<PlayerCommand>,
}

impl PlayerHandle {
    /// Wrap an existing command channel.
    pub fn new(cmd_tx: Sender<PlayerCommand>) -> Self {
        Self { cmd_tx }
    }

    pub fn toggle(&self, text: impl Into<String>) {
        self.send(PlayerCommand::Toggle { text: text.into() });
    }

    pub fn play(&self, text: impl Into<String>) {
        self.send(PlayerCommand::Play { text: text.into() });
    }

    pub fn stop(&self) {
        self.send(PlayerCommand::Stop);
    }

    pub fn shutdown(&self) {
        self.send(PlayerCommand::Shutdown);
    }

    fn send(&self, cmd: PlayerCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::debug!("player worker is gone; command dropped");
        }
    }
}

/// Spawn the playback worker thread.
///
/// `open_output` runs on the worker thread the first time audio is needed. It receives the
/// completion hook the output must call when a buffer finishes.
pub fn spawn_player<S, O, F>(
    synth: Arc<S>,
    open_output: F,
    format: PcmFormat,
    events: Sender<PlayerEvent>,
) -> PlayerHandle
where
    S: SpeechSynthesizer + ?Sized + 'static,
    O: AudioOutput + 'static,
    F: FnMut(CompletionFn) -> Result<O, OutputError> + Send + 'static,
{
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || player_thread_main(synth, open_output, format, events, cmd_rx));
    PlayerHandle { cmd_tx }
}

fn player_thread_main<S, O, F>(
    synth: Arc<S>,
    mut open_output: F,
    format: PcmFormat,
    events: Sender<PlayerEvent>,
    cmd_rx: Receiver<PlayerCommand>,
) where
    S: SpeechSynthesizer + ?Sized + 'static,
    O: AudioOutput + 'static,
    F: FnMut(CompletionFn) -> Result<O, OutputError> + Send + 'static,
{
    let (notice_tx, notice_rx) = crossbeam_channel::unbounded::<WorkerNotice>();
    let on_complete: CompletionFn = {
        let tx = notice_tx.clone();
        Arc::new(move |token| {
            let _ = tx.send(WorkerNotice::Finished { token });
        })
    };
    let context = OutputContext::new(move || open_output(on_complete.clone()));
    let mut controller = PlaybackController::new(context, format);
    let mut published: Option<PlaybackStatus> = None;

    loop {
        select! {
            recv(cmd_rx) -> msg => {
                let Ok(cmd) = msg else {
                    tracing::debug!("all player handles dropped");
                    controller.stop();
                    break;
                };
                match cmd {
                    PlayerCommand::Toggle { text } => match controller.toggle(&text) {
                        Ok(ToggleOutcome::Requested(req)) => dispatch(&synth, &notice_tx, req),
                        Ok(outcome) => tracing::debug!(?outcome, "toggle"),
                        Err(e) => report(&events, &controller, &e),
                    },
                    PlayerCommand::Play { text } => match controller.request(&text) {
                        Ok(req) => dispatch(&synth, &notice_tx, req),
                        Err(e) => report(&events, &controller, &e),
                    },
                    PlayerCommand::Stop => {
                        controller.stop();
                    }
                    PlayerCommand::Shutdown => {
                        controller.stop();
                        publish(&events, &controller, &mut published);
                        break;
                    }
                }
            }
            // the worker holds `notice_tx`, so this side never disconnects
            recv(notice_rx) -> msg => match msg {
                Ok(WorkerNotice::SpeechReady { token, result }) => {
                    if let Err(e) = controller.complete(token, result) {
                        report(&events, &controller, &e);
                    }
                }
                Ok(WorkerNotice::Finished { token }) => {
                    controller.finished(token);
                }
                Err(_) => break,
            },
            default(STATUS_TICK) => {
                if controller.state() != PlaybackState::Playing {
                    continue;
                }
            }
        }
        publish(&events, &controller, &mut published);
    }
    tracing::debug!("player worker exiting");
}

fn dispatch<S>(synth: &Arc<S>, notice_tx: &Sender<WorkerNotice>, req: SpeechRequest)
where
    S: SpeechSynthesizer + ?Sized + 'static,
{
    let synth = synth.clone();
    let tx = notice_tx.clone();
    std::thread::spawn(move || {
        let result = synth.synthesize(&req.text);
        let _ = tx.send(WorkerNotice::SpeechReady {
            token: req.token,
            result,
        });
    });
}

fn report<O: AudioOutput>(
    events: &Sender<PlayerEvent>,
    controller: &PlaybackController<O>,
    err: &PlaybackError,
) {
    let _ = events.send(PlayerEvent::Failed {
        token: controller.token(),
        message: err.to_string(),
        notice: err.user_notice().to_string(),
    });
}

fn publish<O: AudioOutput>(
    events: &Sender<PlayerEvent>,
    controller: &PlaybackController<O>,
    published: &mut Option<PlaybackStatus>,
) {
    let status = controller.status();
    if published.as_ref() == Some(&status) {
        return;
    }
    *published = Some(status.clone());
    let _ = events.send(PlayerEvent::Status(status));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ActivePlayback;
    use crate::pcm::PlayableAudioBuffer;
    use base64::{Engine as _, engine::general_purpose};
    use std::sync::atomic::AtomicU64;
    use yki_types::PlaybackEndReason;

    struct FakeSynth {
        delay: Duration,
        result: Result<String, GenerationFailure>,
    }

    impl SpeechSynthesizer for FakeSynth {
        fn synthesize(&self, _text: &str) -> Result<String, GenerationFailure> {
            std::thread::sleep(self.delay);
            self.result.clone()
        }
    }

    /// Reports completion as soon as playback starts.
    struct InstantOutput {
        on_complete: CompletionFn,
    }

    impl AudioOutput for InstantOutput {
        type Handle = ();

        fn is_suspended(&self) -> bool {
            false
        }

        fn resume(&mut self) -> Result<(), OutputError> {
            Ok(())
        }

        fn start(
            &mut self,
            token: u64,
            buffer: PlayableAudioBuffer,
        ) -> Result<ActivePlayback<()>, OutputError> {
            (self.on_complete)(token);
            Ok(ActivePlayback {
                handle: (),
                played_frames: Arc::new(AtomicU64::new(0)),
                output_rate: buffer.sample_rate(),
            })
        }

        fn stop(&mut self, _playback: ActivePlayback<()>) {}
    }

    fn spawn(synth: FakeSynth) -> (PlayerHandle, Receiver<PlayerEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_player(
            Arc::new(synth),
            |on_complete| Ok(InstantOutput { on_complete }),
            PcmFormat::SPEECH,
            tx,
        );
        (handle, rx)
    }

    fn collect(rx: &Receiver<PlayerEvent>, window: Duration) -> Vec<PlayerEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.recv_timeout(window) {
            out.push(ev);
        }
        out
    }

    fn states(events: &[PlayerEvent]) -> Vec<PlaybackState> {
        events
            .iter()
            .filter_map(|ev| match ev {
                PlayerEvent::Status(s) => Some(s.state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn toggle_plays_to_completion() {
        let pcm = general_purpose::STANDARD.encode([0u8, 0, 0, 64, 0, 192]);
        let (player, rx) = spawn(FakeSynth {
            delay: Duration::ZERO,
            result: Ok(pcm),
        });
        player.toggle("Hei");
        let events = collect(&rx, Duration::from_millis(300));
        player.shutdown();

        let seen = states(&events);
        assert_eq!(
            seen,
            vec![PlaybackState::Loading, PlaybackState::Playing, PlaybackState::Idle]
        );
        let Some(PlayerEvent::Status(last)) = events.last() else {
            panic!("expected status");
        };
        assert_eq!(last.end_reason, Some(PlaybackEndReason::Completed));
    }

    #[test]
    fn missing_audio_reports_notice() {
        let (player, rx) = spawn(FakeSynth {
            delay: Duration::ZERO,
            result: Err(GenerationFailure::NoAudio { text: None }),
        });
        player.toggle("Hei");
        let events = collect(&rx, Duration::from_millis(300));
        player.shutdown();

        let notice = events.iter().find_map(|ev| match ev {
            PlayerEvent::Failed { notice, .. } => Some(notice.clone()),
            _ => None,
        });
        assert_eq!(
            notice.as_deref(),
            Some("Äänen generointi epäonnistui (ei audiodataa)")
        );
        assert!(!states(&events).contains(&PlaybackState::Playing));
    }

    #[test]
    fn cancelled_request_never_plays() {
        let pcm = general_purpose::STANDARD.encode([0u8, 1]);
        let (player, rx) = spawn(FakeSynth {
            delay: Duration::from_millis(100),
            result: Ok(pcm),
        });
        player.toggle("Hei");
        player.toggle("Hei");
        let events = collect(&rx, Duration::from_millis(400));
        player.shutdown();

        let seen = states(&events);
        assert!(seen.contains(&PlaybackState::Loading));
        assert!(!seen.contains(&PlaybackState::Playing));
        let Some(PlayerEvent::Status(last)) = events.last() else {
            panic!("expected status");
        };
        assert_eq!(last.end_reason, Some(PlaybackEndReason::Cancelled));
    }

    #[test]
    fn dropping_every_handle_ends_the_worker() {
        let (player, rx) = spawn(FakeSynth {
            delay: Duration::ZERO,
            result: Ok(String::new()),
        });
        let second = player.clone();
        drop(player);
        drop(second);

        // the worker owns the only event sender; its exit disconnects the channel
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut disconnected = false;
        while std::time::Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(_) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    break;
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            }
        }
        assert!(disconnected);
    }

    #[test]
    fn device_failure_is_reported() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let player = spawn_player(
            Arc::new(FakeSynth {
                delay: Duration::ZERO,
                result: Ok(String::new()),
            }),
            |_| -> Result<InstantOutput, OutputError> { Err(OutputError::NoDevice("none".into())) },
            PcmFormat::SPEECH,
            tx,
        );
        player.play("Hei");
        let events = collect(&rx, Duration::from_millis(300));
        player.shutdown();
        assert!(events.iter().any(|ev| matches!(
            ev,
            PlayerEvent::Failed { notice, .. } if notice == "Virhe äänen toistossa."
        )));
    }
}
