//! Playback controller.
//!
//! Three-state machine (`Idle → Loading → Playing → Idle`) around one speech request at a
//! time. The controller never blocks: it hands out a [`SpeechRequest`] and expects the
//! synthesis result back through [`PlaybackController::complete`]. Everything after the
//! network round-trip (decode, materialize, start output) runs synchronously inside
//! `complete`.
//!
//! Every request carries a session token. Results and completion reports whose token is not
//! the current session's are dropped, so a response that lands after a stop never starts
//! audio.

use yki_types::{PlaybackEndReason, PlaybackState, PlaybackStatus};

use crate::decode::decode_payload;
use crate::error::{GenerationFailure, PlaybackError};
use crate::output::{ActivePlayback, AudioOutput, OutputContext};
use crate::pcm::{PcmFormat, materialize_format};
use crate::status::PlayerStatusState;

/// Synthesis work the caller must perform for the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeechRequest {
    pub token: u64,
    pub text: String,
}

/// What pressing the play/stop control did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Idle: a synthesis request was issued.
    Requested(SpeechRequest),
    /// Playing: output was stopped.
    Stopped,
    /// Loading: the pending request was abandoned.
    Cancelled,
}

/// What happened to a synthesis result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Audio is playing.
    Started,
    /// The result belonged to an abandoned session.
    Discarded,
}

enum Session<H> {
    Idle,
    Loading { token: u64 },
    Playing { token: u64, playback: ActivePlayback<H> },
}

pub struct PlaybackController<O: AudioOutput> {
    context: OutputContext<O>,
    format: PcmFormat,
    session: Session<O::Handle>,
    token: u64,
    status: PlayerStatusState,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(context: OutputContext<O>, format: PcmFormat) -> Self {
        Self {
            context,
            format,
            session: Session::Idle,
            token: 0,
            status: PlayerStatusState::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        match self.session {
            Session::Idle => PlaybackState::Idle,
            Session::Loading { .. } => PlaybackState::Loading,
            Session::Playing { .. } => PlaybackState::Playing,
        }
    }

    /// Token of the current (or most recent) session.
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.snapshot(self.state(), self.token)
    }

    pub fn context(&self) -> &OutputContext<O> {
        &self.context
    }

    /// The single play/stop control.
    pub fn toggle(&mut self, text: &str) -> Result<ToggleOutcome, PlaybackError> {
        match self.session {
            Session::Playing { .. } => {
                self.stop();
                Ok(ToggleOutcome::Stopped)
            }
            Session::Loading { .. } => {
                self.stop();
                Ok(ToggleOutcome::Cancelled)
            }
            Session::Idle => self.request(text).map(ToggleOutcome::Requested),
        }
    }

    /// Start a new request, resolving any prior session first (stop-then-start).
    ///
    /// Opens the output context on first use and resumes it if suspended, so device
    /// problems surface before the network round-trip.
    pub fn request(&mut self, text: &str) -> Result<SpeechRequest, PlaybackError> {
        self.stop();
        self.token += 1;
        let token = self.token;
        self.status.begin_request(text);

        match self.context.acquire() {
            Ok(output) => {
                self.status.device = output.device_name();
            }
            Err(e) => {
                tracing::warn!(token, error = %e, "audio output unavailable");
                self.status.end_reason = Some(PlaybackEndReason::Error);
                return Err(e.into());
            }
        }

        tracing::info!(token, "speech requested");
        self.session = Session::Loading { token };
        Ok(SpeechRequest {
            token,
            text: text.to_string(),
        })
    }

    /// Stop output or abandon a pending request. Returns `false` when already idle.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.session, Session::Idle) {
            Session::Idle => false,
            Session::Loading { token } => {
                tracing::info!(token, "pending speech request abandoned");
                self.status.clear_playback();
                self.status.end_reason = Some(PlaybackEndReason::Cancelled);
                true
            }
            Session::Playing { token, playback } => {
                if let Some(output) = self.context.get_mut() {
                    output.stop(playback);
                }
                tracing::info!(token, "playback stopped");
                self.status.clear_playback();
                self.status.end_reason = Some(PlaybackEndReason::Stopped);
                true
            }
        }
    }

    /// Feed back the synthesis result for `token`.
    ///
    /// On success the payload is decoded, materialized and started. Any failure returns the
    /// controller to idle and is handed back to the caller for the user notice.
    pub fn complete(
        &mut self,
        token: u64,
        result: Result<String, GenerationFailure>,
    ) -> Result<Completion, PlaybackError> {
        if !matches!(self.session, Session::Loading { token: t } if t == token) {
            tracing::debug!(token, current = self.token, "stale speech result discarded");
            return Ok(Completion::Discarded);
        }

        match self.start_payload(token, result) {
            Ok(playback) => {
                tracing::info!(
                    token,
                    duration_ms = self.status.duration_ms.unwrap_or(0),
                    "playback started"
                );
                self.session = Session::Playing { token, playback };
                Ok(Completion::Started)
            }
            Err(e) => {
                tracing::warn!(token, error = %e, "speech playback failed");
                self.session = Session::Idle;
                self.status.clear_playback();
                self.status.end_reason = Some(PlaybackEndReason::Error);
                Err(e)
            }
        }
    }

    fn start_payload(
        &mut self,
        token: u64,
        result: Result<String, GenerationFailure>,
    ) -> Result<ActivePlayback<O::Handle>, PlaybackError> {
        let payload = result?;
        let bytes = decode_payload(&payload)?;
        let buffer = materialize_format(&bytes, self.format)?;

        self.status.sample_rate = Some(buffer.sample_rate());
        self.status.channels = Some(buffer.channel_count() as u16);
        self.status.duration_ms = Some(buffer.duration_ms());

        let output = self.context.acquire()?;
        let playback = output.start(token, buffer)?;
        self.status.output_rate = Some(playback.output_rate);
        self.status.played_frames = Some(playback.played_frames.clone());
        Ok(playback)
    }

    /// The output reported that `token`'s buffer was fully played.
    ///
    /// Returns `true` when this ended the current session.
    pub fn finished(&mut self, token: u64) -> bool {
        if !matches!(self.session, Session::Playing { token: t, .. } if t == token) {
            tracing::debug!(token, current = self.token, "stale completion ignored");
            return false;
        }
        if let Session::Playing { playback, .. } =
            std::mem::replace(&mut self.session, Session::Idle)
        {
            if let Some(output) = self.context.get_mut() {
                output.stop(playback);
            }
        }
        tracing::info!(token, "playback completed");
        self.status.clear_playback();
        self.status.end_reason = Some(PlaybackEndReason::Completed);
        true
    }
}
