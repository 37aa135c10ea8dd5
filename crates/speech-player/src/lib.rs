//! Spoken-audio pipeline for listening tasks.
//!
//! A base64 PCM16 payload from the speech service flows through [`decode`] and [`pcm`] into a
//! [`pcm::PlayableAudioBuffer`], which the [`controller`] starts on the session's
//! [`output::AudioOutput`]. [`worker`] runs the controller on its own thread.

pub mod config;
pub mod controller;
pub mod decode;
pub mod device;
pub mod error;
pub mod output;
pub mod pcm;
pub mod playback;
pub mod resample;
pub mod status;
pub mod synth;
pub mod worker;

pub use error::{
    DecodeError, GenerationFailure, MaterializeError, OutputError, PlaybackError,
};
pub use synth::SpeechSynthesizer;
