use crate::error::GenerationFailure;

/// Text-to-speech backend.
///
/// Returns the base64 PCM16 payload exactly as received; decoding happens in the player.
/// Implementations block for the whole network round-trip.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<String, GenerationFailure>;
}

impl<S: SpeechSynthesizer + ?Sized> SpeechSynthesizer for std::sync::Arc<S> {
    fn synthesize(&self, text: &str) -> Result<String, GenerationFailure> {
        (**self).synthesize(text)
    }
}
