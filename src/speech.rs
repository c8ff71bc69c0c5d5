use async_trait::async_trait;

/// Optional speech-to-text collaborator. Implementations return an empty
/// transcript when the audio cannot be understood.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    async fn transcribe(&self, audio: &[u8]) -> String;
}

/// Stand-in used when no recogniser is configured.
pub struct NoSpeech;

#[async_trait]
impl SpeechToText for NoSpeech {
    fn is_available(&self) -> bool {
        false
    }

    async fn transcribe(&self, _audio: &[u8]) -> String {
        String::new()
    }
}
