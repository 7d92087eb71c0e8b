use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubError {
    #[error("Input rejected: {0}")]
    InputRejected(String),

    #[error("Media tool failed: {0}")]
    MediaTool(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Transcription job did not finish before the deadline")]
    TranscriptionTimeout,

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Translation job did not finish before the deadline")]
    TranslationTimeout,

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Synthesized clip contains no audible audio")]
    SynthesisEmptyAudio,

    #[error("Synthesized audio for fragment {0} is missing from job storage")]
    MissingFragmentAudio(usize),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, DubError>;
