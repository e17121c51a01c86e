use std::path::PathBuf;

use thiserror::Error;

/// A single failed attempt reported by a [`SpeechSynthesizer`](crate::narration::SpeechSynthesizer).
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Speech provider error: {0}")]
    Provider(String),

    #[error("Speech I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("Clip {index} could not be synthesized after {attempts} attempts: {last_error}")]
    Exhausted {
        index: usize,
        attempts: u32,
        last_error: SynthesisError,
    },

    #[error("Could not measure {}: {source}", path.display())]
    Measure {
        path: PathBuf,
        source: SynthesisError,
    },

    #[error("Clip {} has an invalid duration {duration}", path.display())]
    InvalidDuration { path: PathBuf, duration: f64 },

    #[error("Invalid narration setting: {0}")]
    InvalidSetting(String),

    #[error("Narration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum CompositionError {
    #[error("Cannot compose a timeline without narration")]
    EmptyNarration,

    #[error("Cannot compose a timeline without chart frames")]
    NoFrames,

    #[error("Invalid duration for {what}: {value}")]
    InvalidDuration { what: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Encoder I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize composition: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Encoder backend failed: {0}")]
    Backend(String),
}
