//! Error types for the engine.

use thiserror::Error;

/// Rejected configuration, reported before any device is opened.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("voice count must be at least 1")]
    NoVoices,
    #[error("voice count {0} exceeds the maximum of {1}")]
    TooManyVoices(usize, usize),
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f32),
    #[error("sample rate must be positive")]
    InvalidSampleRate,
    #[error("tempo {tempo} BPM at {sample_rate} Hz leaves less than one sample per beat")]
    BeatTooShort { tempo: f32, sample_rate: u32 },
    #[error("tempo {tempo} BPM at {sample_rate} Hz makes a beat longer than the clock can count")]
    BeatTooLong { tempo: f32, sample_rate: u32 },
    #[error("schedule window {0} is empty")]
    EmptyWindow(&'static str),
}

/// Unrecoverable engine failures. Nothing in the engine retries these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("pitch {label} has a period of {period} samples (minimum {min})")]
    DegeneratePeriod { label: &'static str, period: usize, min: usize },
    #[error("weighted pitch walk exhausted the table without a candidate")]
    NoCandidate,
    #[error("pitch weights overflowed while folding voice {0}")]
    WeightOverflow(usize),
    #[error("voice {0} does not exist")]
    NoSuchVoice(usize),
}
