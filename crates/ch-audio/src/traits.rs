//! Audio output trait and error types.

use thiserror::Error;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No audio device available
    #[error("no audio output device available")]
    NoDevice,
    /// Failed to query or configure the device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create the output stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Device wants a sample type we cannot feed
    #[error("unsupported device sample format: {0}")]
    UnsupportedFormat(String),
    /// Play/pause failed
    #[error("playback error: {0}")]
    Playback(String),
    #[error("no stream has been opened")]
    NotOpen,
    /// The host reported the stream broken, e.g. the device went away
    #[error("stream error: {0}")]
    Stream(String),
}

/// Trait for audio output backends. The backend pulls samples from the
/// engine on its own thread; callers only drive the transport.
pub trait AudioOutput {
    /// Sample rate the device was opened at.
    fn sample_rate(&self) -> u32;

    /// Interleaved channel count; mono is duplicated to each.
    fn channels(&self) -> u16;

    /// Begin pulling samples.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop pulling samples. The stream can be restarted.
    fn pause(&mut self) -> Result<(), AudioError>;

    /// Release the stream.
    fn close(&mut self);

    /// The fill callback reported a halt or an engine error, or the host
    /// reported the stream broken.
    fn is_halted(&self) -> bool;
}
