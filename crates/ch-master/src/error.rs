use ch_audio::AudioError;
use ch_engine::{ConfigError, EngineError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),
    #[error("audio device: {0}")]
    Audio(#[from] AudioError),
    #[error("playback is already running")]
    AlreadyPlaying,
    #[error("nothing is playing")]
    NotPlaying,
    #[error("failed to spawn {0} thread: {1}")]
    Spawn(&'static str, #[source] std::io::Error),
    #[error("{0} thread panicked")]
    Panicked(&'static str),
}
