//! Runtime configuration shared by the binary and the controller.

use ch_audio::StreamSettings;
use ch_engine::config::DEFAULT_SAMPLE_RATE;
use ch_engine::{CompositionMode, ConfigError, EngineConfig, SampleFormat, ScheduleWindows, Waveform};

/// Host buffer size in frames unless overridden.
pub const DEFAULT_BUFFER_SIZE: u32 = 8192;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub voices: usize,
    pub tempo_bpm: f32,
    pub waveform: Waveform,
    pub format: SampleFormat,
    /// Single voice walks the whole pitch table.
    pub showcase: bool,
    /// Print one CSV line per sample to stdout.
    pub log_samples: bool,
    /// Device default when `None`.
    pub sample_rate: Option<u32>,
    /// Frames per host buffer; `0` leaves it to the device.
    pub buffer_size: u32,
    /// Fresh OS entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            voices: engine.voices,
            tempo_bpm: engine.tempo_bpm,
            waveform: engine.waveform,
            format: SampleFormat::default(),
            showcase: false,
            log_samples: false,
            sample_rate: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            seed: None,
        }
    }
}

impl Config {
    /// Check everything that can be checked before a device is opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine_config(self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)).validate()
    }

    /// Engine settings for a device running at `sample_rate`.
    pub fn engine_config(&self, sample_rate: u32) -> EngineConfig {
        EngineConfig {
            voices: self.voices,
            tempo_bpm: self.tempo_bpm,
            waveform: self.waveform,
            mode: if self.showcase { CompositionMode::Showcase } else { CompositionMode::Ensemble },
            sample_rate,
            windows: ScheduleWindows::default(),
        }
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            sample_rate: self.sample_rate,
            buffer_size: (self.buffer_size > 0).then_some(self.buffer_size),
        }
    }
}
