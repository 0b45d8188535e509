//! Engine configuration and validation.

use crate::error::ConfigError;
use crate::tone::Waveform;

/// Upper bound on ensemble size. Keeps the multiplicative pitch weights
/// comfortably inside `u64`.
pub const MAX_VOICES: usize = 16;

/// Default output sample rate (Hz).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// How new notes are chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompositionMode {
    /// Dissonance-weighted improvisation across the whole ensemble.
    #[default]
    Ensemble,
    /// A single voice walks the pitch table in order.
    Showcase,
}

/// Beat windows the scheduler draws note timing from. All bounds inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleWindows {
    /// Beats between reassignment and the attack beat.
    pub delay_min: i32,
    pub delay_max: i32,
    /// Beats between the attack beat and the release beat.
    pub duration_min: i32,
    pub duration_max: i32,
    /// `end_beat` of the opening notes, which start immediately.
    pub opening_beats: i32,
    /// Beats each pitch is held in showcase mode.
    pub showcase_beats: i32,
}

impl Default for ScheduleWindows {
    fn default() -> Self {
        Self {
            delay_min: 0,
            delay_max: 4,
            duration_min: 1,
            duration_max: 6,
            opening_beats: 1,
            showcase_beats: 2,
        }
    }
}

/// Everything the engine needs to build its tone table and ensemble.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub voices: usize,
    pub tempo_bpm: f32,
    pub waveform: Waveform,
    pub mode: CompositionMode,
    pub sample_rate: u32,
    pub windows: ScheduleWindows,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voices: 5,
            tempo_bpm: 60.0,
            waveform: Waveform::Sine,
            mode: CompositionMode::Ensemble,
            sample_rate: DEFAULT_SAMPLE_RATE,
            windows: ScheduleWindows::default(),
        }
    }
}

impl EngineConfig {
    /// Check every option before anything is allocated or opened.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.voices == 0 {
            return Err(ConfigError::NoVoices);
        }
        if self.voices > MAX_VOICES {
            return Err(ConfigError::TooManyVoices(self.voices, MAX_VOICES));
        }
        if !self.tempo_bpm.is_finite() || self.tempo_bpm <= 0.0 {
            return Err(ConfigError::InvalidTempo(self.tempo_bpm));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }
        // The clock steps one past the beat length before rolling over.
        if self.raw_beat_length() >= u32::MAX as f32 {
            return Err(ConfigError::BeatTooLong {
                tempo: self.tempo_bpm,
                sample_rate: self.sample_rate,
            });
        }
        if self.beat_length() == 0 {
            return Err(ConfigError::BeatTooShort {
                tempo: self.tempo_bpm,
                sample_rate: self.sample_rate,
            });
        }

        let w = &self.windows;
        if w.delay_min < 0 || w.delay_min > w.delay_max {
            return Err(ConfigError::EmptyWindow("delay"));
        }
        if w.duration_min < 0 || w.duration_min > w.duration_max {
            return Err(ConfigError::EmptyWindow("duration"));
        }
        if w.opening_beats < 0 {
            return Err(ConfigError::EmptyWindow("opening"));
        }
        if w.showcase_beats < 1 {
            return Err(ConfigError::EmptyWindow("showcase"));
        }
        Ok(())
    }

    /// Samples per beat at the configured tempo.
    pub fn beat_length(&self) -> u32 {
        self.raw_beat_length() as u32
    }

    fn raw_beat_length(&self) -> f32 {
        libm::roundf(self.sample_rate as f32 * 60.0 / self.tempo_bpm)
    }

    /// Number of voice slots actually allocated.
    pub fn voice_slots(&self) -> usize {
        match self.mode {
            CompositionMode::Ensemble => self.voices,
            CompositionMode::Showcase => 1,
        }
    }
}
