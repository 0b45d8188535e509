//! Generative playback engine for the chords ensemble.
//!
//! Precomputes one-period tone tables, schedules a small ensemble of voices
//! against a beat clock, picks pitches with a dissonance-weighted draw and
//! mixes everything into 8-bit mono samples on demand.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod clock;
pub mod config;
mod diagnostics;
mod error;
mod mixer;
mod sample;
pub mod scheduler;
pub mod selector;
mod tone;
mod transport;
mod voice;

pub use clock::BeatClock;
pub use config::{CompositionMode, EngineConfig, ScheduleWindows};
pub use diagnostics::{DiagnosticSink, NullSink};
pub use error::{ConfigError, EngineError};
pub use mixer::{Engine, FillStatus, FULL_SCALE};
pub use sample::{OutputSample, ParseSampleFormatError, SampleFormat};
pub use scheduler::Scheduler;
pub use selector::{NoteSelector, DISSONANCE_PROFILE};
pub use tone::{ParseWaveformError, Pitch, Tone, ToneTable, Waveform, MIN_PERIOD, PITCHES};
pub use transport::{Transport, TransportState};
pub use voice::{Voice, VoiceState, VOICE_VOLUME};
