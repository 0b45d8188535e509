//! Beat-level voice scheduling.
//!
//! Voices count down towards their attack and release beats. Once per beat
//! the mixer calls [`Scheduler::next_beat`] and then [`Scheduler::reassign`],
//! which hands every finished voice a new note and makes sure something is
//! sounding in the beat that is about to start.

use alloc::vec::Vec;
use rand::Rng;

use crate::config::{CompositionMode, ScheduleWindows};
use crate::error::EngineError;
use crate::selector::NoteSelector;
use crate::voice::{Voice, VoiceState};

/// Owns the ensemble's voices and decides when each one plays what.
#[derive(Clone, Debug)]
pub struct Scheduler {
    voices: Vec<Voice>,
    selector: NoteSelector,
    windows: ScheduleWindows,
    mode: CompositionMode,
    table_len: usize,
}

impl Scheduler {
    /// `slots` idle voices over a table of `table_len` pitches.
    pub fn new(slots: usize, table_len: usize, mode: CompositionMode, windows: ScheduleWindows) -> Self {
        Self {
            voices: (0..slots).map(|_| Voice::idle()).collect(),
            selector: NoteSelector::new(table_len),
            windows,
            mode,
            table_len,
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn mode(&self) -> CompositionMode {
        self.mode
    }

    pub fn states(&self) -> impl Iterator<Item = VoiceState> + '_ {
        self.voices.iter().map(Voice::state)
    }

    pub(crate) fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    /// Opening notes: every voice starts sounding on the first beat so audio
    /// begins immediately.
    pub fn open<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), EngineError> {
        match self.mode {
            CompositionMode::Ensemble => {
                let end = self.windows.opening_beats;
                for i in 0..self.voices.len() {
                    let tone = self.selector.pick_pitch(&self.voices, i, 0, end, rng)?;
                    self.voices[i].assign(tone, 0, end);
                }
            }
            CompositionMode::Showcase => {
                for i in 0..self.voices.len() {
                    self.assign_showcase(i);
                }
            }
        }
        Ok(())
    }

    /// Count every voice down by one beat.
    pub fn next_beat(&mut self) {
        for voice in &mut self.voices {
            voice.next_beat();
        }
    }

    /// Give each finished voice a new note, then enforce the no-silence rule.
    pub fn reassign<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), EngineError> {
        for i in 0..self.voices.len() {
            if self.voices[i].is_finished() {
                self.assign_next(i, rng)?;
            }
        }
        self.ensure_sounding();
        Ok(())
    }

    /// Pick timing and pitch for voice `index`.
    pub fn assign_next<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) -> Result<(), EngineError> {
        if index >= self.voices.len() {
            return Err(EngineError::NoSuchVoice(index));
        }
        match self.mode {
            CompositionMode::Ensemble => {
                let w = self.windows;
                let start = rng.random_range(w.delay_min..=w.delay_max);
                let end = start + rng.random_range(w.duration_min..=w.duration_max);
                let tone = self.selector.pick_pitch(&self.voices, index, start, end, rng)?;
                self.voices[index].assign(tone, start, end);
            }
            CompositionMode::Showcase => self.assign_showcase(index),
        }
        Ok(())
    }

    fn assign_showcase(&mut self, index: usize) {
        let hold = self.windows.showcase_beats - 1;
        let voice = &mut self.voices[index];
        let tone = voice.showcase_index % self.table_len;
        voice.assign(tone, 0, hold);
        voice.showcase_index = (tone + 1) % self.table_len;
    }

    /// If nothing would sound in the upcoming beat, pull the soonest pending
    /// voice forward so it starts now. Returns the voice moved, if any.
    pub fn ensure_sounding(&mut self) -> Option<usize> {
        if self.voices.iter().any(Voice::is_active) {
            return None;
        }
        let (index, _) = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.state() == VoiceState::Pending)
            .min_by_key(|(_, v)| v.start_beat)?;
        self.voices[index].start_now();
        Some(index)
    }
}
